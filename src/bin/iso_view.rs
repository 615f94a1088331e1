//! Interactive isometric map viewer.
//!
//! ```bash
//! cargo run --release -- --map-size 96 --vehicles 40 --config view.toml
//! ```
//!
//! Arrows scroll, `Z`/`X` zoom, `F` follows a vehicle, `B` toggles bounding
//! boxes, `G` toggles dirty-block tinting, left click recentres the main view
//! (or reports the sign under the cursor).

use clap::Parser;
use glam::{IVec2, IVec3, ivec2, ivec3};
use hecs::{Entity, World};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use isoview::{
    config::ViewportConfig,
    engine::{
        Compositor, DirtyRects, DrawRegion, ObjectDrawer, Overlay, Rect, RepaintSink, Scene, SpriteBounds,
        SpriteCollector, TileDrawer, Viewport, ViewportSet, ZoomLevel, ZoomStep,
        dirty::{mark_all_viewports_dirty, mark_tile_dirty_by_tile},
        projection::{remap_coords, remap_coords2},
        types::{TILE_HEIGHT, TILE_SIZE},
        zoom::scale_by_zoom,
    },
    renderer::{Blitter, PaletteMode, Rgba, Software},
    world::{
        HeightMap, SignIndex, SignKind, Sprite, SpriteBank, SpriteId, TileInfo, TileKind, TileMap,
        sprite::Palette,
    },
};

#[derive(Parser, Debug)]
#[command(about = "Isometric viewport demo")]
struct Args {
    #[arg(long, default_value_t = 1280)]
    width: usize,
    #[arg(long, default_value_t = 800)]
    height: usize,
    /// Tiles along each map edge.
    #[arg(long, default_value_t = 64)]
    map_size: i32,
    #[arg(long, default_value_t = 24)]
    vehicles: usize,
    /// Viewport settings (TOML).
    #[arg(long)]
    config: Option<PathBuf>,
}

/*──────────────────────────── sprites ─────────────────────────────*/

mod pal {
    pub const GRASS: u8 = 1;
    pub const SLOPE: u8 = 2;
    pub const WATER: u8 = 3;
    pub const WALL: u8 = 4;
    pub const ROOF: u8 = 5;
    pub const TREE: u8 = 6;
    pub const DECK: u8 = 7;
    pub const VEHICLE: u8 = 8;
    pub const CURSOR: u8 = 9;
}

fn palette() -> Palette {
    let mut p = Palette::default();
    p[pal::GRASS] = 0xFF_4C_8C_3C;
    p[pal::SLOPE] = 0xFF_3E_74_30;
    p[pal::WATER] = 0xFF_2C_5C_A8;
    p[pal::WALL] = 0xFF_B8_A0_80;
    p[pal::ROOF] = 0xFF_9C_3C_2C;
    p[pal::TREE] = 0xFF_1E_50_1E;
    p[pal::DECK] = 0xFF_70_70_78;
    p[pal::VEHICLE] = 0xFF_E8_C8_20;
    p[pal::CURSOR] = 0xFF_F0_F0_F0;
    p
}

/// Flat tile diamond anchored at its north corner.
fn diamond(name: &str, colour: u8) -> Sprite {
    let (w, h) = (64usize, 32usize);
    let mut pixels = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let dx = (2 * x as i32 + 1 - w as i32).abs();
            let dy = (2 * y as i32 + 1 - h as i32).abs();
            if dx + 2 * dy <= w as i32 {
                pixels[y * w + x] = colour;
            }
        }
    }
    Sprite {
        name: name.into(),
        x_offs: -32,
        y_offs: 0,
        width: w as u16,
        height: h as u16,
        pixels,
    }
}

/// Diamond outline only.
fn cursor() -> Sprite {
    let mut s = diamond("CURSOR", pal::CURSOR);
    let full = s.clone();
    let (w, h) = (s.width as usize, s.height as usize);
    for y in 0..h {
        for x in 0..w {
            let inner = x > 0 && x + 1 < w && y > 0 && y + 1 < h
                && full.pixel(x - 1, y) != 0
                && full.pixel(x + 1, y) != 0
                && full.pixel(x, y - 1) != 0
                && full.pixel(x, y + 1) != 0;
            if inner {
                s.pixels[y * w + x] = 0;
            }
        }
    }
    s
}

struct Ids {
    grass: SpriteId,
    slope: SpriteId,
    water: SpriteId,
    wall: SpriteId,
    roof: SpriteId,
    tree: SpriteId,
    deck: SpriteId,
    vehicle: SpriteId,
    cursor: SpriteId,
}

fn load_sprites() -> anyhow::Result<(SpriteBank, Ids)> {
    let mut bank = SpriteBank::default_with_checker();
    bank.set_palette(palette());
    let ids = Ids {
        grass: bank.insert(diamond("GRASS", pal::GRASS))?,
        slope: bank.insert(diamond("SLOPE", pal::SLOPE))?,
        water: bank.insert(diamond("WATER", pal::WATER))?,
        wall: bank.insert(Sprite::solid("HOUSE", -14, -12, 28, 36, pal::WALL))?,
        roof: bank.insert(Sprite::solid("ROOF", 0, 0, 28, 8, pal::ROOF))?,
        tree: bank.insert(Sprite::solid("TREE", -4, -18, 8, 22, pal::TREE))?,
        deck: bank.insert(Sprite::solid("DECK", -32, 0, 64, 6, pal::DECK))?,
        vehicle: bank.insert(Sprite::solid("VEHICLE", -4, -7, 8, 8, pal::VEHICLE))?,
        cursor: bank.insert(cursor())?,
    };
    log::debug!("{} sprites loaded", bank.len());
    Ok((bank, ids))
}

/*──────────────────────────── map ─────────────────────────────────*/

fn hash(x: i32, y: i32) -> u32 {
    let mut h = (x as u32).wrapping_mul(0x9E37_79B1) ^ (y as u32).wrapping_mul(0x85EB_CA77);
    h ^= h >> 15;
    h = h.wrapping_mul(0xC2B2_AE3D);
    h ^ (h >> 13)
}

fn build_map(n: i32) -> HeightMap {
    let mut map = HeightMap::from_fn(n, n, |x, y| {
        let v = (x as f32 * 0.3).sin() + (y as f32 * 0.25).cos();
        (v * 1.5 + 1.5).round().clamp(0.0, 4.0) as u8
    });

    for y in 0..n {
        for x in 0..n {
            let (slope, z) = map.tile_slope_outside_map(x, y);
            let kind = if z == 0 && slope.is_empty() {
                TileKind::Water
            } else if !slope.is_empty() {
                TileKind::Clear
            } else {
                match hash(x, y) % 11 {
                    0 | 1 => TileKind::House,
                    2 | 3 | 4 => TileKind::Trees,
                    _ => TileKind::Clear,
                }
            };
            map.set_kind(x, y, kind);
        }
    }

    /* one bridge across the middle */
    let row = n / 2;
    for x in n / 4..n * 3 / 4 {
        map.set_kind(x, row, TileKind::TunnelBridge);
        map.set_bridge(x, row, Some(6));
    }
    map
}

struct DemoTiles<'a> {
    map: &'a HeightMap,
    ids: &'a Ids,
    hover: Option<IVec2>,
}

impl TileDrawer for DemoTiles<'_> {
    fn draw_tile(&self, ti: &TileInfo, vd: &mut SpriteCollector<'_>) {
        let ground = match ti.kind {
            TileKind::Void => return,
            TileKind::Water => self.ids.water,
            _ if !ti.slope.is_empty() => self.ids.slope,
            _ => self.ids.grass,
        };
        vd.draw_ground_sprite(ground, PaletteMode::Normal, None, IVec2::ZERO);

        match ti.kind {
            TileKind::House => {
                let bounds = SpriteBounds::new(14, 14, 24).with_offset(2, 2, 0);
                vd.add_sortable_sprite(self.ids.wall, PaletteMode::Normal, ti.x, ti.y, ti.z, bounds, false, None);
                vd.add_child_sprite(self.ids.roof, PaletteMode::Normal, 0, 0, false, None, true);
            }
            TileKind::Trees => {
                let bounds = SpriteBounds::new(10, 10, 16).with_offset(6, 6, 0);
                vd.add_sortable_sprite(self.ids.tree, PaletteMode::Normal, ti.x + 8, ti.y + 8, ti.z, bounds, false, None);
            }
            TileKind::TunnelBridge => {
                if let Some(h) = self.map.bridge_height(ti.tile.x, ti.tile.y) {
                    let bounds = SpriteBounds::new(TILE_SIZE, TILE_SIZE, 1);
                    let z = h * TILE_HEIGHT;
                    vd.add_sortable_sprite(self.ids.deck, PaletteMode::Normal, ti.x, ti.y, z, bounds, false, None);
                }
            }
            _ => {}
        }

        if self.hover == Some(ti.tile) {
            vd.draw_selection_sprite(self.ids.cursor, PaletteMode::Normal, 0, isoview::engine::sprites::FoundationPart::Normal);
        }
    }
}

/*──────────────────────────── vehicles ────────────────────────────*/

#[derive(Clone, Copy, Debug)]
struct Position(IVec3);

#[derive(Clone, Copy, Debug)]
struct Heading(IVec2);

fn spawn_vehicles(world: &mut World, map: &HeightMap, count: usize) {
    let n = map.size_x();
    for i in 0..count {
        let h = hash(i as i32, 7);
        let x = (h % (n * TILE_SIZE) as u32) as i32;
        let y = ((h >> 12) % (n * TILE_SIZE) as u32) as i32;
        let dir = match h % 4 {
            0 => ivec2(1, 0),
            1 => ivec2(-1, 0),
            2 => ivec2(0, 1),
            _ => ivec2(0, -1),
        };
        world.spawn((Position(ivec3(x, y, map.slope_pixel_z(x, y))), Heading(dir)));
    }
}

/// Virtual area a vehicle may cover, bounding box included.
fn vehicle_rect(pos: IVec3) -> Rect {
    let pt = remap_coords(pos.x, pos.y, pos.z);
    Rect::new(pt.x - 16, pt.y - 20, pt.x + 16, pt.y + 12)
}

fn move_vehicles(world: &mut World, map: &HeightMap, viewports: &ViewportSet, sink: &mut dyn RepaintSink) {
    let limit = map.size_x() * TILE_SIZE - 1;
    for (_, (pos, dir)) in world.query_mut::<(&mut Position, &mut Heading)>() {
        mark_all_viewports_dirty(viewports, vehicle_rect(pos.0), sink);

        let mut next = pos.0.truncate() + dir.0;
        if !(0..=limit).contains(&next.x) || !(0..=limit).contains(&next.y) {
            dir.0 = -dir.0;
            next = pos.0.truncate() + dir.0;
        }
        pos.0 = next.extend(map.slope_pixel_z(next.x, next.y));

        mark_all_viewports_dirty(viewports, vehicle_rect(pos.0), sink);
    }
}

struct Vehicles<'w> {
    world: &'w World,
    sprite: SpriteId,
}

impl ObjectDrawer for Vehicles<'_> {
    fn draw_objects(&self, vd: &mut SpriteCollector<'_>) {
        let bounds = SpriteBounds::new(3, 3, 6).with_offset(-3, -3, 0);
        for (_, pos) in self.world.query::<&Position>().iter() {
            let p = pos.0;
            vd.add_sortable_sprite(self.sprite, PaletteMode::Normal, p.x, p.y, p.z, bounds, false, None);
        }
    }
}

/*──────────────────────────── overlay ─────────────────────────────*/

/// Cross at the centre of the main view.
struct Crosshair {
    at: IVec2,
}

const CROSSHAIR_COLOUR: Rgba = 0xFF_FF_40_40;

impl Crosshair {
    fn rect(&self) -> Rect {
        Rect::new(self.at.x - 4, self.at.y - 4, self.at.x + 5, self.at.y + 5)
    }
}

impl Overlay for Crosshair {
    fn draw(&self, region: &DrawRegion, blitter: &mut dyn Blitter) {
        let clip = region.screen_rect();
        let IVec2 { x, y } = self.at;
        blitter.draw_line(&clip, x - 4, y, x + 4, y, CROSSHAIR_COLOUR);
        blitter.draw_line(&clip, x, y - 4, x, y + 4, CROSSHAIR_COLOUR);
    }
}

/*──────────────────────────── main ────────────────────────────────*/

fn place_signs(map: &HeightMap) -> SignIndex {
    let mut signs = SignIndex::new();
    let n = map.size_x();
    let towns = [("Northfield", 8, 10), ("Lower Marsh", n - 12, 14), ("Kettleby", n / 2, n - 10)];
    for (name, x, y) in towns {
        let pt = remap_coords2(map, x * TILE_SIZE + 8, y * TILE_SIZE + 8);
        signs.insert(SignKind::Town, pt.x, pt.y - 40, name, None);
    }
    let pt = remap_coords2(map, n / 2 * TILE_SIZE, n / 2 * TILE_SIZE);
    signs.insert(SignKind::Station, pt.x, pt.y - 60, "Central", Some(0xFF_30_30_A0));
    signs
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(path) => ViewportConfig::load(path)?,
        None => ViewportConfig::default(),
    };

    let (w, h) = (args.width, args.height);
    let map = build_map(args.map_size);
    let (bank, ids) = load_sprites()?;
    let signs = place_signs(&map);

    let mut world = World::new();
    spawn_vehicles(&mut world, &map, args.vehicles);
    let followed: Vec<Entity> = world.iter().map(|e| e.entity()).collect();
    let mut follow_idx = 0usize;

    let side = (w / 4) as i32;
    let centre = ivec2(args.map_size / 2, args.map_size / 2);
    let mut viewports = ViewportSet::new();
    let main_id = viewports.open(Viewport::at_tile(&map, 0, 0, w as i32 - side, h as i32, ZoomLevel::Normal, centre));
    viewports.open(Viewport::at_tile(&map, w as i32 - side, 0, side, h as i32, ZoomLevel::Out4x, centre));

    let mut compositor = Compositor::new(cfg);
    let mut screen = Software::new(w, h);
    let mut dirty = DirtyRects::new();
    dirty.mark_dirty(Rect::new(0, 0, w as i32, h as i32));

    let mut win = Window::new("isoview", w, h, WindowOptions::default())?;
    win.set_target_fps(35);

    let mut hover: Option<IVec2> = None;
    let mut was_down = false;

    let mut acc_time = Duration::ZERO;
    let mut acc_frames = 0usize;
    let mut last_print = Instant::now();

    while win.is_open() && !win.is_key_down(Key::Escape) {
        let t0 = Instant::now();

        /* input */
        if let Some(vp) = viewports.get_mut(main_id) {
            let step = scale_by_zoom(24, vp.zoom);
            let mut d = IVec2::ZERO;
            if win.is_key_down(Key::Left) {
                d.x -= step;
            }
            if win.is_key_down(Key::Right) {
                d.x += step;
            }
            if win.is_key_down(Key::Up) {
                d.y -= step;
            }
            if win.is_key_down(Key::Down) {
                d.y += step;
            }
            if d != IVec2::ZERO {
                vp.follow = None;
                vp.dest_scroll += d;
            }

            if win.is_key_pressed(Key::Z, KeyRepeat::No) {
                vp.zoom_in_out(ZoomStep::In, compositor.config(), &mut dirty);
            }
            if win.is_key_pressed(Key::X, KeyRepeat::No) {
                vp.zoom_in_out(ZoomStep::Out, compositor.config(), &mut dirty);
            }
            if win.is_key_pressed(Key::F, KeyRepeat::No) && !followed.is_empty() {
                let e = followed[follow_idx % followed.len()];
                follow_idx += 1;
                vp.set_follow(Some(e.to_bits().get()));
                log::info!("following vehicle {e:?}");
            }
        }

        let mut toggled = false;
        if win.is_key_pressed(Key::B, KeyRepeat::No) {
            let c = compositor.config_mut();
            c.draw_bounding_boxes = !c.draw_bounding_boxes;
            toggled = true;
        }
        if win.is_key_pressed(Key::G, KeyRepeat::No) {
            let c = compositor.config_mut();
            c.draw_dirty_blocks = !c.draw_dirty_blocks;
            toggled = true;
        }
        if toggled {
            dirty.mark_dirty(Rect::new(0, 0, w as i32, h as i32));
        }

        /* mouse */
        let mouse = win
            .get_mouse_pos(MouseMode::Discard)
            .map(|(x, y)| ivec2(x as i32, y as i32));
        let new_hover = mouse.and_then(|m| {
            let id = viewports.at_point(m.x, m.y)?;
            let p = viewports.get(id)?.translate_xy_to_tile_coord(&map, m.x, m.y, false)?;
            Some(ivec2(p.x.div_euclid(TILE_SIZE), p.y.div_euclid(TILE_SIZE)))
        });
        if new_hover != hover {
            for t in [hover, new_hover].into_iter().flatten() {
                mark_tile_dirty_by_tile(&viewports, &map, t, 0, &mut dirty);
            }
            hover = new_hover;
        }

        let down = win.get_mouse_down(MouseButton::Left);
        if down && !was_down {
            if let Some(m) = mouse {
                click(&mut viewports, main_id, &map, &signs, compositor.config(), m);
            }
        }
        was_down = down;

        /* simulation */
        move_vehicles(&mut world, &map, &viewports, &mut dirty);

        let locate = |id: u64| {
            let e = Entity::from_bits(id)?;
            world.get::<&Position>(e).ok().map(|p| p.0)
        };
        for (_, vp) in viewports.iter_mut() {
            vp.update_position(&map, compositor.config(), locate, &mut screen, &mut dirty);
        }

        /* draw */
        let crosshair = viewports.get(main_id).map(|vp| Crosshair {
            at: ivec2(vp.left + vp.width / 2, vp.top + vp.height / 2),
        });
        if let Some(c) = &crosshair {
            dirty.mark_dirty(c.rect());
        }

        let tiles = DemoTiles { map: &map, ids: &ids, hover };
        let vehicles = Vehicles { world: &world, sprite: ids.vehicle };
        let scene = Scene {
            map: &map,
            tiles: &tiles,
            bank: &bank,
            objects: &[&vehicles],
            signs: Some(&signs),
            overlay: crosshair.as_ref().map(|c| c as &dyn Overlay),
        };

        let rects = dirty.take();
        compositor.redraw(&viewports, &rects, &scene, &mut screen);
        compositor.next_frame();
        screen.present(|fb, w, h| win.update_with_buffer(fb, w, h))?;

        acc_time += t0.elapsed();
        acc_frames += 1;
        if last_print.elapsed() >= Duration::from_secs(3) {
            let avg_ms = acc_time.as_secs_f64() * 1000.0 / acc_frames as f64;
            log::info!("avg frame: {avg_ms:.2} ms ({:.1} FPS)", 1000.0 / avg_ms);
            acc_time = Duration::ZERO;
            acc_frames = 0;
            last_print = Instant::now();
        }
    }
    Ok(())
}

/// Left click: report a sign under the cursor, otherwise recentre the main
/// view on the clicked tile.
fn click(
    viewports: &mut ViewportSet,
    main_id: isoview::engine::ViewportId,
    map: &HeightMap,
    signs: &SignIndex,
    cfg: &ViewportConfig,
    m: IVec2,
) {
    let Some(id) = viewports.at_point(m.x, m.y) else {
        return;
    };
    let Some(vp) = viewports.get(id) else {
        return;
    };

    let vx = scale_by_zoom(m.x - vp.left, vp.zoom) + vp.virtual_left;
    let vy = scale_by_zoom(m.y - vp.top, vp.zoom) + vp.virtual_top;
    if let Some(sign) = signs.sign_hit(vx, vy, vp.zoom, cfg.sign_layers()).and_then(|s| signs.get(s)) {
        log::info!("sign {:?}: {}", sign.kind, sign.text);
        return;
    }

    let Some(p) = vp.translate_xy_to_tile_coord(map, m.x, m.y, true) else {
        return;
    };
    let tile = ivec2(p.x.div_euclid(TILE_SIZE), p.y.div_euclid(TILE_SIZE));
    if let Some(main) = viewports.get_mut(main_id) {
        main.scroll_to_tile(map, tile, false);
        log::info!("scroll to tile {tile}");
    }
}
