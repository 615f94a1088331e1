//! End-to-end compositing into the software frame buffer.

use glam::{IVec2, ivec2};
use isoview::{
    config::ViewportConfig,
    engine::{
        Compositor, DirtyRects, ObjectDrawer, Rect, Scene, SpriteBounds, SpriteCollector, TileDrawer, Viewport,
        ViewportSet, ZoomLevel,
        dirty::{mark_all_viewports_dirty, mark_tile_dirty_by_tile},
        projection::remap_coords,
    },
    renderer::{PaletteMode, Software},
    world::{HeightMap, Sprite, SpriteBank, SpriteId, TileInfo},
};
use proptest::prelude::*;

const W: usize = 128;
const H: usize = 96;

const GROUND_IDX: u8 = 40;

/// Same ground sprite on every tile, void included, so a frame has no holes.
struct Ground(SpriteId);

impl TileDrawer for Ground {
    fn draw_tile(&self, _ti: &TileInfo, vd: &mut SpriteCollector<'_>) {
        vd.draw_ground_sprite(self.0, PaletteMode::Normal, None, IVec2::ZERO);
    }
}

/// [`Ground`] plus a tower on one tile.
struct GroundWithTower {
    ground: SpriteId,
    tower: SpriteId,
    at: Option<IVec2>,
}

impl TileDrawer for GroundWithTower {
    fn draw_tile(&self, ti: &TileInfo, vd: &mut SpriteCollector<'_>) {
        vd.draw_ground_sprite(self.ground, PaletteMode::Normal, None, IVec2::ZERO);
        if self.at == Some(ti.tile) {
            let bounds = SpriteBounds::new(16, 16, 80);
            vd.add_sortable_sprite(self.tower, PaletteMode::Normal, ti.x, ti.y, ti.z, bounds, false, None);
        }
    }
}

struct Crates {
    at: Vec<(IVec2, SpriteId)>,
}

impl ObjectDrawer for Crates {
    fn draw_objects(&self, vd: &mut SpriteCollector<'_>) {
        for &(p, image) in &self.at {
            vd.add_sortable_sprite(image, PaletteMode::Normal, p.x, p.y, 0, SpriteBounds::new(8, 8, 8), false, None);
        }
    }
}

fn bank() -> (SpriteBank, SpriteId, [SpriteId; 3]) {
    let mut bank = SpriteBank::default_with_checker();
    let ground = bank.insert(Sprite::solid("GROUND", -32, 0, 64, 32, GROUND_IDX)).unwrap();
    let crates = [
        bank.insert(Sprite::solid("RED", -4, -8, 8, 9, 200)).unwrap(),
        bank.insert(Sprite::solid("GREEN", -4, -8, 8, 9, 150)).unwrap(),
        bank.insert(Sprite::solid("BLUE", -4, -8, 8, 9, 100)).unwrap(),
    ];
    (bank, ground, crates)
}

fn full_frame(comp: &mut Compositor, vp: &Viewport, scene: &Scene<'_, HeightMap>) -> Vec<u32> {
    let mut sw = Software::new(W, H);
    comp.draw_viewport(vp, vp.screen_rect(), scene, &mut sw);
    sw.frame().to_vec()
}

#[test]
fn sprite_lands_on_its_projected_pixel() {
    let map = HeightMap::new(8, 8);
    let (bank, ground, crates) = bank();
    let tiles = Ground(ground);
    let objects = Crates { at: vec![(ivec2(24, 24), crates[0])] };
    let scene = Scene {
        map: &map,
        tiles: &tiles,
        bank: &bank,
        objects: &[&objects],
        signs: None,
        overlay: None,
    };
    let vp = Viewport::at_tile(&map, 0, 0, W as i32, H as i32, ZoomLevel::Normal, ivec2(2, 2));
    let frame = full_frame(&mut Compositor::new(ViewportConfig::default()), &vp, &scene);

    let palette = bank.palette();
    let at = remap_coords(24, 24, 0);
    let (sx, sy) = (at.x - vp.virtual_left, at.y - vp.virtual_top - 4);
    assert_eq!(frame[sy as usize * W + sx as usize], palette[200]);
    assert_eq!(frame[(sy as usize + 20) * W + sx as usize], palette[GROUND_IDX]);
    assert!(frame.iter().all(|&c| c == palette[200] || c == palette[GROUND_IDX]));
}

#[test]
fn moved_sprite_is_repainted_through_dirty_rects() {
    let map = HeightMap::new(8, 8);
    let (bank, ground, crates) = bank();
    let tiles = Ground(ground);
    let mut viewports = ViewportSet::new();
    viewports.open(Viewport::at_tile(&map, 0, 0, W as i32, H as i32, ZoomLevel::Normal, ivec2(4, 4)));
    let vp = viewports.iter().map(|(_, vp)| vp.clone()).next().unwrap();

    let mut comp = Compositor::new(ViewportConfig::default());
    let mut sw = Software::new(W, H);

    let before = Crates { at: vec![(ivec2(60, 60), crates[1])] };
    let scene = Scene { map: &map, tiles: &tiles, bank: &bank, objects: &[&before], signs: None, overlay: None };
    comp.draw_viewport(&vp, vp.screen_rect(), &scene, &mut sw);

    let after = Crates { at: vec![(ivec2(72, 64), crates[1])] };
    let mut dirty = DirtyRects::new();
    for p in [ivec2(60, 60), ivec2(72, 64)] {
        let pt = remap_coords(p.x, p.y, 0);
        mark_all_viewports_dirty(&viewports, Rect::new(pt.x - 20, pt.y - 20, pt.x + 20, pt.y + 20), &mut dirty);
    }
    let scene = Scene { map: &map, tiles: &tiles, bank: &bank, objects: &[&after], signs: None, overlay: None };
    comp.redraw(&viewports, &dirty.take(), &scene, &mut sw);

    assert_eq!(sw.frame(), full_frame(&mut comp, &vp, &scene).as_slice());
}

#[test]
fn tile_change_stays_inside_its_dirty_rect() {
    let map = HeightMap::new(8, 8);
    let (mut bank, ground, _) = bank();
    let tower = bank.insert(Sprite::solid("TOWER", -30, -150, 60, 180, 220)).unwrap();
    let tile = ivec2(3, 5);

    let mut viewports = ViewportSet::new();
    viewports.open(Viewport::at_tile(&map, 0, 0, W as i32, H as i32, ZoomLevel::Out2x, tile));
    let vp = viewports.iter().map(|(_, vp)| vp.clone()).next().unwrap();

    let mut frames = Vec::new();
    for at in [None, Some(tile)] {
        let tiles = GroundWithTower { ground, tower, at };
        let scene = Scene { map: &map, tiles: &tiles, bank: &bank, objects: &[], signs: None, overlay: None };
        frames.push(full_frame(&mut Compositor::new(ViewportConfig::default()), &vp, &scene));
    }

    let mut dirty = DirtyRects::new();
    mark_tile_dirty_by_tile(&viewports, &map, tile, 0, &mut dirty);
    let rects = dirty.take();

    let mut changed = 0;
    for (i, (a, b)) in frames[0].iter().zip(&frames[1]).enumerate() {
        if a != b {
            changed += 1;
            let (x, y) = ((i % W) as i32, (i / W) as i32);
            assert!(rects.iter().any(|r| r.contains(x, y)), "({x}, {y}) changed outside {rects:?}");
        }
    }
    assert!(changed > 0);
}

#[test]
fn split_passes_paint_the_same_frame() {
    let map = HeightMap::new(8, 8);
    let (bank, ground, crates) = bank();
    let tiles = Ground(ground);
    let objects = Crates {
        at: vec![(ivec2(40, 40), crates[0]), (ivec2(68, 68), crates[1]), (ivec2(90, 50), crates[2])],
    };
    let scene = Scene {
        map: &map,
        tiles: &tiles,
        bank: &bank,
        objects: &[&objects],
        signs: None,
        overlay: None,
    };
    let vp = Viewport::at_tile(&map, 0, 0, W as i32, H as i32, ZoomLevel::Normal, ivec2(4, 4));

    let whole = full_frame(&mut Compositor::new(ViewportConfig::default()), &vp, &scene);
    let cfg = ViewportConfig { max_draw_area: 700, ..ViewportConfig::default() };
    let mut comp = Compositor::new(cfg);
    let split = full_frame(&mut comp, &vp, &scene);
    assert!(comp.stats().passes > 8);
    assert_eq!(whole, split);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Scrolling pixels and repainting the uncovered strips gives the same
    /// frame as drawing from scratch at the new position.
    #[test]
    fn scrolled_frame_matches_full_redraw(
        zoom in prop::sample::select(vec![ZoomLevel::Normal, ZoomLevel::Out2x, ZoomLevel::Out4x]),
        dx in -60i32..60,
        dy in -60i32..60,
    ) {
        let map = HeightMap::new(8, 8);
        let (bank, ground, crates) = bank();
        let tiles = Ground(ground);
        let objects = Crates {
            at: vec![(ivec2(40, 40), crates[0]), (ivec2(68, 68), crates[1]), (ivec2(90, 50), crates[2])],
        };
        let scene = Scene {
            map: &map,
            tiles: &tiles,
            bank: &bank,
            objects: &[&objects],
            signs: None,
            overlay: None,
        };
        let mut comp = Compositor::new(ViewportConfig::default());
        let mut vp = Viewport::at_tile(&map, 0, 0, W as i32, H as i32, zoom, ivec2(4, 4));

        let mut sw = Software::new(W, H);
        comp.draw_viewport(&vp, vp.screen_rect(), &scene, &mut sw);

        let mut dirty = DirtyRects::new();
        let (x, y) = (vp.virtual_left + dx, vp.virtual_top + dy);
        vp.set_position(x, y, &mut sw, &mut dirty);
        for r in dirty.take() {
            comp.draw_viewport(&vp, r, &scene, &mut sw);
        }

        let expected = full_frame(&mut comp, &vp, &scene);
        prop_assert_eq!(sw.frame(), expected.as_slice());
    }
}
