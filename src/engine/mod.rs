pub mod compositor;
pub mod dirty;
pub mod projection;
pub mod sorter;
pub mod sprites;
pub mod traversal;
pub mod types;
pub mod viewport;
pub mod zoom;

pub use compositor::{Compositor, FrameStats, ObjectDrawer, Overlay, Scene};
pub use dirty::{DirtyRects, RepaintSink};
pub use sprites::{SpriteBounds, SpriteCollector};
pub use traversal::TileDrawer;
pub use types::{DrawRegion, Rect};
pub use viewport::{Viewport, ViewportId, ViewportSet, ZoomStep};
pub use zoom::ZoomLevel;
