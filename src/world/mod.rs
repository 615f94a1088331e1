pub mod map;
pub mod signs;
pub mod sprite;

pub use map::{HeightMap, Slope, TileInfo, TileKind, TileMap};
pub use signs::{SignId, SignIndex, SignKind, SignLayers, ViewportSign};
pub use sprite::{Sprite, SpriteBank, SpriteError, SpriteId};
