mod atlas;
mod renderer;
mod transform;

pub use atlas::{TileAtlas, TileAtlases, TileImage, TileSetId, MAP_TILE_SET};
pub use renderer::{render_frame, RenderCounts, Renderer};
pub use transform::{
    CellRange, Viewport, ViewportError, SCALE_DEFAULT, SCALE_MAX, SCALE_MIN, SCALE_STEP,
    TILE_SIZE_PX,
};
