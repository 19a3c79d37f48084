use thiserror::Error;

use crate::app::Vec2;
use crate::grid::{GridBounds, GridPoint};

pub const TILE_SIZE_PX: f32 = 32.0;
pub const SCALE_DEFAULT: f32 = 2.0;
pub const SCALE_MIN: f32 = 0.25;
pub const SCALE_MAX: f32 = 8.0;
pub const SCALE_STEP: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ViewportError {
    #[error("viewport scale must be finite and positive, got {0}")]
    InvalidScale(f32),
}

/// Half-open cell range `[i_min, i_max) x [j_min, j_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub i_min: i32,
    pub i_max: i32,
    pub j_min: i32,
    pub j_max: i32,
}

impl CellRange {
    pub fn is_empty(&self) -> bool {
        self.i_min >= self.i_max || self.j_min >= self.j_max
    }

    pub fn cell_count(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.i_max.abs_diff(self.i_min) as usize * self.j_max.abs_diff(self.j_min) as usize
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        (self.i_min..self.i_max).contains(&point.x) && (self.j_min..self.j_max).contains(&point.y)
    }

    pub fn clamped_to(self, bounds: GridBounds) -> Self {
        let width = bounds.width.min(i32::MAX as u32) as i32;
        let height = bounds.height.min(i32::MAX as u32) as i32;
        let i_min = self.i_min.clamp(0, width);
        let j_min = self.j_min.clamp(0, height);
        Self {
            i_min,
            i_max: self.i_max.clamp(i_min, width),
            j_min,
            j_max: self.j_max.clamp(j_min, height),
        }
    }

    /// Column-major walk: every row of column `i_min`, then the next column.
    pub fn points(self) -> impl Iterator<Item = GridPoint> {
        (self.i_min..self.i_max)
            .flat_map(move |i| (self.j_min..self.j_max).map(move |j| GridPoint::new(i, j)))
    }
}

/// Scroll offset and zoom mapping grid coordinates to screen pixels.
///
/// `screen = scale * tile_size * grid - offset` on both axes, so the mapping
/// is affine and exactly invertible for any valid scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    screen_width: u32,
    screen_height: u32,
    offset: Vec2,
    scale: f32,
    tile_size_px: f32,
}

impl Viewport {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width,
            screen_height,
            offset: Vec2::default(),
            scale: SCALE_DEFAULT,
            tile_size_px: TILE_SIZE_PX,
        }
    }

    pub fn with_tile_size_px(mut self, tile_size_px: f32) -> Self {
        if tile_size_px.is_finite() && tile_size_px > 0.0 {
            self.tile_size_px = tile_size_px;
        }
        self
    }

    pub fn screen_width(&self) -> u32 {
        self.screen_width
    }

    pub fn screen_height(&self) -> u32 {
        self.screen_height
    }

    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn tile_size_px(&self) -> f32 {
        self.tile_size_px
    }

    /// On-screen size of one grid cell.
    pub fn cell_size_px(&self) -> f32 {
        self.scale * self.tile_size_px
    }

    pub fn resize(&mut self, screen_width: u32, screen_height: u32) {
        self.screen_width = screen_width;
        self.screen_height = screen_height;
    }

    pub fn transform_pos(&self, grid: Vec2) -> Vec2 {
        let cell = self.cell_size_px();
        Vec2 {
            x: cell * grid.x - self.offset.x,
            y: cell * grid.y - self.offset.y,
        }
    }

    pub fn screen_to_grid(&self, screen: Vec2) -> Vec2 {
        let cell = self.cell_size_px();
        Vec2 {
            x: (screen.x + self.offset.x) / cell,
            y: (screen.y + self.offset.y) / cell,
        }
    }

    pub fn screen_to_cell(&self, screen: Vec2) -> GridPoint {
        let grid = self.screen_to_grid(screen);
        GridPoint::new(grid.x.floor() as i32, grid.y.floor() as i32)
    }

    /// Cells whose footprint may intersect the screen. Unclamped; callers
    /// clamp to map bounds.
    pub fn visible_cell_range(&self) -> CellRange {
        let width = self.screen_width as f32;
        let height = self.screen_height as f32;
        let corners = [
            self.screen_to_grid(Vec2 { x: 0.0, y: 0.0 }),
            self.screen_to_grid(Vec2 { x: width, y: 0.0 }),
            self.screen_to_grid(Vec2 { x: 0.0, y: height }),
            self.screen_to_grid(Vec2 { x: width, y: height }),
        ];
        let (mut min_x, mut max_x) = (f32::INFINITY, f32::NEG_INFINITY);
        let (mut min_y, mut max_y) = (f32::INFINITY, f32::NEG_INFINITY);
        for corner in corners {
            min_x = min_x.min(corner.x);
            max_x = max_x.max(corner.x);
            min_y = min_y.min(corner.y);
            max_y = max_y.max(corner.y);
        }
        CellRange {
            i_min: min_x.floor() as i32,
            i_max: max_x.ceil() as i32,
            j_min: min_y.floor() as i32,
            j_max: max_y.ceil() as i32,
        }
    }

    /// Whether the transformed anchor lies on screen. Sprites larger than a
    /// cell can pop at the right and bottom edges.
    pub fn is_visible(&self, anchor: Vec2) -> bool {
        let screen = self.transform_pos(anchor);
        screen.x >= 0.0
            && screen.y >= 0.0
            && screen.x < self.screen_width as f32
            && screen.y < self.screen_height as f32
    }

    pub fn shift(&mut self, dx: f32, dy: f32) {
        self.offset.x += dx;
        self.offset.y += dy;
    }

    pub fn set_offset(&mut self, offset: Vec2) {
        self.offset = offset;
    }

    /// Scrolls so the center of cell `point` lands on the screen center.
    pub fn center_on(&mut self, point: Vec2) {
        self.offset = Vec2::default();
        let center = self.screen_to_grid(Vec2 {
            x: self.screen_width as f32 / 2.0,
            y: self.screen_height as f32 / 2.0,
        });
        self.offset = self.transform_pos(Vec2 {
            x: point.x - center.x + 0.5,
            y: point.y - center.y + 0.5,
        });
    }

    pub fn set_scale(&mut self, scale: f32) -> Result<(), ViewportError> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(ViewportError::InvalidScale(scale));
        }
        self.scale = scale.clamp(SCALE_MIN, SCALE_MAX);
        Ok(())
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        if steps == 0 {
            return;
        }
        self.scale = (self.scale + steps as f32 * SCALE_STEP).clamp(SCALE_MIN, SCALE_MAX);
    }
}
