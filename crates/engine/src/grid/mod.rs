mod catalog;
mod map;
mod search;
mod terrain;

pub use catalog::{ResolvedTile, TileCatalog};
pub(crate) use map::normalize_animation_rate;
pub use map::{
    AnimationClock, Color, GridMap, GridMapError, TileRef, DEFAULT_ANIMATION_RATE,
    DEFAULT_BG_COLOR,
};
pub use search::{a_star, manhattan_distance, reachable, PathResult, ReachableSet};
pub use terrain::{TerrainCostModel, DEFAULT_MOVER, DEFAULT_TERRAIN};

/// Integer cell coordinate. `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridPoint {
    pub x: i32,
    pub y: i32,
}

impl GridPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl From<(i32, i32)> for GridPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// Extents of a grid anchored at the origin: `[0, width) x [0, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridBounds {
    pub width: u32,
    pub height: u32,
}

impl GridBounds {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(self, point: GridPoint) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as u32) < self.width
            && (point.y as u32) < self.height
    }

    pub fn cell_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index, `None` outside the bounds.
    pub fn index_of(self, point: GridPoint) -> Option<usize> {
        if !self.contains(point) {
            return None;
        }
        Some(point.y as usize * self.width as usize + point.x as usize)
    }

    pub fn point_of(self, index: usize) -> GridPoint {
        let width = self.width.max(1) as usize;
        GridPoint::new((index % width) as i32, (index / width) as i32)
    }

    pub fn clamp(self, point: GridPoint) -> GridPoint {
        let max_x = self.width.saturating_sub(1).min(i32::MAX as u32) as i32;
        let max_y = self.height.saturating_sub(1).min(i32::MAX as u32) as i32;
        GridPoint::new(point.x.clamp(0, max_x), point.y.clamp(0, max_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_index_round_trips_inside_and_rejects_outside() {
        let bounds = GridBounds::new(4, 3);
        assert_eq!(bounds.index_of(GridPoint::new(3, 2)), Some(11));
        assert_eq!(bounds.point_of(11), GridPoint::new(3, 2));
        for outside in [(-1, 0), (0, -1), (4, 0), (0, 3), (i32::MIN, i32::MAX)] {
            assert_eq!(bounds.index_of(outside.into()), None, "{outside:?}");
        }
    }

    #[test]
    fn clamp_pulls_points_onto_the_grid() {
        let bounds = GridBounds::new(5, 5);
        assert_eq!(bounds.clamp(GridPoint::new(-3, 9)), GridPoint::new(0, 4));
        assert_eq!(bounds.clamp(GridPoint::new(2, 2)), GridPoint::new(2, 2));
    }
}
