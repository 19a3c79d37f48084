use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use super::catalog::{cycle_index, ResolvedTile, TileCatalog};
use super::search::{a_star, manhattan_distance, reachable, PathResult, ReachableSet};
use super::terrain::TerrainCostModel;
use super::{GridBounds, GridPoint};
use crate::tile_keys::{TileKey, TileKeyError};

pub type Color = [u8; 3];

pub const DEFAULT_ANIMATION_RATE: f32 = 10.0;
pub const DEFAULT_BG_COLOR: Color = [0, 0, 0];

/// Contents of one map cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileRef {
    #[default]
    Absent,
    Static(u32),
    /// Index into the map's animation table.
    Animated(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridMapError {
    #[error("map grid is empty")]
    EmptyGrid,
    #[error("map column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: usize,
        expected: usize,
        actual: usize,
    },
    #[error("map extents {width}x{height} exceed the supported size")]
    TooLarge { width: usize, height: usize },
    #[error("cell count mismatch: expected {expected}, got {actual}")]
    CellCountMismatch { expected: usize, actual: usize },
    #[error("cell ({x}, {y}): {source}")]
    TileKey {
        x: usize,
        y: usize,
        #[source]
        source: TileKeyError,
    },
    #[error("cell {index} references unknown animation {animation}")]
    UnknownAnimation { index: usize, animation: u32 },
    #[error("animation {animation} has no frames")]
    EmptyAnimation { animation: u32 },
}

/// Animation phase of a map. Advanced once per frame by `1 / rate`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnimationClock {
    phase: f64,
}

impl AnimationClock {
    pub fn advance(&mut self, rate: f32) {
        self.phase += 1.0 / f64::from(normalize_animation_rate(rate));
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }
}

pub(crate) fn normalize_animation_rate(rate: f32) -> f32 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        DEFAULT_ANIMATION_RATE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridMap {
    width: u32,
    height: u32,
    cells: Vec<TileRef>,
    animations: Vec<Vec<u32>>,
    // 0 is the default class, otherwise `terrain_names[id - 1]`.
    terrain_ids: Vec<u16>,
    terrain_names: Vec<String>,
    tint: BTreeMap<GridPoint, Color>,
    clock: AnimationClock,
    offset_px: [f32; 2],
    bg_color: Color,
}

impl GridMap {
    /// Builds a map from row-major cells. Every cell gets the default terrain.
    pub fn new(
        width: u32,
        height: u32,
        cells: Vec<TileRef>,
        animations: Vec<Vec<u32>>,
    ) -> Result<Self, GridMapError> {
        if width == 0 || height == 0 {
            return Err(GridMapError::EmptyGrid);
        }
        check_extents(width as usize, height as usize)?;
        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(GridMapError::CellCountMismatch {
                expected,
                actual: cells.len(),
            });
        }
        for (animation, frames) in animations.iter().enumerate() {
            if frames.is_empty() {
                return Err(GridMapError::EmptyAnimation {
                    animation: animation as u32,
                });
            }
        }
        for (index, cell) in cells.iter().enumerate() {
            if let TileRef::Animated(animation) = cell {
                if *animation as usize >= animations.len() {
                    return Err(GridMapError::UnknownAnimation {
                        index,
                        animation: *animation,
                    });
                }
            }
        }
        Ok(Self {
            width,
            height,
            terrain_ids: vec![0; cells.len()],
            cells,
            animations,
            terrain_names: Vec::new(),
            tint: BTreeMap::new(),
            clock: AnimationClock::default(),
            offset_px: [0.0, 0.0],
            bg_color: DEFAULT_BG_COLOR,
        })
    }

    /// Builds a map from descriptor columns, `columns[x][y]`.
    ///
    /// Terrain comes from tile identity: a named key uses its own group, an
    /// index uses the first group containing it.
    pub fn from_columns(
        columns: &[Vec<TileKey>],
        catalog: &TileCatalog,
    ) -> Result<Self, GridMapError> {
        let width = columns.len();
        let height = columns.first().map_or(0, Vec::len);
        if width == 0 || height == 0 {
            return Err(GridMapError::EmptyGrid);
        }
        check_extents(width, height)?;
        for (column, rows) in columns.iter().enumerate() {
            if rows.len() != height {
                return Err(GridMapError::RaggedColumn {
                    column,
                    expected: height,
                    actual: rows.len(),
                });
            }
        }

        let mut cells = vec![TileRef::Absent; width * height];
        let mut cell_groups: Vec<Option<&str>> = vec![None; width * height];
        let mut animations: Vec<Vec<u32>> = Vec::new();
        let mut animation_ids: HashMap<&str, u32> = HashMap::new();
        for (x, rows) in columns.iter().enumerate() {
            for (y, key) in rows.iter().enumerate() {
                let index = y * width + x;
                let resolved = catalog
                    .resolve(key)
                    .map_err(|source| GridMapError::TileKey { x, y, source })?;
                cell_groups[index] = resolved.group();
                cells[index] = match resolved {
                    ResolvedTile::Single { tile, .. } => TileRef::Static(tile),
                    ResolvedTile::Sequence { frames, group } => {
                        let id = *animation_ids.entry(group).or_insert_with(|| {
                            animations.push(frames.to_vec());
                            (animations.len() - 1) as u32
                        });
                        TileRef::Animated(id)
                    }
                };
            }
        }

        let mut map = Self::new(width as u32, height as u32, cells, animations)?;
        for (index, group) in cell_groups.into_iter().enumerate() {
            if let Some(group) = group {
                let id = map.intern_terrain(group);
                map.terrain_ids[index] = id;
            }
        }
        Ok(map)
    }

    pub fn with_bg_color(mut self, bg_color: Color) -> Self {
        self.bg_color = bg_color;
        self
    }

    /// Initial scroll offset in pixels.
    pub fn with_offset_px(mut self, offset_px: [f32; 2]) -> Self {
        self.offset_px = offset_px;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> GridBounds {
        GridBounds::new(self.width, self.height)
    }

    pub fn bg_color(&self) -> Color {
        self.bg_color
    }

    pub fn offset_px(&self) -> [f32; 2] {
        self.offset_px
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        self.bounds().contains(point)
    }

    /// Cell contents; `Absent` for any point off the map.
    pub fn cell(&self, point: GridPoint) -> TileRef {
        self.bounds()
            .index_of(point)
            .and_then(|index| self.cells.get(index).copied())
            .unwrap_or(TileRef::Absent)
    }

    /// Tile index shown at `point` for an explicit animation phase.
    pub fn frame_at(&self, point: GridPoint, phase: f64) -> Option<u32> {
        match self.cell(point) {
            TileRef::Absent => None,
            TileRef::Static(tile) => Some(tile),
            TileRef::Animated(animation) => {
                let frames = self.animations.get(animation as usize)?;
                frames.get(cycle_index(phase, frames.len())).copied()
            }
        }
    }

    /// Tile index shown at `point` for the map's own clock.
    pub fn tile_frame(&self, point: GridPoint) -> Option<u32> {
        self.frame_at(point, self.clock.phase())
    }

    pub fn terrain_of(&self, point: GridPoint) -> Option<&str> {
        let index = self.bounds().index_of(point)?;
        let id = *self.terrain_ids.get(index)?;
        if id == 0 {
            return None;
        }
        self.terrain_names
            .get(usize::from(id) - 1)
            .map(String::as_str)
    }

    /// Overrides the terrain class of one cell. `None` restores the default.
    pub fn set_terrain(&mut self, point: GridPoint, terrain: Option<&str>) -> bool {
        let Some(index) = self.bounds().index_of(point) else {
            return false;
        };
        let id = terrain.map_or(0, |name| self.intern_terrain(name));
        self.terrain_ids[index] = id;
        true
    }

    fn intern_terrain(&mut self, name: &str) -> u16 {
        if let Some(position) = self.terrain_names.iter().position(|known| known == name) {
            return (position + 1) as u16;
        }
        // Past u16::MAX distinct classes new names fold into the default.
        if self.terrain_names.len() >= usize::from(u16::MAX) {
            return 0;
        }
        self.terrain_names.push(name.to_string());
        self.terrain_names.len() as u16
    }

    pub fn clock(&self) -> AnimationClock {
        self.clock
    }

    pub fn advance(&mut self, rate: f32) {
        self.clock.advance(rate);
    }

    /// Tints one cell. Points off the map are ignored and return `false`.
    pub fn set_tint(&mut self, point: GridPoint, color: Color) -> bool {
        if !self.contains(point) {
            return false;
        }
        self.tint.insert(point, color);
        true
    }

    pub fn tint_points<I>(&mut self, points: I, color: Color) -> usize
    where
        I: IntoIterator<Item = GridPoint>,
    {
        points
            .into_iter()
            .filter(|point| self.set_tint(*point, color))
            .count()
    }

    pub fn tint(&self, point: GridPoint) -> Option<Color> {
        self.tint.get(&point).copied()
    }

    pub fn tint_len(&self) -> usize {
        self.tint.len()
    }

    pub fn clear_tint(&mut self) {
        self.tint.clear();
    }

    /// Cost of stepping from `from` to `to` for `mover`: the destination's
    /// terrain multiplier times the Manhattan step. Absent cells are walls.
    pub fn step_cost(
        &self,
        terrain: &TerrainCostModel,
        mover: &str,
        from: GridPoint,
        to: GridPoint,
    ) -> f32 {
        if self.cell(to) == TileRef::Absent {
            return f32::INFINITY;
        }
        terrain.multiplier(mover, self.terrain_of(to)) * manhattan_distance(from, to) as f32
    }

    /// Shortest path for `mover`. The Manhattan heuristic is scaled by the
    /// cheapest multiplier the mover can meet so it never overestimates.
    pub fn find_path(
        &self,
        terrain: &TerrainCostModel,
        mover: &str,
        start: GridPoint,
        goal: GridPoint,
    ) -> PathResult {
        let heuristic_scale = terrain.min_multiplier(mover);
        a_star(
            self.bounds(),
            start,
            goal,
            |point| manhattan_distance(point, goal) as f32 * heuristic_scale,
            |from, to| self.step_cost(terrain, mover, from, to),
        )
    }

    pub fn reachable_from(
        &self,
        terrain: &TerrainCostModel,
        mover: &str,
        start: GridPoint,
        budget: f32,
    ) -> ReachableSet {
        reachable(self.bounds(), start, budget, |from, to| {
            self.step_cost(terrain, mover, from, to)
        })
    }
}

fn check_extents(width: usize, height: usize) -> Result<(), GridMapError> {
    let max = i32::MAX as usize;
    if width > max || height > max || width.checked_mul(height).is_none() {
        return Err(GridMapError::TooLarge { width, height });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> TileCatalog {
        let mut groups = BTreeMap::new();
        groups.insert("grass".to_string(), vec![0]);
        groups.insert("wall".to_string(), vec![1]);
        groups.insert("water".to_string(), vec![2, 3]);
        TileCatalog::new(groups).expect("catalog")
    }

    fn keys(rows: &[&[u32]]) -> Vec<Vec<TileKey>> {
        rows.iter()
            .map(|column| column.iter().map(|tile| TileKey::Index(*tile)).collect())
            .collect()
    }

    #[test]
    fn descriptor_columns_are_x_major() {
        let columns = keys(&[&[0, 1, 0], &[0, 0, 0]]);
        let map = GridMap::from_columns(&columns, &catalog()).expect("map");
        assert_eq!(map.width(), 2);
        assert_eq!(map.height(), 3);
        assert_eq!(map.cell(GridPoint::new(0, 1)), TileRef::Static(1));
        assert_eq!(map.cell(GridPoint::new(1, 1)), TileRef::Static(0));
    }

    #[test]
    fn out_of_bounds_cells_are_absent() {
        let map = GridMap::from_columns(&keys(&[&[0, 0], &[0, 0]]), &catalog()).expect("map");
        for point in [(-1, 0), (0, -1), (2, 0), (0, 2), (i32::MAX, i32::MIN)] {
            let point = GridPoint::from(point);
            assert_eq!(map.cell(point), TileRef::Absent, "{point:?}");
            assert_eq!(map.tile_frame(point), None);
            assert_eq!(map.terrain_of(point), None);
        }
    }

    #[test]
    fn rejects_empty_and_ragged_grids() {
        assert_eq!(
            GridMap::from_columns(&[], &catalog()),
            Err(GridMapError::EmptyGrid)
        );
        assert_eq!(
            GridMap::from_columns(&[Vec::new()], &catalog()),
            Err(GridMapError::EmptyGrid)
        );
        assert_eq!(
            GridMap::from_columns(&keys(&[&[0, 0], &[0]]), &catalog()),
            Err(GridMapError::RaggedColumn {
                column: 1,
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn unknown_tile_key_names_the_cell() {
        let columns = vec![vec![TileKey::from("grass"), TileKey::from("lava")]];
        let error = GridMap::from_columns(&columns, &catalog()).expect_err("unknown group");
        assert!(matches!(error, GridMapError::TileKey { x: 0, y: 1, .. }));
    }

    #[test]
    fn terrain_comes_from_tile_groups() {
        let columns = vec![vec![
            TileKey::Index(0),
            TileKey::Index(1),
            TileKey::from("water"),
            TileKey::Index(7),
        ]];
        let map = GridMap::from_columns(&columns, &catalog()).expect("map");
        assert_eq!(map.terrain_of(GridPoint::new(0, 0)), Some("grass"));
        assert_eq!(map.terrain_of(GridPoint::new(0, 1)), Some("wall"));
        assert_eq!(map.terrain_of(GridPoint::new(0, 2)), Some("water"));
        assert_eq!(map.terrain_of(GridPoint::new(0, 3)), None);
    }

    #[test]
    fn animated_cells_cycle_with_the_clock() {
        let columns = vec![vec![TileKey::from("water"), TileKey::from("water")]];
        let mut map = GridMap::from_columns(&columns, &catalog()).expect("map");
        assert_eq!(map.cell(GridPoint::new(0, 0)), TileRef::Animated(0));
        assert_eq!(map.cell(GridPoint::new(0, 1)), TileRef::Animated(0));
        assert_eq!(map.tile_frame(GridPoint::new(0, 0)), Some(2));
        for _ in 0..4 {
            map.advance(4.0);
        }
        assert_eq!(map.tile_frame(GridPoint::new(0, 0)), Some(3));
        assert_eq!(map.frame_at(GridPoint::new(0, 0), 2.0), Some(2));
    }

    #[test]
    fn invalid_animation_rate_uses_default() {
        let mut clock = AnimationClock::default();
        clock.advance(0.0);
        clock.advance(f32::NAN);
        assert!((clock.phase() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn tint_ignores_points_off_the_map_and_clears_idempotently() {
        let mut map = GridMap::from_columns(&keys(&[&[0, 0], &[0, 0]]), &catalog()).expect("map");
        assert!(map.set_tint(GridPoint::new(1, 1), [255, 0, 0]));
        assert!(!map.set_tint(GridPoint::new(5, 5), [255, 0, 0]));
        assert_eq!(map.tint(GridPoint::new(1, 1)), Some([255, 0, 0]));
        assert_eq!(map.tint_len(), 1);
        map.clear_tint();
        assert_eq!(map.tint_len(), 0);
        map.clear_tint();
        assert_eq!(map.tint_len(), 0);
    }

    #[test]
    fn new_validates_cell_count_and_animation_references() {
        assert_eq!(
            GridMap::new(2, 2, vec![TileRef::Absent; 3], Vec::new()),
            Err(GridMapError::CellCountMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(matches!(
            GridMap::new(1, 1, vec![TileRef::Animated(0)], Vec::new()),
            Err(GridMapError::UnknownAnimation { .. })
        ));
        assert!(matches!(
            GridMap::new(1, 1, vec![TileRef::Animated(0)], vec![Vec::new()]),
            Err(GridMapError::EmptyAnimation { animation: 0 })
        ));
    }

    #[test]
    fn step_cost_uses_destination_terrain() {
        let columns = vec![vec![TileKey::Index(0), TileKey::Index(2)]];
        let mut map = GridMap::from_columns(&columns, &catalog()).expect("map");
        let terrain = TerrainCostModel::uniform().with_multiplier("boat", "grass", 4.0);
        let from = GridPoint::new(0, 1);
        let to = GridPoint::new(0, 0);
        assert_eq!(map.step_cost(&terrain, "boat", from, to), 4.0);
        assert_eq!(map.step_cost(&terrain, "boat", to, from), 1.0);
        assert!(map.set_terrain(to, None));
        assert_eq!(map.step_cost(&terrain, "boat", from, to), 1.0);
        assert!(map
            .step_cost(&terrain, "boat", to, GridPoint::new(0, 2))
            .is_infinite());
    }

    #[test]
    fn find_path_takes_cheap_detour() {
        let mut map = GridMap::new(5, 3, vec![TileRef::Static(0); 15], Vec::new()).expect("map");
        for x in 0..5 {
            assert!(map.set_terrain(GridPoint::new(x, 0), Some("road")));
        }
        let terrain = TerrainCostModel::uniform().with_multiplier("default", "road", 0.1);
        let start = GridPoint::new(0, 1);
        let goal = GridPoint::new(4, 1);

        let path = map.find_path(&terrain, "default", start, goal);
        assert!(path.is_found());
        assert_eq!(path.points().first(), Some(&start));
        assert_eq!(path.points().last(), Some(&goal));
        let cost: f32 = path
            .points()
            .windows(2)
            .map(|step| map.step_cost(&terrain, "default", step[0], step[1]))
            .sum();
        assert!((cost - 1.5).abs() < 1e-4, "cost={cost}");
    }
}
