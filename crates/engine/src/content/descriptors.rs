use std::collections::BTreeMap;

use serde::Deserialize;

use crate::grid::Color;
use crate::tile_keys::TileKey;

pub const DEFAULT_TILE_SIZE_PX: u32 = 32;
pub const DEFAULT_ENTITY_LAYER: i32 = 1;

/// `grid[x][y]`: one inner list per column.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MapDescriptor {
    #[serde(default)]
    pub offset: Option<[f32; 2]>,
    #[serde(default)]
    pub bg_color: Option<Color>,
    pub grid: Vec<Vec<TileKey>>,
    pub tile_set: String,
    #[serde(default)]
    pub terrain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TileSize {
    Square(u32),
    Rect([u32; 2]),
}

impl Default for TileSize {
    fn default() -> Self {
        TileSize::Square(DEFAULT_TILE_SIZE_PX)
    }
}

impl TileSize {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            TileSize::Square(size) => (size, size),
            TileSize::Rect([width, height]) => (width, height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TileSetDescriptor {
    pub image: String,
    #[serde(default)]
    pub size: TileSize,
    /// Color made transparent when slicing.
    #[serde(default)]
    pub key: Option<Color>,
    #[serde(default)]
    pub names: BTreeMap<String, Vec<u32>>,
}

/// `mover -> terrain -> multiplier`; `null`, `false`, zero, or negative
/// multipliers block movement.
pub type TerrainTable = BTreeMap<String, BTreeMap<String, Option<MultiplierValue>>>;

/// A terrain multiplier as written in a terrain table.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MultiplierValue {
    Number(f32),
    /// `true` is a plain `1.0`; `false` blocks movement.
    Flag(bool),
}

impl MultiplierValue {
    pub fn multiplier(self) -> Option<f32> {
        match self {
            MultiplierValue::Number(value) => Some(value),
            MultiplierValue::Flag(true) => Some(1.0),
            MultiplierValue::Flag(false) => None,
        }
    }
}

/// Flattens a parsed table into the shape [`TerrainCostModel::from_table`]
/// takes.
///
/// [`TerrainCostModel::from_table`]: crate::grid::TerrainCostModel::from_table
pub fn terrain_multipliers(
    table: TerrainTable,
) -> BTreeMap<String, BTreeMap<String, Option<f32>>> {
    table
        .into_iter()
        .map(|(mover, terrains)| {
            let terrains = terrains
                .into_iter()
                .map(|(terrain, value)| (terrain, value.and_then(MultiplierValue::multiplier)))
                .collect();
            (mover, terrains)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioDescriptor {
    pub map: String,
    #[serde(default)]
    pub entities: Vec<EntityPlacement>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityPlacement {
    /// Path of the entity template.
    pub id: String,
    pub pos: [f32; 2],
    #[serde(default = "default_entity_layer")]
    pub layer: i32,
}

fn default_entity_layer() -> i32 {
    DEFAULT_ENTITY_LAYER
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EntityTemplate {
    pub tile_set: String,
    #[serde(default)]
    pub pose: TileKey,
    #[serde(default)]
    pub mover: Option<String>,
    #[serde(default)]
    pub animate: bool,
    #[serde(default)]
    pub hflip: bool,
    #[serde(default)]
    pub vflip: bool,
    #[serde(default)]
    pub name: Option<String>,
}
