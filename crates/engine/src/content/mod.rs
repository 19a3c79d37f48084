mod config;
mod descriptors;
mod error;
mod loader;

pub use config::{Config, ConfigError};
pub use descriptors::{
    terrain_multipliers, EntityPlacement, EntityTemplate, MapDescriptor, MultiplierValue,
    ScenarioDescriptor, TerrainTable, TileSetDescriptor, TileSize, DEFAULT_ENTITY_LAYER,
    DEFAULT_TILE_SIZE_PX,
};
pub use error::ContentError;
pub use loader::{ContentLoader, LoadedMap, LoadedScenario};
