use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::ImageReader;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::app::{
    GameState, Layers, SpriteDesc, TileAtlas, TileAtlases, TileImage, TileSetId, Vec2, Viewport,
    MAP_TILE_SET,
};
use crate::grid::{GridMap, TerrainCostModel, TileCatalog};

use super::descriptors::{
    terrain_multipliers, EntityTemplate, MapDescriptor, ScenarioDescriptor, TerrainTable,
    TileSetDescriptor,
};
use super::ContentError;

/// A map with the tile set and terrain table it names.
#[derive(Debug)]
pub struct LoadedMap {
    pub map: GridMap,
    pub atlas: TileAtlas,
    pub terrain: TerrainCostModel,
}

/// Everything a scenario file describes, ready to install into a
/// [`GameState`]. The map's tile set is always atlas slot 0.
#[derive(Debug)]
pub struct LoadedScenario {
    pub map: GridMap,
    pub terrain: TerrainCostModel,
    pub atlases: TileAtlases,
    pub layers: Layers,
}

impl LoadedScenario {
    /// Builds the game state for `viewport`, scrolled to the map's offset.
    /// Grid cells take the width of the map tile set's tiles.
    pub fn into_state(self, viewport: Viewport) -> (GameState, TileAtlases) {
        let mut viewport = match self.atlases.get(MAP_TILE_SET) {
            Some(atlas) => viewport.with_tile_size_px(atlas.tile_size().0 as f32),
            None => viewport,
        };
        let [x, y] = self.map.offset_px();
        viewport.set_offset(Vec2::new(x, y));
        let mut state = GameState::new(viewport);
        state.set_map(self.map);
        state.set_terrain(self.terrain);
        state.set_layers(self.layers);
        (state, self.atlases)
    }
}

/// Reads descriptors relative to an asset root.
#[derive(Debug)]
pub struct ContentLoader {
    root: PathBuf,
    warned_missing_images: HashSet<PathBuf>,
}

impl ContentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            warned_missing_images: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ContentError> {
        let raw = fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut deserializer = serde_json::Deserializer::from_str(&raw);
        serde_path_to_error::deserialize::<_, T>(&mut deserializer).map_err(|error| {
            let json_path = error.path().to_string();
            ContentError::Parse {
                path: path.to_path_buf(),
                json_path,
                source: error.into_inner(),
            }
        })
    }

    /// Slices a tile set's image. An unreadable image is reported once per
    /// path and yields an atlas without images, so names still resolve.
    pub fn load_tile_set(&mut self, relative: &str) -> Result<TileAtlas, ContentError> {
        let path = self.resolve(relative);
        let descriptor: TileSetDescriptor = self.read_json(&path)?;
        let (tile_width, tile_height) = descriptor.size.dimensions();
        if tile_width == 0 || tile_height == 0 {
            return Err(ContentError::InvalidTileSize {
                path,
                width: tile_width,
                height: tile_height,
            });
        }
        let catalog = TileCatalog::new(descriptor.names).map_err(|source| {
            ContentError::TileSet {
                path: path.clone(),
                source,
            }
        })?;

        let image_path = self.resolve(&descriptor.image);
        match load_image_rgba(&image_path) {
            Ok(sheet) => {
                let atlas = TileAtlas::slice(
                    relative,
                    &sheet,
                    tile_width,
                    tile_height,
                    descriptor.key,
                    catalog,
                )
                .map_err(|source| ContentError::TileSet {
                    path: path.clone(),
                    source,
                })?;
                info!(
                    tile_set = relative,
                    tile_count = atlas.tile_count(),
                    tile_width,
                    tile_height,
                    "tile_set_loaded"
                );
                Ok(atlas)
            }
            Err(reason) => {
                self.warn_missing_image_once(&image_path, &reason);
                Ok(TileAtlas::without_images(
                    relative,
                    tile_width,
                    tile_height,
                    catalog,
                ))
            }
        }
    }

    pub fn load_terrain(&self, relative: &str) -> Result<TerrainCostModel, ContentError> {
        let table: TerrainTable = self.read_json(&self.resolve(relative))?;
        Ok(TerrainCostModel::from_table(terrain_multipliers(table)))
    }

    pub fn load_map(&mut self, relative: &str) -> Result<LoadedMap, ContentError> {
        let path = self.resolve(relative);
        let descriptor: MapDescriptor = self.read_json(&path)?;
        let atlas = self.load_tile_set(&descriptor.tile_set)?;
        let mut map = GridMap::from_columns(&descriptor.grid, atlas.catalog())
            .map_err(|source| ContentError::Map { path, source })?;
        if let Some(bg_color) = descriptor.bg_color {
            map = map.with_bg_color(bg_color);
        }
        if let Some(offset) = descriptor.offset {
            map = map.with_offset_px(offset);
        }
        let terrain = match descriptor.terrain.as_deref() {
            Some(terrain) => self.load_terrain(terrain)?,
            None => TerrainCostModel::uniform(),
        };
        info!(
            map = relative,
            width = map.width(),
            height = map.height(),
            "map_loaded"
        );
        Ok(LoadedMap {
            map,
            atlas,
            terrain,
        })
    }

    pub fn load_entity_template(&self, relative: &str) -> Result<EntityTemplate, ContentError> {
        self.read_json(&self.resolve(relative))
    }

    /// Loads the map, its terrain, and every placed entity. Entity tile sets
    /// are loaded once each and share the map's slot when they name the same
    /// file.
    pub fn load_scenario(&mut self, relative: &str) -> Result<LoadedScenario, ContentError> {
        let descriptor: ScenarioDescriptor = self.read_json(&self.resolve(relative))?;
        let LoadedMap {
            map,
            atlas,
            terrain,
        } = self.load_map(&descriptor.map)?;

        let mut atlases = TileAtlases::default();
        atlases.push(atlas);
        let mut layers = Layers::default();
        for placement in &descriptor.entities {
            let template = self.load_entity_template(&placement.id)?;
            let tile_set = self.atlas_slot(&mut atlases, &template.tile_set)?;
            if let Some(atlas) = atlases.get(tile_set) {
                atlas
                    .catalog()
                    .resolve(&template.pose)
                    .map_err(|source| ContentError::Pose {
                        path: self.resolve(&placement.id),
                        source,
                    })?;
            }
            let [x, y] = placement.pos;
            layers.spawn(
                placement.layer,
                Vec2::new(x, y),
                sprite_from_template(tile_set, template, &placement.id),
            );
        }
        info!(
            scenario = relative,
            entity_count = layers.entity_count(),
            tile_sets = atlases.len(),
            "scenario_loaded"
        );
        Ok(LoadedScenario {
            map,
            terrain,
            atlases,
            layers,
        })
    }

    fn atlas_slot(
        &mut self,
        atlases: &mut TileAtlases,
        tile_set: &str,
    ) -> Result<TileSetId, ContentError> {
        if let Some(id) = atlases.find_by_source(tile_set) {
            return Ok(id);
        }
        let atlas = self.load_tile_set(tile_set)?;
        Ok(atlases.push(atlas))
    }

    fn warn_missing_image_once(&mut self, path: &Path, reason: &str) {
        if !self.warned_missing_images.insert(path.to_path_buf()) {
            return;
        }
        warn!(
            path = %path.display(),
            reason,
            "tile_set_image_load_failed_using_fallback"
        );
    }
}

fn sprite_from_template(tile_set: TileSetId, template: EntityTemplate, id: &str) -> SpriteDesc {
    SpriteDesc {
        tile_set,
        pose: template.pose,
        hflip: template.hflip,
        vflip: template.vflip,
        animate: template.animate,
        mover: template.mover,
        name: template.name.unwrap_or_else(|| id.to_string()),
    }
}

fn load_image_rgba(path: &Path) -> Result<TileImage, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    let (width, height) = image.dimensions();
    TileImage::new(width, height, image.into_raw())
        .ok_or_else(|| "decode_failed:buffer_size_mismatch".to_string())
}
