use std::collections::BTreeMap;
use std::fmt;

use super::rendering::{TileSetId, Viewport};
use crate::grid::{normalize_animation_rate, GridMap, GridPoint, TerrainCostModel};
use crate::tile_keys::TileKey;

pub const LAYER_TERRAIN: i32 = 0;
pub const LAYER_ACTORS: i32 = 1;
pub const LAYER_CURSOR: i32 = 99;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<GridPoint> for Vec2 {
    fn from(point: GridPoint) -> Self {
        Self {
            x: point.x as f32,
            y: point.y as f32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// What an entity looks like and how it moves.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDesc {
    pub tile_set: TileSetId,
    pub pose: TileKey,
    pub hflip: bool,
    pub vflip: bool,
    pub animate: bool,
    pub mover: Option<String>,
    pub name: String,
}

impl SpriteDesc {
    pub fn new(tile_set: TileSetId, pose: TileKey) -> Self {
        Self {
            tile_set,
            pose,
            hflip: false,
            vflip: false,
            animate: false,
            mover: None,
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    /// Top-left corner in grid coordinates.
    pub position: Vec2,
    pub sprite: SpriteDesc,
    pub frame: f32,
}

impl Entity {
    pub fn grid_point(&self) -> GridPoint {
        GridPoint::new(self.position.x.floor() as i32, self.position.y.floor() as i32)
    }
}

/// Entities grouped by z-order. Lower layers draw first.
#[derive(Debug, Default)]
pub struct Layers {
    allocator: EntityIdAllocator,
    layers: BTreeMap<i32, Vec<Entity>>,
}

impl Layers {
    pub fn spawn(&mut self, layer: i32, position: Vec2, sprite: SpriteDesc) -> EntityId {
        let id = self.allocator.allocate();
        self.layers.entry(layer).or_default().push(Entity {
            id,
            position,
            sprite,
            frame: 0.0,
        });
        id
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        for entities in self.layers.values_mut() {
            if let Some(index) = entities.iter().position(|entity| entity.id == id) {
                return Some(entities.remove(index));
            }
        }
        None
    }

    pub fn find(&self, id: EntityId) -> Option<&Entity> {
        self.iter()
            .map(|(_, entity)| entity)
            .find(|entity| entity.id == id)
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.layers
            .values_mut()
            .flat_map(|entities| entities.iter_mut())
            .find(|entity| entity.id == id)
    }

    pub fn layer_of(&self, id: EntityId) -> Option<i32> {
        self.iter()
            .find(|(_, entity)| entity.id == id)
            .map(|(layer, _)| layer)
    }

    /// Entities in draw order: ascending layer, then spawn order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &Entity)> {
        self.layers
            .iter()
            .flat_map(|(layer, entities)| entities.iter().map(move |entity| (*layer, entity)))
    }

    pub fn entity_count(&self) -> usize {
        self.layers.values().map(Vec::len).sum()
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.find_mut(id) {
            Some(entity) => {
                entity.position = position;
                true
            }
            None => false,
        }
    }

    /// First entity placed exactly on `point`, skipping `ignore_layers`.
    pub fn sprite_at(&self, point: GridPoint, ignore_layers: &[i32]) -> Option<&Entity> {
        let target = Vec2::from(point);
        self.iter()
            .filter(|(layer, _)| !ignore_layers.contains(layer))
            .map(|(_, entity)| entity)
            .find(|entity| entity.position == target)
    }

    pub fn advance_animations(&mut self, rate: f32) {
        let step = 1.0 / normalize_animation_rate(rate);
        for entity in self
            .layers
            .values_mut()
            .flat_map(|entities| entities.iter_mut())
            .filter(|entity| entity.sprite.animate)
        {
            entity.frame += step;
        }
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }
}

/// Passed to the cursor callback after every cursor move.
pub struct CursorMoved<'a> {
    pub position: GridPoint,
    pub map: Option<&'a mut GridMap>,
    pub viewport: &'a mut Viewport,
}

pub type CursorCallback = Box<dyn FnMut(CursorMoved<'_>)>;

/// Cursor entity id, its grid position, and an optional move callback.
pub struct Cursor {
    entity: EntityId,
    position: GridPoint,
    on_move: Option<CursorCallback>,
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("entity", &self.entity)
            .field("position", &self.position)
            .field("has_callback", &self.on_move.is_some())
            .finish()
    }
}

impl Cursor {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn position(&self) -> GridPoint {
        self.position
    }
}

/// Everything input handlers, hooks, and the renderer operate on.
#[derive(Debug)]
pub struct GameState {
    viewport: Viewport,
    map: Option<GridMap>,
    terrain: TerrainCostModel,
    layers: Layers,
    cursor: Option<Cursor>,
    selected: Option<EntityId>,
    stop_requested: bool,
}

impl GameState {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            map: None,
            terrain: TerrainCostModel::uniform(),
            layers: Layers::default(),
            cursor: None,
            selected: None,
            stop_requested: false,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn set_map(&mut self, map: GridMap) {
        self.map = Some(map);
    }

    pub fn map(&self) -> Option<&GridMap> {
        self.map.as_ref()
    }

    pub fn map_mut(&mut self) -> Option<&mut GridMap> {
        self.map.as_mut()
    }

    pub fn set_terrain(&mut self, terrain: TerrainCostModel) {
        self.terrain = terrain;
    }

    pub fn terrain(&self) -> &TerrainCostModel {
        &self.terrain
    }

    pub fn layers(&self) -> &Layers {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut Layers {
        &mut self.layers
    }

    pub fn set_layers(&mut self, layers: Layers) {
        self.layers = layers;
        self.cursor = None;
        self.selected = None;
    }

    /// Spawns the cursor sprite on the cursor layer, replacing any previous
    /// cursor.
    pub fn spawn_cursor(&mut self, sprite: SpriteDesc, position: GridPoint) -> EntityId {
        if let Some(previous) = self.cursor.take() {
            self.layers.despawn(previous.entity);
        }
        let entity = self
            .layers
            .spawn(LAYER_CURSOR, Vec2::from(position), sprite);
        self.cursor = Some(Cursor {
            entity,
            position,
            on_move: None,
        });
        entity
    }

    pub fn set_cursor_callback(&mut self, callback: CursorCallback) -> bool {
        match self.cursor.as_mut() {
            Some(cursor) => {
                cursor.on_move = Some(callback);
                true
            }
            None => false,
        }
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn cursor_position(&self) -> Option<GridPoint> {
        self.cursor.as_ref().map(Cursor::position)
    }

    pub fn move_cursor(&mut self, dx: i32, dy: i32) -> Option<GridPoint> {
        let target = self.cursor.as_ref()?.position.offset(dx, dy);
        self.place_cursor(target)
    }

    /// Moves the cursor to `target`, clamped to the map, then runs the cursor
    /// callback.
    pub fn place_cursor(&mut self, target: GridPoint) -> Option<GridPoint> {
        let cursor = self.cursor.as_mut()?;
        let target = match &self.map {
            Some(map) => map.bounds().clamp(target),
            None => target,
        };
        cursor.position = target;
        self.layers.set_position(cursor.entity, Vec2::from(target));
        if let Some(on_move) = cursor.on_move.as_mut() {
            on_move(CursorMoved {
                position: target,
                map: self.map.as_mut(),
                viewport: &mut self.viewport,
            });
        }
        Some(target)
    }

    pub fn select(&mut self, entity: Option<EntityId>) {
        self.selected = entity;
    }

    pub fn selected(&self) -> Option<EntityId> {
        self.selected
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}
