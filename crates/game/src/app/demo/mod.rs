use std::rc::Rc;
use std::time::Duration;

use serde::Deserialize;
use tilegrid_engine::app::{
    ActionTrigger, CursorMoved, EventKind, GameState, InputEvent, KeyBindings, MouseButton,
    SharedKeyBindings, SpriteDesc, LAYER_CURSOR, MAP_TILE_SET,
};
use tilegrid_engine::grid::{Color, GridPoint, DEFAULT_MOVER};
use tilegrid_engine::{Config, ConfigError, Engine, TileKey, Vec2};
use tracing::{debug, info};

const PAN_STEP_PX: f32 = 32.0;
const KEY_REPEAT_INTERVAL: Duration = Duration::from_millis(150);
const DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(5);
const REACH_TINT: Color = [64, 160, 255];
const PATH_TINT: Color = [255, 210, 64];

const SECTION_VIEW: &str = "view";
const SECTION_CURSOR: &str = "cursor";
const SECTION_SELECT: &str = "select";

/// `demo` section of the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct DemoConfig {
    pub(crate) cursor_pose: TileKey,
    pub(crate) cursor_start: [i32; 2],
    pub(crate) move_budget: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            cursor_pose: TileKey::from("cursor"),
            cursor_start: [0, 0],
            move_budget: 4.0,
        }
    }
}

impl DemoConfig {
    pub(crate) fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.get_or("demo", Self::default())
    }
}

/// Spawns the cursor and wires key bindings, mouse input, and timers into
/// `engine`.
pub(crate) fn install(
    engine: &mut Engine,
    mut bindings: KeyBindings,
    demo: &DemoConfig,
) -> SharedKeyBindings {
    let state = engine.state_mut();
    let cursor_sprite = SpriteDesc {
        name: "cursor".to_string(),
        ..SpriteDesc::new(MAP_TILE_SET, demo.cursor_pose.clone())
    };
    let [x, y] = demo.cursor_start;
    state.spawn_cursor(cursor_sprite, GridPoint::new(x, y));
    state.set_cursor_callback(Box::new(|moved: CursorMoved<'_>| {
        moved.viewport.center_on(Vec2::from(moved.position));
    }));
    state.place_cursor(GridPoint::new(x, y));

    register_view_actions(&mut bindings);
    register_cursor_actions(&mut bindings);
    register_select_actions(&mut bindings, demo.move_budget);
    let shared = bindings.attach(engine.dispatcher_mut());

    engine.on_event(EventKind::Resized, Box::new(recenter_on_cursor));
    engine.on_event(EventKind::MouseWheel, Box::new(zoom_with_wheel));
    engine.on_event(EventKind::MouseDown, Box::new(click_to_place_cursor));

    let repeat = Rc::clone(&shared);
    engine.every(
        KEY_REPEAT_INTERVAL,
        Box::new(move |state: &mut GameState| {
            repeat.borrow_mut().repeat_held(state);
        }),
    );
    engine.every(DIAGNOSTICS_INTERVAL, Box::new(log_diagnostics));
    shared
}

fn register_view_actions(bindings: &mut KeyBindings) {
    for (action, dx, dy) in [
        ("up", 0.0, -PAN_STEP_PX),
        ("down", 0.0, PAN_STEP_PX),
        ("left", -PAN_STEP_PX, 0.0),
        ("right", PAN_STEP_PX, 0.0),
    ] {
        bindings.on_action(
            SECTION_VIEW,
            action,
            Box::new(move |_: &ActionTrigger<'_>, state: &mut GameState| {
                state.viewport_mut().shift(dx, dy);
            }),
        );
    }
    for (action, steps) in [("zoom_in", 1), ("zoom_out", -1)] {
        bindings.on_action(
            SECTION_VIEW,
            action,
            Box::new(move |_: &ActionTrigger<'_>, state: &mut GameState| {
                zoom_on_cursor(state, steps);
            }),
        );
    }
}

fn register_cursor_actions(bindings: &mut KeyBindings) {
    for (action, dx, dy) in [
        ("up", 0, -1),
        ("down", 0, 1),
        ("left", -1, 0),
        ("right", 1, 0),
    ] {
        bindings.on_action(
            SECTION_CURSOR,
            action,
            Box::new(move |_: &ActionTrigger<'_>, state: &mut GameState| {
                state.move_cursor(dx, dy);
            }),
        );
    }
}

fn register_select_actions(bindings: &mut KeyBindings, move_budget: f32) {
    bindings.on_action(
        SECTION_SELECT,
        "select",
        Box::new(move |_: &ActionTrigger<'_>, state: &mut GameState| {
            select_under_cursor(state, move_budget);
        }),
    );
    bindings.on_action(
        SECTION_SELECT,
        "path",
        Box::new(|_: &ActionTrigger<'_>, state: &mut GameState| {
            tint_path_to_cursor(state);
        }),
    );
    bindings.on_action(
        SECTION_SELECT,
        "clear",
        Box::new(|_: &ActionTrigger<'_>, state: &mut GameState| {
            state.select(None);
            if let Some(map) = state.map_mut() {
                map.clear_tint();
            }
        }),
    );
    bindings.on_action(
        SECTION_SELECT,
        "quit",
        Box::new(|_: &ActionTrigger<'_>, state: &mut GameState| {
            info!(reason = "quit_key", "shutdown_requested");
            state.request_stop();
        }),
    );
}

fn zoom_on_cursor(state: &mut GameState, steps: i32) {
    state.viewport_mut().apply_zoom_steps(steps);
    if let Some(position) = state.cursor_position() {
        state.viewport_mut().center_on(Vec2::from(position));
    }
    debug!(scale = state.viewport().scale(), "viewport_zoomed");
}

fn recenter_on_cursor(_: &InputEvent, state: &mut GameState) {
    if let Some(position) = state.cursor_position() {
        state.viewport_mut().center_on(Vec2::from(position));
    }
}

fn zoom_with_wheel(event: &InputEvent, state: &mut GameState) {
    if let InputEvent::MouseWheel { steps } = *event {
        zoom_on_cursor(state, steps);
    }
}

fn click_to_place_cursor(event: &InputEvent, state: &mut GameState) {
    if let InputEvent::MouseDown {
        button: MouseButton::Left,
        position,
    } = *event
    {
        let target = state.viewport().screen_to_cell(position);
        state.place_cursor(target);
    }
}

/// Selects the actor under the cursor and tints every cell it can reach
/// within `budget`. An empty cell clears the selection.
fn select_under_cursor(state: &mut GameState, budget: f32) {
    let Some(cursor) = state.cursor_position() else {
        return;
    };
    let picked = state
        .layers()
        .sprite_at(cursor, &[LAYER_CURSOR])
        .map(|entity| (entity.id, entity.grid_point(), mover_of(&entity.sprite)));
    let Some((id, origin, mover)) = picked else {
        state.select(None);
        if let Some(map) = state.map_mut() {
            map.clear_tint();
        }
        return;
    };
    state.select(Some(id));

    let Some(reach) = state
        .map()
        .map(|map| map.reachable_from(state.terrain(), &mover, origin, budget))
    else {
        return;
    };
    if let Some(map) = state.map_mut() {
        map.clear_tint();
        let tinted = map.tint_points(reach.points(), REACH_TINT);
        info!(
            entity = id.0,
            x = origin.x,
            y = origin.y,
            mover = mover.as_str(),
            budget,
            reachable_cells = tinted,
            "selection_range"
        );
    }
}

/// Tints the shortest path from the selected actor to the cursor.
fn tint_path_to_cursor(state: &mut GameState) {
    let (Some(selected), Some(goal)) = (state.selected(), state.cursor_position()) else {
        return;
    };
    let Some((start, mover)) = state
        .layers()
        .find(selected)
        .map(|entity| (entity.grid_point(), mover_of(&entity.sprite)))
    else {
        return;
    };
    let Some(path) = state
        .map()
        .map(|map| map.find_path(state.terrain(), &mover, start, goal))
    else {
        return;
    };
    if let Some(map) = state.map_mut() {
        map.clear_tint();
        let tinted = map.tint_points(path.points().iter().copied(), PATH_TINT);
        info!(
            entity = selected.0,
            found = path.is_found(),
            path_len = tinted,
            "selection_path"
        );
    }
}

fn mover_of(sprite: &SpriteDesc) -> String {
    sprite
        .mover
        .clone()
        .unwrap_or_else(|| DEFAULT_MOVER.to_string())
}

fn log_diagnostics(state: &mut GameState) {
    let viewport = state.viewport();
    info!(
        cursor = ?state.cursor_position(),
        selected = ?state.selected(),
        entity_count = state.layers().entity_count(),
        tinted_cells = state.map().map_or(0, |map| map.tint_len()),
        scale = viewport.scale(),
        offset_x = viewport.offset().x,
        offset_y = viewport.offset().y,
        "demo_diagnostics"
    );
}

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
