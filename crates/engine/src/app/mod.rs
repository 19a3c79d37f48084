mod frame;
mod hooks;
mod input;
mod keybindings;
mod loop_runner;
mod metrics;
mod rendering;
mod scene;

pub use frame::{Engine, FrameReport, DEFAULT_MAX_FRAME_DELTA};
pub use hooks::{StepHook, StepHooks, TimerCallback, TimerId, Timers};
pub use input::{parse_key_name, EventDispatcher, EventHandler, EventKind, InputEvent, MouseButton};
pub use keybindings::{
    ActionHook, ActionTrigger, KeyBindingError, KeyBindings, SharedKeyBindings, WILDCARD_ACTION,
};
pub use loop_runner::{
    run_app, run_app_with_metrics, AppError, LoopConfig, DEFAULT_FRAME_LIMIT, SLOW_FRAME_ENV_VAR,
};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    render_frame, CellRange, RenderCounts, Renderer, TileAtlas, TileAtlases, TileImage, TileSetId,
    Viewport, ViewportError, MAP_TILE_SET, SCALE_DEFAULT, SCALE_MAX, SCALE_MIN, SCALE_STEP,
    TILE_SIZE_PX,
};
pub use scene::{
    Cursor, CursorCallback, CursorMoved, Entity, EntityId, GameState, Layers, SpriteDesc, Vec2,
    LAYER_ACTORS, LAYER_CURSOR, LAYER_TERRAIN,
};
