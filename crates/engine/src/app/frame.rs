use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::grid::DEFAULT_ANIMATION_RATE;

use super::hooks::{StepHook, StepHooks, TimerCallback, TimerId, Timers};
use super::input::{EventDispatcher, EventHandler, EventKind, InputEvent};
use super::metrics::MetricsAccumulator;
use super::{render_frame, GameState, LoopMetricsSnapshot, MetricsHandle, TileAtlases};

pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// What one frame drew, published to the status side channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub frame_index: u64,
    pub tiles_drawn: usize,
    pub entities_drawn: usize,
    pub fps: f32,
    pub frame_time_ms: f32,
}

impl FrameReport {
    /// Window-title status text.
    pub fn status_line(&self) -> String {
        format!(
            "{} sprites, {} tiles @{:.2} FPS",
            self.entities_drawn, self.tiles_drawn, self.fps
        )
    }
}

/// Owns the game state plus everything that drives it once per frame.
#[derive(Debug)]
pub struct Engine {
    state: GameState,
    atlases: TileAtlases,
    dispatcher: EventDispatcher,
    steps: StepHooks,
    timers: Timers,
    animation_rate: f32,
    max_frame_delta: Duration,
    metrics: MetricsAccumulator,
    metrics_handle: MetricsHandle,
    last_snapshot: LoopMetricsSnapshot,
    frame_index: u64,
    last_frame: Option<Instant>,
}

impl Engine {
    pub fn new(state: GameState, atlases: TileAtlases) -> Self {
        Self {
            state,
            atlases,
            dispatcher: EventDispatcher::default(),
            steps: StepHooks::default(),
            timers: Timers::default(),
            animation_rate: DEFAULT_ANIMATION_RATE,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            metrics: MetricsAccumulator::new(Duration::from_secs(1), Instant::now()),
            metrics_handle: MetricsHandle::default(),
            last_snapshot: LoopMetricsSnapshot::default(),
            frame_index: 0,
            last_frame: None,
        }
    }

    pub fn with_animation_rate(mut self, rate: f32) -> Self {
        self.animation_rate = rate;
        self
    }

    /// Caps the frame time fed to metrics.
    pub fn with_max_frame_delta(mut self, max_frame_delta: Duration) -> Self {
        self.max_frame_delta = max_frame_delta;
        self
    }

    pub fn with_metrics(mut self, interval: Duration, handle: MetricsHandle) -> Self {
        self.metrics = MetricsAccumulator::new(interval, Instant::now());
        self.metrics_handle = handle;
        self
    }

    /// Frames whose work exceeds `budget` are counted in the metrics.
    pub fn with_frame_budget(mut self, budget: Option<Duration>) -> Self {
        self.metrics.set_frame_budget(budget);
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn atlases(&self) -> &TileAtlases {
        &self.atlases
    }

    pub fn dispatcher_mut(&mut self) -> &mut EventDispatcher {
        &mut self.dispatcher
    }

    pub fn metrics_handle(&self) -> &MetricsHandle {
        &self.metrics_handle
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn push_event(&mut self, event: InputEvent) {
        self.dispatcher.push(event);
    }

    pub fn on_event(&mut self, kind: EventKind, handler: EventHandler) {
        self.dispatcher.register(kind, handler);
    }

    pub fn on_step(&mut self, name: impl Into<String>, hook: StepHook) {
        self.steps.register(name, hook);
    }

    pub fn remove_step(&mut self, name: &str) -> bool {
        self.steps.remove(name)
    }

    pub fn every(&mut self, period: Duration, callback: TimerCallback) -> TimerId {
        self.timers.every(period, Instant::now(), callback)
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn should_stop(&self) -> bool {
        self.state.stop_requested()
    }

    /// Runs one frame into `frame` (RGBA, `width * height * 4` bytes):
    /// input, hooks, timers, animation, drawing, then counters.
    pub fn run_frame(&mut self, frame: &mut [u8], width: u32, height: u32, now: Instant) -> FrameReport {
        let work_started = Instant::now();
        let raw_frame_dt = self
            .last_frame
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        let frame_dt = clamp_frame_delta(raw_frame_dt, self.max_frame_delta);
        self.last_frame = Some(now);

        let dispatched = self.dispatcher.dispatch_pending(&mut self.state);
        self.steps.run_all(&mut self.state);
        let fired = self.timers.fire_due(now, &mut self.state);
        if dispatched > 0 || fired > 0 {
            debug!(dispatched, timers_fired = fired, "frame_input");
        }

        let rate = self.animation_rate;
        if let Some(map) = self.state.map_mut() {
            map.advance(rate);
        }
        self.state.layers_mut().advance_animations(rate);

        let counts = render_frame(frame, width, height, &self.state, &self.atlases);

        self.metrics.record_frame(frame_dt, work_started.elapsed(), counts);
        if let Some(snapshot) = self.metrics.maybe_snapshot(now) {
            self.metrics_handle.publish(snapshot);
            self.last_snapshot = snapshot;
            info!(
                fps = snapshot.fps,
                frame_time_ms = snapshot.frame_time_ms,
                work_time_ms = snapshot.work_time_ms,
                worst_work_time_ms = snapshot.worst_work_time_ms,
                over_budget_frames = snapshot.over_budget_frames,
                tiles_drawn = snapshot.tiles_drawn,
                entities_drawn = snapshot.entities_drawn,
                "frame_metrics"
            );
        }

        let report = FrameReport {
            frame_index: self.frame_index,
            tiles_drawn: counts.tiles_drawn,
            entities_drawn: counts.entities_drawn,
            fps: self.last_snapshot.fps,
            frame_time_ms: frame_dt.as_secs_f32() * 1000.0,
        };
        self.frame_index = self.frame_index.saturating_add(1);
        report
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}
