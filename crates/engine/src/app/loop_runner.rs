use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Fullscreen, WindowBuilder};

use crate::content::{Config, ConfigError};
use crate::grid::DEFAULT_ANIMATION_RATE;
use crate::StartupError;

use super::frame::DEFAULT_MAX_FRAME_DELTA;
use super::{Engine, InputEvent, MetricsHandle, MouseButton, Renderer, Vec2};

pub const SLOW_FRAME_ENV_VAR: &str = "TILEGRID_SLOW_FRAME_MS";
pub const DEFAULT_FRAME_LIMIT: u32 = 30;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub full_screen: bool,
    /// Render FPS cap; `None` or `Some(0)` runs uncapped.
    pub frame_limit: Option<u32>,
    pub animation_rate: f32,
    pub max_frame_delta: Duration,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "tilegrid".to_string(),
            window_width: 800,
            window_height: 600,
            full_screen: false,
            frame_limit: Some(DEFAULT_FRAME_LIMIT),
            animation_rate: DEFAULT_ANIMATION_RATE,
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
        }
    }
}

impl LoopConfig {
    /// Reads `graphics/*` and `animation/rate`; absent keys keep defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let [window_width, window_height] = config.get_or(
            "graphics/display_mode",
            [defaults.window_width, defaults.window_height],
        )?;
        Ok(Self {
            window_title: config.get_or("graphics/title", defaults.window_title)?,
            window_width,
            window_height,
            full_screen: config.get("graphics/full_screen").is_some_and(is_truthy),
            frame_limit: Some(config.get_or("graphics/frame_limit", DEFAULT_FRAME_LIMIT)?),
            animation_rate: config.get_or("animation/rate", defaults.animation_rate)?,
            max_frame_delta: defaults.max_frame_delta,
            metrics_log_interval: defaults.metrics_log_interval,
            simulated_slow_frame_ms: config
                .get_or("debug/slow_frame_ms", defaults.simulated_slow_frame_ms)?,
        })
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(config: LoopConfig, engine: Engine) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, engine, metrics_handle)
}

/// Opens the window and drives `engine` once per redraw until it requests a
/// stop or the window closes.
pub fn run_app_with_metrics(
    config: LoopConfig,
    engine: Engine,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, DEFAULT_MAX_FRAME_DELTA);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let effective_render_cap = normalize_render_fps_cap(config.frame_limit);
    let render_frame_target = target_frame_duration(effective_render_cap);
    let mut engine = engine
        .with_animation_rate(config.animation_rate)
        .with_max_frame_delta(max_frame_delta)
        .with_metrics(metrics_log_interval, metrics_handle)
        .with_frame_budget(render_frame_target);

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let mut builder = WindowBuilder::new()
        .with_title(config.window_title.clone())
        .with_inner_size(LogicalSize::new(
            config.window_width as f64,
            config.window_height as f64,
        ));
    if config.full_screen {
        builder = builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = Arc::new(builder.build(&event_loop).map_err(AppError::CreateWindow)?);
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;
    let (width, height) = renderer.size();
    engine.push_event(InputEvent::Resized { width, height });

    event_loop.set_control_flow(ControlFlow::Poll);

    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    info!(
        width,
        height,
        full_screen = config.full_screen,
        animation_rate = config.animation_rate,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut translator = EventTranslator::default();
    let mut last_present_instant = Instant::now();
    let mut last_applied_title: Option<String> = None;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    engine.push_event(InputEvent::Quit);
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    engine.push_event(InputEvent::Resized {
                        width: new_size.width,
                        height: new_size.height,
                    });
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                    engine.push_event(InputEvent::Resized {
                        width: size.width,
                        height: size.height,
                    });
                }
                WindowEvent::CursorMoved { position, .. } => {
                    let event = translator.cursor_moved(position.x as f32, position.y as f32);
                    engine.push_event(event);
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    engine.push_event(translator.mouse_button(button, state));
                }
                WindowEvent::MouseWheel { delta, .. } => {
                    if let Some(event) = translator.mouse_wheel(delta) {
                        engine.push_event(event);
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let Some(event) =
                        translator.key(event.physical_key, event.state, event.repeat)
                    {
                        engine.push_event(event);
                    }
                }
                WindowEvent::RedrawRequested => {
                    if slow_frame_delay > Duration::ZERO {
                        // Explicit debug perturbation only; this is not the FPS cap.
                        thread::sleep(slow_frame_delay);
                    }

                    // Single authoritative FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let now = Instant::now();
                    let (width, height) = renderer.size();
                    let report = engine.run_frame(renderer.frame_mut(), width, height, now);
                    if let Err(error) = renderer.present() {
                        warn!(error = %error, "renderer_present_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();

                    let next_title = report.status_line();
                    if last_applied_title.as_deref() != Some(next_title.as_str()) {
                        window.set_title(&next_title);
                        last_applied_title = Some(next_title);
                    }

                    if engine.should_stop() {
                        info!(reason = "stop_requested", "shutdown_requested");
                        window_target.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                info!(frames = engine.frame_index(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// Converts window events into engine input events.
#[derive(Debug, Default)]
struct EventTranslator {
    cursor_position: Vec2,
}

impl EventTranslator {
    fn cursor_moved(&mut self, x: f32, y: f32) -> InputEvent {
        self.cursor_position = Vec2 { x, y };
        InputEvent::MouseMoved {
            position: self.cursor_position,
        }
    }

    fn mouse_button(&self, button: WinitMouseButton, state: ElementState) -> InputEvent {
        let button = map_mouse_button(button);
        let position = self.cursor_position;
        match state {
            ElementState::Pressed => InputEvent::MouseDown { button, position },
            ElementState::Released => InputEvent::MouseUp { button, position },
        }
    }

    fn mouse_wheel(&self, delta: MouseScrollDelta) -> Option<InputEvent> {
        let steps = zoom_steps_from_scroll_delta(delta);
        (steps != 0).then_some(InputEvent::MouseWheel { steps })
    }

    /// OS auto-repeat is dropped; held keys repeat through the key bindings.
    fn key(&self, key: PhysicalKey, state: ElementState, repeat: bool) -> Option<InputEvent> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        match state {
            ElementState::Pressed if repeat => None,
            ElementState::Pressed => Some(InputEvent::KeyDown(code)),
            ElementState::Released => Some(InputEvent::KeyUp(code)),
        }
    }
}

fn map_mouse_button(button: WinitMouseButton) -> MouseButton {
    match button {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Other(3),
        WinitMouseButton::Forward => MouseButton::Other(4),
        WinitMouseButton::Other(code) => MouseButton::Other(code),
    }
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

fn zoom_steps_from_scroll_delta(delta: MouseScrollDelta) -> i32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => y.round() as i32,
        MouseScrollDelta::PixelDelta(position) => {
            if position.y > 0.0 {
                1
            } else if position.y < 0.0 {
                -1
            } else {
                0
            }
        }
    }
}
