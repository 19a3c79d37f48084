use std::collections::{HashMap, VecDeque};
use std::fmt;

use winit::keyboard::KeyCode;

use super::{GameState, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Other(u16),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    MouseDown { button: MouseButton, position: Vec2 },
    MouseUp { button: MouseButton, position: Vec2 },
    MouseMoved { position: Vec2 },
    MouseWheel { steps: i32 },
    Resized { width: u32, height: u32 },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
    MouseDown,
    MouseUp,
    MouseMoved,
    MouseWheel,
    Resized,
    Quit,
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InputEvent::KeyDown(_) => EventKind::KeyDown,
            InputEvent::KeyUp(_) => EventKind::KeyUp,
            InputEvent::MouseDown { .. } => EventKind::MouseDown,
            InputEvent::MouseUp { .. } => EventKind::MouseUp,
            InputEvent::MouseMoved { .. } => EventKind::MouseMoved,
            InputEvent::MouseWheel { .. } => EventKind::MouseWheel,
            InputEvent::Resized { .. } => EventKind::Resized,
            InputEvent::Quit => EventKind::Quit,
        }
    }
}

pub type EventHandler = Box<dyn FnMut(&InputEvent, &mut GameState)>;

/// Queued input events and the handlers registered per event kind.
///
/// Handlers for one kind run in registration order. `Resized` updates the
/// viewport and `Quit` raises the stop flag before any handler sees them.
#[derive(Default)]
pub struct EventDispatcher {
    queue: VecDeque<InputEvent>,
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("pending", &self.queue.len())
            .field("kinds", &self.handlers.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn push(&mut self, event: InputEvent) {
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn register(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drains the queue, returning how many events were dispatched.
    pub fn dispatch_pending(&mut self, state: &mut GameState) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.queue.pop_front() {
            match event {
                InputEvent::Resized { width, height } => state.viewport_mut().resize(width, height),
                InputEvent::Quit => state.request_stop(),
                _ => {}
            }
            if let Some(handlers) = self.handlers.get_mut(&event.kind()) {
                for handler in handlers.iter_mut() {
                    handler(&event, state);
                }
            }
            dispatched += 1;
        }
        dispatched
    }
}

/// Maps a key name used in binding tables to a physical key.
///
/// Single characters name letter, digit, and punctuation keys; longer names
/// follow the upper-case convention (`UP`, `ESCAPE`, `RETURN`, `KP_PLUS`).
pub fn parse_key_name(name: &str) -> Option<KeyCode> {
    let mut chars = name.chars();
    if let (Some(ch), None) = (chars.next(), chars.next()) {
        return parse_key_char(ch.to_ascii_lowercase());
    }
    let key = match name.to_ascii_uppercase().as_str() {
        "UP" => KeyCode::ArrowUp,
        "DOWN" => KeyCode::ArrowDown,
        "LEFT" => KeyCode::ArrowLeft,
        "RIGHT" => KeyCode::ArrowRight,
        "ESCAPE" | "ESC" => KeyCode::Escape,
        "RETURN" | "ENTER" => KeyCode::Enter,
        "SPACE" => KeyCode::Space,
        "TAB" => KeyCode::Tab,
        "BACKSPACE" => KeyCode::Backspace,
        "DELETE" => KeyCode::Delete,
        "HOME" => KeyCode::Home,
        "END" => KeyCode::End,
        "PAGEUP" => KeyCode::PageUp,
        "PAGEDOWN" => KeyCode::PageDown,
        "PLUS" | "EQUALS" => KeyCode::Equal,
        "MINUS" => KeyCode::Minus,
        "KP_PLUS" => KeyCode::NumpadAdd,
        "KP_MINUS" => KeyCode::NumpadSubtract,
        "KP_ENTER" => KeyCode::NumpadEnter,
        "LSHIFT" => KeyCode::ShiftLeft,
        "RSHIFT" => KeyCode::ShiftRight,
        "LCTRL" => KeyCode::ControlLeft,
        "RCTRL" => KeyCode::ControlRight,
        "F1" => KeyCode::F1,
        "F2" => KeyCode::F2,
        "F3" => KeyCode::F3,
        "F4" => KeyCode::F4,
        "F5" => KeyCode::F5,
        "F6" => KeyCode::F6,
        "F7" => KeyCode::F7,
        "F8" => KeyCode::F8,
        "F9" => KeyCode::F9,
        "F10" => KeyCode::F10,
        "F11" => KeyCode::F11,
        "F12" => KeyCode::F12,
        _ => return None,
    };
    Some(key)
}

fn parse_key_char(ch: char) -> Option<KeyCode> {
    let key = match ch {
        'a' => KeyCode::KeyA,
        'b' => KeyCode::KeyB,
        'c' => KeyCode::KeyC,
        'd' => KeyCode::KeyD,
        'e' => KeyCode::KeyE,
        'f' => KeyCode::KeyF,
        'g' => KeyCode::KeyG,
        'h' => KeyCode::KeyH,
        'i' => KeyCode::KeyI,
        'j' => KeyCode::KeyJ,
        'k' => KeyCode::KeyK,
        'l' => KeyCode::KeyL,
        'm' => KeyCode::KeyM,
        'n' => KeyCode::KeyN,
        'o' => KeyCode::KeyO,
        'p' => KeyCode::KeyP,
        'q' => KeyCode::KeyQ,
        'r' => KeyCode::KeyR,
        's' => KeyCode::KeyS,
        't' => KeyCode::KeyT,
        'u' => KeyCode::KeyU,
        'v' => KeyCode::KeyV,
        'w' => KeyCode::KeyW,
        'x' => KeyCode::KeyX,
        'y' => KeyCode::KeyY,
        'z' => KeyCode::KeyZ,
        '0' => KeyCode::Digit0,
        '1' => KeyCode::Digit1,
        '2' => KeyCode::Digit2,
        '3' => KeyCode::Digit3,
        '4' => KeyCode::Digit4,
        '5' => KeyCode::Digit5,
        '6' => KeyCode::Digit6,
        '7' => KeyCode::Digit7,
        '8' => KeyCode::Digit8,
        '9' => KeyCode::Digit9,
        '+' | '=' => KeyCode::Equal,
        '-' => KeyCode::Minus,
        ',' => KeyCode::Comma,
        '.' => KeyCode::Period,
        '/' => KeyCode::Slash,
        ';' => KeyCode::Semicolon,
        '[' => KeyCode::BracketLeft,
        ']' => KeyCode::BracketRight,
        ' ' => KeyCode::Space,
        _ => return None,
    };
    Some(key)
}
