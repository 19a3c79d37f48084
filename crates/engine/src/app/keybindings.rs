use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use winit::keyboard::KeyCode;

use super::input::{parse_key_name, EventDispatcher, EventKind, InputEvent};
use super::GameState;

/// Hook action name that matches every action of a section.
pub const WILDCARD_ACTION: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyBindingError {
    #[error("unknown key name '{name}' bound to {section}/{action}")]
    UnknownKey {
        section: String,
        action: String,
        name: String,
    },
}

/// The action a key press resolved to, handed to action hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionTrigger<'a> {
    pub section: &'a str,
    pub action: &'a str,
    pub key: KeyCode,
    pub repeat: bool,
}

pub type ActionHook = Box<dyn FnMut(&ActionTrigger<'_>, &mut GameState)>;
pub type SharedKeyBindings = Rc<RefCell<KeyBindings>>;

#[derive(Debug, Clone)]
struct BindingSection {
    name: String,
    actions: Vec<(String, Vec<KeyCode>)>,
}

struct RegisteredHook {
    section: String,
    action: String,
    hook: ActionHook,
}

/// Key table grouped into sections of named actions.
///
/// A key may be bound once per section; a press triggers the matching action
/// of every section, in section order.
#[derive(Default)]
pub struct KeyBindings {
    sections: Vec<BindingSection>,
    hooks: Vec<RegisteredHook>,
    held: Vec<KeyCode>,
}

impl fmt::Debug for KeyBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBindings")
            .field("sections", &self.sections)
            .field("hooks", &self.hooks.len())
            .field("held", &self.held)
            .finish()
    }
}

impl KeyBindings {
    /// Builds bindings from `section -> action -> [key name]`. Sections and
    /// actions keep the table's key order.
    pub fn from_table(
        table: &BTreeMap<String, BTreeMap<String, Vec<String>>>,
    ) -> Result<Self, KeyBindingError> {
        let mut sections = Vec::with_capacity(table.len());
        for (section, actions) in table {
            let mut bound = Vec::with_capacity(actions.len());
            for (action, names) in actions {
                let keys = names
                    .iter()
                    .map(|name| {
                        parse_key_name(name).ok_or_else(|| KeyBindingError::UnknownKey {
                            section: section.clone(),
                            action: action.clone(),
                            name: name.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                bound.push((action.clone(), keys));
            }
            sections.push(BindingSection {
                name: section.clone(),
                actions: bound,
            });
        }
        Ok(Self {
            sections,
            hooks: Vec::new(),
            held: Vec::new(),
        })
    }

    /// First `(section, action)` bound to `key`, in section order.
    pub fn action_for(&self, key: KeyCode) -> Option<(&str, &str)> {
        self.actions_for(key).next()
    }

    /// One `(section, action)` per section that binds `key`.
    pub fn actions_for(&self, key: KeyCode) -> impl Iterator<Item = (&str, &str)> {
        self.sections.iter().filter_map(move |section| {
            section
                .actions
                .iter()
                .find(|(_, keys)| keys.contains(&key))
                .map(|(action, _)| (section.name.as_str(), action.as_str()))
        })
    }

    pub fn keys_for(&self, section: &str, action: &str) -> &[KeyCode] {
        self.sections
            .iter()
            .find(|candidate| candidate.name == section)
            .and_then(|candidate| {
                candidate
                    .actions
                    .iter()
                    .find(|(name, _)| name == action)
            })
            .map(|(_, keys)| keys.as_slice())
            .unwrap_or(&[])
    }

    /// Registers `hook` for `section/action`; `action` may be
    /// [`WILDCARD_ACTION`]. Wildcard hooks run before action hooks.
    pub fn on_action(&mut self, section: &str, action: &str, hook: ActionHook) {
        self.hooks.push(RegisteredHook {
            section: section.to_string(),
            action: action.to_string(),
            hook,
        });
    }

    pub fn held_keys(&self) -> &[KeyCode] {
        &self.held
    }

    /// Tracks held keys and triggers actions on key presses. Returns how many
    /// hooks ran.
    pub fn handle_event(&mut self, event: &InputEvent, state: &mut GameState) -> usize {
        match *event {
            InputEvent::KeyDown(key) => {
                if !self.held.contains(&key) {
                    self.held.push(key);
                }
                self.trigger(key, false, state)
            }
            InputEvent::KeyUp(key) => {
                self.held.retain(|held| *held != key);
                0
            }
            _ => 0,
        }
    }

    /// Re-triggers every held key as a repeat.
    pub fn repeat_held(&mut self, state: &mut GameState) -> usize {
        let held = self.held.clone();
        held.into_iter()
            .map(|key| self.trigger(key, true, state))
            .sum()
    }

    fn trigger(&mut self, key: KeyCode, repeat: bool, state: &mut GameState) -> usize {
        let mut ran = 0;
        for section in &self.sections {
            let Some((action, _)) = section.actions.iter().find(|(_, keys)| keys.contains(&key))
            else {
                continue;
            };
            let trigger = ActionTrigger {
                section: &section.name,
                action,
                key,
                repeat,
            };
            for pass in [WILDCARD_ACTION, action.as_str()] {
                for registered in self
                    .hooks
                    .iter_mut()
                    .filter(|registered| registered.section == section.name && registered.action == pass)
                {
                    (registered.hook)(&trigger, state);
                    ran += 1;
                }
            }
        }
        ran
    }

    /// Moves the bindings behind a shared handle and registers it for key
    /// events on `dispatcher`.
    pub fn attach(self, dispatcher: &mut EventDispatcher) -> SharedKeyBindings {
        let shared = Rc::new(RefCell::new(self));
        for kind in [EventKind::KeyDown, EventKind::KeyUp] {
            let bindings = Rc::clone(&shared);
            dispatcher.register(
                kind,
                Box::new(move |event: &InputEvent, state: &mut GameState| {
                    bindings.borrow_mut().handle_event(event, state);
                }),
            );
        }
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Viewport;

    fn table(entries: &[(&str, &str, &[&str])]) -> BTreeMap<String, BTreeMap<String, Vec<String>>> {
        let mut table: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for (section, action, keys) in entries {
            table.entry(section.to_string()).or_default().insert(
                action.to_string(),
                keys.iter().map(|key| key.to_string()).collect(),
            );
        }
        table
    }

    fn bindings() -> KeyBindings {
        KeyBindings::from_table(&table(&[
            ("cursor", "up", &["UP"]),
            ("select", "quit", &["ESCAPE"]),
            ("view", "up", &["w", "UP"]),
            ("view", "zoom_in", &["+", "KP_PLUS"]),
        ]))
        .expect("bindings")
    }

    fn state() -> GameState {
        GameState::new(Viewport::new(64, 64))
    }

    #[test]
    fn action_for_returns_first_section_in_order() {
        let bindings = bindings();
        assert_eq!(bindings.action_for(KeyCode::ArrowUp), Some(("cursor", "up")));
        assert_eq!(bindings.action_for(KeyCode::KeyW), Some(("view", "up")));
        assert_eq!(bindings.action_for(KeyCode::KeyQ), None);
        assert_eq!(
            bindings.actions_for(KeyCode::ArrowUp).collect::<Vec<_>>(),
            vec![("cursor", "up"), ("view", "up")]
        );
        assert_eq!(
            bindings.keys_for("view", "zoom_in"),
            &[KeyCode::Equal, KeyCode::NumpadAdd]
        );
    }

    #[test]
    fn unknown_key_names_are_rejected() {
        let error = KeyBindings::from_table(&table(&[("view", "up", &["HYPER"])]))
            .expect_err("unknown key");
        assert_eq!(
            error,
            KeyBindingError::UnknownKey {
                section: "view".to_string(),
                action: "up".to_string(),
                name: "HYPER".to_string(),
            }
        );
    }

    #[test]
    fn key_press_runs_wildcard_then_action_hooks_per_section() {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let mut bindings = bindings();
        for (section, action) in [("view", "up"), ("view", "*"), ("cursor", "up"), ("select", "quit")] {
            let log = Rc::clone(&log);
            bindings.on_action(
                section,
                action,
                Box::new(move |trigger: &ActionTrigger<'_>, _: &mut GameState| {
                    log.borrow_mut()
                        .push(format!("{action}:{}/{}", trigger.section, trigger.action));
                }),
            );
        }
        let mut state = state();
        let ran = bindings.handle_event(&InputEvent::KeyDown(KeyCode::ArrowUp), &mut state);
        assert_eq!(ran, 3);
        assert_eq!(
            *log.borrow(),
            vec!["up:cursor/up", "*:view/up", "up:view/up"]
        );
    }

    #[test]
    fn held_keys_repeat_until_released() {
        let count = Rc::new(RefCell::new(0));
        let mut bindings = bindings();
        let sink = Rc::clone(&count);
        bindings.on_action(
            "view",
            "up",
            Box::new(move |trigger: &ActionTrigger<'_>, _: &mut GameState| {
                if trigger.repeat {
                    *sink.borrow_mut() += 1;
                }
            }),
        );
        let mut state = state();
        bindings.handle_event(&InputEvent::KeyDown(KeyCode::KeyW), &mut state);
        bindings.handle_event(&InputEvent::KeyDown(KeyCode::KeyW), &mut state);
        assert_eq!(bindings.held_keys(), &[KeyCode::KeyW]);
        bindings.repeat_held(&mut state);
        bindings.repeat_held(&mut state);
        bindings.handle_event(&InputEvent::KeyUp(KeyCode::KeyW), &mut state);
        bindings.repeat_held(&mut state);
        assert_eq!(*count.borrow(), 2);
        assert!(bindings.held_keys().is_empty());
    }

    #[test]
    fn attached_bindings_receive_dispatched_key_events() {
        let mut dispatcher = EventDispatcher::default();
        let mut bindings = bindings();
        bindings.on_action(
            "select",
            "quit",
            Box::new(|_: &ActionTrigger<'_>, state: &mut GameState| state.request_stop()),
        );
        let shared = bindings.attach(&mut dispatcher);
        let mut state = state();
        dispatcher.push(InputEvent::KeyDown(KeyCode::Escape));
        dispatcher.dispatch_pending(&mut state);
        assert!(state.stop_requested());
        assert_eq!(shared.borrow().held_keys(), &[KeyCode::Escape]);
    }
}
