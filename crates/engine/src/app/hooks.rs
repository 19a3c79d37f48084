use std::fmt;
use std::time::{Duration, Instant};

use super::GameState;

const MIN_TIMER_PERIOD: Duration = Duration::from_millis(1);

pub type StepHook = Box<dyn FnMut(&mut GameState)>;
pub type TimerCallback = Box<dyn FnMut(&mut GameState)>;

/// Named per-frame callbacks. Registering an existing name replaces the hook
/// in place, keeping its position.
#[derive(Default)]
pub struct StepHooks {
    hooks: Vec<(String, StepHook)>,
}

impl fmt::Debug for StepHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|(name, _)| name))
            .finish()
    }
}

impl StepHooks {
    pub fn register(&mut self, name: impl Into<String>, hook: StepHook) {
        let name = name.into();
        match self.hooks.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = hook,
            None => self.hooks.push((name, hook)),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(existing, _)| existing != name);
        self.hooks.len() != before
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hooks.iter().map(|(name, _)| name.as_str())
    }

    pub fn run_all(&mut self, state: &mut GameState) {
        for (_, hook) in self.hooks.iter_mut() {
            hook(state);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct Timer {
    id: TimerId,
    period: Duration,
    next_due: Instant,
    callback: TimerCallback,
}

/// Repeating timers checked once per frame. A due timer fires once and is
/// rescheduled one period after the frame that fired it, so missed periods do
/// not pile up.
#[derive(Default)]
pub struct Timers {
    timers: Vec<Timer>,
    next_id: u64,
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("count", &self.timers.len())
            .finish()
    }
}

impl Timers {
    pub fn every(&mut self, period: Duration, now: Instant, callback: TimerCallback) -> TimerId {
        let period = period.max(MIN_TIMER_PERIOD);
        let id = TimerId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.timers.push(Timer {
            id,
            period,
            next_due: now + period,
            callback,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|timer| timer.id != id);
        self.timers.len() != before
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Fires every due timer once, in creation order. Returns how many fired.
    pub fn fire_due(&mut self, now: Instant, state: &mut GameState) -> usize {
        let mut fired = 0;
        for timer in self.timers.iter_mut() {
            if now < timer.next_due {
                continue;
            }
            (timer.callback)(state);
            timer.next_due = now + timer.period;
            fired += 1;
        }
        fired
    }
}
