use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::warn;

use super::RenderCounts;

/// Frame statistics averaged over one metrics interval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopMetricsSnapshot {
    pub fps: f32,
    /// Mean time between frames.
    pub frame_time_ms: f32,
    /// Mean time spent inside `run_frame`.
    pub work_time_ms: f32,
    pub worst_work_time_ms: f32,
    /// Frames whose work time exceeded the frame budget.
    pub over_budget_frames: u32,
    pub tiles_drawn: usize,
    pub entities_drawn: usize,
}

#[derive(Debug, Default)]
struct SharedSnapshot {
    snapshot: RwLock<LoopMetricsSnapshot>,
    poison_warned: AtomicBool,
}

impl SharedSnapshot {
    fn warn_poisoned_once(&self, operation: &'static str) {
        if !self.poison_warned.swap(true, Ordering::Relaxed) {
            warn!(operation, "metrics_lock_poisoned_recovered");
        }
    }
}

/// Latest published snapshot, readable from any thread.
#[derive(Clone, Debug, Default)]
pub struct MetricsHandle {
    shared: Arc<SharedSnapshot>,
}

impl MetricsHandle {
    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        match self.shared.snapshot.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                self.shared.warn_poisoned_once("read");
                *poisoned.into_inner()
            }
        }
    }

    pub(crate) fn publish(&self, snapshot: LoopMetricsSnapshot) {
        match self.shared.snapshot.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => {
                self.shared.warn_poisoned_once("write");
                *poisoned.into_inner() = snapshot;
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct MetricsAccumulator {
    interval: Duration,
    interval_start: Instant,
    frame_budget: Option<Duration>,
    frames: u32,
    frame_time_sum: Duration,
    work_time_sum: Duration,
    worst_work_time: Duration,
    over_budget_frames: u32,
    last_counts: RenderCounts,
}

impl MetricsAccumulator {
    pub(crate) fn new(interval: Duration, started_at: Instant) -> Self {
        Self {
            interval,
            interval_start: started_at,
            frame_budget: None,
            frames: 0,
            frame_time_sum: Duration::ZERO,
            work_time_sum: Duration::ZERO,
            worst_work_time: Duration::ZERO,
            over_budget_frames: 0,
            last_counts: RenderCounts::default(),
        }
    }

    /// `None` disables over-budget counting.
    pub(crate) fn set_frame_budget(&mut self, frame_budget: Option<Duration>) {
        self.frame_budget = frame_budget.filter(|budget| !budget.is_zero());
    }

    pub(crate) fn record_frame(
        &mut self,
        frame_dt: Duration,
        work_time: Duration,
        counts: RenderCounts,
    ) {
        self.frames = self.frames.saturating_add(1);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.work_time_sum = self.work_time_sum.saturating_add(work_time);
        self.worst_work_time = self.worst_work_time.max(work_time);
        if self.frame_budget.is_some_and(|budget| work_time > budget) {
            self.over_budget_frames = self.over_budget_frames.saturating_add(1);
        }
        self.last_counts = counts;
    }

    /// Closes the interval once it has run its full length.
    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<LoopMetricsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let snapshot = LoopMetricsSnapshot {
            fps: self.frames as f32 / elapsed.as_secs_f32().max(f32::EPSILON),
            frame_time_ms: mean_ms(self.frame_time_sum, self.frames),
            work_time_ms: mean_ms(self.work_time_sum, self.frames),
            worst_work_time_ms: self.worst_work_time.as_secs_f32() * 1000.0,
            over_budget_frames: self.over_budget_frames,
            tiles_drawn: self.last_counts.tiles_drawn,
            entities_drawn: self.last_counts.entities_drawn,
        };

        self.interval_start = now;
        self.frames = 0;
        self.frame_time_sum = Duration::ZERO;
        self.work_time_sum = Duration::ZERO;
        self.worst_work_time = Duration::ZERO;
        self.over_budget_frames = 0;
        Some(snapshot)
    }
}

fn mean_ms(total: Duration, frames: u32) -> f32 {
    if frames == 0 {
        return 0.0;
    }
    total.as_secs_f32() / frames as f32 * 1000.0
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn poison(handle: &MetricsHandle) {
        thread::scope(|scope| {
            let _ = scope
                .spawn(|| {
                    let _guard = handle.shared.snapshot.write().expect("write guard");
                    panic!("poison metrics lock");
                })
                .join();
        });
    }

    fn counts(tiles_drawn: usize, entities_drawn: usize) -> RenderCounts {
        RenderCounts {
            tiles_drawn,
            entities_drawn,
        }
    }

    #[test]
    fn snapshot_averages_the_interval() {
        let start = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), start);
        accumulator.record_frame(Duration::from_millis(16), Duration::from_millis(4), counts(0, 0));
        accumulator.record_frame(Duration::from_millis(16), Duration::from_millis(8), counts(300, 4));

        let snapshot = accumulator
            .maybe_snapshot(start + Duration::from_secs(1))
            .expect("snapshot");
        assert!((snapshot.fps - 2.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 16.0).abs() < 0.001);
        assert!((snapshot.work_time_ms - 6.0).abs() < 0.001);
        assert!((snapshot.worst_work_time_ms - 8.0).abs() < 0.001);
        assert_eq!(snapshot.over_budget_frames, 0);
        assert_eq!((snapshot.tiles_drawn, snapshot.entities_drawn), (300, 4));
    }

    #[test]
    fn nothing_is_emitted_before_the_interval_ends() {
        let start = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_secs(1), start);
        accumulator.record_frame(Duration::from_millis(16), Duration::ZERO, counts(1, 1));
        assert!(accumulator
            .maybe_snapshot(start + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn over_budget_frames_are_counted_and_reset() {
        let start = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_millis(100), start);
        accumulator.set_frame_budget(Some(Duration::from_millis(10)));
        for work_ms in [5, 12, 30] {
            accumulator.record_frame(
                Duration::from_millis(33),
                Duration::from_millis(work_ms),
                counts(0, 0),
            );
        }
        let first = accumulator
            .maybe_snapshot(start + Duration::from_millis(100))
            .expect("first");
        assert_eq!(first.over_budget_frames, 2);

        accumulator.record_frame(Duration::from_millis(33), Duration::from_millis(1), counts(0, 0));
        let second = accumulator
            .maybe_snapshot(start + Duration::from_millis(200))
            .expect("second");
        assert_eq!(second.over_budget_frames, 0);
        assert!((second.worst_work_time_ms - 1.0).abs() < 0.001);
    }

    #[test]
    fn zero_budget_disables_counting() {
        let start = Instant::now();
        let mut accumulator = MetricsAccumulator::new(Duration::from_millis(1), start);
        accumulator.set_frame_budget(Some(Duration::ZERO));
        accumulator.record_frame(Duration::ZERO, Duration::from_secs(1), counts(0, 0));
        let snapshot = accumulator
            .maybe_snapshot(start + Duration::from_millis(1))
            .expect("snapshot");
        assert_eq!(snapshot.over_budget_frames, 0);
    }

    #[test]
    fn poisoned_handle_still_reads_and_publishes() {
        let handle = MetricsHandle::default();
        poison(&handle);
        assert_eq!(handle.snapshot(), LoopMetricsSnapshot::default());

        let expected = LoopMetricsSnapshot {
            fps: 30.0,
            tiles_drawn: 480,
            entities_drawn: 7,
            ..LoopMetricsSnapshot::default()
        };
        handle.clone().publish(expected);
        assert_eq!(handle.snapshot(), expected);
    }
}
