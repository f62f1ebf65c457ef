// Cooperative single-threaded scheduling for the pipeline and comparator.
//
// Two logical timers share one thread: the pipeline's processing cadence and
// the comparator's animation cadence. The scheduler always fires the earliest
// due timer (pipeline first on ties), sleeping on a `Clock` in between. Each
// tick runs to completion before the next one starts.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::pipeline::TokenPipeline;

/// Source of time for the scheduler.
pub trait Clock {
    /// Milliseconds since the clock was created.
    fn now_ms(&self) -> u64;

    /// Block (or pretend to) for `ms` milliseconds.
    fn sleep_ms(&mut self, ms: u64);
}

/// Wall-clock time, sleeping the current thread.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

/// Logical time that advances only when slept on.
#[derive(Debug, Clone, Copy, Default)]
pub struct VirtualClock {
    now: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now
    }

    fn sleep_ms(&mut self, ms: u64) {
        self.now = self.now.saturating_add(ms);
    }
}

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Timer {
    Pipeline,
    Comparison,
}

/// One timer firing from [`CooperativeScheduler::run_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired {
    pub timer: Timer,
    /// Whether the tick moved its component forward. Ticks left over from
    /// before a pause, stop or reset fire without advancing.
    pub advanced: bool,
}

/// Totals for one [`CooperativeScheduler::run`]. Only advancing ticks count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub pipeline_ticks: usize,
    pub comparison_ticks: usize,
    pub elapsed_ms: u64,
}

/// Interleaves pipeline and comparator ticks by due time.
#[derive(Debug, Clone, Default)]
pub struct CooperativeScheduler {
    pipeline_due: Option<u64>,
    comparison_due: Option<u64>,
}

/// Due time `delay` from now. Saturates at `u64::MAX`.
fn deadline(clock: &dyn Clock, delay: Duration) -> u64 {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    clock.now_ms().saturating_add(delay_ms)
}

impl CooperativeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule any runnable component that has no pending tick.
    ///
    /// Call after external input (process, resume) to start its cadence.
    pub fn arm(&mut self, pipeline: &TokenPipeline, now_ms: u64) {
        if pipeline.is_processing() && self.pipeline_due.is_none() {
            self.pipeline_due = Some(now_ms);
        }
        if pipeline.comparison().is_running() && self.comparison_due.is_none() {
            self.comparison_due = Some(now_ms);
        }
    }

    /// Earliest pending timer and its due time.
    pub fn next_due(&self) -> Option<(Timer, u64)> {
        match (self.pipeline_due, self.comparison_due) {
            (Some(p), Some(c)) if c < p => Some((Timer::Comparison, c)),
            (Some(p), _) => Some((Timer::Pipeline, p)),
            (None, Some(c)) => Some((Timer::Comparison, c)),
            (None, None) => None,
        }
    }

    /// Drop every pending tick.
    pub fn cancel(&mut self) {
        self.pipeline_due = None;
        self.comparison_due = None;
    }

    /// Fire the earliest due timer, sleeping until it is due.
    ///
    /// Returns `None` when nothing is scheduled.
    pub fn run_once(&mut self, pipeline: &mut TokenPipeline, clock: &mut dyn Clock) -> Option<Fired> {
        self.arm(pipeline, clock.now_ms());
        let (timer, due) = self.next_due()?;

        let now = clock.now_ms();
        if due > now {
            clock.sleep_ms(due - now);
        }

        let advanced = match timer {
            Timer::Pipeline => {
                let before = pipeline.position();
                self.pipeline_due = pipeline.tick().map(|d| deadline(&*clock, d));
                pipeline.position() != before
            }
            Timer::Comparison => {
                let before = pipeline.comparison().position();
                self.comparison_due = pipeline.comparison_mut().tick().map(|d| deadline(&*clock, d));
                pipeline.comparison().position() != before
            }
        };
        debug!(timer = ?timer, advanced, at_ms = clock.now_ms(), "scheduler tick");
        Some(Fired { timer, advanced })
    }

    /// Run until neither the pipeline nor the comparator has work left.
    pub fn run(&mut self, pipeline: &mut TokenPipeline, clock: &mut dyn Clock) -> RunSummary {
        let start = clock.now_ms();
        let mut summary = RunSummary::default();
        while let Some(fired) = self.run_once(pipeline, clock) {
            match fired {
                Fired { advanced: false, .. } => {}
                Fired { timer: Timer::Pipeline, .. } => summary.pipeline_ticks += 1,
                Fired { timer: Timer::Comparison, .. } => summary.comparison_ticks += 1,
            }
        }
        summary.elapsed_ms = clock.now_ms().saturating_sub(start);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::SimulationConfig;
    use crate::events::{NullSink, RecordingSink, SimEvent};

    fn pipeline(processing_ms: u64, comparison_ms: u64) -> TokenPipeline {
        let config = SimulationConfig {
            seed: Some(5),
            processing_delay_ms: processing_ms,
            comparison_delay_ms: comparison_ms,
            ..SimulationConfig::default()
        };
        TokenPipeline::from_config(&config, Arc::new(NullSink)).unwrap()
    }

    #[test]
    fn test_virtual_clock_advances_on_sleep() {
        let mut clock = VirtualClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.sleep_ms(250);
        assert_eq!(clock.now_ms(), 250);
    }

    #[test]
    fn test_idle_scheduler_does_nothing() {
        let mut p = pipeline(100, 100);
        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        assert_eq!(scheduler.run_once(&mut p, &mut clock), None);
        assert_eq!(scheduler.run(&mut p, &mut clock), RunSummary::default());
    }

    #[test]
    fn test_run_completes_both_cadences() {
        let mut p = pipeline(1000, 1500);
        p.process_input("a b c d", "basic");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        let summary = scheduler.run(&mut p, &mut clock);

        assert_eq!(summary.pipeline_ticks, 4);
        assert_eq!(summary.comparison_ticks, 4);
        // Last comparator tick fires at 3 * 1500.
        assert_eq!(summary.elapsed_ms, 4500);
        assert!(p.is_complete());
        assert_eq!(p.comparison().stats().without_cache.computations, 10);
        assert_eq!(p.comparison().stats().with_cache.cached, 6);
    }

    #[test]
    fn test_ticks_interleave_by_due_time() {
        let mut p = pipeline(100, 250);
        p.process_input("a b c", "basic");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        let mut order = Vec::new();
        while let Some(fired) = scheduler.run_once(&mut p, &mut clock) {
            assert!(fired.advanced);
            order.push((fired.timer, clock.now_ms()));
        }
        assert_eq!(
            order,
            vec![
                (Timer::Pipeline, 0),
                (Timer::Comparison, 0),
                (Timer::Pipeline, 100),
                (Timer::Pipeline, 200),
                (Timer::Comparison, 250),
                (Timer::Comparison, 500),
            ]
        );
    }

    #[test]
    fn test_pause_stops_pipeline_timer() {
        let mut p = pipeline(100, 100);
        p.process_input("a b c d", "basic");
        p.comparison_mut().stop();

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        scheduler.run_once(&mut p, &mut clock);
        p.toggle_pause();
        scheduler.run(&mut p, &mut clock);
        assert_eq!(p.position(), 1);

        p.toggle_pause();
        scheduler.run(&mut p, &mut clock);
        assert_eq!(p.position(), 4);
    }

    #[test]
    fn test_resume_before_pending_tick_does_not_double_schedule() {
        let mut p = pipeline(100, 100);
        p.process_input("a b c d", "basic");
        p.comparison_mut().stop();

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        scheduler.run_once(&mut p, &mut clock);
        p.toggle_pause();
        p.toggle_pause();
        scheduler.arm(&p, clock.now_ms());
        assert_eq!(scheduler.next_due(), Some((Timer::Pipeline, 100)));
    }

    #[test]
    fn test_reset_mid_run_leaves_clean_state() {
        let sink = Arc::new(RecordingSink::new());
        let config = SimulationConfig {
            seed: Some(5),
            ..SimulationConfig::default()
        };
        let mut p = TokenPipeline::from_config(&config, sink.clone()).unwrap();
        p.process_input("a b c d", "shared-cache");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        scheduler.run_once(&mut p, &mut clock);
        p.reset();

        let summary = scheduler.run(&mut p, &mut clock);

        // Timers pending at reset fire without advancing and are not counted.
        assert_eq!(summary.pipeline_ticks, 0);
        assert_eq!(summary.comparison_ticks, 0);
        assert!(p.manager().heads().iter().all(|h| h.cache().is_empty()));
        assert_eq!(p.position(), 0);
        let last_added = sink
            .events()
            .iter()
            .rposition(|e| matches!(e, SimEvent::CacheItemAdded { .. }));
        let last_cleared = sink
            .events()
            .iter()
            .rposition(|e| matches!(e, SimEvent::CacheCleared { .. }));
        assert!(last_cleared > last_added);
    }

    #[test]
    fn test_stale_ticks_report_no_advance() {
        let mut p = pipeline(100, 100);
        p.process_input("a b c", "basic");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        let first = scheduler.run_once(&mut p, &mut clock).unwrap();
        assert_eq!(first, Fired { timer: Timer::Pipeline, advanced: true });

        p.reset();
        let mut fired = Vec::new();
        while let Some(f) = scheduler.run_once(&mut p, &mut clock) {
            fired.push(f);
        }
        assert_eq!(
            fired,
            vec![
                Fired { timer: Timer::Comparison, advanced: false },
                Fired { timer: Timer::Pipeline, advanced: false },
            ]
        );
    }

    #[test]
    fn test_huge_cadence_saturates_instead_of_overflowing() {
        let mut p = pipeline(u64::MAX, 100);
        p.process_input("a b", "basic");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        let summary = scheduler.run(&mut p, &mut clock);

        assert_eq!(summary.pipeline_ticks, 2);
        assert_eq!(summary.comparison_ticks, 2);
        assert!(p.is_complete());
        assert_eq!(clock.now_ms(), u64::MAX);
        assert_eq!(summary.elapsed_ms, u64::MAX);
    }

    #[test]
    fn test_huge_comparison_cadence_after_virtual_time_advanced() {
        let mut p = pipeline(100, u64::MAX);
        p.process_input("a b c", "basic");

        let mut scheduler = CooperativeScheduler::new();
        let mut clock = VirtualClock::new();
        clock.sleep_ms(50);
        let summary = scheduler.run(&mut p, &mut clock);

        assert_eq!(summary.pipeline_ticks, 3);
        assert_eq!(summary.comparison_ticks, 3);
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn test_virtual_clock_saturates() {
        let mut clock = VirtualClock::new();
        clock.sleep_ms(u64::MAX);
        clock.sleep_ms(10);
        assert_eq!(clock.now_ms(), u64::MAX);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let before = clock.now_ms();
        clock.sleep_ms(1);
        assert!(clock.now_ms() >= before);
    }
}
