// src/alert.rs - Debounce for sustained forward-head posture and the repeating alert it drives
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scheduler::{RepeatingTask, Scheduler, TaskHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    Idle,
    Armed,
    Sustained,
    Alerting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AlertState {
    Idle,
    Armed,
    Sustained { onset: Instant },
    Alerting { onset: Instant, handle: TaskHandle },
}

/// `Idle -> Armed -> Sustained -> Alerting`, back to `Armed` whenever the
/// condition clears.
///
/// At most one repeating task exists at a time: it is created only on the
/// `Sustained -> Alerting` edge and cancelled on every exit from `Alerting`.
#[derive(Debug)]
pub struct AlertDebouncer {
    onset_after: Duration,
    interval: Duration,
    state: AlertState,
}

impl AlertDebouncer {
    pub fn new(onset_after: Duration, interval: Duration) -> Self {
        Self {
            onset_after,
            interval,
            state: AlertState::Idle,
        }
    }

    pub fn phase(&self) -> AlertPhase {
        match self.state {
            AlertState::Idle => AlertPhase::Idle,
            AlertState::Armed => AlertPhase::Armed,
            AlertState::Sustained { .. } => AlertPhase::Sustained,
            AlertState::Alerting { .. } => AlertPhase::Alerting,
        }
    }

    pub fn onset(&self) -> Option<Instant> {
        match self.state {
            AlertState::Sustained { onset } | AlertState::Alerting { onset, .. } => Some(onset),
            AlertState::Idle | AlertState::Armed => None,
        }
    }

    pub fn arm(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_pending(scheduler);
        if self.state != AlertState::Armed {
            info!("Posture alert armed");
        }
        self.state = AlertState::Armed;
    }

    pub fn disarm(&mut self, scheduler: &mut dyn Scheduler) {
        self.cancel_pending(scheduler);
        if self.state != AlertState::Idle {
            info!("Posture alert disarmed");
        }
        self.state = AlertState::Idle;
    }

    /// Feed one frame's forward-head verdict (indeterminate counts as `false`).
    ///
    /// `make_task` is only invoked on the transition into `Alerting`.
    pub fn observe<F>(
        &mut self,
        forward_head: bool,
        now: Instant,
        scheduler: &mut dyn Scheduler,
        make_task: F,
    ) -> AlertPhase
    where
        F: FnOnce() -> RepeatingTask,
    {
        self.state = match (self.state, forward_head) {
            (AlertState::Idle, _) => AlertState::Idle,
            (AlertState::Armed, true) => {
                debug!("Forward head onset recorded");
                AlertState::Sustained { onset: now }
            }
            (AlertState::Sustained { onset }, true) => {
                if now.saturating_duration_since(onset) >= self.onset_after {
                    let handle = scheduler.schedule_repeating(self.interval, make_task());
                    info!(
                        "Forward head sustained for {:?}, alerting every {:?}",
                        now.saturating_duration_since(onset),
                        self.interval
                    );
                    AlertState::Alerting { onset, handle }
                } else {
                    AlertState::Sustained { onset }
                }
            }
            (alerting @ AlertState::Alerting { .. }, true) => alerting,
            (_, false) => {
                if self.cancel_pending(scheduler) {
                    info!("Posture corrected, alert cancelled");
                }
                AlertState::Armed
            }
        };

        self.phase()
    }

    fn cancel_pending(&mut self, scheduler: &mut dyn Scheduler) -> bool {
        if let AlertState::Alerting { onset, handle } = self.state {
            scheduler.cancel(handle);
            self.state = AlertState::Sustained { onset };
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{Clock, ManualClock, ManualScheduler};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const ONSET: Duration = Duration::from_millis(3000);
    const INTERVAL: Duration = Duration::from_millis(2000);

    struct Harness {
        debouncer: AlertDebouncer,
        scheduler: ManualScheduler,
        fired: Arc<AtomicUsize>,
        tasks_built: usize,
    }

    impl Harness {
        fn armed() -> Self {
            let mut scheduler = ManualScheduler::new(ManualClock::new());
            let mut debouncer = AlertDebouncer::new(ONSET, INTERVAL);
            debouncer.arm(&mut scheduler);
            Self {
                debouncer,
                scheduler,
                fired: Arc::new(AtomicUsize::new(0)),
                tasks_built: 0,
            }
        }

        fn observe(&mut self, forward_head: bool) -> AlertPhase {
            let fired = Arc::clone(&self.fired);
            let built = &mut self.tasks_built;
            let now = self.scheduler.clock().now();
            let mut scheduler = self.scheduler.clone();
            self.debouncer.observe(forward_head, now, &mut scheduler, || -> RepeatingTask {
                *built += 1;
                Box::new(move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            })
        }

        fn advance_ms(&self, ms: u64) {
            self.scheduler.advance(Duration::from_millis(ms));
        }

        fn fired(&self) -> usize {
            self.fired.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_idle_ignores_frames() {
        let mut scheduler = ManualScheduler::new(ManualClock::new());
        let mut debouncer = AlertDebouncer::new(ONSET, INTERVAL);
        let now = scheduler.clock().now();
        let phase = debouncer.observe(true, now, &mut scheduler, || -> RepeatingTask { Box::new(|| {}) });
        assert_eq!(phase, AlertPhase::Idle);
        assert_eq!(debouncer.onset(), None);
    }

    #[test]
    fn test_no_alert_before_onset_threshold() {
        let mut h = Harness::armed();
        assert_eq!(h.observe(true), AlertPhase::Sustained);

        for _ in 0..29 {
            h.advance_ms(100);
            assert_eq!(h.observe(true), AlertPhase::Sustained);
        }
        assert_eq!(h.tasks_built, 0);
        assert_eq!(h.scheduler.active_tasks(), 0);
    }

    #[test]
    fn test_alert_scheduled_once_at_threshold() {
        let mut h = Harness::armed();
        h.observe(true);
        h.advance_ms(3000);
        assert_eq!(h.observe(true), AlertPhase::Alerting);

        for _ in 0..10 {
            h.advance_ms(500);
            assert_eq!(h.observe(true), AlertPhase::Alerting);
        }
        assert_eq!(h.tasks_built, 1);
        assert_eq!(h.scheduler.active_tasks(), 1);
        // armed at 3000ms, fired at 5000ms and 7000ms
        assert_eq!(h.fired(), 2);
    }

    #[test]
    fn test_clearing_cancels_and_rearms() {
        let mut h = Harness::armed();
        h.observe(true);
        h.advance_ms(3000);
        h.observe(true);
        h.advance_ms(500);

        assert_eq!(h.observe(false), AlertPhase::Armed);
        assert_eq!(h.debouncer.onset(), None);
        assert_eq!(h.scheduler.active_tasks(), 0);

        h.advance_ms(10_000);
        assert_eq!(h.fired(), 0);
    }

    #[test]
    fn test_new_episode_needs_fresh_onset() {
        let mut h = Harness::armed();
        h.observe(true);
        h.advance_ms(2500);
        h.observe(false);
        h.advance_ms(100);
        h.observe(true);
        h.advance_ms(2900);
        assert_eq!(h.observe(true), AlertPhase::Sustained);
        h.advance_ms(100);
        assert_eq!(h.observe(true), AlertPhase::Alerting);
    }

    #[test]
    fn test_disarm_and_rearm_are_idempotent() {
        let mut h = Harness::armed();
        h.observe(true);
        h.advance_ms(3000);
        h.observe(true);

        let mut scheduler = h.scheduler.clone();
        h.debouncer.disarm(&mut scheduler);
        h.debouncer.disarm(&mut scheduler);
        assert_eq!(h.debouncer.phase(), AlertPhase::Idle);
        assert_eq!(h.scheduler.active_tasks(), 0);

        h.debouncer.arm(&mut scheduler);
        h.debouncer.arm(&mut scheduler);
        assert_eq!(h.debouncer.phase(), AlertPhase::Armed);
        assert_eq!(h.debouncer.onset(), None);
    }
}
