// src/scheduler.rs - Injectable clock and cancellable repeating-task scheduler
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

pub trait Scheduler: Send {
    /// Run `task` every `period`, first after one full period.
    fn schedule_repeating(&mut self, period: Duration, task: RepeatingTask) -> TaskHandle;

    /// Once this returns, `handle`'s task never runs again, including a
    /// firing that was already due.
    fn cancel(&mut self, handle: TaskHandle);
}

struct SpawnedTask {
    join: JoinHandle<()>,
    live: Arc<Mutex<bool>>,
}

/// Scheduler backed by tokio timers.
///
/// Each firing runs while holding the task's `live` lock, and `cancel`
/// clears the flag under the same lock, so no firing can start after
/// `cancel` returns.
pub struct TokioScheduler {
    runtime: Handle,
    next_id: u64,
    tasks: HashMap<TaskHandle, SpawnedTask>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&mut self, period: Duration, mut task: RepeatingTask) -> TaskHandle {
        let handle = TaskHandle(self.next_id);
        self.next_id += 1;

        let live = Arc::new(Mutex::new(true));
        let guard = Arc::clone(&live);
        let join = self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                {
                    let live = guard.lock().unwrap_or_else(PoisonError::into_inner);
                    if !*live {
                        break;
                    }
                    task();
                }
            }
        });

        debug!("Scheduled repeating task {:?} every {:?}", handle, period);
        self.tasks.insert(handle, SpawnedTask { join, live });
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        if let Some(spawned) = self.tasks.remove(&handle) {
            *spawned.live.lock().unwrap_or_else(PoisonError::into_inner) = false;
            spawned.join.abort();
            debug!("Cancelled repeating task {:?}", handle);
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let handles: Vec<TaskHandle> = self.tasks.keys().copied().collect();
        for handle in handles {
            self.cancel(handle);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) += by;
    }

    fn set(&self, at: Instant) {
        *self.elapsed.lock().unwrap_or_else(PoisonError::into_inner) = at.saturating_duration_since(self.base);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

struct ManualTask {
    period: Duration,
    next_due: Instant,
    task: RepeatingTask,
}

#[derive(Default)]
struct ManualState {
    next_id: u64,
    tasks: BTreeMap<TaskHandle, ManualTask>,
    firings: u64,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
///
/// Clones share state, so a test can keep one clone while the engine owns
/// another. Tasks must not call back into the scheduler.
#[derive(Clone)]
pub struct ManualScheduler {
    clock: ManualClock,
    state: Arc<Mutex<ManualState>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            state: Arc::new(Mutex::new(ManualState::default())),
        }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            let due = state
                .tasks
                .iter()
                .filter(|(_, t)| t.next_due <= target)
                .min_by_key(|(_, t)| t.next_due)
                .map(|(handle, t)| (*handle, t.next_due));

            let Some((handle, at)) = due else {
                break;
            };

            self.clock.set(at);
            if let Some(entry) = state.tasks.get_mut(&handle) {
                (entry.task)();
                entry.next_due += entry.period;
            }
            state.firings += 1;
        }

        self.clock.set(target);
    }

    pub fn active_tasks(&self) -> usize {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tasks.len()
    }

    pub fn firings(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).firings
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_repeating(&mut self, period: Duration, task: RepeatingTask) -> TaskHandle {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = TaskHandle(state.next_id);
        state.next_id += 1;
        state.tasks.insert(
            handle,
            ManualTask {
                period,
                next_due: self.clock.now() + period,
                task,
            },
        );
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).tasks.remove(&handle);
    }
}
