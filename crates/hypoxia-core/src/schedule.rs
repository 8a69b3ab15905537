//! Repeating-task scheduling.
//!
//! The host owns the clock. A [`Scheduler`] installs a closure to run every
//! `period` game ticks after an initial delay and hands back a
//! [`TaskHandle`] that cancels it. [`TokioScheduler`] maps game ticks onto a
//! fixed wall-clock duration and runs each task on the Tokio runtime;
//! [`ManualScheduler`] runs tasks only when asked, for deterministic tests
//! and for hosts that drive their own tick loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hypoxia_types::TaskId;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Work run on every period.
pub type Task = Box<dyn FnMut() + Send + 'static>;

/// Handle to an installed repeating task.
pub trait TaskHandle: Send + Sync {
    /// Identity assigned when the task was installed.
    fn id(&self) -> TaskId;

    /// Stop the task. Idempotent.
    fn cancel(&mut self);

    /// Whether the task will still run.
    fn is_active(&self) -> bool;
}

/// Installs repeating tasks.
pub trait Scheduler {
    /// Run `task` every `period_ticks` game ticks, first after
    /// `delay_ticks`.
    fn run_task_timer(&self, delay_ticks: u32, period_ticks: u32, task: Task) -> Box<dyn TaskHandle>;
}

// ---------------------------------------------------------------------------
// Tokio
// ---------------------------------------------------------------------------

/// Wall-clock length of one game tick on a server running at full speed.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Runs tasks on a Tokio runtime, one game tick being `tick` of wall time.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
    tick: Duration,
}

impl TokioScheduler {
    /// Scheduler spawning onto `runtime`.
    pub const fn new(runtime: Handle, tick: Duration) -> Self {
        Self { runtime, tick }
    }

    /// Scheduler on the runtime the caller is running in, if any.
    pub fn current(tick: Duration) -> Option<Self> {
        Handle::try_current().ok().map(|runtime| Self::new(runtime, tick))
    }

    /// Wall-clock length of one game tick.
    pub const fn tick(&self) -> Duration {
        self.tick
    }

    fn ticks(&self, count: u32) -> Duration {
        self.tick.saturating_mul(count)
    }
}

impl Scheduler for TokioScheduler {
    fn run_task_timer(&self, delay_ticks: u32, period_ticks: u32, mut task: Task) -> Box<dyn TaskHandle> {
        let id = TaskId::new();
        let delay = self.ticks(delay_ticks);
        let period = self.ticks(period_ticks).max(MIN_PERIOD);

        // Entered so `Instant::now` reads the runtime's clock.
        let _guard = self.runtime.enter();
        let start = Instant::now().checked_add(delay).unwrap_or_else(Instant::now);
        let join = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                task();
            }
        });
        debug!(task = %id, ?delay, ?period, "repeating task installed");

        Box::new(TokioTask {
            id,
            join,
            cancelled: false,
        })
    }
}

/// Running Tokio task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TokioTask {
    id: TaskId,
    join: JoinHandle<()>,
    cancelled: bool,
}

impl TaskHandle for TokioTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn cancel(&mut self) {
        if !self.cancelled {
            self.join.abort();
            self.cancelled = true;
            debug!(task = %self.id, "repeating task cancelled");
        }
    }

    fn is_active(&self) -> bool {
        !self.cancelled && !self.join.is_finished()
    }
}

impl Drop for TokioTask {
    fn drop(&mut self) {
        self.join.abort();
    }
}

// ---------------------------------------------------------------------------
// Manual
// ---------------------------------------------------------------------------

struct ManualEntry {
    id: TaskId,
    delay_ticks: u32,
    period_ticks: u32,
    active: Arc<AtomicBool>,
    task: Task,
}

/// Records installed tasks and runs them on demand.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<ManualEntry>>>,
}

impl ManualScheduler {
    /// Scheduler with no tasks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks installed so far, cancelled ones included.
    pub fn installed(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Tasks that have not been cancelled.
    pub fn active_count(&self) -> usize {
        self.entries.lock().map_or(0, |entries| {
            entries
                .iter()
                .filter(|entry| entry.active.load(Ordering::Acquire))
                .count()
        })
    }

    /// `(delay, period)` in ticks of every active task, in install order.
    pub fn active_timings(&self) -> Vec<(u32, u32)> {
        self.entries.lock().map_or_else(
            |_| Vec::new(),
            |entries| {
                entries
                    .iter()
                    .filter(|entry| entry.active.load(Ordering::Acquire))
                    .map(|entry| (entry.delay_ticks, entry.period_ticks))
                    .collect()
            },
        )
    }

    /// Run every active task once. Returns how many ran.
    pub fn run_active(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let mut ran = 0_usize;
        for entry in entries.iter_mut() {
            if entry.active.load(Ordering::Acquire) {
                (entry.task)();
                ran = ran.saturating_add(1);
            }
        }
        ran
    }

    /// Whether the task with `id` is still active.
    pub fn is_active(&self, id: TaskId) -> bool {
        self.entries.lock().is_ok_and(|entries| {
            entries
                .iter()
                .any(|entry| entry.id == id && entry.active.load(Ordering::Acquire))
        })
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("installed", &self.installed())
            .field("active", &self.active_count())
            .finish()
    }
}

impl Scheduler for ManualScheduler {
    fn run_task_timer(&self, delay_ticks: u32, period_ticks: u32, task: Task) -> Box<dyn TaskHandle> {
        let id = TaskId::new();
        let active = Arc::new(AtomicBool::new(true));
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(ManualEntry {
                id,
                delay_ticks,
                period_ticks,
                active: Arc::clone(&active),
                task,
            });
        }
        Box::new(ManualTask { id, active })
    }
}

/// Handle to a [`ManualScheduler`] task.
#[derive(Debug)]
pub struct ManualTask {
    id: TaskId,
    active: Arc<AtomicBool>,
}

impl TaskHandle for ManualTask {
    fn id(&self) -> TaskId {
        self.id
    }

    fn cancel(&mut self) {
        self.active.store(false, Ordering::Release);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
