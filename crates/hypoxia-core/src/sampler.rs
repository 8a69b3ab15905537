//! Independent chance sampler.
//!
//! The main hazard tick only refreshes the chance cache when it visits a
//! player. The sampler runs on its own period and walks every connected
//! player, caching the chance for those in the hazard zone and evicting the
//! rest. It never draws randomness and never applies effects.
//!
//! A pass may still be running on another thread when the sampler is
//! cancelled. It checks its [`CancelFlag`] before every player and writes
//! only into the cache generation it was started under, so nothing it
//! computes lands after a reload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hypoxia_types::TaskId;
use tracing::{debug, trace};

use crate::cache::ChanceCache;
use crate::hazard::HazardSettings;
use crate::host::{Host, Players, Terrain};
use crate::schedule::{Scheduler, Task, TaskHandle};

/// Outcome of one sampling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleReport {
    /// Players whose chance was cached.
    pub cached: u32,
    /// Players whose entry was evicted.
    pub evicted: u32,
    /// The pass stopped early because it was cancelled or superseded.
    pub abandoned: bool,
}

/// Stop signal shared by a [`ChanceSampler`] and the passes it runs.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Flag that has not been raised.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether the flag has been raised.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Refresh the cache for every connected player.
///
/// Players outside the configured worlds or outside the hazard zone lose
/// their entry; everyone else gets the chance that would apply right now.
/// The pass stops as soon as `cancel` is raised or the cache moves past
/// `generation`.
pub fn sample_once<H>(
    host: &H,
    settings: &HazardSettings,
    cache: &ChanceCache,
    generation: u64,
    cancel: &CancelFlag,
) -> SampleReport
where
    H: Players + Terrain + ?Sized,
{
    let mut report = SampleReport::default();
    for player in host.online_players() {
        if cancel.is_cancelled() {
            report.abandoned = true;
            break;
        }
        let in_zone = settings.worlds.contains(&player.location.world)
            && settings.gate.in_hazard_zone(host, &player.location);
        let current = if in_zone {
            let landed = cache.put_in(generation, player.id, settings.model.chance_for(&player));
            report.cached = report.cached.saturating_add(u32::from(landed));
            landed
        } else {
            let current = cache.evict_in(generation, player.id);
            report.evicted = report.evicted.saturating_add(u32::from(current));
            current
        };
        if !current {
            report.abandoned = true;
            break;
        }
    }
    if report.abandoned {
        debug!(cached = report.cached, evicted = report.evicted, "chance sample pass abandoned");
    } else {
        trace!(cached = report.cached, evicted = report.evicted, "chance sample pass");
    }
    report
}

/// Build the repeating task that runs [`sample_once`] against shared state.
pub fn sampling_task<H>(
    host: Arc<H>,
    settings: Arc<HazardSettings>,
    cache: Arc<ChanceCache>,
    generation: u64,
    cancel: CancelFlag,
) -> Task
where
    H: Host + ?Sized + 'static,
{
    Box::new(move || {
        sample_once(&*host, &settings, &cache, generation, &cancel);
    })
}

/// Owns at most one installed sampling task.
///
/// Starting always cancels the previous task first, so two samplers never
/// run at once. Dropping the sampler cancels its task.
#[derive(Default)]
pub struct ChanceSampler {
    task: Option<Box<dyn TaskHandle>>,
    flag: CancelFlag,
}

impl ChanceSampler {
    /// Sampler with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the running task, if any. Returns whether one was installed.
    ///
    /// A pass already in progress stops before its next player.
    pub fn cancel(&mut self) -> bool {
        self.flag.cancel();
        self.task.take().is_some_and(|mut handle| {
            handle.cancel();
            true
        })
    }

    /// Install the task built by `build` every `period_ticks`, first after
    /// one period. `build` receives the flag the new task must honour.
    pub fn start<F>(&mut self, scheduler: &dyn Scheduler, period_ticks: u32, build: F) -> TaskId
    where
        F: FnOnce(CancelFlag) -> Task,
    {
        self.cancel();
        self.flag = CancelFlag::new();
        let handle = scheduler.run_task_timer(period_ticks, period_ticks, build(self.flag.clone()));
        let id = handle.id();
        self.task = Some(handle);
        id
    }

    /// Whether a task is installed and still active.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|handle| handle.is_active())
    }

    /// ID of the installed task.
    pub fn task_id(&self) -> Option<TaskId> {
        self.task.as_ref().map(|handle| handle.id())
    }
}

impl Drop for ChanceSampler {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ChanceSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChanceSampler")
            .field("task", &self.task_id())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
