//! Recurring job scheduler
//!
//! Every registered job owns one timer task. The task sleeps until the next
//! deadline of its [`Schedule`], then spawns the job body as an independent
//! task and goes back to sleep, so a slow tick never delays the next one
//! and jobs never wait on each other.
//!
//! ## Cancellation
//!
//! - [`JobHandle::cancel`] removes one job from the registry. Ticks already
//!   running are left to finish in the background.
//! - [`Scheduler::stop`] removes every job, then waits until all running
//!   ticks have finished, including those of jobs cancelled earlier.
//!
//! Neither interrupts a tick that is already executing.
//!
//! Dropping the scheduler cancels all jobs without waiting.

pub mod schedule;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventSink};

pub use schedule::Schedule;
use schedule::Ticker;

/// Future produced by one tick of a job
pub type JobFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Job body; called once per tick with the job's id
pub type JobFn = Arc<dyn Fn(JobId) -> JobFuture + Send + Sync>;

/// Scheduler-assigned job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The record a job keeps in sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    /// Zone name
    pub zone: String,
    /// Fully-qualified record name
    pub name: String,
    /// Proxy flag written on every tick
    pub proxied: bool,
}

/// A registered recurring job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub target: JobTarget,
    pub expression: String,
}

struct JobEntry {
    job: JobInfo,
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    stopped: bool,
    jobs: HashMap<JobId, JobEntry>,
    /// Timer tasks of removed jobs, possibly still draining ticks
    retired: Vec<JoinHandle<()>>,
}

impl RegistryState {
    fn retire(&mut self, id: JobId) -> Option<JobInfo> {
        let entry = self.jobs.remove(&id)?;
        // The timer task may already be gone if its schedule ran out
        let _ = entry.cancel.send(());

        self.retired.retain(|task| !task.is_finished());
        self.retired.push(entry.task);
        Some(entry.job)
    }
}

struct Registry {
    state: Mutex<RegistryState>,
    next_id: AtomicU64,
    sink: Arc<dyn EventSink>,
}

impl Registry {
    fn state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel(&self, id: JobId) -> Option<JobInfo> {
        let job = self.state().retire(id)?;

        self.sink.emit(ClientEvent::JobCancelled {
            job: id,
            name: job.target.name.clone(),
        });
        Some(job)
    }
}

/// Cancellation token for one scheduled job
///
/// Dropping the handle does not cancel the job; it keeps running until
/// [`JobHandle::cancel`] or [`Scheduler::stop`].
#[must_use = "dropping the handle leaves the job running until the scheduler is stopped"]
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    registry: Weak<Registry>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Whether the job is still registered
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.state().jobs.contains_key(&self.id))
    }

    /// Cancel this job only
    ///
    /// Returns `false` if the job was already cancelled or the scheduler
    /// has been stopped or dropped.
    pub fn cancel(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.cancel(self.id).is_some(),
            None => false,
        }
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registry of recurring jobs
pub struct Scheduler {
    registry: Arc<Registry>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            registry: Arc::new(Registry {
                state: Mutex::new(RegistryState::default()),
                next_id: AtomicU64::new(1),
                sink,
            }),
        }
    }

    /// Register a job
    ///
    /// The first tick happens at the schedule's next deadline, not
    /// immediately. Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// - `Ok(JobHandle)`: Handle cancelling this job only
    /// - `Err(Error::SchedulerStopped)`: [`Scheduler::stop`] was already called
    pub fn add(&self, schedule: Schedule, target: JobTarget, job: JobFn) -> Result<JobHandle> {
        let mut state = self.registry.state();
        if state.stopped {
            return Err(Error::SchedulerStopped);
        }

        let id = JobId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let expression = schedule.expression().to_string();
        let task = tokio::spawn(run_job(
            id,
            Ticker::new(schedule),
            job,
            cancel_rx,
            Arc::downgrade(&self.registry),
        ));

        let scheduled = JobInfo {
            id,
            target,
            expression,
        };
        let event = ClientEvent::JobScheduled {
            job: id,
            name: scheduled.target.name.clone(),
            expression: scheduled.expression.clone(),
        };

        state.jobs.insert(
            id,
            JobEntry {
                job: scheduled,
                cancel: cancel_tx,
                task,
            },
        );
        drop(state);

        self.registry.sink.emit(event);

        Ok(JobHandle {
            id,
            registry: Arc::downgrade(&self.registry),
        })
    }

    /// Cancel one job by id
    pub fn cancel(&self, id: JobId) -> Option<JobInfo> {
        self.registry.cancel(id)
    }

    /// Currently registered jobs, ordered by id
    pub fn jobs(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .registry
            .state()
            .jobs
            .values()
            .map(|entry| entry.job.clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    pub fn is_stopped(&self) -> bool {
        self.registry.state().stopped
    }

    /// Cancel every job and wait for running ticks to finish
    ///
    /// Further calls to [`Scheduler::add`] fail with
    /// [`Error::SchedulerStopped`]. Calling `stop` again is a no-op.
    ///
    /// # Returns
    ///
    /// The number of jobs that were cancelled
    pub async fn stop(&self) -> usize {
        let (entries, retired): (Vec<JobEntry>, Vec<JoinHandle<()>>) = {
            let mut state = self.registry.state();
            state.stopped = true;
            (
                state.jobs.drain().map(|(_, entry)| entry).collect(),
                std::mem::take(&mut state.retired),
            )
        };

        let cancelled = entries.len();
        let mut tasks = retired;
        for entry in entries {
            let _ = entry.cancel.send(());
            tasks.push(entry.task);
        }

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Scheduler task ended abnormally: {}", e);
            }
        }

        self.registry
            .sink
            .emit(ClientEvent::SchedulerStopped { cancelled_jobs: cancelled });
        cancelled
    }
}

/// Timer loop of one job
///
/// A job whose schedule yields no further deadline removes itself from the
/// registry.
async fn run_job(
    id: JobId,
    mut ticker: Ticker,
    job: JobFn,
    mut cancel: oneshot::Receiver<()>,
    registry: Weak<Registry>,
) {
    let mut in_flight = JoinSet::new();
    let mut exhausted = true;

    if let Some(mut deadline) = ticker.next_deadline() {
        loop {
            tokio::select! {
                biased;

                // Fires on an explicit cancel and when the registry is dropped
                _ = &mut cancel => {
                    exhausted = false;
                    break;
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Job {} tick panicked: {}", id, e);
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    in_flight.spawn((job)(id));
                    match ticker.next_deadline() {
                        Some(next) => deadline = next,
                        None => break,
                    }
                }
            }
        }
    }

    if exhausted {
        tracing::warn!("Job {} has no further fire time", id);
        if let Some(registry) = registry.upgrade() {
            registry.cancel(id);
        }
    }

    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            tracing::error!("Job {} tick panicked: {}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopSink;
    use std::sync::OnceLock;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_job(counter: &Arc<AtomicUsize>) -> JobFn {
        let counter = Arc::clone(counter);
        Arc::new(move |_id| {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn target() -> JobTarget {
        JobTarget {
            zone: "example.com".to_string(),
            name: "www.example.com".to_string(),
            proxied: false,
        }
    }

    fn every_minute() -> Schedule {
        Schedule::parse("@every 1m").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn job_fires_once_per_interval() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        assert!(handle.is_active());

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_job_stops_firing() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        let id = handle.id();
        assert!(handle.clone().cancel());
        assert!(!handle.is_active());
        assert!(!handle.cancel(), "second cancel is a no-op");
        assert!(scheduler.cancel(id).is_none());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(scheduler.jobs().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_are_listed_in_id_order() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let counter = Arc::new(AtomicUsize::new(0));

        let first = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        let second = scheduler
            .add(Schedule::parse("@hourly").unwrap(), target(), counting_job(&counter))
            .unwrap();

        let jobs = scheduler.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, first.id());
        assert_eq!(jobs[1].id, second.id());
        assert_eq!(jobs[1].expression, "@hourly");
        assert!(first.id() < second.id());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_rejects_new_jobs() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        assert_eq!(scheduler.stop().await, 1);
        assert!(scheduler.is_stopped());
        assert!(!handle.is_active());
        assert_eq!(scheduler.stop().await, 0);

        let err = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap_err();
        assert!(matches!(err, Error::SchedulerStopped));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_running_tick() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let finished = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&finished);
        let slow: JobFn = Arc::new(move |_id| {
            let done = Arc::clone(&done);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
        });

        let _handle = scheduler.add(every_minute(), target(), slow).unwrap();

        // First tick starts at 60s and is still sleeping at 70s
        tokio::time::sleep(Duration::from_secs(70)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        scheduler.stop().await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_ticks_of_cancelled_jobs() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let finished = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&finished);
        let slow: JobFn = Arc::new(move |_id| {
            let done = Arc::clone(&done);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(30)).await;
                done.fetch_add(1, Ordering::SeqCst);
            })
        });

        let handle = scheduler.add(every_minute(), target(), slow).unwrap();

        tokio::time::sleep(Duration::from_secs(70)).await;
        assert!(handle.cancel());
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        assert_eq!(scheduler.stop().await, 0);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    /// Records how many jobs the registry holds whenever an event arrives
    struct InspectingSink {
        registry: OnceLock<Weak<Registry>>,
        seen: Mutex<Vec<usize>>,
    }

    impl EventSink for InspectingSink {
        fn emit(&self, _event: ClientEvent) {
            if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
                let jobs = registry.state().jobs.len();
                self.seen.lock().unwrap().push(jobs);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sink_may_inspect_the_scheduler() {
        let sink = Arc::new(InspectingSink {
            registry: OnceLock::new(),
            seen: Mutex::new(Vec::new()),
        });
        let scheduler = Scheduler::new(Arc::clone(&sink) as Arc<dyn EventSink>);
        sink.registry
            .set(Arc::downgrade(&scheduler.registry))
            .unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        assert!(handle.cancel());
        scheduler.stop().await;

        // Scheduled, cancelled, stopped
        assert_eq!(*sink.seen.lock().unwrap(), vec![1, 0, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_scheduler_ends_jobs() {
        let scheduler = Scheduler::new(Arc::new(NoopSink));
        let counter = Arc::new(AtomicUsize::new(0));

        let handle = scheduler
            .add(every_minute(), target(), counting_job(&counter))
            .unwrap();
        drop(scheduler);
        assert!(!handle.is_active());
        assert!(!handle.cancel());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
