//! Worker pool scheduler.
//!
//! One coordinator thread owns all run state. Attempts run in execution
//! contexts (see [`executor`]) and report back over a crossbeam channel; the
//! coordinator blocks only on that channel, with a deadline equal to the
//! earliest active timeout.
//!
//! Per-job state machine:
//!
//! ```text
//! Queued ──► Dispatched ──► Succeeded
//!   ▲            │
//!   └── retry ◄──┼──► Failed (retries exhausted)
//! ```
//!
//! Slot fill rule: retries first, then fresh jobs. Fresh jobs consult the
//! cache before taking a slot; retries never do.

mod executor;
mod message;


pub use executor::{Executor, ProcessExecutor, ThreadExecutor};
pub use message::{WorkerOutcome, WorkerReport, run_attempt};

use executor::Execution;
use message::{AttemptId, Event};

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;

use crate::cache::{ArtifactCache, CachedArtifact};
use crate::config::WorkersConfig;
use crate::logger::ProgressLine;
use crate::source::CompileJob;
use crate::{debug, log};

/// Progress counter name shared with the build command.
pub const PROGRESS_COUNTER: &str = "posts";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub max_concurrency: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl SchedulerOptions {
    pub fn from_config(workers: &WorkersConfig) -> Self {
        Self {
            max_concurrency: workers.concurrency(),
            timeout: workers.timeout(),
            max_retries: workers.retries,
        }
    }
}

/// A job that exhausted its attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct JobFailure {
    pub identifier: String,
    pub error: String,
    pub attempts: u32,
}

/// Counters gathered during one run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Successes produced by an attempt (not the cache).
    pub compiled: usize,
    pub cached: usize,
    pub attempts: usize,
    /// Slot count of the pool.
    pub pool_size: usize,
    /// Most slots ever occupied at once.
    pub peak_active: usize,
    /// Largest memory delta reported by any attempt.
    pub peak_memory_mb: f64,
    /// Summed processing time of compiled successes.
    pub processing_ms: u64,
}

impl RunStats {
    /// Mean processing time of compiled successes, 0 when nothing compiled.
    #[allow(clippy::cast_precision_loss)]
    pub fn avg_processing_ms(&self) -> f64 {
        if self.compiled == 0 {
            0.0
        } else {
            self.processing_ms as f64 / self.compiled as f64
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Successful artifacts in completion order.
    pub results: Vec<CachedArtifact>,
    /// Terminal failures in completion order.
    pub errors: Vec<JobFailure>,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Dispatched,
    Succeeded,
    Failed,
}

impl JobState {
    const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

struct Slot {
    job: CompileJob,
    /// `None` when the timeout reaches past what `Instant` can represent.
    deadline: Option<Instant>,
    execution: Box<dyn Execution>,
}

/// Mutable state of one run. Never shared, never persisted.
struct RunState {
    pending: VecDeque<CompileJob>,
    retry: VecDeque<CompileJob>,
    active: FxHashMap<AttemptId, Slot>,
    states: FxHashMap<String, JobState>,
    completed: usize,
    next_attempt: AttemptId,
    outcome: RunOutcome,
}

impl RunState {
    fn new(jobs: Vec<CompileJob>) -> Self {
        let states = jobs
            .iter()
            .map(|job| (job.identifier.clone(), JobState::Queued))
            .collect();
        Self {
            outcome: RunOutcome {
                stats: RunStats {
                    total: jobs.len(),
                    ..RunStats::default()
                },
                ..RunOutcome::default()
            },
            pending: jobs.into(),
            retry: VecDeque::new(),
            active: FxHashMap::default(),
            states,
            completed: 0,
            next_attempt: 0,
        }
    }

    fn is_finished(&self) -> bool {
        self.completed == self.outcome.stats.total && self.retry.is_empty() && self.active.is_empty()
    }

    fn earliest_deadline(&self) -> Option<Instant> {
        self.active.values().filter_map(|slot| slot.deadline).min()
    }

    fn set_state(&mut self, identifier: &str, state: JobState) {
        if let Some(slot) = self.states.get_mut(identifier) {
            debug_assert!(!slot.is_terminal(), "{identifier} completed twice");
            *slot = state;
        }
    }

    fn succeed(&mut self, artifact: CachedArtifact, compiled: bool) {
        self.set_state(artifact.slug(), JobState::Succeeded);
        self.completed += 1;
        let stats = &mut self.outcome.stats;
        stats.succeeded += 1;
        if compiled {
            stats.compiled += 1;
            stats.processing_ms += artifact.meta.processing_time.unwrap_or(0);
        } else {
            stats.cached += 1;
        }
        self.outcome.results.push(artifact);
    }

    fn fail(&mut self, job: &CompileJob, error: String) {
        self.set_state(&job.identifier, JobState::Failed);
        self.completed += 1;
        self.outcome.stats.failed += 1;
        self.outcome.errors.push(JobFailure {
            identifier: job.identifier.clone(),
            error,
            attempts: job.attempt_number(),
        });
    }
}

/// Drives a set of jobs to terminal outcomes.
pub struct Scheduler<'a> {
    executor: &'a dyn Executor,
    cache: &'a ArtifactCache,
    options: SchedulerOptions,
}

impl<'a> Scheduler<'a> {
    pub fn new(executor: &'a dyn Executor, cache: &'a ArtifactCache, options: SchedulerOptions) -> Self {
        Self {
            executor,
            cache,
            options: SchedulerOptions {
                max_concurrency: options.max_concurrency.max(1),
                ..options
            },
        }
    }

    /// Run every job to completion.
    ///
    /// Returns once each job has either succeeded or exhausted its retries.
    pub fn run(&self, jobs: Vec<CompileJob>, progress: Option<&ProgressLine>) -> RunOutcome {
        let (tx, rx) = channel::unbounded();
        let mut state = RunState::new(jobs);
        state.outcome.stats.pool_size = self.options.max_concurrency;

        debug!(
            "scheduler";
            "{} jobs, {} {} slots, timeout {:?}, {} retries",
            state.outcome.stats.total,
            self.options.max_concurrency,
            self.executor.name(),
            self.options.timeout,
            self.options.max_retries
        );

        loop {
            self.fill_slots(&mut state, &tx, progress);

            if state.active.is_empty() {
                // nothing in flight and nothing left to dispatch
                break;
            }

            let received = match state.earliest_deadline() {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(event) => self.handle_event(&mut state, event, progress),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.expire_overdue(&mut state, Instant::now(), progress);
        }

        debug_assert!(state.is_finished());
        state.outcome
    }

    /// Dispatch until every slot is busy or both queues are empty.
    fn fill_slots(&self, state: &mut RunState, tx: &Sender<Event>, progress: Option<&ProgressLine>) {
        while state.active.len() < self.options.max_concurrency {
            let job = if let Some(job) = state.retry.pop_front() {
                job
            } else if let Some(job) = state.pending.pop_front() {
                if let Some(artifact) = self.cache.lookup(&job) {
                    debug!("cache"; "hit {}", job.identifier);
                    state.succeed(artifact, false);
                    tick(progress);
                    continue;
                }
                job
            } else {
                break;
            };

            state.next_attempt += 1;
            let attempt = state.next_attempt;
            state.outcome.stats.attempts += 1;

            match self.executor.start(&job, attempt, tx) {
                Ok(execution) => {
                    debug!("dispatch"; "{} (attempt {})", job.identifier, job.attempt_number());
                    state.set_state(&job.identifier, JobState::Dispatched);
                    state.active.insert(
                        attempt,
                        Slot {
                            job,
                            deadline: Instant::now().checked_add(self.options.timeout),
                            execution,
                        },
                    );
                    let stats = &mut state.outcome.stats;
                    stats.peak_active = stats.peak_active.max(state.active.len());
                }
                Err(e) => {
                    let error = format!("cannot start {} worker: {e}", self.executor.name());
                    self.handle_failure(state, job, error, progress);
                }
            }
        }
    }

    fn handle_event(&self, state: &mut RunState, event: Event, progress: Option<&ProgressLine>) {
        let Some(slot) = state.active.remove(&event.attempt) else {
            debug!("scheduler"; "dropping late result of attempt {}", event.attempt);
            return;
        };
        let job = slot.job;

        let report = match event.result {
            Ok(report) => report,
            Err(error) => return self.handle_failure(state, job, error, progress),
        };

        if let Some(delta) = report.memory_delta_mb {
            let stats = &mut state.outcome.stats;
            stats.peak_memory_mb = stats.peak_memory_mb.max(delta);
        }

        match report.outcome {
            WorkerOutcome::Success { artifact } => {
                let mut artifact = *artifact;
                artifact.meta.processing_time = Some(report.processing_ms);
                artifact.meta.retry_count = Some(job.retry_count);

                if let Err(e) = self.cache.store(&artifact) {
                    log!("warning"; "cannot write artifact for {}: {}", job.identifier, e);
                    refresh(progress);
                }
                debug!("done"; "{} in {}ms", job.identifier, report.processing_ms);
                state.succeed(artifact, true);
                tick(progress);
            }
            WorkerOutcome::Failure { error } => self.handle_failure(state, job, error, progress),
        }
    }

    /// Terminate every attempt whose deadline has passed.
    fn expire_overdue(&self, state: &mut RunState, now: Instant, progress: Option<&ProgressLine>) {
        let overdue: Vec<AttemptId> = state
            .active
            .iter()
            .filter(|(_, slot)| slot.deadline.is_some_and(|deadline| deadline <= now))
            .map(|(attempt, _)| *attempt)
            .collect();

        for attempt in overdue {
            if let Some(mut slot) = state.active.remove(&attempt) {
                slot.execution.terminate();
                let error = format!("timed out after {:?}", self.options.timeout);
                self.handle_failure(state, slot.job, error, progress);
            }
        }
    }

    /// Requeue for retry, or record a terminal failure.
    fn handle_failure(
        &self,
        state: &mut RunState,
        mut job: CompileJob,
        error: String,
        progress: Option<&ProgressLine>,
    ) {
        let total_attempts = self.options.max_retries + 1;

        if job.retry_count < self.options.max_retries {
            log!(
                "retry";
                "{} (attempt {}/{}): {}",
                job.identifier, job.attempt_number(), total_attempts, error
            );
            job.retry_count += 1;
            state.set_state(&job.identifier, JobState::Queued);
            state.retry.push_back(job);
        } else {
            log!(
                "error";
                "{} failed after {}: {}",
                job.identifier,
                crate::utils::plural_count(job.attempt_number() as usize, "attempt"),
                error
            );
            state.fail(&job, error);
            tick(progress);
        }
        refresh(progress);
    }
}

#[inline]
fn tick(progress: Option<&ProgressLine>) {
    if let Some(progress) = progress {
        progress.inc(PROGRESS_COUNTER);
    }
}

#[inline]
fn refresh(progress: Option<&ProgressLine>) {
    if let Some(progress) = progress {
        progress.refresh();
    }
}
