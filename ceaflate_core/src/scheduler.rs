use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::codec::CodecError;
use crate::job::ChunkJob;

/// Longest the dispatch loop sleeps before re-polling job states.
const SCHEDULER_WAIT_MS: u64 = 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Pending = 0,
    Running = 1,
    Done = 2,
}

/// Runs chunk jobs on scoped worker threads, never more than `max_parallel`
/// at once.
///
/// Jobs are dispatched in ascending index order as capacity frees up; they
/// may finish in any order. The caller reads results by index afterwards, so
/// output never depends on timing.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    max_parallel: usize,
}

impl Scheduler {
    /// A scheduler capped at `max_parallel` concurrent jobs (at least 1).
    pub fn new(max_parallel: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
        }
    }

    /// Cap concurrency at the host's available parallelism.
    pub fn from_hardware() -> Self {
        Self::new(hardware_parallelism())
    }

    /// Use `max_parallel` when given, otherwise the host's parallelism.
    pub fn with_limit(max_parallel: Option<NonZeroUsize>) -> Self {
        match max_parallel {
            Some(n) => Self::new(n.get()),
            None => Self::from_hardware(),
        }
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Run `work` once for every job and record its outcome on the job.
    ///
    /// Returns only after every job has finished. With a limit of one the
    /// jobs run in index order on the calling thread, producing exactly what
    /// the threaded path would.
    pub fn run<'a, F>(&self, jobs: &mut [ChunkJob<'a>], work: F)
    where
        F: Fn(&mut ChunkJob<'a>) -> Result<(), CodecError> + Sync,
    {
        if jobs.is_empty() {
            return;
        }

        if self.max_parallel == 1 {
            log::debug!("running {} jobs sequentially", jobs.len());
            for job in jobs.iter_mut() {
                let result = work(job);
                job.record(result);
            }
            return;
        }

        log::debug!(
            "dispatching {} jobs across up to {} workers",
            jobs.len(),
            self.max_parallel
        );

        let states: Vec<AtomicU8> = jobs
            .iter()
            .map(|_| AtomicU8::new(JobState::Pending as u8))
            .collect();
        let wake = (Mutex::new(()), Condvar::new());
        let work = &work;
        let wake = &wake;

        // Handing out `&mut` jobs from one iterator keeps every buffer owned
        // by exactly one worker.
        let mut pending = jobs.iter_mut().zip(states.iter()).peekable();

        thread::scope(|scope| loop {
            let running = count_in_state(&states, JobState::Running);
            debug_assert!(running <= self.max_parallel);

            let has_pending = pending.peek().is_some();
            if !has_pending && running == 0 {
                break;
            }

            if has_pending && running < self.max_parallel {
                let Some((job, state)) = pending.next() else {
                    continue;
                };
                log::debug!("starting block #{}", job.index());
                state.store(JobState::Running as u8, Ordering::Release);
                scope.spawn(move || {
                    let result = work(job);
                    job.record(result);
                    state.store(JobState::Done as u8, Ordering::Release);
                    wake.1.notify_all();
                });
            } else {
                wait_for_scheduler(wake);
            }
        });

        debug_assert_eq!(count_in_state(&states, JobState::Done), states.len());
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::from_hardware()
    }
}

/// Number of jobs the host can run concurrently, never less than one.
pub fn hardware_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(1)
}

fn count_in_state(states: &[AtomicU8], state: JobState) -> usize {
    states
        .iter()
        .filter(|s| s.load(Ordering::Acquire) == state as u8)
        .count()
}

fn wait_for_scheduler(wake: &(Mutex<()>, Condvar)) {
    if let Ok(guard) = wake.0.lock() {
        let _ = wake
            .1
            .wait_timeout(guard, Duration::from_millis(SCHEDULER_WAIT_MS));
    }
}
