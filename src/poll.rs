//! Waiting on long-running remote jobs.
//!
//! The generation service offers no callback mechanism, so video jobs are
//! observed by re-fetching their status on a fixed interval. [`JobPoller`]
//! owns that loop and bounds it with a [`PollPolicy`]; the passage of time
//! comes from a [`Clock`] so tests can drive it without real sleeps.

use crate::error::{GenReelError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A submitted job that has not been consumed yet.
///
/// Implementations hold the latest status snapshot. `refresh` replaces it
/// with a fresh one from the remote system.
#[async_trait]
pub trait PendingJob: Send {
    /// Value produced when the job completes successfully.
    type Output: Send;

    /// Remote identifier, used in logs and timeout errors.
    fn id(&self) -> &str;

    /// Whether the last snapshot is terminal (complete or failed).
    fn is_done(&self) -> bool;

    /// Re-fetches the job status.
    async fn refresh(&mut self) -> Result<()>;

    /// Consumes a terminal job, yielding its result or its failure.
    fn into_outcome(self) -> Result<Self::Output>;
}

/// Source of time for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspends the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounds for a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between status checks.
    pub interval: Duration,
    /// Give up once waiting longer than this.
    pub timeout: Duration,
    /// Optional cap on the number of refreshes.
    pub max_polls: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600), // 10 minutes for video
            max_polls: None,
        }
    }
}

impl PollPolicy {
    /// Sets the pause between status checks.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the overall wait budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Caps the number of refreshes.
    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = Some(max_polls);
        self
    }
}

/// Drives a [`PendingJob`] to a terminal state.
#[derive(Clone)]
pub struct JobPoller {
    policy: PollPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JobPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobPoller")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl JobPoller {
    /// Creates a poller that sleeps on the tokio timer.
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            clock: Arc::new(TokioClock),
        }
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the active policy.
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Waits until `job` is terminal and returns its outcome.
    ///
    /// Every iteration checks `is_done` first; only a pending job is slept on
    /// and refreshed, exactly once per iteration.
    pub async fn wait<J: PendingJob>(&self, mut job: J) -> Result<J::Output> {
        let start = self.clock.now();
        let mut polls: u32 = 0;

        loop {
            if job.is_done() {
                tracing::debug!(
                    job = %job.id(),
                    polls,
                    elapsed_secs = self.clock.now().duration_since(start).as_secs(),
                    "job reached terminal state"
                );
                return job.into_outcome();
            }

            let elapsed = self.clock.now().duration_since(start);
            let poll_cap_reached = self.policy.max_polls.is_some_and(|max| polls >= max);
            if poll_cap_reached || elapsed + self.policy.interval > self.policy.timeout {
                return Err(GenReelError::Timeout {
                    operation: job.id().to_string(),
                    elapsed,
                    polls,
                });
            }

            self.clock.sleep(self.policy.interval).await;
            job.refresh().await?;
            polls += 1;

            tracing::debug!(
                job = %job.id(),
                polls,
                elapsed_secs = self.clock.now().duration_since(start).as_secs(),
                "polled job status"
            );
        }
    }
}
