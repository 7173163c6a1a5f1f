use std::time::{Duration, Instant};

use crate::Job;

/// Temporal contract every job-polling loop must honor.
///
/// Pure and lock-free: callers pass `now` explicitly so tests can control time
/// without sleeping. The policy holds no job state; it only answers questions
/// about a job value at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Hard cap on status requests for one job.
    pub max_attempts: u32,
    /// Delay between consecutive status requests.
    pub poll_interval: Duration,
    /// Extra time allowed past a job's estimated duration before it is
    /// declared expired.
    pub grace_period: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            poll_interval: Duration::from_secs(2),
            grace_period: Duration::from_secs(30),
        }
    }
}

impl PollPolicy {
    /// Wall-clock time spent on the job so far, saturating at zero.
    pub fn elapsed(&self, job: &Job, now: Instant) -> Duration {
        now.saturating_duration_since(job.started_at)
    }

    /// True strictly after `started_at + estimated_duration + grace_period`.
    pub fn is_expired(&self, job: &Job, now: Instant) -> bool {
        now > job.started_at + job.estimated_duration + self.grace_period
    }

    /// Delay to sleep before the next status request.
    ///
    /// Constant in the base policy; a method rather than a field access so an
    /// adaptive backoff policy can replace it without changing callers.
    pub fn next_poll_delay(&self) -> Duration {
        self.poll_interval
    }

    /// The sole gate a polling loop consults before issuing another status
    /// request. Once false, the loop must stop and report a timeout rather
    /// than a success or a silent drop.
    pub fn should_continue_polling(&self, attempt_count: u32, job: &Job, now: Instant) -> bool {
        attempt_count < self.max_attempts && !self.is_expired(job, now)
    }
}
