use std::sync::mpsc;

use tokio_util::sync::CancellationToken;

use placemark_core::{Job, PollPolicy};

use crate::{Clock, JobState, PollOutcome, PollUpdate, RemoteCapability};

/// Receiver for progress updates while a job is being polled.
pub trait StatusSink: Send + Sync {
    fn emit(&self, update: PollUpdate);
}

/// Ships updates over a channel to a UI shell.
pub struct ChannelStatusSink {
    tx: mpsc::Sender<PollUpdate>,
}

impl ChannelStatusSink {
    pub fn new(tx: mpsc::Sender<PollUpdate>) -> Self {
        Self { tx }
    }
}

impl StatusSink for ChannelStatusSink {
    fn emit(&self, update: PollUpdate) {
        let _ = self.tx.send(update);
    }
}

/// Polls one job to a terminal outcome.
///
/// Each iteration is gated on [`PollPolicy::should_continue_polling`]; once
/// that gate closes while the remote state is still non-terminal the result
/// is `TimedOut`, never a silent drop. Transient fetch errors consume an
/// attempt from the budget but do not abandon the job. Both the inter-poll
/// sleep and the status fetch abort promptly on cancellation.
///
/// Loops for different jobs are independent; this function holds no shared
/// state beyond what the remote capability itself synchronizes.
pub async fn poll_job(
    remote: &dyn RemoteCapability,
    job: &Job,
    policy: &PollPolicy,
    clock: &dyn Clock,
    cancel: &CancellationToken,
    sink: &dyn StatusSink,
) -> PollOutcome {
    let mut attempts: u32 = 0;
    loop {
        if !policy.should_continue_polling(attempts, job, clock.now()) {
            log::info!(
                "job {} timed out after {} attempts ({:?} elapsed)",
                job.id,
                attempts,
                policy.elapsed(job, clock.now())
            );
            return PollOutcome::TimedOut;
        }

        tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            _ = tokio::time::sleep(policy.next_poll_delay()) => {}
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return PollOutcome::Cancelled,
            fetched = remote.fetch_job_status(&job.id) => fetched,
        };
        attempts += 1;

        match fetched {
            Ok(status) => match status.state {
                JobState::Complete => {
                    return PollOutcome::Complete {
                        payload: status.result_payload,
                    }
                }
                JobState::Failed => {
                    return PollOutcome::Failed {
                        payload: status.result_payload,
                    }
                }
                JobState::Queued | JobState::Processing => {
                    sink.emit(PollUpdate {
                        job_id: job.id.clone(),
                        state: status.state,
                        progress_percent: status.progress_percent,
                    });
                }
            },
            // Transient; stays within the same attempt budget.
            Err(err) => log::debug!("status fetch for job {} failed: {err}", job.id),
        }
    }
}
