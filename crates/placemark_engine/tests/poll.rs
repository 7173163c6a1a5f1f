use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use placemark_core::{Job, PollPolicy};
use placemark_engine::{
    poll_job, Category, JobState, JobStatus, Message, PollOutcome, PollUpdate, RemoteCapability,
    RemoteError, RemoteFailureKind, StatusSink, SystemClock,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(placemark_logging::initialize_for_tests);
}

/// Replays a fixed script of status responses, then repeats the last one.
struct ScriptedRemote {
    script: Mutex<VecDeque<Result<JobStatus, RemoteError>>>,
    last: Result<JobStatus, RemoteError>,
    calls: AtomicUsize,
}

impl ScriptedRemote {
    fn new(script: Vec<Result<JobStatus, RemoteError>>) -> Self {
        let last = script
            .last()
            .cloned()
            .expect("script must not be empty");
        Self {
            script: Mutex::new(script.into()),
            last,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RemoteCapability for ScriptedRemote {
    async fn fetch_message(&self, category: Category) -> Result<Message, RemoteError> {
        Ok(Message::fallback(category, Instant::now()))
    }

    async fn fetch_job_status(&self, _job_id: &str) -> Result<JobStatus, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(step) => step,
            None => self.last.clone(),
        }
    }
}

#[derive(Default)]
struct VecSink {
    updates: Mutex<Vec<PollUpdate>>,
}

impl VecSink {
    fn take(&self) -> Vec<PollUpdate> {
        self.updates.lock().unwrap().drain(..).collect()
    }
}

impl StatusSink for VecSink {
    fn emit(&self, update: PollUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

fn status(state: JobState, progress_percent: u8) -> JobStatus {
    JobStatus {
        state,
        progress_percent,
        result_payload: None,
    }
}

fn fast_policy(max_attempts: u32) -> PollPolicy {
    PollPolicy {
        max_attempts,
        poll_interval: Duration::from_millis(1),
        ..PollPolicy::default()
    }
}

fn fresh_job() -> Job {
    Job::new(
        "job-7",
        "https://maps.example.com/p/7",
        Instant::now(),
        Duration::from_secs(600),
    )
}

#[tokio::test]
async fn completes_and_reports_progress_along_the_way() {
    init_logging();
    let remote = ScriptedRemote::new(vec![
        Ok(status(JobState::Queued, 0)),
        Ok(status(JobState::Processing, 40)),
        Ok(JobStatus {
            state: JobState::Complete,
            progress_percent: 100,
            result_payload: Some(json!({"name": "Cafe Florette"})),
        }),
    ]);
    let sink = VecSink::default();
    let job = fresh_job();

    let outcome = poll_job(
        &remote,
        &job,
        &fast_policy(50),
        &SystemClock,
        &CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(
        outcome,
        PollOutcome::Complete {
            payload: Some(json!({"name": "Cafe Florette"})),
        }
    );
    let updates = sink.take();
    assert_eq!(
        updates,
        vec![
            PollUpdate {
                job_id: "job-7".to_string(),
                state: JobState::Queued,
                progress_percent: 0,
            },
            PollUpdate {
                job_id: "job-7".to_string(),
                state: JobState::Processing,
                progress_percent: 40,
            },
        ]
    );
}

#[tokio::test]
async fn remote_failure_is_terminal_and_distinct_from_timeout() {
    init_logging();
    let remote = ScriptedRemote::new(vec![
        Ok(status(JobState::Processing, 10)),
        Ok(JobStatus {
            state: JobState::Failed,
            progress_percent: 10,
            result_payload: Some(json!({"reason": "page unreadable"})),
        }),
    ]);
    let sink = VecSink::default();
    let job = fresh_job();

    let outcome = poll_job(
        &remote,
        &job,
        &fast_policy(50),
        &SystemClock,
        &CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(
        outcome,
        PollOutcome::Failed {
            payload: Some(json!({"reason": "page unreadable"})),
        }
    );
}

#[tokio::test]
async fn attempt_budget_exhaustion_times_out() {
    init_logging();
    let remote = ScriptedRemote::new(vec![Ok(status(JobState::Processing, 50))]);
    let sink = VecSink::default();
    let job = fresh_job();

    let outcome = poll_job(
        &remote,
        &job,
        &fast_policy(3),
        &SystemClock,
        &CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(remote.call_count(), 3);
}

#[tokio::test]
async fn transient_fetch_errors_consume_attempts_but_do_not_abort() {
    init_logging();
    let remote = ScriptedRemote::new(vec![
        Err(RemoteError::new(RemoteFailureKind::Network, "blip")),
        Err(RemoteError::new(RemoteFailureKind::Timeout, "slow")),
        Ok(status(JobState::Complete, 100)),
    ]);
    let sink = VecSink::default();
    let job = fresh_job();

    let outcome = poll_job(
        &remote,
        &job,
        &fast_policy(10),
        &SystemClock,
        &CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(outcome, PollOutcome::Complete { payload: None });
    assert_eq!(remote.call_count(), 3);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn expired_job_times_out_without_a_single_fetch() {
    init_logging();
    let remote = ScriptedRemote::new(vec![Ok(status(JobState::Queued, 0))]);
    let sink = VecSink::default();
    // Zero estimate and zero grace: the job is expired as soon as any time
    // at all has passed since it started.
    let policy = PollPolicy {
        grace_period: Duration::ZERO,
        ..fast_policy(50)
    };
    let job = Job::new(
        "job-9",
        "https://maps.example.com/p/9",
        Instant::now(),
        Duration::ZERO,
    );
    tokio::time::sleep(Duration::from_millis(5)).await;

    let outcome = poll_job(
        &remote,
        &job,
        &policy,
        &SystemClock,
        &CancellationToken::new(),
        &sink,
    )
    .await;

    assert_eq!(outcome, PollOutcome::TimedOut);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn cancellation_interrupts_the_sleep_promptly() {
    init_logging();
    let remote = Arc::new(ScriptedRemote::new(vec![Ok(status(JobState::Queued, 0))]));
    let job = fresh_job();
    let policy = PollPolicy {
        poll_interval: Duration::from_secs(30),
        ..PollPolicy::default()
    };
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let outcome = poll_job(
        remote.as_ref(),
        &job,
        &policy,
        &SystemClock,
        &cancel,
        &VecSink::default(),
    )
    .await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn already_cancelled_token_short_circuits() {
    init_logging();
    let remote = ScriptedRemote::new(vec![Ok(status(JobState::Queued, 0))]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = poll_job(
        &remote,
        &fresh_job(),
        &fast_policy(50),
        &SystemClock,
        &cancel,
        &VecSink::default(),
    )
    .await;

    assert_eq!(outcome, PollOutcome::Cancelled);
    assert_eq!(remote.call_count(), 0);
}
