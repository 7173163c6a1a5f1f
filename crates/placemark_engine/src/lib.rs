//! Placemark engine: status message cache and job polling.
mod cache;
mod clock;
mod message;
mod poll;
mod remote;
mod types;

pub use cache::{CacheSettings, MessageRotationCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use message::{Category, Message};
pub use poll::{poll_job, ChannelStatusSink, StatusSink};
pub use remote::{RemoteCapability, RemoteSettings, ReqwestRemote};
pub use types::{JobState, JobStatus, PollOutcome, PollUpdate, RemoteError, RemoteFailureKind};
