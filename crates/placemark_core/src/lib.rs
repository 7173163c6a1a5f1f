//! Placemark core: pure job-tracking policy and domain values.
mod job;
mod policy;

pub use job::{normalize_url_for_dedupe, Job};
pub use policy::PollPolicy;
