use std::time::{Duration, Instant};

use url::Url;

/// One outstanding remote extraction request.
///
/// A `Job` is an immutable value: re-requesting extraction for the same id
/// replaces the whole value rather than mutating fields in place. The core
/// never stores jobs; whoever created one owns it and discards it once its
/// status resolves or it is judged expired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: String,
    pub source_url: String,
    pub started_at: Instant,
    pub estimated_duration: Duration,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        source_url: impl Into<String>,
        started_at: Instant,
        estimated_duration: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            started_at,
            estimated_duration,
        }
    }
}

/// Normalize a shared URL for duplicate detection before enqueuing a job.
///
/// Drops the fragment, relies on the parser to lowercase scheme and host, and
/// strips a lone trailing slash so `https://a.example/place/` and
/// `https://a.example/place#map` dedupe to the same key. Returns `None` for
/// input that does not parse as an absolute URL.
pub fn normalize_url_for_dedupe(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_fragment(None);
    let mut normalized = url.to_string();
    if normalized.ends_with('/') && url.path() == "/" {
        normalized.pop();
    }
    Some(normalized)
}
