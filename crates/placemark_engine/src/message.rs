use std::fmt;
use std::time::Instant;

/// Topic tag for a status message, used to pick contextually appropriate text.
///
/// Closed set; each category carries a static fallback string for when no live
/// message is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Processing,
    Extraction,
    Analysis,
    Random,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Processing,
        Category::Extraction,
        Category::Analysis,
        Category::Random,
    ];

    /// Lowercase name; doubles as the remote path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Processing => "processing",
            Category::Extraction => "extraction",
            Category::Analysis => "analysis",
            Category::Random => "random",
        }
    }

    /// Static text served when no live message could be fetched.
    pub fn fallback_text(self) -> &'static str {
        match self {
            Category::Processing => "Working on your place...",
            Category::Extraction => "Pulling out the details...",
            Category::Analysis => "Making sense of the page...",
            Category::Random => "Hang tight, almost there...",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short status string shown while the user waits.
///
/// Immutable once created; produced either by the remote capability or by the
/// fallback constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub category: Category,
    pub created_at: Instant,
}

impl Message {
    pub fn new(text: impl Into<String>, category: Category, created_at: Instant) -> Self {
        Self {
            text: text.into(),
            category,
            created_at,
        }
    }

    /// The category's static fallback, stamped with the current time.
    pub fn fallback(category: Category, now: Instant) -> Self {
        Self::new(category.fallback_text(), category, now)
    }
}
