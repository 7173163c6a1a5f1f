use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::{Category, Clock, Message, RemoteCapability};

/// Tuning knobs for the message cache. Defaults match production; tests
/// override via struct-update syntax.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Age past which a buffer must be re-fetched before being served again.
    pub validity: Duration,
    /// Minimum time between rotation steps, shared across all categories.
    pub rotation_interval: Duration,
    /// Messages fetched per refresh.
    pub buffer_capacity: usize,
    /// Pause between consecutive fetches within one refresh, so a remote
    /// returning pseudo-random content has a chance to vary its answer.
    pub fetch_spacing: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            validity: Duration::from_secs(300),
            rotation_interval: Duration::from_secs(12),
            buffer_capacity: 8,
            fetch_spacing: Duration::from_millis(100),
        }
    }
}

struct CategoryBuffer {
    messages: Vec<Message>,
    fetched_at: Instant,
    rotation_index: usize,
}

struct CacheState {
    buffers: HashMap<Category, CategoryBuffer>,
    /// Categories with a refresh currently in flight.
    refreshing: HashSet<Category>,
    /// Single rotation clock shared by every category.
    last_rotation_at: Option<Instant>,
}

/// Per-category cache of pre-fetched status messages.
///
/// Serves a message instantly from a warm buffer, cycling through the cached
/// texts on a global rotation cadence, and refreshes stale buffers without
/// ever surfacing an error: when nothing can be fetched the category's static
/// fallback is returned instead.
///
/// All mutable state sits behind one mutex; the lock is never held across an
/// await, so a slow remote cannot block readers of other categories.
pub struct MessageRotationCache {
    remote: Arc<dyn RemoteCapability>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    state: Mutex<CacheState>,
}

impl MessageRotationCache {
    pub fn new(
        remote: Arc<dyn RemoteCapability>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            remote,
            clock,
            settings,
            state: Mutex::new(CacheState {
                buffers: HashMap::new(),
                refreshing: HashSet::new(),
                last_rotation_at: None,
            }),
        }
    }

    /// Returns a message for the category, never an error.
    ///
    /// A valid buffer is served directly (advancing the rotation index only
    /// when the shared rotation interval has elapsed). A missing or stale
    /// buffer triggers one refresh attempt; if that yields nothing the static
    /// fallback is returned.
    pub async fn get_message(&self, category: Category) -> Message {
        if let Some(message) = self.serve_cached(category, self.clock.now()) {
            return message;
        }

        self.refresh_category(category).await;

        if let Some(message) = self.serve_cached(category, self.clock.now()) {
            return message;
        }
        Message::fallback(category, self.clock.now())
    }

    /// Refreshes every category concurrently. A failing category keeps its
    /// fallback; it cannot block or fail the others.
    pub async fn pre_warm(&self) {
        let refreshes = Category::ALL.iter().map(|&c| self.refresh_category(c));
        futures_util::future::join_all(refreshes).await;
    }

    /// Drops all buffers and resets the rotation clock.
    ///
    /// Safe to call while a refresh is in flight: the late buffer swap is
    /// additive and will be replaced again once it goes stale.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.buffers.clear();
        state.last_rotation_at = None;
    }

    /// Count of cached messages per category, zero for cold categories.
    pub fn cache_status(&self) -> HashMap<Category, usize> {
        let state = self.state.lock().unwrap();
        Category::ALL
            .iter()
            .map(|&category| {
                let count = state
                    .buffers
                    .get(&category)
                    .map_or(0, |buffer| buffer.messages.len());
                (category, count)
            })
            .collect()
    }

    fn serve_cached(&self, category: Category, now: Instant) -> Option<Message> {
        let mut state = self.state.lock().unwrap();
        let CacheState {
            buffers,
            last_rotation_at,
            ..
        } = &mut *state;

        let buffer = buffers.get_mut(&category)?;
        // An empty buffer is treated identically to a missing one.
        if buffer.messages.is_empty() {
            return None;
        }
        if now.duration_since(buffer.fetched_at) >= self.settings.validity {
            return None;
        }

        match *last_rotation_at {
            None => *last_rotation_at = Some(now),
            Some(at) if now.duration_since(at) >= self.settings.rotation_interval => {
                buffer.rotation_index = (buffer.rotation_index + 1) % buffer.messages.len();
                *last_rotation_at = Some(now);
            }
            Some(_) => {}
        }

        Some(buffer.messages[buffer.rotation_index].clone())
    }

    /// Fetches a fresh buffer for one category.
    ///
    /// No-op when a refresh for this category is already in flight. Fetches
    /// run outside the lock; the buffer swap at the end is the only write.
    /// Partial success is kept: collection stops at the first failure, and a
    /// single fallback is synthesized only when nothing was collected at all.
    async fn refresh_category(&self, category: Category) {
        {
            let mut state = self.state.lock().unwrap();
            if !state.refreshing.insert(category) {
                log::debug!("refresh for {category} already in flight, skipping");
                return;
            }
        }
        // Cleared on every exit path, including an early return above us.
        let _busy = BusyGuard {
            state: &self.state,
            category,
        };

        let mut collected: Vec<Message> = Vec::with_capacity(self.settings.buffer_capacity);
        for attempt in 0..self.settings.buffer_capacity {
            if attempt > 0 && !self.settings.fetch_spacing.is_zero() {
                tokio::time::sleep(self.settings.fetch_spacing).await;
            }
            match self.remote.fetch_message(category).await {
                Ok(message) => collected.push(message),
                Err(err) => {
                    log::warn!("message fetch for {category} failed: {err}");
                    if collected.is_empty() {
                        collected.push(Message::fallback(category, self.clock.now()));
                    }
                    break;
                }
            }
        }

        if !collected.is_empty() {
            let mut state = self.state.lock().unwrap();
            state.buffers.insert(
                category,
                CategoryBuffer {
                    messages: collected,
                    fetched_at: self.clock.now(),
                    rotation_index: 0,
                },
            );
        }
    }
}

struct BusyGuard<'a> {
    state: &'a Mutex<CacheState>,
    category: Category,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.refreshing.remove(&self.category);
        }
    }
}
