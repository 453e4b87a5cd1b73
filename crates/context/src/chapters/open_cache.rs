//! Short-lived cache of the open chapter for read paths.
//!
//! Boundary checks always go to the store; this only serves
//! `current_open_chapter()` lookups between them.

use parking_lot::Mutex;
use recall_core::chapter::Chapter;
use std::time::Duration;
use tokio::time::Instant;

pub struct OpenChapterCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, Chapter)>>,
}

impl OpenChapterCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached chapter if it is younger than the TTL.
    pub fn get(&self) -> Option<Chapter> {
        let entry = self.entry.lock();
        entry
            .as_ref()
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, chapter)| chapter.clone())
    }

    pub fn put(&self, chapter: Chapter) {
        *self.entry.lock() = Some((Instant::now(), chapter));
    }

    pub fn invalidate(&self) {
        *self.entry.lock() = None;
    }
}
