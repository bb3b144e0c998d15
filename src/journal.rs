//! Post-session journal.
//!
//! The engine only hands a [`JournalHandoff`] over; writing the entry is up to
//! whoever holds the other end.

use chrono::Local;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::models::{JournalEntry, JournalHandoff};

pub trait JournalSink: Send {
    fn hand_off(&mut self, handoff: JournalHandoff);
}

#[derive(Default)]
struct JournalState {
    pending: Option<JournalHandoff>,
    /// Duration of the most recent recorded session, skipped or not.
    latest_duration: Option<u64>,
    entries: Vec<JournalEntry>,
}

/// Shared, cloneable journal. Give one clone to the engine and keep another
/// for the capture form.
#[derive(Clone, Default)]
pub struct Journal {
    inner: Arc<Mutex<JournalState>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handoff waiting for after-session text, if any.
    pub fn pending(&self) -> Option<JournalHandoff> {
        self.inner.lock().pending.clone()
    }

    /// Store an entry for the most recent recorded session. Nothing is written
    /// when both texts are empty; the pending handoff then stays open.
    pub fn save_entry(&self, before: &str, after: &str) -> Option<JournalEntry> {
        if before.is_empty() && after.is_empty() {
            return None;
        }
        let mut state = self.inner.lock();
        state.pending = None;
        let entry = JournalEntry {
            date: Local::now(),
            before_session: before.to_string(),
            session_duration: state.latest_duration.unwrap_or(0),
            after_session: after.to_string(),
        };
        state.entries.insert(0, entry.clone());
        Some(entry)
    }

    /// Close the capture form without writing anything.
    pub fn skip(&self) -> Option<JournalHandoff> {
        self.inner.lock().pending.take()
    }

    /// Newest first.
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.inner.lock().entries.clone()
    }
}

impl JournalSink for Journal {
    fn hand_off(&mut self, handoff: JournalHandoff) {
        info!(
            duration_seconds = handoff.duration_seconds,
            bpm = handoff.bpm,
            "session ready for journal"
        );
        let mut state = self.inner.lock();
        state.latest_duration = Some(handoff.duration_seconds);
        state.pending = Some(handoff);
    }
}
