use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::engine::QueueMode;

/// Submission metadata for an utterance the engine has accepted.
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub(crate) text: String,
    pub(crate) mode: QueueMode,
    pub(crate) submitted_at: Instant,
    pub(crate) started: bool,
}

/// In-flight utterances keyed by id.
///
/// Entries leave the map on their terminal notification, when a `Flush`
/// submission supersedes them, or when they sit unstarted for longer than
/// the stale threshold.
#[derive(Debug, Default)]
pub(crate) struct UtteranceTracker {
    in_flight: HashMap<String, InFlight>,
}

impl UtteranceTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.in_flight.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    /// Track a newly accepted utterance. Callers check `contains` first; ids are unique.
    pub(crate) fn insert(&mut self, id: String, text: &str, mode: QueueMode, now: Instant) {
        debug_assert!(!self.in_flight.contains_key(&id), "duplicate id {id}");
        self.in_flight.insert(
            id,
            InFlight {
                text: text.to_string(),
                mode,
                submitted_at: now,
                started: false,
            },
        );
    }

    /// Mark an utterance as playing. Returns `false` for ids that are not tracked.
    pub(crate) fn mark_started(&mut self, id: &str) -> bool {
        match self.in_flight.get_mut(id) {
            Some(entry) => {
                entry.started = true;
                true
            }
            None => false,
        }
    }

    /// Remove an utterance on its terminal notification.
    pub(crate) fn finish(&mut self, id: &str) -> Option<InFlight> {
        self.in_flight.remove(id)
    }

    /// Drop every entry. Returns the ids that had already started, sorted.
    pub(crate) fn drain(&mut self) -> Vec<String> {
        let mut started: Vec<String> = self
            .in_flight
            .drain()
            .filter(|(_, entry)| entry.started)
            .map(|(id, _)| id)
            .collect();
        started.sort_unstable();
        started
    }

    /// Discard entries that were never started and are older than `max_age`.
    ///
    /// Engines may silently drop queued work, so this is a best-effort sweep
    /// rather than an exact accounting.
    pub(crate) fn discard_stale(&mut self, max_age: Duration, now: Instant) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|id, entry| {
            let stale =
                !entry.started && now.saturating_duration_since(entry.submitted_at) > max_age;
            if stale {
                log::debug!(
                    "Discarding stale utterance '{id}' ({:?}, {} chars)",
                    entry.mode,
                    entry.text.chars().count()
                );
            }
            !stale
        });
        before - self.in_flight.len()
    }
}
