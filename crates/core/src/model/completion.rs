use std::collections::HashMap;

use serde::{Deserialize, Serialize};

type ItemMap = HashMap<String, bool>;
type TopicMap = HashMap<String, ItemMap>;
type TechMap = HashMap<String, TopicMap>;

//
// ─── COMPLETION MAP ────────────────────────────────────────────────────────────
//

/// Sparse record of which roadmap items a user has marked done.
///
/// Keys follow the catalog shape `level → technology → topic → item`. A path
/// that is absent reads as not completed; lookups never fail. The map is the
/// single local source of truth for a roadmap session and serializes to the
/// wire shape the progress API expects (a nested JSON object of booleans).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletionMap {
    levels: HashMap<String, TechMap>,
}

impl CompletionMap {
    /// Creates an empty completion map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the item at the given path is marked completed.
    ///
    /// Any missing path segment reads as `false`.
    #[must_use]
    pub fn is_completed(&self, level: &str, tech: &str, topic: &str, item: &str) -> bool {
        self.levels
            .get(level)
            .and_then(|techs| techs.get(tech))
            .and_then(|topics| topics.get(topic))
            .and_then(|items| items.get(item))
            .copied()
            .unwrap_or(false)
    }

    /// Flips the completion flag at the given path, creating intermediate
    /// containers as needed.
    ///
    /// The map is unaware of authentication; callers gate mutations before
    /// reaching it.
    pub fn toggle_item(&mut self, level: &str, tech: &str, topic: &str, item: &str) {
        let items = self.topic_entry(level, tech, topic);
        let flag = items.entry(item.to_owned()).or_insert(false);
        *flag = !*flag;
    }

    /// Sets every listed item's flag to `completed`, regardless of prior state.
    ///
    /// Missing containers are created rather than treated as an error, so the
    /// operation never partially applies.
    pub fn set_topic_completion(
        &mut self,
        level: &str,
        tech: &str,
        topic: &str,
        items: &[String],
        completed: bool,
    ) {
        let entry = self.topic_entry(level, tech, topic);
        for item in items {
            entry.insert(item.clone(), completed);
        }
    }

    /// Returns `true` iff `items` is non-empty and every listed item is
    /// completed.
    ///
    /// An empty item list is defined as not fully completed, guarding against
    /// vacuous truth on malformed catalog entries.
    #[must_use]
    pub fn is_topic_fully_completed(
        &self,
        level: &str,
        tech: &str,
        topic: &str,
        items: &[String],
    ) -> bool {
        if items.is_empty() {
            return false;
        }
        items
            .iter()
            .all(|item| self.is_completed(level, tech, topic, item))
    }

    /// Atomically replaces the entire map with `snapshot`.
    ///
    /// Used on initial hydration from the remote store; prior in-memory state
    /// is discarded, not merged.
    pub fn replace_all(&mut self, snapshot: CompletionMap) {
        *self = snapshot;
    }

    /// Returns whether the map holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of items currently marked completed.
    #[must_use]
    pub fn completed_count(&self) -> u32 {
        let mut count = 0;
        for techs in self.levels.values() {
            for topics in techs.values() {
                for items in topics.values() {
                    count += items.values().filter(|done| **done).count();
                }
            }
        }
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn topic_entry(&mut self, level: &str, tech: &str, topic: &str) -> &mut ItemMap {
        self.levels
            .entry(level.to_owned())
            .or_default()
            .entry(tech.to_owned())
            .or_default()
            .entry(topic.to_owned())
            .or_default()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
