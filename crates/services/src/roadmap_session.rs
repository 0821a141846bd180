use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use roadmap_core::model::{CompletionMap, RoadmapCatalog, RoadmapId};
use roadmap_core::progress::{self, ProgressSnapshot};
use roadmap_core::session::SessionContext;
use storage::repository::ProgressRepository;

use crate::Clock;
use crate::error::ProgressSyncError;
use crate::sync::{SyncController, SyncStatus};

/// One user's view of one roadmap: the catalog, the local completion map, and
/// the sync controller that keeps the remote store caught up.
///
/// Created at roadmap-view mount and discarded at unmount; the remote store is
/// the only durable copy. Every mutation is gated on the session's auth
/// signal: anonymous callers get an explicit [`ProgressSyncError::AuthRequired`]
/// and neither the map nor the network is touched.
pub struct RoadmapSession {
    catalog: RoadmapCatalog,
    completed: Mutex<CompletionMap>,
    session: Arc<SessionContext>,
    sync: SyncController,
}

impl RoadmapSession {
    #[must_use]
    pub fn new(
        clock: Clock,
        roadmap: RoadmapId,
        catalog: RoadmapCatalog,
        repo: Arc<dyn ProgressRepository>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            catalog,
            completed: Mutex::new(CompletionMap::new()),
            session: Arc::clone(&session),
            sync: SyncController::new(clock, roadmap, repo, session),
        }
    }

    /// Replace the sync controller's debounce window (deterministic tests).
    #[must_use]
    pub fn with_debounce(mut self, window: std::time::Duration) -> Self {
        self.sync = self.sync.with_debounce(window);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &RoadmapCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn roadmap(&self) -> &RoadmapId {
        self.sync.roadmap()
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.sync.status()
    }

    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.sync.last_synced_at()
    }

    /// Hydrate the local map from the remote store.
    ///
    /// Anonymous sessions skip the fetch entirely and keep browsing with an
    /// empty map. A remote failure surfaces as a transient error status and
    /// leaves the map empty; calling again retries.
    pub async fn refresh(&self) -> Result<(), ProgressSyncError> {
        if !self.session.is_authenticated() {
            return Ok(());
        }
        let snapshot = self.sync.load_initial().await?;
        self.lock_map().replace_all(snapshot);
        Ok(())
    }

    /// Flip one item and arm the debounced save.
    ///
    /// Returns the item's new completion state.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` for anonymous sessions; the
    /// map is left untouched.
    pub fn toggle_item(
        &self,
        level: &str,
        tech: &str,
        topic: &str,
        item: &str,
    ) -> Result<bool, ProgressSyncError> {
        if !self.session.is_authenticated() {
            return Err(ProgressSyncError::AuthRequired);
        }
        let (snapshot, now_completed) = {
            let mut map = self.lock_map();
            map.toggle_item(level, tech, topic, item);
            (map.clone(), map.is_completed(level, tech, topic, item))
        };
        self.sync.schedule_save(snapshot)?;
        Ok(now_completed)
    }

    /// Mark every catalog item of a topic complete or incomplete at once.
    ///
    /// A topic unknown to the catalog (or with an empty item list) is a no-op;
    /// there is nothing to set and no save is armed.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` for anonymous sessions.
    pub fn set_topic_completion(
        &self,
        level: &str,
        tech: &str,
        topic: &str,
        completed: bool,
    ) -> Result<(), ProgressSyncError> {
        if !self.session.is_authenticated() {
            return Err(ProgressSyncError::AuthRequired);
        }
        let Some(items) = self.catalog.items(level, tech, topic) else {
            return Ok(());
        };
        if items.is_empty() {
            return Ok(());
        }
        let snapshot = {
            let mut map = self.lock_map();
            map.set_topic_completion(level, tech, topic, items, completed);
            map.clone()
        };
        self.sync.schedule_save(snapshot)?;
        Ok(())
    }

    #[must_use]
    pub fn is_item_completed(&self, level: &str, tech: &str, topic: &str, item: &str) -> bool {
        self.lock_map().is_completed(level, tech, topic, item)
    }

    /// Whether every catalog item of the topic is completed.
    ///
    /// Topics missing from the catalog or with no items read as not completed.
    #[must_use]
    pub fn is_topic_completed(&self, level: &str, tech: &str, topic: &str) -> bool {
        let Some(items) = self.catalog.items(level, tech, topic) else {
            return false;
        };
        self.lock_map()
            .is_topic_fully_completed(level, tech, topic, items)
    }

    #[must_use]
    pub fn topic_progress(&self, level: &str, tech: &str, topic: &str) -> ProgressSnapshot {
        progress::topic_progress(&self.lock_map(), &self.catalog, level, tech, topic)
    }

    /// Progress across the whole roadmap.
    #[must_use]
    pub fn overall_progress(&self) -> ProgressSnapshot {
        progress::roadmap_progress(&self.lock_map(), &self.catalog)
    }

    /// Copy of the current completion map (for display or diagnostics).
    #[must_use]
    pub fn completion_snapshot(&self) -> CompletionMap {
        self.lock_map().clone()
    }

    /// Save immediately, bypassing the debounce window.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` for anonymous sessions.
    pub async fn sync_now(&self) -> Result<(), ProgressSyncError> {
        let snapshot = self.lock_map().clone();
        self.sync.sync_now(snapshot).await
    }

    /// Tear down on unmount: cancels armed saves and resets the sync status.
    pub fn close(&self) {
        self.sync.close();
    }

    fn lock_map(&self) -> MutexGuard<'_, CompletionMap> {
        self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
