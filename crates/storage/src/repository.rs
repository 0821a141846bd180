use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roadmap_core::model::{CompletionMap, RoadmapId};
use roadmap_core::session::AuthToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::{ApiConfig, HttpProgressRepository};

/// Errors surfaced by remote store adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("missing or invalid credential")]
    Unauthorized,

    #[error("server rejected the request")]
    Rejected,

    #[error("remote returned status {0}")]
    Status(u16),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// One roadmap's standing as reported by the progress overview endpoint.
///
/// Mirrors the wire shape so repositories can deserialize it directly; the
/// services layer folds these into dashboard aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapOverview {
    pub roadmap: RoadmapId,
    #[serde(default)]
    pub title: Option<String>,
    pub percentage: u8,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Remote store contract for roadmap progress.
///
/// The remote service is the only durable copy of a user's progress; there is
/// no local persistent cache. All operations require a bearer credential.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the saved completion map for one roadmap.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential is refused or the remote call
    /// fails.
    async fn fetch_progress(
        &self,
        roadmap: &RoadmapId,
        token: &AuthToken,
    ) -> Result<CompletionMap, StorageError>;

    /// Persist the full completion snapshot for one roadmap.
    ///
    /// The snapshot replaces whatever the server held before; there is no
    /// diffing or merging.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential is refused or the remote call
    /// fails.
    async fn save_progress(
        &self,
        roadmap: &RoadmapId,
        token: &AuthToken,
        snapshot: &CompletionMap,
    ) -> Result<(), StorageError>;

    /// Fetch the per-roadmap overview used by the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the credential is refused or the remote call
    /// fails.
    async fn fetch_overview(
        &self,
        token: &AuthToken,
    ) -> Result<Vec<RoadmapOverview>, StorageError>;
}

/// In-memory progress store for testing and prototyping.
///
/// Records every save so tests can assert on call counts and the exact
/// snapshot that went over the wire; failure toggles let tests exercise the
/// fetch/save error paths.
#[derive(Default)]
pub struct InMemoryProgressRepository {
    progress: Mutex<HashMap<RoadmapId, CompletionMap>>,
    overview: Mutex<Vec<RoadmapOverview>>,
    saves: Mutex<Vec<(RoadmapId, CompletionMap)>>,
    fail_fetches: AtomicBool,
    fail_saves: AtomicBool,
}

impl InMemoryProgressRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads the stored completion map for a roadmap.
    pub fn seed(&self, roadmap: RoadmapId, snapshot: CompletionMap) {
        lock(&self.progress).insert(roadmap, snapshot);
    }

    /// Pre-loads the dashboard overview response.
    pub fn seed_overview(&self, entries: Vec<RoadmapOverview>) {
        *lock(&self.overview) = entries;
    }

    /// Makes subsequent fetches fail with a connection error.
    pub fn set_fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent saves fail with a connection error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful save calls observed.
    #[must_use]
    pub fn save_count(&self) -> usize {
        lock(&self.saves).len()
    }

    /// The snapshot carried by the most recent save, if any.
    #[must_use]
    pub fn last_saved(&self) -> Option<(RoadmapId, CompletionMap)> {
        lock(&self.saves).last().cloned()
    }

    /// The currently stored map for a roadmap, empty if never saved.
    #[must_use]
    pub fn stored(&self, roadmap: &RoadmapId) -> CompletionMap {
        lock(&self.progress)
            .get(roadmap)
            .cloned()
            .unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ProgressRepository for InMemoryProgressRepository {
    async fn fetch_progress(
        &self,
        roadmap: &RoadmapId,
        _token: &AuthToken,
    ) -> Result<CompletionMap, StorageError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("injected fetch failure".into()));
        }
        Ok(self.stored(roadmap))
    }

    async fn save_progress(
        &self,
        roadmap: &RoadmapId,
        _token: &AuthToken,
        snapshot: &CompletionMap,
    ) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("injected save failure".into()));
        }
        lock(&self.progress).insert(roadmap.clone(), snapshot.clone());
        lock(&self.saves).push((roadmap.clone(), snapshot.clone()));
        Ok(())
    }

    async fn fetch_overview(
        &self,
        _token: &AuthToken,
    ) -> Result<Vec<RoadmapOverview>, StorageError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("injected fetch failure".into()));
        }
        Ok(lock(&self.overview).clone())
    }
}

/// Aggregates the progress store behind a trait object for backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            progress: Arc::new(InMemoryProgressRepository::new()),
        }
    }

    #[must_use]
    pub fn http(config: ApiConfig) -> Self {
        Self {
            progress: Arc::new(HttpProgressRepository::new(config)),
        }
    }
}
