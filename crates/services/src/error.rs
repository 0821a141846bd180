//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by progress services.
///
/// Network failures during debounced saves and the initial load are converted
/// to [`crate::SyncStatus`] transitions at the sync boundary rather than
/// surfaced here; callers only ever see the explicit auth signal and errors
/// from direct remote queries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressSyncError {
    #[error("login required to track progress")]
    AuthRequired,
    #[error(transparent)]
    Storage(#[from] StorageError),
}
