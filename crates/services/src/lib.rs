#![forbid(unsafe_code)]

pub mod error;
pub mod overview;
pub mod roadmap_session;
pub mod sync;

pub use roadmap_core::Clock;

pub use error::ProgressSyncError;
pub use overview::{DashboardSummary, OverviewService};
pub use roadmap_session::RoadmapSession;
pub use sync::{SyncController, SyncStatus};
