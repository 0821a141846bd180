use std::sync::Arc;

use roadmap_core::progress::{AggregateProgress, aggregate_progress};
use roadmap_core::session::SessionContext;
use storage::repository::{ProgressRepository, RoadmapOverview};

use crate::error::ProgressSyncError;

/// Dashboard rollup of every roadmap the user has touched.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub roadmaps: Vec<RoadmapOverview>,
    pub aggregate: AggregateProgress,
    /// The furthest-along roadmap, shown as the "top roadmap" card; only
    /// present when at least one roadmap has progress.
    pub top: Option<RoadmapOverview>,
}

/// Fetches the cross-roadmap progress overview for the home dashboard.
pub struct OverviewService {
    repo: Arc<dyn ProgressRepository>,
    session: Arc<SessionContext>,
}

impl OverviewService {
    #[must_use]
    pub fn new(repo: Arc<dyn ProgressRepository>, session: Arc<SessionContext>) -> Self {
        Self { repo, session }
    }

    /// Fetch the overview and fold it into dashboard figures.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` when signed out, or the
    /// underlying storage error when the remote call fails (the dashboard has
    /// its own retry affordance, pull-to-refresh).
    pub async fn dashboard(&self) -> Result<DashboardSummary, ProgressSyncError> {
        let token = self
            .session
            .token()
            .ok_or(ProgressSyncError::AuthRequired)?;
        let roadmaps = self.repo.fetch_overview(&token).await?;

        let aggregate = aggregate_progress(roadmaps.iter().map(|r| r.percentage));
        let top = roadmaps
            .iter()
            .filter(|r| r.percentage > 0)
            .max_by_key(|r| r.percentage)
            .cloned();

        Ok(DashboardSummary {
            roadmaps,
            aggregate,
            top,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
