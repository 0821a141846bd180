use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use roadmap_core::model::{CompletionMap, RoadmapId};
use roadmap_core::session::{AuthToken, SessionContext};
use storage::repository::ProgressRepository;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::Clock;
use crate::error::ProgressSyncError;

/// Delay between the last mutation and the automatic save it triggers.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(1500);
/// How long the "saved" notice stays up before reverting to idle.
pub const SUCCESS_NOTICE_TTL: Duration = Duration::from_secs(3);
/// How long a failure notice stays up before reverting to idle.
pub const ERROR_NOTICE_TTL: Duration = Duration::from_secs(5);

const LOAD_ERROR_MESSAGE: &str = "Failed to load your progress from the server";
const SAVE_ERROR_MESSAGE: &str = "Failed to save your progress to the server";
const SAVE_SUCCESS_MESSAGE: &str = "Your progress has been saved to the server";

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Synchronization state of one roadmap session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    LoadingInitial,
    /// A mutation happened and a debounced save is armed.
    Pending,
    Saving,
    /// Transient failure notice; auto-clears after [`ERROR_NOTICE_TTL`].
    Error(String),
    /// Transient success notice; auto-clears after [`SUCCESS_NOTICE_TTL`].
    Success(String),
}

impl SyncStatus {
    /// Whether a remote call is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncStatus::LoadingInitial | SyncStatus::Saving)
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

struct SyncInner {
    status: SyncStatus,
    /// Sequence of the most recently dispatched save; completions from older
    /// dispatches are ignored so a late response cannot clobber a newer one.
    dispatch_seq: u64,
    /// Invalidates auto-clear timers armed for an earlier notice.
    notice_gen: u64,
    /// Invalidates debounce timers superseded by a newer arm or a cancel.
    timer_gen: u64,
    pending: Option<JoinHandle<()>>,
    notice: Option<JoinHandle<()>>,
    last_synced_at: Option<DateTime<Utc>>,
}

/// Debounces and dispatches persistence of a roadmap's completion snapshot.
///
/// Mutations arriving within the debounce window collapse into a single save
/// carrying the latest full snapshot; a manual sync bypasses the window. All
/// remote failures are converted to transient [`SyncStatus`] transitions and
/// never propagate. Requires a tokio runtime for the scheduled tasks.
#[derive(Clone)]
pub struct SyncController {
    roadmap: RoadmapId,
    clock: Clock,
    repo: Arc<dyn ProgressRepository>,
    session: Arc<SessionContext>,
    debounce: Duration,
    inner: Arc<Mutex<SyncInner>>,
}

impl SyncController {
    #[must_use]
    pub fn new(
        clock: Clock,
        roadmap: RoadmapId,
        repo: Arc<dyn ProgressRepository>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            roadmap,
            clock,
            repo,
            session,
            debounce: DEBOUNCE_WINDOW,
            inner: Arc::new(Mutex::new(SyncInner {
                status: SyncStatus::Idle,
                dispatch_seq: 0,
                notice_gen: 0,
                timer_gen: 0,
                pending: None,
                notice: None,
                last_synced_at: None,
            })),
        }
    }

    /// Override the debounce window (usually for deterministic testing).
    #[must_use]
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    #[must_use]
    pub fn roadmap(&self) -> &RoadmapId {
        &self.roadmap
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.lock().status.clone()
    }

    /// When the remote store last confirmed this session's snapshot.
    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_synced_at
    }

    /// Fetch the remote snapshot for initial hydration.
    ///
    /// On success the returned map replaces local state and the controller
    /// goes back to idle. A remote failure surfaces as a transient error
    /// notice and yields an empty map so the view stays usable; the caller may
    /// retry via a manual refresh.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` when no credential is
    /// present; anonymous sessions must not reach the network.
    pub async fn load_initial(&self) -> Result<CompletionMap, ProgressSyncError> {
        let token = self.require_token()?;
        self.lock().status = SyncStatus::LoadingInitial;

        match self.repo.fetch_progress(&self.roadmap, &token).await {
            Ok(map) => {
                let mut inner = self.lock();
                inner.status = SyncStatus::Idle;
                inner.last_synced_at = Some(self.clock.now());
                Ok(map)
            }
            Err(err) => {
                warn!(roadmap = %self.roadmap, error = %err, "initial progress fetch failed");
                self.raise_notice(
                    SyncStatus::Error(LOAD_ERROR_MESSAGE.to_owned()),
                    ERROR_NOTICE_TTL,
                );
                Ok(CompletionMap::default())
            }
        }
    }

    /// Arm (or re-arm) the debounced save with the latest snapshot.
    ///
    /// Each call replaces the previously scheduled task, so a burst of
    /// mutations produces exactly one save carrying the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` when no credential is
    /// present.
    pub fn schedule_save(&self, snapshot: CompletionMap) -> Result<(), ProgressSyncError> {
        self.require_token()?;

        let controller = self.clone();
        let debounce = self.debounce;
        let mut inner = self.lock();
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        inner.timer_gen += 1;
        let armed_gen = inner.timer_gen;
        inner.status = SyncStatus::Pending;
        inner.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            {
                let mut inner = controller.lock();
                if inner.timer_gen != armed_gen {
                    return; // superseded while the window was open
                }
                // Past the cancellation point; the save itself is only ever
                // superseded via the dispatch sequence, never aborted.
                inner.pending = None;
            }
            controller.dispatch(snapshot).await;
        }));
        Ok(())
    }

    /// Save immediately, bypassing the debounce window.
    ///
    /// Cancels any armed save; resending an unchanged snapshot is fine, the
    /// server treats saves as wholesale replacement.
    ///
    /// # Errors
    ///
    /// Returns `ProgressSyncError::AuthRequired` when no credential is
    /// present. Remote failures become a transient error notice, not an error
    /// return.
    pub async fn sync_now(&self, snapshot: CompletionMap) -> Result<(), ProgressSyncError> {
        self.require_token()?;
        {
            let mut inner = self.lock();
            if let Some(handle) = inner.pending.take() {
                handle.abort();
            }
            inner.timer_gen += 1;
        }
        self.dispatch(snapshot).await;
        Ok(())
    }

    /// Tear down this session's scheduled work and reset the status.
    ///
    /// Called when the view unmounts; an armed debounce must not fire into a
    /// disposed view.
    pub fn close(&self) {
        let mut inner = self.lock();
        if let Some(handle) = inner.pending.take() {
            handle.abort();
        }
        if let Some(handle) = inner.notice.take() {
            handle.abort();
        }
        inner.timer_gen += 1;
        inner.notice_gen += 1;
        inner.status = SyncStatus::Idle;
    }

    async fn dispatch(&self, snapshot: CompletionMap) {
        // Re-check the credential at fire time; the user may have signed out
        // while the debounce was armed.
        let Some(token) = self.session.token() else {
            self.lock().status = SyncStatus::Idle;
            return;
        };

        let seq = {
            let mut inner = self.lock();
            inner.dispatch_seq += 1;
            inner.status = SyncStatus::Saving;
            inner.dispatch_seq
        };
        debug!(roadmap = %self.roadmap, seq, "saving progress snapshot");

        let outcome = self.repo.save_progress(&self.roadmap, &token, &snapshot).await;

        {
            let inner = self.lock();
            if seq != inner.dispatch_seq {
                // A newer save was dispatched while this one was in flight;
                // its completion owns the status now.
                return;
            }
        }

        match outcome {
            Ok(()) => {
                self.lock().last_synced_at = Some(self.clock.now());
                self.raise_notice(
                    SyncStatus::Success(SAVE_SUCCESS_MESSAGE.to_owned()),
                    SUCCESS_NOTICE_TTL,
                );
            }
            Err(err) => {
                warn!(roadmap = %self.roadmap, seq, error = %err, "progress save failed");
                self.raise_notice(
                    SyncStatus::Error(SAVE_ERROR_MESSAGE.to_owned()),
                    ERROR_NOTICE_TTL,
                );
            }
        }
    }

    fn raise_notice(&self, status: SyncStatus, ttl: Duration) {
        let controller = self.clone();
        let mut inner = self.lock();
        inner.notice_gen += 1;
        let generation = inner.notice_gen;
        inner.status = status;
        if let Some(handle) = inner.notice.take() {
            handle.abort();
        }
        inner.notice = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut inner = controller.lock();
            if inner.notice_gen == generation {
                inner.status = SyncStatus::Idle;
            }
        }));
    }

    fn require_token(&self) -> Result<AuthToken, ProgressSyncError> {
        self.session.token().ok_or(ProgressSyncError::AuthRequired)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SyncInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use roadmap_core::session::Credentials;
    use roadmap_core::time::fixed_clock;
    use std::collections::VecDeque;
    use storage::repository::{InMemoryProgressRepository, ProgressRepository, StorageError};

    fn signed_in_session() -> Arc<SessionContext> {
        Arc::new(SessionContext::signed_in(Credentials::new(
            "u1",
            "dana",
            AuthToken::new("t-123"),
        )))
    }

    fn controller_with(
        repo: Arc<dyn ProgressRepository>,
        session: Arc<SessionContext>,
    ) -> SyncController {
        SyncController::new(fixed_clock(), RoadmapId::new("frontend"), repo, session)
    }

    fn snapshot_with(item: &str) -> CompletionMap {
        let mut map = CompletionMap::new();
        map.toggle_item("Beginner", "HTML", "Basics", item);
        map
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_collapses_rapid_mutations_into_one_save() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.schedule_save(snapshot_with("tag")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        controller.schedule_save(snapshot_with("elements")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        controller
            .schedule_save(snapshot_with("attributes"))
            .unwrap();
        assert_eq!(controller.status(), SyncStatus::Pending);

        tokio::time::sleep(DEBOUNCE_WINDOW + Duration::from_millis(100)).await;

        assert_eq!(repo.save_count(), 1);
        let (_, saved) = repo.last_saved().unwrap();
        assert!(saved.is_completed("Beginner", "HTML", "Basics", "attributes"));
        assert!(!saved.is_completed("Beginner", "HTML", "Basics", "tag"));
        assert!(matches!(controller.status(), SyncStatus::Success(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_sync_bypasses_debounce_and_cancels_pending() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.schedule_save(snapshot_with("tag")).unwrap();
        controller.sync_now(snapshot_with("tag")).await.unwrap();
        assert_eq!(repo.save_count(), 1);

        // The armed debounce was cancelled; no second save fires.
        tokio::time::sleep(DEBOUNCE_WINDOW * 2).await;
        assert_eq!(repo.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_sync_without_prior_mutation_is_allowed() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.sync_now(CompletionMap::new()).await.unwrap();
        controller.sync_now(CompletionMap::new()).await.unwrap();
        assert_eq!(repo.save_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn success_notice_auto_clears() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.sync_now(snapshot_with("tag")).await.unwrap();
        assert!(matches!(controller.status(), SyncStatus::Success(_)));
        assert_eq!(controller.last_synced_at(), Some(fixed_clock().now()));

        tokio::time::sleep(SUCCESS_NOTICE_TTL + Duration::from_millis(100)).await;
        assert_eq!(controller.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn save_failure_raises_transient_error_notice() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        repo.set_fail_saves(true);
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.sync_now(snapshot_with("tag")).await.unwrap();
        assert!(matches!(controller.status(), SyncStatus::Error(_)));
        assert_eq!(controller.last_synced_at(), None);

        tokio::time::sleep(ERROR_NOTICE_TTL + Duration::from_millis(100)).await;
        assert_eq!(controller.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn load_initial_returns_remote_snapshot() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        repo.seed(RoadmapId::new("frontend"), snapshot_with("tag"));
        let controller = controller_with(repo.clone(), signed_in_session());

        let map = controller.load_initial().await.unwrap();
        assert!(map.is_completed("Beginner", "HTML", "Basics", "tag"));
        assert_eq!(controller.status(), SyncStatus::Idle);
        assert!(controller.last_synced_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn load_initial_failure_yields_empty_map_and_error_notice() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        repo.set_fail_fetches(true);
        let controller = controller_with(repo.clone(), signed_in_session());

        let map = controller.load_initial().await.unwrap();
        assert!(map.is_empty());
        assert!(matches!(controller.status(), SyncStatus::Error(_)));

        // Retry succeeds once the network is back.
        repo.set_fail_fetches(false);
        repo.seed(RoadmapId::new("frontend"), snapshot_with("tag"));
        let map = controller.load_initial().await.unwrap();
        assert!(!map.is_empty());
        assert_eq!(controller.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn anonymous_session_cannot_schedule_or_sync() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), Arc::new(SessionContext::new()));

        assert!(matches!(
            controller.schedule_save(CompletionMap::new()),
            Err(ProgressSyncError::AuthRequired)
        ));
        assert!(matches!(
            controller.sync_now(CompletionMap::new()).await,
            Err(ProgressSyncError::AuthRequired)
        ));
        assert!(matches!(
            controller.load_initial().await,
            Err(ProgressSyncError::AuthRequired)
        ));
        assert_eq!(repo.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_while_armed_drops_the_save() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let session = signed_in_session();
        let controller = controller_with(repo.clone(), session.clone());

        controller.schedule_save(snapshot_with("tag")).unwrap();
        session.sign_out();

        tokio::time::sleep(DEBOUNCE_WINDOW * 2).await;
        assert_eq!(repo.save_count(), 0);
        assert_eq!(controller.status(), SyncStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn close_cancels_armed_save() {
        let repo = Arc::new(InMemoryProgressRepository::new());
        let controller = controller_with(repo.clone(), signed_in_session());

        controller.schedule_save(snapshot_with("tag")).unwrap();
        controller.close();

        tokio::time::sleep(DEBOUNCE_WINDOW * 2).await;
        assert_eq!(repo.save_count(), 0);
        assert_eq!(controller.status(), SyncStatus::Idle);
    }

    /// Repository whose save calls follow scripted delay/failure behaviors, for
    /// exercising out-of-order completions.
    struct ScriptedRepository {
        saves: Mutex<Vec<CompletionMap>>,
        script: Mutex<VecDeque<(Duration, bool)>>,
    }

    impl ScriptedRepository {
        fn new(script: Vec<(Duration, bool)>) -> Self {
            Self {
                saves: Mutex::new(Vec::new()),
                script: Mutex::new(script.into()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ProgressRepository for ScriptedRepository {
        async fn fetch_progress(
            &self,
            _roadmap: &RoadmapId,
            _token: &AuthToken,
        ) -> Result<CompletionMap, StorageError> {
            Ok(CompletionMap::default())
        }

        async fn save_progress(
            &self,
            _roadmap: &RoadmapId,
            _token: &AuthToken,
            snapshot: &CompletionMap,
        ) -> Result<(), StorageError> {
            let (delay, fail) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Duration::ZERO, false));
            tokio::time::sleep(delay).await;
            if fail {
                return Err(StorageError::Connection("scripted failure".into()));
            }
            self.saves.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn fetch_overview(
            &self,
            _token: &AuthToken,
        ) -> Result<Vec<storage::repository::RoadmapOverview>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_failure_of_superseded_save_does_not_clobber_newer_outcome() {
        // First save: slow and failing. Second save: fast and successful.
        let repo = Arc::new(ScriptedRepository::new(vec![
            (Duration::from_secs(10), true),
            (Duration::from_millis(100), false),
        ]));
        let controller = controller_with(repo.clone(), signed_in_session())
            .with_debounce(Duration::from_millis(100));

        controller.schedule_save(snapshot_with("tag")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await; // first dispatched, in flight

        controller.schedule_save(snapshot_with("elements")).unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await; // second dispatched and done
        assert!(matches!(controller.status(), SyncStatus::Success(_)));

        // The stale first save fails long after; its completion must be ignored.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(!matches!(controller.status(), SyncStatus::Error(_)));
        assert_eq!(repo.saves.lock().unwrap().len(), 1);
    }
}
