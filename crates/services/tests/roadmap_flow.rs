use std::sync::Arc;
use std::time::Duration;

use roadmap_core::model::{
    CatalogLevel, CatalogTechnology, CatalogTopic, RoadmapCatalog, RoadmapId,
};
use roadmap_core::session::{AuthToken, Credentials, SessionContext};
use roadmap_core::time::fixed_clock;
use services::{ProgressSyncError, RoadmapSession, SyncStatus};
use storage::repository::InMemoryProgressRepository;

fn frontend_catalog() -> RoadmapCatalog {
    RoadmapCatalog::new(vec![
        CatalogLevel::new(
            "Beginner",
            vec![CatalogTechnology::new(
                "HTML",
                vec![
                    CatalogTopic::new(
                        "Basics",
                        vec!["tag".into(), "elements".into(), "attributes".into()],
                    ),
                    CatalogTopic::new("Forms", vec!["input".into(), "validation".into()]),
                ],
            )],
        ),
        CatalogLevel::new(
            "Intermediate",
            vec![CatalogTechnology::new(
                "CSS",
                vec![CatalogTopic::new(
                    "Layout",
                    vec!["flexbox".into(), "grid".into()],
                )],
            )],
        ),
    ])
}

#[tokio::test(start_paused = true)]
async fn roadmap_flow_login_track_sync_logout() {
    let repo = Arc::new(InMemoryProgressRepository::new());
    let session = Arc::new(SessionContext::new());
    let roadmap = RoadmapId::new("frontend");

    let view = RoadmapSession::new(
        fixed_clock(),
        roadmap.clone(),
        frontend_catalog(),
        repo.clone(),
        session.clone(),
    )
    .with_debounce(Duration::from_millis(100));

    // Anonymous browsing: queries work, mutations are refused.
    assert_eq!(view.overall_progress().total, 7);
    assert!(matches!(
        view.toggle_item("Beginner", "HTML", "Basics", "tag"),
        Err(ProgressSyncError::AuthRequired)
    ));

    // Log in and hydrate from the (empty) remote store.
    session.sign_in(Credentials::new("u1", "dana", AuthToken::new("t-123")));
    view.refresh().await.expect("refresh");
    assert_eq!(view.status(), SyncStatus::Idle);

    // Track two items and complete a topic; the burst collapses into one save.
    view.toggle_item("Beginner", "HTML", "Basics", "tag")
        .expect("toggle tag");
    view.toggle_item("Beginner", "HTML", "Basics", "elements")
        .expect("toggle elements");
    view.set_topic_completion("Beginner", "HTML", "Forms", true)
        .expect("complete forms");

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(repo.save_count(), 1);
    let stored = repo.stored(&roadmap);
    assert!(stored.is_completed("Beginner", "HTML", "Basics", "tag"));
    assert!(stored.is_completed("Beginner", "HTML", "Forms", "validation"));

    // 4 of 7 items done.
    let overall = view.overall_progress();
    assert_eq!(overall.completed, 4);
    assert_eq!(overall.percentage, 57);

    // Manual sync resends immediately even with nothing new.
    view.sync_now().await.expect("manual sync");
    assert_eq!(repo.save_count(), 2);
    assert!(matches!(view.status(), SyncStatus::Success(_)));

    // A fresh mount for the same user sees the persisted progress.
    let second = RoadmapSession::new(
        fixed_clock(),
        roadmap.clone(),
        frontend_catalog(),
        repo.clone(),
        session.clone(),
    );
    second.refresh().await.expect("second refresh");
    assert!(second.is_topic_completed("Beginner", "HTML", "Forms"));
    assert_eq!(second.overall_progress().percentage, 57);
    second.close();

    // Logout: tracking is refused again and nothing further reaches the store.
    session.sign_out();
    assert!(matches!(
        view.toggle_item("Intermediate", "CSS", "Layout", "grid"),
        Err(ProgressSyncError::AuthRequired)
    ));
    view.close();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(repo.save_count(), 2);
}
