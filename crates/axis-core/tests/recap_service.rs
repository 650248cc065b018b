use std::sync::Arc;

use axis_bus::EventBus;
use axis_core::{RecapService, StorePoller};
use axis_engine::{Engine, HealthStatus, TransferInsight};
use axis_schema::{Actor, NewEvent, SessionKind};
use axis_store::{EventStore, WindowQuery};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

fn service(dir: &tempfile::TempDir, bus: &EventBus, window_size: usize) -> RecapService {
    let store = EventStore::open(&dir.path().join("axis.db"))
        .unwrap()
        .with_publisher(bus.publisher());
    RecapService::new(Arc::new(store), Engine::default(), window_size)
}

fn tap(outcome: &str, subject: &str, session: SessionKind) -> NewEvent {
    NewEvent::new(Actor::Parent, session)
        .outcome(outcome)
        .tags(["pressure"])
        .subject(subject, None)
}

#[tokio::test]
async fn recap_uses_default_window_size() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bus = EventBus::new(8);
    let svc = service(&tmp, &bus, 10);

    for i in 0..15 {
        let outcome = if i < 5 { "MISS" } else { "GOOD" };
        svc.store()
            .insert(tap(outcome, "cole", SessionKind::Game))
            .await
            .unwrap();
    }

    let recap = svc.recap(&WindowQuery::default()).await.unwrap();
    assert_eq!(recap.total, 10);
    assert_eq!(recap.top_outcome.unwrap().percent, 100);
    // 10 GOOD with one shared tag trips both rules
    assert_eq!(recap.health.status, HealthStatus::Warn);
    assert_eq!(recap.health.flags.len(), 2);
}

#[tokio::test]
async fn transfer_splits_practice_and_game() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bus = EventBus::new(8);
    let svc = service(&tmp, &bus, 50);

    for i in 0..10 {
        let practice = if i < 9 { "GOOD" } else { "MISS" };
        let game = if i < 3 { "GOOD" } else { "PANIC" };
        svc.store()
            .insert(tap(practice, "hailey", SessionKind::Practice))
            .await
            .unwrap();
        svc.store()
            .insert(tap(game, "hailey", SessionKind::Game))
            .await
            .unwrap();
    }

    let insight = svc
        .transfer(&WindowQuery::default().subject("hailey"), "GOOD")
        .await
        .unwrap();
    assert!(matches!(
        insight,
        TransferInsight::NotTransferring {
            practice_percent: 90,
            game_percent: 30,
            ..
        }
    ));
}

#[tokio::test]
async fn watch_recomputes_for_matching_subject_only() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bus = EventBus::new(16);
    let svc = Arc::new(service(&tmp, &bus, 50));
    let rx = bus.subscribe_all().await;
    let (recap_tx, mut recap_rx) = mpsc::unbounded_channel();

    let watcher = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            svc.watch(rx, WindowQuery::default().subject("cole"), move |recap| {
                let _ = recap_tx.send(recap.total);
            })
            .await
        })
    };

    let initial = timeout(Duration::from_millis(200), recap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(initial, 0);

    svc.store()
        .insert(tap("GOOD", "rocket", SessionKind::Game))
        .await
        .unwrap();
    svc.store()
        .insert(tap("GOOD", "cole", SessionKind::Game))
        .await
        .unwrap();

    let next = timeout(Duration::from_millis(200), recap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next, 1);
    assert!(timeout(Duration::from_millis(50), recap_rx.recv())
        .await
        .is_err());

    drop(bus);
    watcher.abort();
}

#[tokio::test]
async fn export_carries_recap_and_recent_rows() {
    let tmp = tempfile::TempDir::new().unwrap();
    let bus = EventBus::new(8);
    let svc = service(&tmp, &bus, 50);

    for _ in 0..30 {
        svc.store()
            .insert(tap("SPACE", "chance", SessionKind::Game))
            .await
            .unwrap();
    }

    let export = svc
        .export_index(&WindowQuery::default(), "Coach V")
        .await
        .unwrap();
    assert_eq!(export.axis, "AXIS LIVE");
    assert_eq!(export.recent_events.len(), 25);
    assert_eq!(export.recap.total, 30);
    assert_eq!(export.recap.next_constraint.as_deref(), Some("SPACING"));

    let json = serde_json::to_value(&export).unwrap();
    assert_eq!(json["recap"]["health"]["status"], "warn");
}

#[tokio::test]
async fn watch_sees_rows_from_another_handle_through_the_poller() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("axis.db");
    let writer = EventStore::open(&path).unwrap();
    let bus = EventBus::new(16);
    let reader = Arc::new(EventStore::open(&path).unwrap());
    let svc = Arc::new(RecapService::new(
        Arc::clone(&reader),
        Engine::default(),
        50,
    ));
    let mut poller = StorePoller::new(reader, bus.publisher()).await.unwrap();
    let rx = bus.subscribe_all().await;
    let (recap_tx, mut recap_rx) = mpsc::unbounded_channel();

    let watcher = {
        let svc = Arc::clone(&svc);
        tokio::spawn(async move {
            svc.watch(rx, WindowQuery::default().subject("cole"), move |recap| {
                let _ = recap_tx.send(recap.total);
            })
            .await
        })
    };
    let initial = timeout(Duration::from_millis(200), recap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(initial, 0);

    // cole's rep is not the newest row when the poller next looks
    writer
        .insert(tap("GOOD", "cole", SessionKind::Game))
        .await
        .unwrap();
    writer
        .insert(tap("MISS", "hailey", SessionKind::Game))
        .await
        .unwrap();
    assert!(poller.tick().await.unwrap());

    let next = timeout(Duration::from_millis(200), recap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next, 1);

    writer.undo_last(Some("cole")).await.unwrap();
    assert!(poller.tick().await.unwrap());
    let after_undo = timeout(Duration::from_millis(200), recap_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(after_undo, 0);

    watcher.abort();
}
