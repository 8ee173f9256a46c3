//! Pipeline service behavior: concurrency, deadlines, shutdown.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::RecordingFulfillment;
use pipeline::{
    DispatchConfig, GrantItemAction, InMemoryStateStore, PipelineError, PipelineManager,
    PipelineService, RageQuitRule, RawEvent, RecordSignalAction, StateStore,
};
use serde_json::json;

fn manager(
    store: Arc<InMemoryStateStore>,
    fulfillment: Arc<RecordingFulfillment>,
) -> Arc<PipelineManager> {
    Arc::new(
        PipelineManager::builder()
            .store(store)
            .rule(Arc::new(RageQuitRule::default()))
            .action(Arc::new(RecordSignalAction::default()))
            .action(Arc::new(GrantItemAction::new(fulfillment, "gem", 5)))
            .bind(RageQuitRule::ID, ["record_signal", "grant_item"], false)
            .build()
            .unwrap(),
    )
}

fn rage_quit(user_id: &str) -> RawEvent {
    RawEvent::new(
        "statistic_updated",
        json!({ "userId": user_id, "statCode": "rage-quit-count", "latestValue": 3 }),
    )
}

#[tokio::test]
async fn processes_many_players_concurrently() {
    let store = Arc::new(InMemoryStateStore::new());
    let fulfillment = Arc::new(RecordingFulfillment::default());
    let service = PipelineService::start(
        manager(store.clone(), fulfillment.clone()),
        DispatchConfig {
            max_in_flight: 4,
            ..DispatchConfig::default()
        },
    );
    let handle = service.handle();

    let mut replies = Vec::new();
    for n in 0..16 {
        let handle = handle.clone();
        replies.push(tokio::spawn(async move {
            handle.process(rage_quit(&format!("p{n}"))).await
        }));
    }
    for reply in replies {
        let report = reply.await.unwrap().unwrap();
        assert!(report.fired(RageQuitRule::ID));
    }

    drop(handle);
    service.shutdown().await.unwrap();
    assert_eq!(store.len(), 16);
    assert_eq!(fulfillment.grant_count(), 16);
}

#[tokio::test]
async fn deadline_interrupts_and_keeps_partial_state() {
    let store = Arc::new(InMemoryStateStore::new());
    let fulfillment = Arc::new(RecordingFulfillment::slow(Duration::from_secs(30)));
    let service = PipelineService::start(
        manager(store.clone(), fulfillment.clone()),
        DispatchConfig {
            event_timeout: Some(Duration::from_millis(50)),
            ..DispatchConfig::default()
        },
    );

    let err = service.handle().process(rage_quit("slow")).await.unwrap_err();
    let PipelineError::Interrupted(report) = err else {
        panic!("expected interruption, got {err:?}");
    };
    let execution = report.execution(RageQuitRule::ID).unwrap();
    assert!(execution.cancelled);
    assert_eq!(execution.executed, vec!["record_signal"]);
    assert_eq!(execution.skipped, vec!["grant_item"]);
    assert!(report.saved);

    let state = store.load("slow").await.unwrap();
    assert_eq!(state.signal_history.len(), 1);
    assert!(state.intervention_history.is_empty());
    assert_eq!(fulfillment.grant_count(), 0);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn submit_after_shutdown_fails() {
    let store = Arc::new(InMemoryStateStore::new());
    let service = PipelineService::start(
        manager(store.clone(), Arc::new(RecordingFulfillment::default())),
        DispatchConfig::default(),
    );
    let handle = service.handle();
    handle.submit(rage_quit("p1")).await.unwrap();

    service.abort().await.unwrap();
    let err = handle.submit(rage_quit("p2")).await.unwrap_err();
    assert!(matches!(err, PipelineError::CommandChannelClosed));
}
