//! tests/pipeline_tests.rs
//! Corridas completas: store en memoria + canal falso.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::models::customer_model::CustomerRecord;
use crate::models::notification_model::{ChannelError, ChannelErrorKind, NotificationStatus, RunMode};
use crate::services::customer_service::CustomerService;
use crate::services::notification_channel_service::OutboundChannel;
use crate::services::notification_service::{NotificationService, REASON_DRY_RUN};
use crate::services::pipeline_service::{PipelineService, REASON_CANCELLED, REASON_DUPLICATE};
use crate::services::repository::Repository;
use crate::tests::common::{customer, date, memory_service, FailingRepository, FakeChannel};

async fn seed(store: &CustomerService, records: Vec<CustomerRecord>) -> Vec<i64> {
    let mut ids = Vec::new();
    for record in records {
        ids.push(store.upsert(&record).await.unwrap());
    }
    ids
}

fn pipeline(
    repository: Arc<dyn Repository<CustomerRecord>>,
    fake: &Arc<FakeChannel>,
    concurrency: usize,
) -> PipelineService {
    let channel: Arc<dyn OutboundChannel> = fake.clone();
    let notifier = NotificationService::new(channel, None, Duration::from_secs(2));
    PipelineService::new(repository, notifier, concurrency)
}

#[tokio::test]
async fn test_partial_failure_does_not_stop_run() {
    let store = memory_service().await;
    let ids = seed(
        &store,
        vec![
            customer("Ivan Petrov", "0888000001", date(2024, 1, 12)),
            customer("Maria Ivanova", "0888000002", date(2024, 1, 13)),
            customer("Georgi Georgiev", "0888000003", date(2024, 1, 8)),
        ],
    )
    .await;

    let fake = Arc::new(FakeChannel::new().failing_for(
        "+359888000002",
        ChannelError::new(ChannelErrorKind::InvalidDestination, "not a mobile number"),
    ));
    let report = pipeline(Arc::new(store), &fake, 2)
        .run(date(2024, 1, 10), 5, RunMode::Production)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.sent(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.skipped(), 0);
    assert!(!report.cancelled);

    // Mismo orden que los registros
    let ids_in_report: Vec<i64> = report.outcomes.iter().map(|o| o.record_id).collect();
    assert_eq!(ids_in_report, ids);
    assert_eq!(report.outcomes[1].status, NotificationStatus::Failed);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record_id, ids[1]);
    assert_eq!(fake.calls().len(), 3);
}

#[tokio::test]
async fn test_dry_run_reports_everything_as_skipped() {
    let store = memory_service().await;
    seed(
        &store,
        vec![
            customer("Ivan Petrov", "0888000001", date(2024, 1, 12)),
            customer("Maria Ivanova", "0888000002", date(2024, 1, 2)),
            customer("Later", "0888000003", date(2024, 3, 1)),
        ],
    )
    .await;

    let fake = Arc::new(FakeChannel::new());
    let report = pipeline(Arc::new(store), &fake, 4)
        .run(date(2024, 1, 10), 5, RunMode::DryRun)
        .await
        .unwrap();

    assert_eq!(report.mode, RunMode::DryRun);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.reason.as_deref() == Some(REASON_DRY_RUN) && !o.message.is_empty()));
    assert_eq!(report.not_yet_due, 1);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_same_name_and_due_date_notified_once() {
    let store = memory_service().await;
    let ids = seed(
        &store,
        vec![
            customer("Ivan Petrov", "0888000001", date(2024, 1, 12)).with_policy_number("P-1"),
            customer("ivan petrov ", "0888000001", date(2024, 1, 12)).with_policy_number("P-2"),
        ],
    )
    .await;
    assert_ne!(ids[0], ids[1]);

    let fake = Arc::new(FakeChannel::new());
    let report = pipeline(Arc::new(store), &fake, 2)
        .run(date(2024, 1, 10), 5, RunMode::Production)
        .await
        .unwrap();

    assert_eq!(report.sent(), 1);
    assert_eq!(report.outcomes[1].record_id, ids[1]);
    assert_eq!(report.outcomes[1].reason.as_deref(), Some(REASON_DUPLICATE));
    assert_eq!(fake.calls().len(), 1);
}

#[tokio::test]
async fn test_missing_due_date_reported_as_data_quality() {
    let store = memory_service().await;
    let mut undated = customer("Undated", "0888000009", date(2024, 1, 12));
    undated.due_date = None;
    let ids = seed(
        &store,
        vec![undated, customer("Dated", "0888000001", date(2024, 1, 12))],
    )
    .await;

    let fake = Arc::new(FakeChannel::new());
    let report = pipeline(Arc::new(store), &fake, 1)
        .run(date(2024, 1, 10), 5, RunMode::DryRun)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.data_quality.len(), 1);
    assert_eq!(report.data_quality[0].record_id, Some(ids[0]));
}

#[tokio::test]
async fn test_cancelled_before_dispatch() {
    let store = memory_service().await;
    seed(
        &store,
        vec![
            customer("Ivan Petrov", "0888000001", date(2024, 1, 12)),
            customer("Maria Ivanova", "0888000002", date(2024, 1, 13)),
        ],
    )
    .await;

    let fake = Arc::new(FakeChannel::new());
    let (_cancel_tx, cancel_rx) = watch::channel(true);
    let report = pipeline(Arc::new(store), &fake, 2)
        .run_with_cancel(date(2024, 1, 10), 5, RunMode::Production, cancel_rx)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), 2);
    assert!(report
        .outcomes
        .iter()
        .all(|o| o.reason.as_deref() == Some(REASON_CANCELLED)));
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let store = memory_service().await;
    let records = (1..=6)
        .map(|i| customer(&format!("Customer {}", i), &format!("088800000{}", i), date(2024, 1, 12)))
        .collect();
    seed(&store, records).await;

    let fake = Arc::new(FakeChannel::new().with_delay(Duration::from_millis(30)));
    let report = pipeline(Arc::new(store), &fake, 2)
        .run(date(2024, 1, 10), 5, RunMode::Production)
        .await
        .unwrap();

    assert_eq!(report.sent(), 6);
    assert!(fake.max_in_flight() <= 2, "en vuelo: {}", fake.max_in_flight());
}

#[tokio::test]
async fn test_store_failure_aborts_before_sending() {
    let fake = Arc::new(FakeChannel::new());
    let result = pipeline(Arc::new(FailingRepository), &fake, 2)
        .run(date(2024, 1, 10), 5, RunMode::Production)
        .await;

    assert!(result.is_err());
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_preview_does_not_notify() {
    let store = memory_service().await;
    seed(&store, vec![customer("Ivan Petrov", "0888000001", date(2024, 1, 12))]).await;

    let fake = Arc::new(FakeChannel::new());
    let classification = pipeline(Arc::new(store), &fake, 1)
        .preview(date(2024, 1, 10), 5)
        .await
        .unwrap();

    assert_eq!(classification.due_soon().count(), 1);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_lets_in_flight_finish() {
    let store = memory_service().await;
    let ids = seed(
        &store,
        (1..=4)
            .map(|i| customer(&format!("Customer {}", i), &format!("088800000{}", i), date(2024, 1, 12)))
            .collect(),
    )
    .await;

    // Una sola plaza: el primer envío ocupa el semáforo mientras llega la cancelación.
    let fake = Arc::new(FakeChannel::new().with_delay(Duration::from_millis(300)));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = cancel_tx.send(true);
    });

    let report = pipeline(Arc::new(store), &fake, 1)
        .run_with_cancel(date(2024, 1, 10), 5, RunMode::Production, cancel_rx)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.outcomes.len(), ids.len());

    let ids_in_report: Vec<i64> = report.outcomes.iter().map(|o| o.record_id).collect();
    assert_eq!(ids_in_report, ids);

    assert_eq!(report.outcomes[0].status, NotificationStatus::Sent);
    for outcome in &report.outcomes[1..] {
        assert_eq!(outcome.status, NotificationStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_CANCELLED));
    }
    assert_eq!(report.sent(), 1);
    assert_eq!(report.skipped(), 3);
    assert_eq!(fake.calls().len(), 1);
}
