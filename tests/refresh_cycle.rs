// ============================================================================
// REFRESH CYCLE - portfolio watcher against the in-process ledger
// ============================================================================
//
// Scenarios:
//   1. Reference portfolio (mixed directions, paused, unrelated streams)
//   2. Windowed scan reads every id exactly once
//   3. One unreachable id does not hide the rest
//   4. Counter outage keeps the previous snapshot
//   5. A newer cycle wins over an older, slower one
//   6. A caller change stops the old scan at a window boundary
//   7. A scan slower than the refresh period still publishes
//   8. Background loop picks up a stream created after it started
//
// Run:
//   cargo test --test refresh_cycle
//
// ============================================================================

use std::sync::Arc;
use std::time::Duration;
use streampay_client::{
    AutoApprove, PortfolioWatcher, RefreshError, StreamActions, StreamLedger,
};
use streampay_integration_tests::{ledger, seed, usdcx_target};

#[tokio::test]
async fn reference_portfolio() {
    let ledger = ledger();
    for _ in 1..=6 {
        seed(&ledger, "SP_X", "SP_Y", 100, 0, 0, false);
    }
    seed(&ledger, "SP_X", "SP_A", 1_000_000, 200_000, 50_000, false);
    seed(&ledger, "SP_X", "SP_Y", 100, 0, 0, false);
    seed(&ledger, "SP_A", "SP_Y", 500_000, 500_000, 0, true);

    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
    watcher.set_caller(Some("SP_A".to_string()));
    watcher.refresh().await.unwrap();

    let snap = watcher.state().snapshot.unwrap();
    assert_eq!(snap.scanned, 9);
    assert_eq!(snap.streams.len(), 2);
    assert_eq!(snap.stats.active_count, 1);
    assert_eq!(snap.stats.incoming_count, 1);
    assert_eq!(snap.stats.outgoing_count, 0);
    assert_eq!(snap.stats.total_streamed, 700_000);
    assert_eq!(snap.stats.available_to_withdraw, 50_000);
}

#[tokio::test]
async fn scan_reads_every_id_once() {
    let ledger = ledger();
    for i in 0..45 {
        let sender = if i % 3 == 0 { "SP_ME" } else { "SP_OTHER" };
        seed(&ledger, sender, "SP_Y", 100, 0, 0, false);
    }
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
    watcher.set_caller(Some("SP_ME".to_string()));
    let report = watcher.refresh().await.unwrap();

    assert_eq!(report.scanned, 45);
    assert_eq!(report.streams, 15);
    assert_eq!(ledger.record_reads(), 45);
}

#[tokio::test]
async fn unreachable_id_does_not_hide_later_ids() {
    let ledger = ledger();
    for _ in 0..5 {
        seed(&ledger, "SP_X", "SP_ME", 100, 0, 10, false);
    }
    ledger.set_unreachable(2, true);

    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 2);
    watcher.set_caller(Some("SP_ME".to_string()));
    let report = watcher.refresh().await.unwrap();

    assert_eq!(report.unreachable, 1);
    let snap = watcher.state().snapshot.unwrap();
    assert_eq!(snap.unreachable, vec![2]);
    assert_eq!(
        snap.streams.iter().map(|s| s.record.id).collect::<Vec<_>>(),
        vec![1, 3, 4, 5]
    );
    assert_eq!(snap.stats.available_to_withdraw, 40);
}

#[tokio::test]
async fn counter_outage_keeps_previous_snapshot() {
    let ledger = ledger();
    seed(&ledger, "SP_X", "SP_ME", 100, 0, 10, false);
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
    watcher.set_caller(Some("SP_ME".to_string()));
    watcher.refresh().await.unwrap();

    seed(&ledger, "SP_X", "SP_ME", 100, 0, 10, false);
    ledger.set_counter_down(true);
    assert!(matches!(
        watcher.refresh().await,
        Err(RefreshError::Counter(_))
    ));

    let state = watcher.state();
    assert_eq!(state.snapshot.unwrap().streams.len(), 1);
    assert!(state.last_error.is_some());

    ledger.set_counter_down(false);
    watcher.refresh().await.unwrap();
    let state = watcher.state();
    assert_eq!(state.snapshot.unwrap().streams.len(), 2);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn newer_cycle_wins() {
    let ledger = ledger();
    for _ in 0..3 {
        seed(&ledger, "SP_X", "SP_ME", 100, 0, 1, false);
    }
    ledger.set_read_delay(Duration::from_millis(40));
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 1);
    watcher.set_caller(Some("SP_ME".to_string()));

    let older = watcher.clone();
    let first = tokio::spawn(async move { older.refresh().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    ledger.set_read_delay(Duration::ZERO);
    let second = watcher.refresh().await.unwrap();

    // The older cycle finishes after the newer one has published.
    assert!(matches!(
        first.await.unwrap(),
        Err(RefreshError::Superseded(_))
    ));
    let state = watcher.state();
    assert_eq!(state.generation, second.generation);
    assert!(!state.loading);
}

#[tokio::test]
async fn caller_change_stops_old_scan_early() {
    let ledger = ledger();
    for _ in 0..3 {
        seed(&ledger, "SP_X", "SP_ME", 100, 0, 1, false);
    }
    ledger.set_read_delay(Duration::from_millis(40));
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 1);
    watcher.set_caller(Some("SP_ME".to_string()));

    let older = watcher.clone();
    let first = tokio::spawn(async move { older.refresh().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    watcher.set_caller(Some("SP_X".to_string()));

    assert!(matches!(
        first.await.unwrap(),
        Err(RefreshError::Superseded(_))
    ));
    // Stopped at its first window boundary.
    assert_eq!(ledger.record_reads(), 1);
    assert!(watcher.state().snapshot.is_none());
}

#[tokio::test]
async fn slow_scan_publishes_under_short_period() {
    let ledger = ledger();
    for _ in 0..5 {
        seed(&ledger, "SP_X", "SP_ME", 100, 0, 2, false);
    }
    ledger.set_read_delay(Duration::from_millis(50));
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 1);
    watcher.set_caller(Some("SP_ME".to_string()));
    let mut updates = watcher.subscribe();
    let task = watcher.spawn(Duration::from_millis(100));

    let published = tokio::time::timeout(
        Duration::from_secs(2),
        updates.wait_for(|s| s.snapshot.is_some()),
    )
    .await
    .map(|r| r.is_ok());
    task.abort();
    assert_eq!(published, Ok(true));
    assert_eq!(
        watcher.state().snapshot.unwrap().stats.available_to_withdraw,
        10
    );
}

#[tokio::test]
async fn background_loop_sees_new_stream() {
    let ledger = ledger();
    ledger.credit("SP_ALICE", 50_000_000);
    let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
    watcher.set_caller(Some("SP_ALICE".to_string()));
    let mut updates = watcher.subscribe();
    let task = watcher.spawn(Duration::from_secs(3600));

    let first = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.snapshot.is_some()),
    )
    .await
    .map(|r| r.is_ok());
    assert_eq!(first, Ok(true));

    let actions = StreamActions::new(
        Arc::clone(&ledger),
        usdcx_target(),
        "SP_ALICE",
        Arc::new(AutoApprove),
    );
    actions.create("SP_BOB", "1", "10", 720).await.unwrap();
    assert_eq!(ledger.stream_counter().await.unwrap(), 1);
    watcher.request_refresh();

    let updated = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| {
            s.snapshot
                .as_ref()
                .map(|snap| snap.stats.outgoing_count == 1)
                .unwrap_or(false)
        }),
    )
    .await
    .map(|r| r.is_ok());
    assert_eq!(updated, Ok(true));
    task.abort();
}
