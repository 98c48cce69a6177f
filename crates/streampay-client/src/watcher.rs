// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PORTFOLIO WATCHER
//
// Keeps the caller's portfolio current by rescanning the ledger on a timer
// and on demand. Each cycle takes a generation number and publishes only
// if nothing newer has published first. A caller change starts a new epoch:
// cycles from an older epoch stop fetching at the next window boundary and
// never publish. Periodic ticks are skipped while a cycle is in flight.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::ledger::{LedgerError, StreamLedger};
use crate::scheduler::scan;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use streampay_core::{PortfolioSnapshot, StreamId, MAX_STREAM_COUNTER};
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// What observers see.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchState {
    /// Latest published portfolio; `None` until a cycle completes for the
    /// current caller.
    pub snapshot: Option<PortfolioSnapshot>,
    /// True while any cycle is in flight.
    pub loading: bool,
    pub last_error: Option<String>,
    pub last_refresh: Option<DateTime<Utc>>,
    /// Generation that produced `snapshot`.
    pub generation: u64,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("no caller address set")]
    NoCaller,
    #[error("stream counter unavailable: {0}")]
    Counter(#[source] LedgerError),
    #[error("stream counter {0} exceeds the scan limit of {}", MAX_STREAM_COUNTER)]
    CounterOutOfRange(StreamId),
    #[error("refresh cycle {0} superseded")]
    Superseded(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub generation: u64,
    pub scanned: StreamId,
    pub streams: usize,
    pub unreachable: usize,
}

struct Shared {
    caller: Option<String>,
    in_flight: usize,
}

struct Inner {
    /// Last generation handed out.
    generation: AtomicU64,
    /// Bumped on every caller change.
    epoch: AtomicU64,
    shared: Mutex<Shared>,
    state: watch::Sender<WatchState>,
    wake: Notify,
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn in_flight(&self) -> usize {
        safe_lock(&self.shared).in_flight
    }
}

/// Marks a cycle in flight for as long as it lives.
struct InFlight<'a> {
    inner: &'a Inner,
}

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let mut shared = safe_lock(&inner.shared);
        shared.in_flight += 1;
        inner.state.send_modify(|s| s.loading = true);
        Self { inner }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut shared = safe_lock(&self.inner.shared);
        shared.in_flight = shared.in_flight.saturating_sub(1);
        let loading = shared.in_flight > 0;
        self.inner.state.send_modify(|s| s.loading = loading);
    }
}

pub struct PortfolioWatcher<L: StreamLedger + 'static> {
    ledger: Arc<L>,
    window: usize,
    inner: Arc<Inner>,
}

impl<L: StreamLedger + 'static> Clone for PortfolioWatcher<L> {
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            window: self.window,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: StreamLedger + 'static> PortfolioWatcher<L> {
    pub fn new(ledger: Arc<L>, window: usize) -> Self {
        let (state, _) = watch::channel(WatchState::default());
        Self {
            ledger,
            window: window.max(1),
            inner: Arc::new(Inner {
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                shared: Mutex::new(Shared {
                    caller: None,
                    in_flight: 0,
                }),
                state,
                wake: Notify::new(),
            }),
        }
    }

    pub fn caller(&self) -> Option<String> {
        safe_lock(&self.inner.shared).caller.clone()
    }

    /// Switch the caller. Cycles already running for the old caller will not
    /// publish; the previous snapshot is dropped and a refresh is requested.
    pub fn set_caller(&self, caller: Option<String>) {
        let caller = caller.filter(|c| !c.is_empty());
        {
            let mut shared = safe_lock(&self.inner.shared);
            if shared.caller == caller {
                return;
            }
            shared.caller = caller;
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
            self.inner.state.send_modify(|s| {
                s.snapshot = None;
                s.last_error = None;
            });
        }
        self.request_refresh();
    }

    /// Ask a spawned loop to run a cycle now.
    pub fn request_refresh(&self) {
        self.inner.wake.notify_one();
    }

    pub fn state(&self) -> WatchState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.inner.state.subscribe()
    }

    /// Run one full cycle: counter, windowed scan, classify, publish.
    pub async fn refresh(&self) -> Result<CycleReport, RefreshError> {
        let (caller, epoch, generation) = {
            let shared = safe_lock(&self.inner.shared);
            let caller = shared.caller.clone().ok_or(RefreshError::NoCaller)?;
            let epoch = self.inner.epoch.load(Ordering::SeqCst);
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (caller, epoch, generation)
        };
        let _flight = InFlight::enter(&self.inner);

        let counter = match self.ledger.stream_counter().await {
            Ok(counter) => counter,
            Err(e) => {
                log::warn!("refresh {}: counter lookup failed: {}", generation, e);
                let shared = safe_lock(&self.inner.shared);
                if self.inner.is_current(epoch) {
                    let msg = e.to_string();
                    self.inner.state.send_modify(|s| s.last_error = Some(msg));
                }
                drop(shared);
                return Err(RefreshError::Counter(e));
            }
        };

        if counter > MAX_STREAM_COUNTER {
            log::warn!("refresh {}: refusing to scan counter {}", generation, counter);
            let shared = safe_lock(&self.inner.shared);
            if self.inner.is_current(epoch) {
                let msg = RefreshError::CounterOutOfRange(counter).to_string();
                self.inner.state.send_modify(|s| s.last_error = Some(msg));
            }
            drop(shared);
            return Err(RefreshError::CounterOutOfRange(counter));
        }

        let inner = &self.inner;
        let outcomes = scan(self.ledger.as_ref(), counter, self.window, || {
            inner.is_current(epoch)
        })
        .await
        .ok_or(RefreshError::Superseded(generation))?;

        let snapshot = PortfolioSnapshot::build(&caller, counter, &outcomes);
        let report = CycleReport {
            generation,
            scanned: counter,
            streams: snapshot.streams.len(),
            unreachable: snapshot.unreachable.len(),
        };

        let shared = safe_lock(&self.inner.shared);
        let stale = !self.inner.is_current(epoch)
            || shared.caller.as_deref() != Some(caller.as_str())
            || generation <= self.inner.state.borrow().generation;
        if stale {
            log::debug!("refresh {}: discarded stale result", generation);
            return Err(RefreshError::Superseded(generation));
        }
        self.inner.state.send_modify(|s| {
            s.snapshot = Some(snapshot);
            s.last_error = None;
            s.last_refresh = Some(Utc::now());
            s.generation = generation;
        });
        drop(shared);

        log::info!(
            "refresh {}: scanned {} ids, {} streams for caller, {} unreachable",
            generation,
            report.scanned,
            report.streams,
            report.unreachable
        );
        Ok(report)
    }

    /// Periodic loop plus on-demand triggers. Every cycle runs on its own task
    /// so a trigger never waits for a slow scan. A tick that lands while a
    /// cycle is still running is dropped.
    pub fn spawn(&self, period: Duration) -> JoinHandle<()> {
        let watcher = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if watcher.inner.in_flight() > 0 {
                            log::debug!("tick skipped: refresh in flight");
                            continue;
                        }
                    }
                    _ = watcher.inner.wake.notified() => {}
                }
                let cycle = watcher.clone();
                tokio::spawn(async move {
                    match cycle.refresh().await {
                        Ok(_) => {}
                        Err(RefreshError::NoCaller) => log::debug!("refresh skipped: no caller"),
                        Err(RefreshError::Superseded(g)) => log::debug!("refresh {} superseded", g),
                        Err(e) => log::warn!("refresh failed: {}", e),
                    }
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use streampay_core::{AssetInfo, StreamContract, StreamRecord};

    fn ledger() -> Arc<MemoryLedger> {
        Arc::new(MemoryLedger::new(StreamContract {
            contract: "ST1DEPLOYER.streams".to_string(),
            token: AssetInfo::new("ST1DEPLOYER.usdcx", "usdcx-token"),
        }))
    }

    fn seed(ledger: &MemoryLedger, sender: &str, recipient: &str, owed: u128) {
        let id = ledger.insert_stream(StreamRecord {
            id: 0,
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            token: "ST1DEPLOYER.usdcx".to_string(),
            rate: 10,
            interval: 1,
            deposit: 1_000,
            withdrawn: 0,
            owed: 0,
            paused: false,
        });
        ledger.set_owed(id, owed);
    }

    #[tokio::test]
    async fn test_no_caller_publishes_nothing() {
        let watcher = PortfolioWatcher::new(ledger(), 20);
        assert!(matches!(watcher.refresh().await, Err(RefreshError::NoCaller)));
        let state = watcher.state();
        assert!(state.snapshot.is_none());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 40);
        seed(&ledger, "ST1BOB", "ST1CAROL", 5);
        seed(&ledger, "ST1ALICE", "ST1CAROL", 0);
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 2);
        watcher.set_caller(Some("ST1BOB".to_string()));

        let report = watcher.refresh().await.unwrap();
        assert_eq!(report.scanned, 3);
        assert_eq!(report.streams, 2);

        let state = watcher.state();
        let snap = state.snapshot.unwrap();
        assert_eq!(snap.stats.incoming_count, 1);
        assert_eq!(snap.stats.outgoing_count, 1);
        assert_eq!(snap.stats.available_to_withdraw, 40);
        assert!(state.last_refresh.is_some());
        assert_eq!(state.generation, report.generation);
    }

    #[tokio::test]
    async fn test_counter_failure_keeps_previous_snapshot() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 40);
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
        watcher.set_caller(Some("ST1BOB".to_string()));
        watcher.refresh().await.unwrap();
        let before = watcher.state().snapshot;

        ledger.set_counter_down(true);
        assert!(matches!(
            watcher.refresh().await,
            Err(RefreshError::Counter(_))
        ));
        let state = watcher.state();
        assert_eq!(state.snapshot, before);
        assert!(state.last_error.is_some());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_caller_change_discards_in_flight_cycle() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 40);
        ledger.set_read_delay(Duration::from_millis(50));
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
        watcher.set_caller(Some("ST1BOB".to_string()));

        let slow = watcher.clone();
        let first = tokio::spawn(async move { slow.refresh().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(watcher.state().loading);

        watcher.set_caller(Some("ST1ALICE".to_string()));
        let second = watcher.refresh().await.unwrap();
        assert!(matches!(
            first.await.unwrap(),
            Err(RefreshError::Superseded(_))
        ));

        let state = watcher.state();
        let snap = state.snapshot.unwrap();
        assert_eq!(snap.caller, "ST1ALICE");
        assert_eq!(state.generation, second.generation);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_set_same_caller_is_noop() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 1);
        let watcher = PortfolioWatcher::new(ledger, 20);
        watcher.set_caller(Some("ST1BOB".to_string()));
        watcher.refresh().await.unwrap();
        watcher.set_caller(Some("ST1BOB".to_string()));
        assert!(watcher.state().snapshot.is_some());
    }

    #[tokio::test]
    async fn test_oversized_counter_is_cycle_error() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 1);
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 20);
        watcher.set_caller(Some("ST1BOB".to_string()));
        watcher.refresh().await.unwrap();

        ledger.set_counter_override(Some(StreamId::MAX));
        assert!(matches!(
            watcher.refresh().await,
            Err(RefreshError::CounterOutOfRange(c)) if c == StreamId::MAX
        ));
        let state = watcher.state();
        assert!(state.snapshot.is_some());
        assert!(state.last_error.is_some());
        assert!(!state.loading);
        assert_eq!(ledger.record_reads(), 1);
    }

    #[tokio::test]
    async fn test_older_cycle_finishing_late_is_discarded() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 3);
        seed(&ledger, "ST1ALICE", "ST1BOB", 4);
        ledger.set_read_delay(Duration::from_millis(60));
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 1);
        watcher.set_caller(Some("ST1BOB".to_string()));

        let slow = watcher.clone();
        let first = tokio::spawn(async move { slow.refresh().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        ledger.set_read_delay(Duration::ZERO);
        let second = watcher.refresh().await.unwrap();

        assert!(matches!(
            first.await.unwrap(),
            Err(RefreshError::Superseded(_))
        ));
        let state = watcher.state();
        assert_eq!(state.generation, second.generation);
        assert!(!state.loading);
        // Same caller: the older cycle was allowed to finish its scan.
        assert_eq!(ledger.record_reads(), 4);
    }

    #[tokio::test]
    async fn test_scan_slower_than_period_still_publishes() {
        let ledger = ledger();
        for owed in 1..=5 {
            seed(&ledger, "ST1ALICE", "ST1BOB", owed);
        }
        ledger.set_read_delay(Duration::from_millis(50));
        let watcher = PortfolioWatcher::new(Arc::clone(&ledger), 1);
        watcher.set_caller(Some("ST1BOB".to_string()));
        let mut rx = watcher.subscribe();
        let handle = watcher.spawn(Duration::from_millis(100));

        let published = tokio::time::timeout(
            Duration::from_secs(2),
            rx.wait_for(|s| s.snapshot.is_some()),
        )
        .await
        .map(|r| r.is_ok());
        assert_eq!(published, Ok(true));
        handle.abort();

        let snap = watcher.state().snapshot.unwrap();
        assert_eq!(snap.stats.incoming_count, 5);
        assert_eq!(snap.stats.available_to_withdraw, 15);
    }

    #[tokio::test]
    async fn test_spawned_loop_refreshes_on_start() {
        let ledger = ledger();
        seed(&ledger, "ST1ALICE", "ST1BOB", 1);
        let watcher = PortfolioWatcher::new(ledger, 20);
        watcher.set_caller(Some("ST1BOB".to_string()));
        let mut rx = watcher.subscribe();
        let handle = watcher.spawn(Duration::from_secs(3600));

        let published = tokio::time::timeout(
            Duration::from_secs(5),
            rx.wait_for(|s| s.snapshot.is_some()),
        )
        .await
        .map(|r| r.is_ok());
        assert_eq!(published, Ok(true));
        handle.abort();
    }
}
