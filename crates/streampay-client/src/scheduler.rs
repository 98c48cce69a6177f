//! Windowed scan of the dense identifier range `1..=counter`.
//!
//! Windows run one after another; lookups inside a window run concurrently.
//! A failed lookup becomes [`FetchOutcome::unreachable`] and never aborts the
//! window or the scan.

use crate::ledger::StreamLedger;
use futures::future::join_all;
use std::ops::RangeInclusive;
use streampay_core::{FetchOutcome, StreamId};

const CAPACITY_HINT: StreamId = 1_024;

/// Split `1..=counter` into consecutive windows of at most `size` ids.
/// Windows are produced lazily.
pub fn fetch_windows(
    counter: StreamId,
    size: usize,
) -> impl Iterator<Item = RangeInclusive<StreamId>> {
    let size = size.max(1);
    let span = size as StreamId - 1;
    (1..=counter)
        .step_by(size)
        .map(move |start| start..=start.saturating_add(span).min(counter))
}

fn window_count(counter: StreamId, size: usize) -> StreamId {
    let size = size.max(1) as StreamId;
    counter / size + StreamId::from(counter % size != 0)
}

pub async fn fetch_record<L: StreamLedger + ?Sized>(ledger: &L, id: StreamId) -> FetchOutcome {
    match ledger.stream(id).await {
        Ok(Some(record)) => FetchOutcome::present(record, id),
        Ok(None) => FetchOutcome::unset(id),
        Err(e) => {
            log::warn!("stream #{} unreachable: {}", id, e);
            FetchOutcome::unreachable(id, e.to_string())
        }
    }
}

/// Fetch every id in `1..=counter`, in id order.
///
/// `still_current` is consulted before each window; once it returns false no
/// further lookups are issued and `None` is returned.
pub async fn scan<L, F>(
    ledger: &L,
    counter: StreamId,
    window: usize,
    still_current: F,
) -> Option<Vec<FetchOutcome>>
where
    L: StreamLedger + ?Sized,
    F: Fn() -> bool,
{
    let total = window_count(counter, window);
    let mut outcomes = Vec::with_capacity(counter.min(CAPACITY_HINT) as usize);
    for (n, ids) in fetch_windows(counter, window).enumerate() {
        if !still_current() {
            log::debug!("scan superseded after {}/{} windows", n, total);
            return None;
        }
        log::debug!("window {}/{}: ids {}..={}", n + 1, total, ids.start(), ids.end());
        let batch = join_all(ids.map(|id| fetch_record(ledger, id))).await;
        outcomes.extend(batch);
    }
    Some(outcomes)
}
