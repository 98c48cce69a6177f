//! Caller-relative view over one scan of the ledger.
//!
//! A scan yields one [`FetchOutcome`] per identifier. Absent outcomes are
//! dropped, records not involving the caller are dropped, the rest are tagged
//! with a [`Direction`] and folded into [`PortfolioStats`]. Ledger-reported
//! amounts are summed verbatim.

use crate::{Direction, StreamId, StreamRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum RecordState {
    Present(StreamRecord),
    /// The ledger has nothing stored under this id.
    Unset,
    /// The lookup failed; the id may well exist.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub id: StreamId,
    pub state: RecordState,
}

impl FetchOutcome {
    pub fn present(mut record: StreamRecord, id: StreamId) -> Self {
        record.id = id;
        Self {
            id,
            state: RecordState::Present(record),
        }
    }

    pub fn unset(id: StreamId) -> Self {
        Self {
            id,
            state: RecordState::Unset,
        }
    }

    pub fn unreachable(id: StreamId, reason: impl Into<String>) -> Self {
        Self {
            id,
            state: RecordState::Unreachable(reason.into()),
        }
    }

    pub fn record(&self) -> Option<&StreamRecord> {
        match &self.state {
            RecordState::Present(r) => Some(r),
            _ => None,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self.state, RecordState::Unreachable(_))
    }
}

/// A stream the caller is party to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStream {
    #[serde(flatten)]
    pub record: StreamRecord,
    pub direction: Direction,
}

/// Keep only the caller's streams, in the order given.
pub fn classify(outcomes: &[FetchOutcome], caller: &str) -> Vec<UserStream> {
    outcomes
        .iter()
        .filter_map(FetchOutcome::record)
        .filter_map(|record| {
            record.direction_for(caller).map(|direction| UserStream {
                record: record.clone(),
                direction,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioStats {
    /// Non-paused streams.
    pub active_count: usize,
    /// Non-paused streams paying the caller.
    pub incoming_count: usize,
    /// Non-paused streams paid by the caller.
    pub outgoing_count: usize,
    /// Sum of `withdrawn` over every stream, paused or not.
    #[serde(with = "crate::u128_flex")]
    pub total_streamed: u128,
    /// Sum of `owed` over non-paused incoming streams.
    #[serde(with = "crate::u128_flex")]
    pub available_to_withdraw: u128,
}

impl PortfolioStats {
    pub fn from_streams(streams: &[UserStream]) -> Self {
        streams.iter().fold(Self::default(), |mut stats, s| {
            stats.total_streamed = stats.total_streamed.saturating_add(s.record.withdrawn);
            if s.record.is_active() {
                stats.active_count += 1;
                match s.direction {
                    Direction::Incoming => {
                        stats.incoming_count += 1;
                        stats.available_to_withdraw =
                            stats.available_to_withdraw.saturating_add(s.record.owed);
                    }
                    Direction::Outgoing => stats.outgoing_count += 1,
                }
            }
            stats
        })
    }
}

/// Everything one refresh cycle learned about the caller. Rebuilt from scratch
/// every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub caller: String,
    /// Ledger counter the scan covered (`1..=scanned`).
    pub scanned: StreamId,
    pub streams: Vec<UserStream>,
    pub stats: PortfolioStats,
    /// Ids whose lookup failed this cycle.
    pub unreachable: Vec<StreamId>,
}

impl PortfolioSnapshot {
    pub fn build(caller: &str, scanned: StreamId, outcomes: &[FetchOutcome]) -> Self {
        let streams = classify(outcomes, caller);
        let stats = PortfolioStats::from_streams(&streams);
        let unreachable = outcomes
            .iter()
            .filter(|o| o.is_unreachable())
            .map(|o| o.id)
            .collect();
        Self {
            caller: caller.to_string(),
            scanned,
            streams,
            stats,
            unreachable,
        }
    }

    pub fn empty(caller: &str) -> Self {
        Self::build(caller, 0, &[])
    }

    pub fn incoming(&self) -> impl Iterator<Item = &UserStream> {
        self.streams
            .iter()
            .filter(|s| s.direction == Direction::Incoming)
    }

    pub fn outgoing(&self) -> impl Iterator<Item = &UserStream> {
        self.streams
            .iter()
            .filter(|s| s.direction == Direction::Outgoing)
    }

    pub fn find(&self, id: StreamId) -> Option<&UserStream> {
        self.streams.iter().find(|s| s.record.id == id)
    }

    /// True when every id in range was either read or confirmed unset.
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }
}
