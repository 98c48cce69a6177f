//! Boundary to the external, authoritative ledger.
//!
//! Point reads only (counter, record by id, token balance) plus submission of
//! guarded calls. The ledger owns all stream state and accrual.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use streampay_core::{ContractCall, StreamId, StreamRecord};
use thiserror::Error;

/// Why the ledger refused a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    PostConditionFailed,
    Unauthorized,
    InsufficientBalance,
    InvalidState,
    Other,
}

impl RejectReason {
    /// Best-effort classification of a ledger rejection message.
    pub fn classify(msg: &str) -> Self {
        let lower = msg.to_ascii_lowercase();
        if lower.contains("post-condition") || lower.contains("postcondition") {
            Self::PostConditionFailed
        } else if lower.contains("unauthorized")
            || lower.contains("not authorized")
            || lower.contains("not-authorized")
        {
            Self::Unauthorized
        } else if lower.contains("insufficient") {
            Self::InsufficientBalance
        } else if lower.contains("paused")
            || lower.contains("cancelled")
            || lower.contains("not found")
            || lower.contains("nothing to withdraw")
            || lower.contains("invalid state")
        {
            Self::InvalidState
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PostConditionFailed => "post-condition failed",
            Self::Unauthorized => "unauthorized",
            Self::InsufficientBalance => "insufficient balance",
            Self::InvalidState => "invalid stream state",
            Self::Other => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Transport(String),
    #[error("ledger returned HTTP {0}")]
    Http(u16),
    #[error("malformed ledger response: {0}")]
    Malformed(String),
    /// Submission refused; `message` is the ledger's own text.
    #[error("{reason}: {message}")]
    Rejected {
        reason: RejectReason,
        message: String,
    },
}

impl LedgerError {
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Rejected {
            reason: RejectReason::classify(&message),
            message,
        }
    }
}

/// Handle of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub txid: String,
}

#[async_trait]
pub trait StreamLedger: Send + Sync {
    /// Highest identifier assigned so far; ids `1..=counter` are dense.
    async fn stream_counter(&self) -> Result<StreamId, LedgerError>;

    /// Current record under `id`, or `None` when nothing is stored there.
    async fn stream(&self, id: StreamId) -> Result<Option<StreamRecord>, LedgerError>;

    /// Balance of the streamed token held by `holder`, in smallest units.
    async fn token_balance(&self, holder: &str) -> Result<u128, LedgerError>;

    /// Execute `call` all-or-nothing, enforcing its post-conditions.
    async fn submit(&self, call: &ContractCall) -> Result<TxReceipt, LedgerError>;
}

#[async_trait]
impl<L: StreamLedger + ?Sized> StreamLedger for std::sync::Arc<L> {
    async fn stream_counter(&self) -> Result<StreamId, LedgerError> {
        (**self).stream_counter().await
    }

    async fn stream(&self, id: StreamId) -> Result<Option<StreamRecord>, LedgerError> {
        (**self).stream(id).await
    }

    async fn token_balance(&self, holder: &str) -> Result<u128, LedgerError> {
        (**self).token_balance(holder).await
    }

    async fn submit(&self, call: &ContractCall) -> Result<TxReceipt, LedgerError> {
        (**self).submit(call).await
    }
}
