// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STREAMPAY - CORE TYPES
//
// Ledger-side payment streams as seen by a client.
// - Stream records and caller-relative direction
// - Fixed-point token amounts (6 decimals, integer only)
// - Post-condition guards attached to every fund-moving call
// - Portfolio classification and aggregation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

pub mod amount;
pub mod intent;
pub mod portfolio;
pub mod postcondition;

pub use amount::{format_amount, parse_amount, AmountError};
pub use intent::{
    CallArg, ContractCall, CreateStreamParams, CreateWarning, IntervalUnit, MutationBuilder,
    PreconditionError, StreamContract, StreamOperation,
};
pub use portfolio::{
    classify, FetchOutcome, PortfolioSnapshot, PortfolioStats, RecordState, UserStream,
};
pub use postcondition::{
    AssetInfo, AssetTransfer, FungibleConditionCode, PostCondition, PostConditionMode,
    PostConditionViolation,
};

/// Fractional digits of the streamed token (USDCx).
pub const TOKEN_DECIMALS: u32 = 6;
/// Smallest units per whole token.
pub const MICRO_PER_TOKEN: u128 = 1_000_000;

/// Ledger blocks per hour / day, used when an interval is entered in wall-clock units.
pub const BLOCKS_PER_HOUR: u64 = 720;
pub const BLOCKS_PER_DAY: u64 = 17_280;

/// Identifiers per fetch window when scanning the ledger.
pub const DEFAULT_FETCH_WINDOW: usize = 20;
/// Largest stream counter a refresh will scan; anything above is treated as a bad response.
pub const MAX_STREAM_COUNTER: u64 = 1_000_000;
/// Seconds between periodic portfolio refreshes.
pub const DEFAULT_REFRESH_SECS: u64 = 30;

/// Dense, ledger-assigned stream identifier (first stream is 1).
pub type StreamId = u64;

/// Point-in-time copy of one stream as reported by the ledger.
///
/// `owed` is computed by the ledger and is never derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(default)]
    pub id: StreamId,
    pub sender: String,
    pub recipient: String,
    pub token: String,
    #[serde(with = "u128_flex")]
    pub rate: u128,
    #[serde(default = "default_interval", with = "u64_flex")]
    pub interval: u64,
    #[serde(with = "u128_flex")]
    pub deposit: u128,
    #[serde(with = "u128_flex")]
    pub withdrawn: u128,
    #[serde(with = "u128_flex")]
    pub owed: u128,
    #[serde(default, rename = "is-paused", alias = "paused", alias = "is_paused")]
    pub paused: bool,
}

fn default_interval() -> u64 {
    1
}

/// Caller's side of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Incoming => write!(f, "incoming"),
            Direction::Outgoing => write!(f, "outgoing"),
        }
    }
}

impl StreamRecord {
    /// Direction of this stream relative to `caller`, or `None` if the caller is
    /// neither party. Recipient wins for a self-stream.
    pub fn direction_for(&self, caller: &str) -> Option<Direction> {
        if self.recipient == caller {
            Some(Direction::Incoming)
        } else if self.sender == caller {
            Some(Direction::Outgoing)
        } else {
            None
        }
    }

    /// Deposit not yet withdrawn nor owed.
    pub fn remaining(&self) -> u128 {
        self.deposit
            .saturating_sub(self.withdrawn)
            .saturating_sub(self.owed)
    }

    pub fn is_active(&self) -> bool {
        !self.paused
    }
}

/// Serde adapter for u128 ↔ JSON: ledgers encode 128-bit integers as strings,
/// so accept either a string or a plain number and always emit a string.
pub mod u128_flex {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        struct U128Visitor;

        impl<'de> Visitor<'de> for U128Visitor {
            type Value = u128;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a u128 as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
                v.trim_start_matches('u').parse().map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
                Ok(v as u128)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<u128, E> {
                if v >= 0 {
                    Ok(v as u128)
                } else {
                    Err(E::custom("negative value for u128"))
                }
            }
        }

        d.deserialize_any(U128Visitor)
    }
}

/// Same as [`u128_flex`] for u64 fields.
pub mod u64_flex {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(val: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(*val)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        let wide = super::u128_flex::deserialize(d)?;
        u64::try_from(wide).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: StreamId, sender: &str, recipient: &str) -> StreamRecord {
    StreamRecord {
        id,
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        token: "ST30J9EZKY44SS1EBT8XNKJFA77Z4TSDBEMZ55MEJ.usdcx".to_string(),
        rate: 1_000,
        interval: 1,
        deposit: 1_000_000,
        withdrawn: 0,
        owed: 0,
        paused: false,
    }
}
