// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GUARDED MUTATIONS - the six fund-moving stream calls
//
// Each builder method validates caller-side preconditions, then emits a
// ContractCall carrying the post-conditions the ledger must enforce:
//   create / top-up   caller sends exactly the amount entered
//   withdraw          streaming contract sends more than zero
//   pause / cancel    streaming contract sends at least zero
//   resume            no guard
// Every call is submitted in Deny mode.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::postcondition::{AssetInfo, PostCondition, PostConditionMode};
use crate::{StreamId, StreamRecord, BLOCKS_PER_DAY, BLOCKS_PER_HOUR, MICRO_PER_TOKEN};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rates above this many whole tokens per interval draw a warning.
pub const RATE_WARNING_TOKENS: u128 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("recipient address is required")]
    MissingRecipient,
    #[error("rate must be greater than 0")]
    ZeroRate,
    #[error("deposit must be greater than 0")]
    ZeroDeposit,
    #[error("payment interval must be at least 1 block")]
    ZeroInterval,
    #[error("deposit ({deposit}) must cover at least one interval payment ({rate})")]
    DepositBelowRate { deposit: u128, rate: u128 },
    #[error("top-up amount must be greater than 0")]
    ZeroTopUp,
    #[error("stream #{0} has nothing to withdraw")]
    NothingOwed(StreamId),
}

/// Non-fatal observations about a create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateWarning {
    /// Deposit covers fewer than two intervals.
    SingleInterval,
    /// Rate exceeds [`RATE_WARNING_TOKENS`] per interval.
    RateAboveCap,
}

impl std::fmt::Display for CreateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SingleInterval => write!(f, "this stream will last only one interval"),
            Self::RateAboveCap => write!(
                f,
                "rate exceeds {} tokens per interval",
                RATE_WARNING_TOKENS
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Blocks,
    Hours,
    Days,
}

impl IntervalUnit {
    /// Ledger blocks for `value` of this unit.
    pub fn to_blocks(self, value: u64) -> u64 {
        match self {
            IntervalUnit::Blocks => value,
            IntervalUnit::Hours => value.saturating_mul(BLOCKS_PER_HOUR),
            IntervalUnit::Days => value.saturating_mul(BLOCKS_PER_DAY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStreamParams {
    pub recipient: String,
    /// Smallest units released per interval.
    #[serde(with = "crate::u128_flex")]
    pub rate: u128,
    /// Smallest units committed up front.
    #[serde(with = "crate::u128_flex")]
    pub deposit: u128,
    /// Ledger blocks between releases.
    pub interval: u64,
}

impl CreateStreamParams {
    pub fn validate(&self) -> Result<Vec<CreateWarning>, PreconditionError> {
        if self.recipient.trim().is_empty() {
            return Err(PreconditionError::MissingRecipient);
        }
        if self.rate == 0 {
            return Err(PreconditionError::ZeroRate);
        }
        if self.deposit == 0 {
            return Err(PreconditionError::ZeroDeposit);
        }
        if self.interval == 0 {
            return Err(PreconditionError::ZeroInterval);
        }
        if self.deposit < self.rate {
            return Err(PreconditionError::DepositBelowRate {
                deposit: self.deposit,
                rate: self.rate,
            });
        }

        let mut warnings = Vec::new();
        if self.deposit < self.rate.saturating_mul(2) {
            warnings.push(CreateWarning::SingleInterval);
        }
        if self.rate > RATE_WARNING_TOKENS * MICRO_PER_TOKEN {
            warnings.push(CreateWarning::RateAboveCap);
        }
        Ok(warnings)
    }
}

/// The intent behind a call, kept alongside the encoded arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum StreamOperation {
    Create(CreateStreamParams),
    Withdraw { stream_id: StreamId },
    Pause { stream_id: StreamId },
    Resume { stream_id: StreamId },
    TopUp {
        stream_id: StreamId,
        #[serde(with = "crate::u128_flex")]
        amount: u128,
    },
    Cancel { stream_id: StreamId },
}

impl StreamOperation {
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create-stream",
            Self::Withdraw { .. } => "withdraw-from-stream",
            Self::Pause { .. } => "pause-stream",
            Self::Resume { .. } => "resume-stream",
            Self::TopUp { .. } => "top-up-stream",
            Self::Cancel { .. } => "cancel-stream",
        }
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        match self {
            Self::Create(_) => None,
            Self::Withdraw { stream_id }
            | Self::Pause { stream_id }
            | Self::Resume { stream_id }
            | Self::TopUp { stream_id, .. }
            | Self::Cancel { stream_id } => Some(*stream_id),
        }
    }

    /// Operations the ledger only accepts from the stream's sender.
    pub fn sender_only(&self) -> bool {
        matches!(
            self,
            Self::Pause { .. } | Self::Resume { .. } | Self::TopUp { .. } | Self::Cancel { .. }
        )
    }
}

/// Typed argument as the ledger expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum CallArg {
    Uint(#[serde(with = "crate::u128_flex")] u128),
    Principal(String),
    ContractPrincipal(String),
}

/// A fully-specified ledger call ready for signing and submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract: String,
    pub function: String,
    pub caller: String,
    pub args: Vec<CallArg>,
    pub post_conditions: Vec<PostCondition>,
    pub mode: PostConditionMode,
    pub operation: StreamOperation,
}

/// Where streams live and what they stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamContract {
    /// Streaming contract principal (`ADDR.name`).
    pub contract: String,
    pub token: AssetInfo,
}

#[derive(Debug, Clone)]
pub struct MutationBuilder {
    target: StreamContract,
}

impl MutationBuilder {
    pub fn new(target: StreamContract) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &StreamContract {
        &self.target
    }

    /// Sender commits exactly `deposit`.
    pub fn create(
        &self,
        sender: &str,
        params: CreateStreamParams,
    ) -> Result<ContractCall, PreconditionError> {
        params.validate()?;
        let guard = vec![PostCondition::sends_eq(sender, params.deposit, &self.target.token)];
        let args = vec![
            CallArg::Principal(params.recipient.clone()),
            CallArg::Uint(params.rate),
            CallArg::Uint(params.deposit),
            CallArg::Uint(params.interval as u128),
            self.token_arg(),
        ];
        Ok(self.call(sender, StreamOperation::Create(params), args, guard))
    }

    /// Contract pays the recipient something. Refused locally when the ledger last
    /// reported nothing owed.
    pub fn withdraw(
        &self,
        caller: &str,
        record: &StreamRecord,
    ) -> Result<ContractCall, PreconditionError> {
        if record.owed == 0 {
            return Err(PreconditionError::NothingOwed(record.id));
        }
        let guard = vec![PostCondition::sends_gt(
            &self.target.contract,
            0,
            &self.target.token,
        )];
        Ok(self.call(
            caller,
            StreamOperation::Withdraw {
                stream_id: record.id,
            },
            self.id_args(record.id),
            guard,
        ))
    }

    pub fn pause(&self, caller: &str, stream_id: StreamId) -> ContractCall {
        let guard = vec![self.contract_sends_nonnegative()];
        self.call(
            caller,
            StreamOperation::Pause { stream_id },
            self.id_args(stream_id),
            guard,
        )
    }

    pub fn resume(&self, caller: &str, stream_id: StreamId) -> ContractCall {
        self.call(
            caller,
            StreamOperation::Resume { stream_id },
            vec![CallArg::Uint(stream_id as u128)],
            Vec::new(),
        )
    }

    /// Sender adds exactly `amount` to the deposit.
    pub fn top_up(
        &self,
        caller: &str,
        stream_id: StreamId,
        amount: u128,
    ) -> Result<ContractCall, PreconditionError> {
        if amount == 0 {
            return Err(PreconditionError::ZeroTopUp);
        }
        let guard = vec![PostCondition::sends_eq(caller, amount, &self.target.token)];
        let args = vec![
            CallArg::Uint(stream_id as u128),
            CallArg::Uint(amount),
            self.token_arg(),
        ];
        Ok(self.call(
            caller,
            StreamOperation::TopUp { stream_id, amount },
            args,
            guard,
        ))
    }

    /// Final owed amount is paid out as part of the cancellation.
    pub fn cancel(&self, caller: &str, stream_id: StreamId) -> ContractCall {
        let guard = vec![self.contract_sends_nonnegative()];
        self.call(
            caller,
            StreamOperation::Cancel { stream_id },
            self.id_args(stream_id),
            guard,
        )
    }

    fn contract_sends_nonnegative(&self) -> PostCondition {
        PostCondition::sends_ge(&self.target.contract, 0, &self.target.token)
    }

    fn token_arg(&self) -> CallArg {
        CallArg::ContractPrincipal(self.target.token.contract.clone())
    }

    fn id_args(&self, stream_id: StreamId) -> Vec<CallArg> {
        vec![CallArg::Uint(stream_id as u128), self.token_arg()]
    }

    fn call(
        &self,
        caller: &str,
        operation: StreamOperation,
        args: Vec<CallArg>,
        post_conditions: Vec<PostCondition>,
    ) -> ContractCall {
        ContractCall {
            contract: self.target.contract.clone(),
            function: operation.function_name().to_string(),
            caller: caller.to_string(),
            args,
            post_conditions,
            mode: PostConditionMode::Deny,
            operation,
        }
    }
}
