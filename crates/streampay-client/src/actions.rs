//! User-facing mutation entry points.
//!
//! Amounts arrive as human decimal strings and are converted before any call
//! is built. Every call goes past an [`Approver`] (the signing step) and is
//! submitted at most once; failures are reported, never retried.

use crate::ledger::{LedgerError, StreamLedger, TxReceipt};
use async_trait::async_trait;
use std::sync::Arc;
use streampay_core::{
    parse_amount, AmountError, ContractCall, CreateStreamParams, CreateWarning, MutationBuilder,
    PreconditionError, StreamContract, StreamId, StreamRecord,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approved,
    Declined,
}

/// Last look at a guarded call before it leaves the client.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, call: &ContractCall, warnings: &[CreateWarning]) -> Approval;
}

/// Signs everything; for scripted use.
pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _call: &ContractCall, _warnings: &[CreateWarning]) -> Approval {
        Approval::Approved
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Submitted(TxReceipt),
    /// The signer declined. Nothing was sent.
    Aborted,
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid {field}: {source}")]
    Amount {
        field: &'static str,
        #[source]
        source: AmountError,
    },
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("stream #{0} not found")]
    UnknownStream(StreamId),
    #[error("transaction failed: {0}")]
    Ledger(#[from] LedgerError),
}

fn amount(field: &'static str, input: &str) -> Result<u128, ActionError> {
    parse_amount(input).map_err(|source| ActionError::Amount { field, source })
}

pub struct StreamActions<L: StreamLedger> {
    ledger: Arc<L>,
    builder: MutationBuilder,
    caller: String,
    approver: Arc<dyn Approver>,
}

impl<L: StreamLedger> StreamActions<L> {
    pub fn new(
        ledger: Arc<L>,
        target: StreamContract,
        caller: impl Into<String>,
        approver: Arc<dyn Approver>,
    ) -> Self {
        Self {
            ledger,
            builder: MutationBuilder::new(target),
            caller: caller.into(),
            approver,
        }
    }

    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Current ledger record, for callers that only have an id.
    pub async fn lookup(&self, stream_id: StreamId) -> Result<StreamRecord, ActionError> {
        self.ledger
            .stream(stream_id)
            .await?
            .ok_or(ActionError::UnknownStream(stream_id))
    }

    /// Build the create call without sending it.
    pub fn plan_create(
        &self,
        recipient: &str,
        rate: &str,
        deposit: &str,
        interval: u64,
    ) -> Result<(ContractCall, Vec<CreateWarning>), ActionError> {
        let params = CreateStreamParams {
            recipient: recipient.trim().to_string(),
            rate: amount("rate", rate)?,
            deposit: amount("deposit", deposit)?,
            interval,
        };
        let warnings = params.validate()?;
        let call = self.builder.create(&self.caller, params)?;
        Ok((call, warnings))
    }

    pub async fn create(
        &self,
        recipient: &str,
        rate: &str,
        deposit: &str,
        interval: u64,
    ) -> Result<MutationOutcome, ActionError> {
        let (call, warnings) = self.plan_create(recipient, rate, deposit, interval)?;
        for w in &warnings {
            log::warn!("create stream: {}", w);
        }
        self.dispatch(call, &warnings).await
    }

    /// `record` is the ledger's last report; nothing is sent when it shows
    /// zero owed.
    pub async fn withdraw(&self, record: &StreamRecord) -> Result<MutationOutcome, ActionError> {
        let call = self.builder.withdraw(&self.caller, record)?;
        self.dispatch(call, &[]).await
    }

    pub async fn pause(&self, stream_id: StreamId) -> Result<MutationOutcome, ActionError> {
        let call = self.builder.pause(&self.caller, stream_id);
        self.dispatch(call, &[]).await
    }

    pub async fn resume(&self, stream_id: StreamId) -> Result<MutationOutcome, ActionError> {
        let call = self.builder.resume(&self.caller, stream_id);
        self.dispatch(call, &[]).await
    }

    pub async fn top_up(
        &self,
        stream_id: StreamId,
        amount_str: &str,
    ) -> Result<MutationOutcome, ActionError> {
        let call = self
            .builder
            .top_up(&self.caller, stream_id, amount("amount", amount_str)?)?;
        self.dispatch(call, &[]).await
    }

    pub async fn cancel(&self, stream_id: StreamId) -> Result<MutationOutcome, ActionError> {
        let call = self.builder.cancel(&self.caller, stream_id);
        self.dispatch(call, &[]).await
    }

    async fn dispatch(
        &self,
        call: ContractCall,
        warnings: &[CreateWarning],
    ) -> Result<MutationOutcome, ActionError> {
        if self.approver.approve(&call, warnings).await == Approval::Declined {
            log::info!("{} aborted by signer", call.function);
            return Ok(MutationOutcome::Aborted);
        }
        match self.ledger.submit(&call).await {
            Ok(receipt) => {
                log::info!("{} submitted: {}", call.function, receipt.txid);
                Ok(MutationOutcome::Submitted(receipt))
            }
            Err(e) => {
                log::warn!("{} rejected: {}", call.function, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::RejectReason;
    use crate::memory::MemoryLedger;
    use streampay_core::AssetInfo;

    struct Decline;

    #[async_trait]
    impl Approver for Decline {
        async fn approve(&self, _call: &ContractCall, _warnings: &[CreateWarning]) -> Approval {
            Approval::Declined
        }
    }

    fn setup(approver: Arc<dyn Approver>) -> (Arc<MemoryLedger>, StreamActions<MemoryLedger>) {
        let target = StreamContract {
            contract: "ST1DEPLOYER.streams".to_string(),
            token: AssetInfo::new("ST1DEPLOYER.usdcx", "usdcx-token"),
        };
        let ledger = Arc::new(MemoryLedger::new(target.clone()));
        ledger.credit("ST1ALICE", 100_000_000);
        let actions = StreamActions::new(Arc::clone(&ledger), target, "ST1ALICE", approver);
        (ledger, actions)
    }

    #[tokio::test]
    async fn test_create_converts_amounts() {
        let (ledger, actions) = setup(Arc::new(AutoApprove));
        let outcome = actions.create("ST1BOB", "0.5", "10", 720).await.unwrap();
        assert!(matches!(outcome, MutationOutcome::Submitted(_)));

        let record = ledger.snapshot(1).unwrap();
        assert_eq!(record.rate, 500_000);
        assert_eq!(record.deposit, 10_000_000);
        assert_eq!(record.interval, 720);
        assert_eq!(ledger.balance_of("ST1ALICE"), 90_000_000);
    }

    #[tokio::test]
    async fn test_bad_amount_sends_nothing() {
        let (ledger, actions) = setup(Arc::new(AutoApprove));
        let err = actions.create("ST1BOB", "abc", "10", 1).await.unwrap_err();
        assert!(matches!(err, ActionError::Amount { field: "rate", .. }));
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_deposit_below_rate_sends_nothing() {
        let (ledger, actions) = setup(Arc::new(AutoApprove));
        let err = actions.create("ST1BOB", "2", "1", 1).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::Precondition(PreconditionError::DepositBelowRate { .. })
        ));
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_warnings_reported() {
        let (_, actions) = setup(Arc::new(AutoApprove));
        let (_, warnings) = actions.plan_create("ST1BOB", "1", "1.5", 1).unwrap();
        assert_eq!(warnings, vec![CreateWarning::SingleInterval]);
    }

    #[tokio::test]
    async fn test_declined_is_benign_abort() {
        let (ledger, actions) = setup(Arc::new(Decline));
        let outcome = actions.create("ST1BOB", "1", "10", 1).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Aborted);
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_withdraw_zero_owed_is_local() {
        let (ledger, actions) = setup(Arc::new(AutoApprove));
        actions.create("ST1BOB", "1", "10", 1).await.unwrap();
        let record = actions.lookup(1).await.unwrap();
        let err = actions.withdraw(&record).await.unwrap_err();
        assert!(matches!(
            err,
            ActionError::Precondition(PreconditionError::NothingOwed(1))
        ));
        assert_eq!(ledger.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_pause_rejected_unauthorized() {
        let (ledger, actions) = setup(Arc::new(AutoApprove));
        actions.create("ST1BOB", "1", "10", 1).await.unwrap();
        let target = actions.builder.target().clone();
        let bob = StreamActions::new(Arc::clone(&ledger), target, "ST1BOB", Arc::new(AutoApprove));
        let err = bob.pause(1).await.unwrap_err();
        match err {
            ActionError::Ledger(LedgerError::Rejected { reason, .. }) => {
                assert_eq!(reason, RejectReason::Unauthorized)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!ledger.snapshot(1).unwrap().paused);
    }

    #[tokio::test]
    async fn test_unknown_stream_lookup() {
        let (_, actions) = setup(Arc::new(AutoApprove));
        assert!(matches!(
            actions.lookup(4).await,
            Err(ActionError::UnknownStream(4))
        ));
    }
}
