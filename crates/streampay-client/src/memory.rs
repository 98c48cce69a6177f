// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// IN-PROCESS LEDGER
//
// A stand-in for the external ledger, for tests and dry runs.
// - Executes the six stream operations with sender/recipient checks
// - Evaluates post-conditions before committing anything
// - Fault injection: unreachable ids, counter outage, read latency,
//   and a fee skim that makes transfers exceed what was requested
//
// Accrual is not modelled: tests set `owed` directly.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::ledger::{LedgerError, StreamLedger, TxReceipt};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use streampay_core::postcondition::{evaluate, AssetTransfer};
use streampay_core::{ContractCall, StreamContract, StreamId, StreamOperation, StreamRecord};

/// Recover from poisoned mutex instead of panicking
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone)]
struct StoredStream {
    record: StreamRecord,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    streams: BTreeMap<StreamId, StoredStream>,
    balances: HashMap<String, u128>,
    unreachable: HashSet<StreamId>,
    counter_down: bool,
    counter_override: Option<StreamId>,
    read_delay: Duration,
    fee_skim: u128,
    submissions: Vec<ContractCall>,
}

enum Change {
    Insert(StreamRecord),
    Update(StoredStream),
}

pub struct MemoryLedger {
    target: StreamContract,
    state: Mutex<MemoryState>,
    record_reads: AtomicUsize,
}

impl MemoryLedger {
    pub fn new(target: StreamContract) -> Self {
        Self {
            target,
            state: Mutex::new(MemoryState::default()),
            record_reads: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> &StreamContract {
        &self.target
    }

    /// Store `record` under the next id and return that id.
    pub fn insert_stream(&self, mut record: StreamRecord) -> StreamId {
        let mut state = safe_lock(&self.state);
        let id = state.streams.len() as StreamId + 1;
        record.id = id;
        state.streams.insert(
            id,
            StoredStream {
                record,
                cancelled: false,
            },
        );
        id
    }

    pub fn credit(&self, holder: &str, amount: u128) {
        let mut state = safe_lock(&self.state);
        let balance = state.balances.entry(holder.to_string()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Ledger-side accrual stand-in; capped at what the deposit still covers.
    pub fn set_owed(&self, id: StreamId, owed: u128) {
        let mut state = safe_lock(&self.state);
        if let Some(s) = state.streams.get_mut(&id) {
            let cap = s.record.deposit.saturating_sub(s.record.withdrawn);
            s.record.owed = owed.min(cap);
        }
    }

    pub fn set_unreachable(&self, id: StreamId, unreachable: bool) {
        let mut state = safe_lock(&self.state);
        if unreachable {
            state.unreachable.insert(id);
        } else {
            state.unreachable.remove(&id);
        }
    }

    pub fn set_counter_down(&self, down: bool) {
        safe_lock(&self.state).counter_down = down;
    }

    /// Report `counter` instead of the real stream count.
    pub fn set_counter_override(&self, counter: Option<StreamId>) {
        safe_lock(&self.state).counter_override = counter;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        safe_lock(&self.state).read_delay = delay;
    }

    /// Extra units the ledger moves from the caller on create/top-up.
    pub fn set_fee_skim(&self, skim: u128) {
        safe_lock(&self.state).fee_skim = skim;
    }

    pub fn snapshot(&self, id: StreamId) -> Option<StreamRecord> {
        safe_lock(&self.state)
            .streams
            .get(&id)
            .map(|s| s.record.clone())
    }

    pub fn is_cancelled(&self, id: StreamId) -> bool {
        safe_lock(&self.state)
            .streams
            .get(&id)
            .map(|s| s.cancelled)
            .unwrap_or(false)
    }

    pub fn balance_of(&self, holder: &str) -> u128 {
        safe_lock(&self.state)
            .balances
            .get(holder)
            .copied()
            .unwrap_or(0)
    }

    /// Calls that reached the ledger, accepted or not.
    pub fn submissions(&self) -> Vec<ContractCall> {
        safe_lock(&self.state).submissions.clone()
    }

    pub fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }

    fn transfer(&self, from: &str, to: &str, amount: u128) -> AssetTransfer {
        AssetTransfer {
            from: from.to_string(),
            to: to.to_string(),
            asset: self.target.token.clone(),
            amount,
        }
    }

    /// Work out what `call` would do without touching state.
    fn plan(
        &self,
        state: &MemoryState,
        call: &ContractCall,
    ) -> Result<(Vec<AssetTransfer>, Change), String> {
        let contract = self.target.contract.as_str();
        let caller = call.caller.as_str();
        let balance = |who: &str| state.balances.get(who).copied().unwrap_or(0);

        if let StreamOperation::Create(params) = &call.operation {
            let debit = params.deposit.saturating_add(state.fee_skim);
            if balance(caller) < debit {
                return Err("insufficient balance for deposit".into());
            }
            let mut transfers = vec![self.transfer(caller, contract, params.deposit)];
            if state.fee_skim > 0 {
                transfers.push(self.transfer(caller, contract, state.fee_skim));
            }
            let record = StreamRecord {
                id: 0,
                sender: caller.to_string(),
                recipient: params.recipient.clone(),
                token: self.target.token.contract.clone(),
                rate: params.rate,
                interval: params.interval,
                deposit: params.deposit,
                withdrawn: 0,
                owed: 0,
                paused: false,
            };
            return Ok((transfers, Change::Insert(record)));
        }

        let id = call
            .operation
            .stream_id()
            .ok_or_else(|| "missing stream id".to_string())?;
        let mut stream = state
            .streams
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("stream #{} not found", id))?;
        if stream.cancelled {
            return Err(format!("stream #{} is cancelled", id));
        }
        if call.operation.sender_only() && stream.record.sender != caller {
            return Err("ERR-NOT-AUTHORIZED: sender only".into());
        }

        let r = &mut stream.record;
        let mut transfers = Vec::new();
        match &call.operation {
            StreamOperation::Create(_) => return Err("create does not target a stream".into()),
            StreamOperation::Withdraw { .. } => {
                if r.recipient != caller {
                    return Err("ERR-NOT-AUTHORIZED: recipient only".into());
                }
                if r.owed == 0 {
                    return Err("nothing to withdraw".into());
                }
                transfers.push(self.transfer(contract, &r.recipient, r.owed));
                r.withdrawn += r.owed;
                r.owed = 0;
            }
            StreamOperation::Pause { .. } => {
                if r.paused {
                    return Err("stream is already paused".into());
                }
                r.paused = true;
            }
            StreamOperation::Resume { .. } => {
                if !r.paused {
                    return Err("stream is not paused".into());
                }
                r.paused = false;
            }
            StreamOperation::TopUp { amount, .. } => {
                let debit = amount.saturating_add(state.fee_skim);
                if balance(caller) < debit {
                    return Err("insufficient balance for top-up".into());
                }
                transfers.push(self.transfer(caller, contract, *amount));
                if state.fee_skim > 0 {
                    transfers.push(self.transfer(caller, contract, state.fee_skim));
                }
                r.deposit += amount;
            }
            StreamOperation::Cancel { .. } => {
                if r.owed > 0 {
                    transfers.push(self.transfer(contract, &r.recipient, r.owed));
                }
                let refund = r.remaining();
                if refund > 0 {
                    transfers.push(self.transfer(contract, &r.sender, refund));
                }
                r.withdrawn += r.owed;
                r.owed = 0;
                r.paused = true;
                stream.cancelled = true;
            }
        }
        Ok((transfers, Change::Update(stream)))
    }
}

#[async_trait]
impl StreamLedger for MemoryLedger {
    async fn stream_counter(&self) -> Result<StreamId, LedgerError> {
        let state = safe_lock(&self.state);
        if state.counter_down {
            return Err(LedgerError::Transport("counter lookup unavailable".into()));
        }
        Ok(state
            .counter_override
            .unwrap_or(state.streams.len() as StreamId))
    }

    async fn stream(&self, id: StreamId) -> Result<Option<StreamRecord>, LedgerError> {
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        let delay = safe_lock(&self.state).read_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = safe_lock(&self.state);
        if state.unreachable.contains(&id) {
            return Err(LedgerError::Transport(format!("stream #{} read timed out", id)));
        }
        Ok(state.streams.get(&id).map(|s| s.record.clone()))
    }

    async fn token_balance(&self, holder: &str) -> Result<u128, LedgerError> {
        Ok(self.balance_of(holder))
    }

    async fn submit(&self, call: &ContractCall) -> Result<TxReceipt, LedgerError> {
        let mut state = safe_lock(&self.state);
        state.submissions.push(call.clone());
        let txid = format!("0x{:064x}", state.submissions.len());

        let (transfers, change) = self.plan(&state, call).map_err(LedgerError::rejected)?;
        evaluate(&call.post_conditions, call.mode, &transfers).map_err(|v| {
            LedgerError::rejected(format!("Post-condition check failure: {}", v))
        })?;

        for t in &transfers {
            let from = state.balances.entry(t.from.clone()).or_insert(0);
            *from = from.saturating_sub(t.amount);
            let to = state.balances.entry(t.to.clone()).or_insert(0);
            *to = to.saturating_add(t.amount);
        }
        match change {
            Change::Insert(mut record) => {
                let id = state.streams.len() as StreamId + 1;
                record.id = id;
                state.streams.insert(
                    id,
                    StoredStream {
                        record,
                        cancelled: false,
                    },
                );
            }
            Change::Update(stream) => {
                state.streams.insert(stream.record.id, stream);
            }
        }
        Ok(TxReceipt { txid })
    }
}
