// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STREAMPAY - CLIENT
//
// Everything that talks to the ledger:
// - HTTP and in-process ledger implementations behind one trait
// - Windowed scanning and the refresh watcher
// - Guarded, signer-approved submissions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod actions;
pub mod config;
pub mod ledger;
pub mod memory;
pub mod rpc;
pub mod scheduler;
pub mod watcher;

pub use actions::{ActionError, Approval, Approver, AutoApprove, MutationOutcome, StreamActions};
pub use config::{ClientConfig, ConfigError};
pub use ledger::{LedgerError, RejectReason, StreamLedger, TxReceipt};
pub use memory::MemoryLedger;
pub use rpc::RpcLedger;
pub use scheduler::{fetch_record, fetch_windows, scan};
pub use watcher::{CycleReport, PortfolioWatcher, RefreshError, WatchState};
