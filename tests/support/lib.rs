//! Fixtures shared by the integration tests.

use std::sync::Arc;
use streampay_client::MemoryLedger;
use streampay_core::{AssetInfo, StreamContract, StreamId, StreamRecord};

pub const STREAMS: &str = "ST30J9EZKY44SS1EBT8XNKJFA77Z4TSDBEMZ55MEJ.precious-white-sparrow";
pub const TOKEN: &str = "ST30J9EZKY44SS1EBT8XNKJFA77Z4TSDBEMZ55MEJ.charming-amethyst-pinniped";

pub fn usdcx_target() -> StreamContract {
    StreamContract {
        contract: STREAMS.to_string(),
        token: AssetInfo::new(TOKEN, "usdcx-token"),
    }
}

pub fn ledger() -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new(usdcx_target()))
}

/// Seed a stream directly into the ledger, bypassing `create`.
pub fn seed(
    ledger: &MemoryLedger,
    sender: &str,
    recipient: &str,
    deposit: u128,
    withdrawn: u128,
    owed: u128,
    paused: bool,
) -> StreamId {
    let id = ledger.insert_stream(StreamRecord {
        id: 0,
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        token: TOKEN.to_string(),
        rate: 1_000,
        interval: 1,
        deposit,
        withdrawn,
        owed: 0,
        paused,
    });
    ledger.set_owed(id, owed);
    id
}
