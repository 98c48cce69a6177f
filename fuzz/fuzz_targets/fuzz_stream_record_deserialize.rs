//! Fuzz target: ledger record decoding
//!
//! Arbitrary bytes through StreamRecord deserialization and the RPC
//! get-stream-stats decoder. Neither may panic; a decoded record always
//! carries the id it was requested under.
//!
//! Run: cargo +nightly fuzz run fuzz_stream_record_deserialize -- -max_len=4096

#![no_main]
use libfuzzer_sys::fuzz_target;
use streampay_core::StreamRecord;

fuzz_target!(|data: &[u8]| {
    let _: Result<StreamRecord, _> = serde_json::from_slice(data);

    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) {
        if let Ok(Some(record)) = streampay_client::rpc::decode_stream(17, value) {
            assert_eq!(record.id, 17);
            let _ = record.remaining();
        }
    }
});
