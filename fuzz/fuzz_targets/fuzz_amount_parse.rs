//! Fuzz target: decimal amount parsing
//!
//! Feeds arbitrary strings to parse_amount() to ensure:
//! 1. No panics on any input
//! 2. Accepted amounts survive format_amount -> parse_amount unchanged
//!
//! Run: cargo +nightly fuzz run fuzz_amount_parse -- -max_len=64

#![no_main]
use libfuzzer_sys::fuzz_target;
use streampay_core::{format_amount, parse_amount};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(micro) = parse_amount(s) {
            let shown = format_amount(micro);
            assert_eq!(
                parse_amount(&shown),
                Ok(micro),
                "formatted amount must parse back: {} -> {}",
                s,
                shown
            );
        }
    }
});
