//! Fuzz target: post-condition evaluation
//!
//! Random transfers and guards over a small principal set. evaluate() must
//! not panic, and in deny mode an accepted call never moves funds from a
//! principal without a guard.
//!
//! Run: cargo +nightly fuzz run fuzz_postcondition_evaluate

#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use streampay_core::postcondition::evaluate;
use streampay_core::{AssetInfo, AssetTransfer, PostCondition, PostConditionMode};

const PRINCIPALS: [&str; 3] = ["SP_A", "SP_B", "SP_C.streams"];

#[derive(Debug, Arbitrary)]
struct Guard {
    who: u8,
    code: u8,
    amount: u64,
}

#[derive(Debug, Arbitrary)]
struct Transfer {
    from: u8,
    to: u8,
    amount: u64,
}

#[derive(Debug, Arbitrary)]
struct Input {
    deny: bool,
    guards: Vec<Guard>,
    transfers: Vec<Transfer>,
}

fn principal(i: u8) -> &'static str {
    PRINCIPALS[i as usize % PRINCIPALS.len()]
}

fuzz_target!(|input: Input| {
    let asset = AssetInfo::new("SP_T.usdcx", "usdcx-token");
    let conditions: Vec<PostCondition> = input
        .guards
        .iter()
        .map(|g| {
            let who = principal(g.who);
            let amount = g.amount as u128;
            match g.code % 3 {
                0 => PostCondition::sends_eq(who, amount, &asset),
                1 => PostCondition::sends_gt(who, amount, &asset),
                _ => PostCondition::sends_ge(who, amount, &asset),
            }
        })
        .collect();
    let transfers: Vec<AssetTransfer> = input
        .transfers
        .iter()
        .map(|t| AssetTransfer {
            from: principal(t.from).to_string(),
            to: principal(t.to).to_string(),
            asset: asset.clone(),
            amount: t.amount as u128,
        })
        .collect();
    let mode = if input.deny {
        PostConditionMode::Deny
    } else {
        PostConditionMode::Allow
    };

    if evaluate(&conditions, mode, &transfers).is_ok() && input.deny {
        for t in transfers.iter().filter(|t| t.amount > 0) {
            assert!(
                conditions.iter().any(|c| c.principal == t.from),
                "unguarded transfer accepted: {:?}",
                t
            );
        }
    }
});
