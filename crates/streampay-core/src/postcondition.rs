// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POST-CONDITIONS - declarative token-flow guards
//
// A call carries a list of conditions of the form "principal P sends
// {exactly | more than | at least} N of asset A". The ledger evaluates them
// against the transfers the call actually produced and refuses to commit
// the whole call if any condition fails. In Deny mode, any transfer that no
// condition mentions also fails the call.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Fungible asset identity: token contract plus asset name inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetInfo {
    pub contract: String,
    pub asset_name: String,
}

impl AssetInfo {
    pub fn new(contract: impl Into<String>, asset_name: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            asset_name: asset_name.into(),
        }
    }
}

impl std::fmt::Display for AssetInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.contract, self.asset_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FungibleConditionCode {
    /// Sent exactly `amount`.
    SentEq,
    /// Sent strictly more than `amount`.
    SentGt,
    /// Sent at least `amount`.
    SentGe,
}

impl FungibleConditionCode {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::SentEq => "==",
            Self::SentGt => ">",
            Self::SentGe => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostConditionMode {
    /// Transfers not covered by a condition abort the call.
    #[default]
    Deny,
    /// Only the listed conditions are checked.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCondition {
    pub principal: String,
    pub code: FungibleConditionCode,
    #[serde(with = "crate::u128_flex")]
    pub amount: u128,
    pub asset: AssetInfo,
}

impl PostCondition {
    pub fn sends_eq(principal: impl Into<String>, amount: u128, asset: &AssetInfo) -> Self {
        Self::new(principal, FungibleConditionCode::SentEq, amount, asset)
    }

    pub fn sends_gt(principal: impl Into<String>, amount: u128, asset: &AssetInfo) -> Self {
        Self::new(principal, FungibleConditionCode::SentGt, amount, asset)
    }

    pub fn sends_ge(principal: impl Into<String>, amount: u128, asset: &AssetInfo) -> Self {
        Self::new(principal, FungibleConditionCode::SentGe, amount, asset)
    }

    fn new(
        principal: impl Into<String>,
        code: FungibleConditionCode,
        amount: u128,
        asset: &AssetInfo,
    ) -> Self {
        Self {
            principal: principal.into(),
            code,
            amount,
            asset: asset.clone(),
        }
    }

    /// Does this condition hold if `principal` sent `sent` units of `asset`?
    pub fn holds(&self, sent: u128) -> bool {
        match self.code {
            FungibleConditionCode::SentEq => sent == self.amount,
            FungibleConditionCode::SentGt => sent > self.amount,
            FungibleConditionCode::SentGe => sent >= self.amount,
        }
    }

    fn covers(&self, principal: &str, asset: &AssetInfo) -> bool {
        self.principal == principal && &self.asset == asset
    }
}

impl std::fmt::Display for PostCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sends {} {} of {}",
            self.principal,
            self.code.symbol(),
            self.amount,
            self.asset
        )
    }
}

/// One asset movement produced by executing a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransfer {
    pub from: String,
    pub to: String,
    pub asset: AssetInfo,
    #[serde(with = "crate::u128_flex")]
    pub amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostConditionViolation {
    #[error("post-condition failed: {condition} (actually sent {sent})")]
    ConditionFailed { condition: PostCondition, sent: u128 },
    #[error("post-condition mode deny: unchecked transfer of {amount} {asset} from {from}")]
    UncoveredTransfer {
        from: String,
        asset: AssetInfo,
        amount: u128,
    },
}

/// Ledger-side evaluation. All-or-nothing: the first violation aborts the call.
pub fn evaluate(
    conditions: &[PostCondition],
    mode: PostConditionMode,
    transfers: &[AssetTransfer],
) -> Result<(), PostConditionViolation> {
    let mut sent: BTreeMap<(&str, &AssetInfo), u128> = BTreeMap::new();
    for t in transfers {
        let total = sent.entry((t.from.as_str(), &t.asset)).or_insert(0);
        *total = total.saturating_add(t.amount);
    }

    for condition in conditions {
        let total = sent
            .get(&(condition.principal.as_str(), &condition.asset))
            .copied()
            .unwrap_or(0);
        if !condition.holds(total) {
            return Err(PostConditionViolation::ConditionFailed {
                condition: condition.clone(),
                sent: total,
            });
        }
    }

    if mode == PostConditionMode::Deny {
        for t in transfers.iter().filter(|t| t.amount > 0) {
            if !conditions.iter().any(|c| c.covers(&t.from, &t.asset)) {
                return Err(PostConditionViolation::UncoveredTransfer {
                    from: t.from.clone(),
                    asset: t.asset.clone(),
                    amount: t.amount,
                });
            }
        }
    }

    Ok(())
}
