//! Transfer plans, outcomes and balance snapshots.

use crate::domain::{DepositAccount, LedgerAddress};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire amounts are expressed in micro-units.
pub const MICRO_PER_UNIT: i64 = 1_000_000;

/// Reasons a transfer plan cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("destination {0} is the source account")]
    SelfTransfer(LedgerAddress),
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),
    #[error("{address} needs {required} but has {available}")]
    InsufficientFunds {
        address: LedgerAddress,
        required: i64,
        available: i64,
    },
}

/// A validated, immutable transfer ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    source: DepositAccount,
    destination: LedgerAddress,
    amount: i64,
    fee: i64,
}

impl TransferPlan {
    /// Build a plan, checking it against the balance available to `source`.
    pub fn new(
        source: DepositAccount,
        destination: LedgerAddress,
        amount: i64,
        fee: i64,
        available: i64,
    ) -> Result<Self, PlanError> {
        if destination == source.address {
            return Err(PlanError::SelfTransfer(destination));
        }
        if amount <= 0 {
            return Err(PlanError::NonPositiveAmount(amount));
        }
        let required = amount.saturating_add(fee);
        if required > available {
            return Err(PlanError::InsufficientFunds {
                address: source.address,
                required,
                available,
            });
        }
        Ok(Self {
            source,
            destination,
            amount,
            fee,
        })
    }

    pub fn source(&self) -> &DepositAccount {
        &self.source
    }

    pub fn destination(&self) -> &LedgerAddress {
        &self.destination
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn fee(&self) -> i64 {
        self.fee
    }

    /// Amount plus fee, in whole units.
    pub fn total(&self) -> i64 {
        self.amount + self.fee
    }
}

/// Result reported by the ledger for a submitted transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub succeeded: bool,
    pub tx_hash: Option<String>,
    pub ledger_message: Option<String>,
    /// Payload as returned by the node, relayed verbatim on failure.
    pub raw: serde_json::Value,
}

/// Account balance at a given block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub balance_micro: i64,
    pub height: u64,
}

impl BalanceSnapshot {
    /// Whole units, rounded down.
    pub fn floor_units(&self) -> i64 {
        self.balance_micro.div_euclid(MICRO_PER_UNIT)
    }

    /// Fractional part in `[0, 1)`.
    pub fn remainder(&self) -> Decimal {
        Decimal::new(self.balance_micro.rem_euclid(MICRO_PER_UNIT), 6).normalize()
    }
}
