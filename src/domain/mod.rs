//! Domain types for the tipping bridge.
//!
//! This module provides:
//! - Chat identities and normalized ledger addresses
//! - Custodial deposit accounts
//! - The transfer fee schedule
//! - Validated transfer plans and ledger outcomes

pub mod account;
pub mod fee;
pub mod primitives;
pub mod transfer;

pub use account::DepositAccount;
pub use fee::fee;
pub use primitives::{AddressParseError, ChatUser, LedgerAddress, ADDRESS_LEN};
pub use transfer::{BalanceSnapshot, PlanError, TransferOutcome, TransferPlan, MICRO_PER_UNIT};
