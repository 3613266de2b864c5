//! Ledger node abstraction: account generation, balances and transfers.

use crate::domain::{BalanceSnapshot, DepositAccount, LedgerAddress, TransferOutcome};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod mock;
pub mod nem;

pub use mock::{MockLedger, SubmittedTransfer};
pub use nem::NemLedgerClient;

/// Client for a ledger node.
///
/// Every method is a single request/response cycle (or a short fixed chain
/// of them). Implementations must not retry; callers decide.
#[async_trait]
pub trait LedgerClient: Send + Sync + fmt::Debug {
    /// Current chain height.
    async fn chain_height(&self) -> Result<u64, LedgerError>;

    /// Ask the node for a fresh keypair.
    async fn generate_account(&self) -> Result<DepositAccount, LedgerError>;

    /// Balance of `address` as of `chain_height() - blocks_back`.
    ///
    /// # Arguments
    /// * `address` - Account to query
    /// * `blocks_back` - Confirmation depth in blocks
    async fn historical_balance(
        &self,
        address: &LedgerAddress,
        blocks_back: u64,
    ) -> Result<BalanceSnapshot, LedgerError>;

    /// Node network time, used for transaction timestamps and deadlines.
    async fn node_time(&self) -> Result<i64, LedgerError>;

    /// Sign with `source` and announce a transfer of whole-unit `amount`
    /// paying `fee` to `destination`.
    async fn submit_transfer(
        &self,
        source: &DepositAccount,
        destination: &LedgerAddress,
        amount: i64,
        fee: i64,
    ) -> Result<TransferOutcome, LedgerError>;
}

/// Error type for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Transport failure (connection refused, DNS, timeout).
    #[error("Network error: {0}")]
    Network(String),
    /// Malformed or unexpected response body.
    #[error("Protocol error: {0}")]
    Protocol(String),
}
