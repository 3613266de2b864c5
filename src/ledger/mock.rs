//! In-memory ledger for testing without network calls.

use super::{LedgerClient, LedgerError};
use crate::domain::{BalanceSnapshot, DepositAccount, LedgerAddress, TransferOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A transfer recorded by [`MockLedger::submit_transfer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransfer {
    pub source: LedgerAddress,
    pub destination: LedgerAddress,
    pub amount: i64,
    pub fee: i64,
}

/// Mock ledger returning scripted balances and outcomes.
#[derive(Debug)]
pub struct MockLedger {
    height: AtomicU64,
    node_time: i64,
    balances: Mutex<HashMap<LedgerAddress, i64>>,
    reject_with: Option<serde_json::Value>,
    fail_network: bool,
    generated: AtomicU64,
    submitted: Mutex<Vec<SubmittedTransfer>>,
    balance_queries: Mutex<Vec<(LedgerAddress, u64)>>,
    latency: Duration,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            height: AtomicU64::new(1_000),
            node_time: 50_000_000,
            balances: Mutex::new(HashMap::new()),
            reject_with: None,
            fail_network: false,
            generated: AtomicU64::new(0),
            submitted: Mutex::new(Vec::new()),
            balance_queries: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
        }
    }

    /// Set the current chain height.
    pub fn with_height(self, height: u64) -> Self {
        self.set_height(height);
        self
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Set the balance of `address` in micro-units.
    pub fn with_balance(self, address: &LedgerAddress, balance_micro: i64) -> Self {
        self.set_balance(address, balance_micro);
        self
    }

    /// Make every announce fail with `payload`.
    pub fn rejecting(mut self, payload: serde_json::Value) -> Self {
        self.reject_with = Some(payload);
        self
    }

    /// Delay balance queries and announces by `latency`, like a remote node.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Make every call fail as if the node were unreachable.
    pub fn unreachable(mut self) -> Self {
        self.fail_network = true;
        self
    }

    pub fn set_balance(&self, address: &LedgerAddress, balance_micro: i64) {
        self.balances
            .lock()
            .expect("mock ledger poisoned")
            .insert(address.clone(), balance_micro);
    }

    /// Address the n-th generated account (1-based) will get.
    pub fn generated_address(n: u64) -> LedgerAddress {
        LedgerAddress::new(format!("TMOCK{:035}", n))
    }

    pub fn submitted(&self) -> Vec<SubmittedTransfer> {
        self.submitted.lock().expect("mock ledger poisoned").clone()
    }

    /// `(address, blocks_back)` of every balance query, in order.
    pub fn balance_queries(&self) -> Vec<(LedgerAddress, u64)> {
        self.balance_queries.lock().expect("mock ledger poisoned").clone()
    }

    pub fn generated_count(&self) -> u64 {
        self.generated.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn check_network(&self) -> Result<(), LedgerError> {
        if self.fail_network {
            return Err(LedgerError::Network("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_height(&self) -> Result<u64, LedgerError> {
        self.check_network()?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn generate_account(&self) -> Result<DepositAccount, LedgerError> {
        self.check_network()?;
        let n = self.generated.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DepositAccount::new(
            Self::generated_address(n),
            format!("pub{}", n),
            format!("priv{}", n),
        ))
    }

    async fn historical_balance(
        &self,
        address: &LedgerAddress,
        blocks_back: u64,
    ) -> Result<BalanceSnapshot, LedgerError> {
        self.check_network()?;
        self.delay().await;
        self.balance_queries
            .lock()
            .expect("mock ledger poisoned")
            .push((address.clone(), blocks_back));
        let balance_micro = self
            .balances
            .lock()
            .expect("mock ledger poisoned")
            .get(address)
            .copied()
            .unwrap_or(0);
        Ok(BalanceSnapshot {
            balance_micro,
            height: self.height.load(Ordering::SeqCst).saturating_sub(blocks_back),
        })
    }

    async fn node_time(&self) -> Result<i64, LedgerError> {
        self.check_network()?;
        Ok(self.node_time)
    }

    async fn submit_transfer(
        &self,
        source: &DepositAccount,
        destination: &LedgerAddress,
        amount: i64,
        fee: i64,
    ) -> Result<TransferOutcome, LedgerError> {
        self.check_network()?;
        self.delay().await;
        let n = {
            let mut submitted = self.submitted.lock().expect("mock ledger poisoned");
            submitted.push(SubmittedTransfer {
                source: source.address.clone(),
                destination: destination.clone(),
                amount,
                fee,
            });
            submitted.len()
        };

        if let Some(payload) = &self.reject_with {
            return Ok(TransferOutcome {
                succeeded: false,
                tx_hash: None,
                ledger_message: payload
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                raw: payload.clone(),
            });
        }

        let tx_hash = format!("{:064x}", n);
        Ok(TransferOutcome {
            succeeded: true,
            tx_hash: Some(tx_hash.clone()),
            ledger_message: Some("SUCCESS".to_string()),
            raw: serde_json::json!({
                "type": 1,
                "code": 1,
                "message": "SUCCESS",
                "transactionHash": {"data": tx_hash},
            }),
        })
    }
}
