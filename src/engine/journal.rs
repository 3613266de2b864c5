use crate::domain::{BalanceSnapshot, LedgerAddress};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

/// Blocks after submission before a spend is assumed to be part of the
/// confirmed balance.
pub const DEFAULT_SETTLEMENT_MARGIN: u64 = 5;

#[derive(Debug, Clone, Copy)]
struct PendingSpend {
    /// Amount plus fee, whole units.
    total: i64,
    /// Chain height when the transfer was announced.
    chain_height: u64,
}

/// Spends announced by this process that confirmed balances may not show yet.
///
/// Confirmed balances lag the chain tip by the confirmation depth, so a
/// second transfer validated right after a first one would otherwise see
/// the pre-transfer balance.
#[derive(Debug)]
pub struct SpendJournal {
    spends: Mutex<HashMap<LedgerAddress, Vec<PendingSpend>>>,
    settlement_margin: u64,
}

impl SpendJournal {
    pub fn new(settlement_margin: u64) -> Self {
        Self {
            spends: Mutex::new(HashMap::new()),
            settlement_margin,
        }
    }

    /// Record a successfully announced spend.
    pub async fn record(&self, address: &LedgerAddress, total: i64, chain_height: u64) {
        self.spends
            .lock()
            .await
            .entry(address.clone())
            .or_default()
            .push(PendingSpend {
                total,
                chain_height,
            });
    }

    /// Whole units available to `address`: the confirmed balance minus spends
    /// the snapshot height does not cover yet.
    pub async fn available(&self, address: &LedgerAddress, snapshot: &BalanceSnapshot) -> i64 {
        let mut spends = self.spends.lock().await;
        let pending: i64 = match spends.get_mut(address) {
            Some(entries) => {
                let margin = self.settlement_margin;
                entries.retain(|s| snapshot.height < s.chain_height.saturating_add(margin));
                entries.iter().map(|s| s.total).sum()
            }
            None => 0,
        };
        if spends.get(address).is_some_and(|e| e.is_empty()) {
            spends.remove(address);
        }

        if pending > 0 {
            debug!(
                "{} has {} pending at confirmed height {}",
                address, pending, snapshot.height
            );
        }
        snapshot.floor_units() - pending
    }
}

impl Default for SpendJournal {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLEMENT_MARGIN)
    }
}
