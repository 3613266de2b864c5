//! Tipping engine: turns parsed commands into ledger operations.
//!
//! Each money-moving command follows the same order: resolve deposits,
//! read the confirmed balance, compute the fee, validate a
//! [`TransferPlan`], and only then submit. Any failure before submission
//! leaves the ledger untouched.

mod journal;

pub use journal::{SpendJournal, DEFAULT_SETTLEMENT_MARGIN};

use crate::bridge::UserDirectory;
use crate::command::Command;
use crate::domain::{
    fee, BalanceSnapshot, ChatUser, DepositAccount, LedgerAddress, TransferOutcome, TransferPlan,
};
use crate::error::TipError;
use crate::ledger::LedgerClient;
use crate::locks::UserLocks;
use crate::store::DepositStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Confirmation depth for balance reports and tips.
pub const BALANCE_CONFIRMATIONS: u64 = 10;
/// Confirmation depth for withdrawals.
pub const WITHDRAW_CONFIRMATIONS: u64 = 2;

const WELCOME: &str = "Hi, I have created a tipbot account for you. \"help\" to get help ;)";

/// Outbound message produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Private message to a user.
    Direct { user: ChatUser, text: String },
    /// Message to the channel the command was issued in, if it was public.
    Channel { text: String },
}

impl Notice {
    fn direct(user: &ChatUser, text: impl Into<String>) -> Self {
        Notice::Direct {
            user: user.clone(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositReceipt {
    pub account: DepositAccount,
    pub created: bool,
}

impl DepositReceipt {
    pub fn message(&self) -> String {
        if self.created {
            format!("Your new deposit address: *{}*", self.account.address)
        } else {
            format!("Your deposit address: *{}*", self.account.address)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceReport {
    pub address: LedgerAddress,
    pub height: u64,
    pub whole: i64,
    /// Fraction of a unit, in `[0, 1)`.
    pub remainder: Decimal,
}

impl BalanceReport {
    pub fn message(&self) -> String {
        let fraction = self.remainder.to_string();
        let digits = fraction.strip_prefix("0.").unwrap_or("0");
        format!(
            "Your balance at block {} is *{}*.{} XEM",
            self.height, self.whole, digits
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawReceipt {
    pub destination: LedgerAddress,
    pub amount: i64,
    pub fee: i64,
    pub outcome: TransferOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    pub recipient: ChatUser,
    pub amount: i64,
    pub fee: i64,
    pub outcome: TransferOutcome,
}

/// Orchestrates deposits, balances, tips and withdrawals.
#[derive(Debug)]
pub struct TippingEngine {
    ledger: Arc<dyn LedgerClient>,
    store: Arc<DepositStore>,
    locks: UserLocks,
    journal: SpendJournal,
}

impl TippingEngine {
    pub fn new(ledger: Arc<dyn LedgerClient>, store: Arc<DepositStore>) -> Self {
        Self {
            ledger,
            store,
            locks: UserLocks::new(),
            journal: SpendJournal::default(),
        }
    }

    /// Blocks a confirmed balance must pass an announced spend's height
    /// before the spend stops being subtracted.
    pub fn with_settlement_margin(mut self, blocks: u64) -> Self {
        self.journal = SpendJournal::new(blocks);
        self
    }

    /// Run `command` for `user` and return the messages to deliver.
    ///
    /// Errors are turned into notices for the user; nothing here fails the
    /// caller.
    pub async fn execute<D>(&self, user: &ChatUser, command: Command, directory: &D) -> Vec<Notice>
    where
        D: UserDirectory + ?Sized,
    {
        debug!("user {} issued {}", user.id, command.name());
        let mut notices = Vec::new();

        let result = match command {
            Command::Help => {
                notices.push(Notice::direct(user, help_text()));
                Ok(())
            }
            Command::Deposit => match self.handle_deposit(user).await {
                Ok(receipt) => {
                    notices.push(Notice::direct(user, receipt.message()));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Command::Balance => match self.handle_balance(user).await {
                Ok(report) => {
                    notices.push(Notice::direct(user, report.message()));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Command::Withdraw { address, amount } => {
                match self.handle_withdraw(user, &address, amount).await {
                    Ok(receipt) => {
                        withdraw_notices(user, &receipt, &mut notices);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            Command::Transfer {
                target_handle,
                amount,
            } => {
                match self
                    .handle_transfer(user, &target_handle, amount, directory, &mut notices)
                    .await
                {
                    Ok(receipt) => {
                        transfer_notices(user, &receipt, &mut notices);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
        };

        if let Err(e) = result {
            match &e {
                TipError::Ledger(inner) => warn!("ledger failure for user {}: {}", user.id, inner),
                TipError::Store(inner) => error!("store failure for user {}: {}", user.id, inner),
                other => debug!("command rejected for user {}: {}", user.id, other),
            }
            let text = e.user_message();
            if e.is_public() {
                notices.push(Notice::Channel {
                    text: format!("@{} {}", user.handle, text),
                });
            }
            notices.push(Notice::direct(user, text));
        }

        notices
    }

    /// Return the user's deposit account, creating it on first request.
    pub async fn handle_deposit(&self, user: &ChatUser) -> Result<DepositReceipt, TipError> {
        let (account, created) = self.provision(user).await?;
        if !created {
            info!("cached deposit address: {} -> {}", user.id, account.address);
        }
        Ok(DepositReceipt { account, created })
    }

    pub async fn handle_balance(&self, user: &ChatUser) -> Result<BalanceReport, TipError> {
        let account = self.deposit_of(user).await?;
        let snapshot = self
            .ledger
            .historical_balance(&account.address, BALANCE_CONFIRMATIONS)
            .await?;

        Ok(BalanceReport {
            address: account.address,
            height: snapshot.height,
            whole: snapshot.floor_units(),
            remainder: snapshot.remainder(),
        })
    }

    /// Withdraw to an external address. Without `amount`, everything left
    /// after the fee is withdrawn.
    pub async fn handle_withdraw(
        &self,
        user: &ChatUser,
        destination: &LedgerAddress,
        amount: Option<i64>,
    ) -> Result<WithdrawReceipt, TipError> {
        let account = self.deposit_of(user).await?;
        let _guard = self.locks.acquire(&user.id).await;

        let snapshot = self
            .ledger
            .historical_balance(&account.address, WITHDRAW_CONFIRMATIONS)
            .await?;
        let available = self.journal.available(&account.address, &snapshot).await;
        let fee = fee(available);
        let amount = amount.unwrap_or(available - fee);
        if amount <= 0 {
            return Err(TipError::InsufficientFunds {
                address: account.address,
                required: fee + 1,
                available,
            });
        }

        let plan = TransferPlan::new(account, destination.clone(), amount, fee, available)?;
        info!(
            "user {} withdraws {} (+{} fee) to {}",
            user.id, amount, fee, destination
        );
        let outcome = self
            .submit(&plan, &snapshot, WITHDRAW_CONFIRMATIONS)
            .await?;

        Ok(WithdrawReceipt {
            destination: destination.clone(),
            amount,
            fee,
            outcome,
        })
    }

    /// Tip another chat user, provisioning their deposit if needed.
    ///
    /// A welcome notice for a newly provisioned recipient is pushed to
    /// `notices` even if the transfer itself is later rejected.
    pub async fn handle_transfer<D>(
        &self,
        source: &ChatUser,
        target_handle: &str,
        amount: i64,
        directory: &D,
        notices: &mut Vec<Notice>,
    ) -> Result<TransferReceipt, TipError>
    where
        D: UserDirectory + ?Sized,
    {
        let source_account = self.deposit_of(source).await?;

        let recipient = directory
            .find_by_handle(target_handle)
            .await
            .ok_or_else(|| TipError::UserNotFound(target_handle.to_string()))?;
        if recipient.is_bot {
            return Err(TipError::BotRecipient(recipient.handle));
        }

        let (recipient_account, created) = self.provision(&recipient).await?;
        if created {
            notices.push(Notice::direct(&recipient, WELCOME));
        }
        if recipient_account.address == source_account.address {
            return Err(TipError::SelfTransfer(recipient_account.address));
        }

        let fee = fee(amount);
        let _guard = self.locks.acquire(&source.id).await;
        let snapshot = self
            .ledger
            .historical_balance(&source_account.address, BALANCE_CONFIRMATIONS)
            .await?;
        let available = self
            .journal
            .available(&source_account.address, &snapshot)
            .await;

        let plan = TransferPlan::new(
            source_account,
            recipient_account.address,
            amount,
            fee,
            available,
        )?;
        info!(
            "user {} sends {} (+{} fee) to {}",
            source.id, amount, fee, recipient.id
        );
        let outcome = self.submit(&plan, &snapshot, BALANCE_CONFIRMATIONS).await?;

        Ok(TransferReceipt {
            recipient,
            amount,
            fee,
            outcome,
        })
    }

    async fn deposit_of(&self, user: &ChatUser) -> Result<DepositAccount, TipError> {
        self.store
            .get(&user.id)
            .await
            .ok_or_else(|| TipError::NoDeposit(user.id.clone()))
    }

    async fn provision(&self, user: &ChatUser) -> Result<(DepositAccount, bool), TipError> {
        let ledger = &self.ledger;
        self.store
            .create_if_absent(user, move || async move {
                ledger.generate_account().await.map_err(TipError::from)
            })
            .await
    }

    async fn submit(
        &self,
        plan: &TransferPlan,
        snapshot: &BalanceSnapshot,
        confirmations: u64,
    ) -> Result<TransferOutcome, TipError> {
        let outcome = self
            .ledger
            .submit_transfer(plan.source(), plan.destination(), plan.amount(), plan.fee())
            .await?;

        if outcome.succeeded {
            let chain_height = snapshot.height + confirmations;
            self.journal
                .record(&plan.source().address, plan.total(), chain_height)
                .await;
        } else {
            warn!(
                "ledger rejected transfer from {}: {}",
                plan.source().address,
                outcome.raw
            );
        }
        Ok(outcome)
    }
}

fn withdraw_notices(user: &ChatUser, receipt: &WithdrawReceipt, notices: &mut Vec<Notice>) {
    let outcome = &receipt.outcome;
    if !outcome.succeeded {
        failure_notices(user, outcome, notices);
        return;
    }
    notices.push(Notice::direct(
        user,
        format!(
            "WITHDRAWN {} to {} ({})",
            receipt.amount,
            receipt.destination,
            outcome.ledger_message.as_deref().unwrap_or("")
        ),
    ));
    notices.push(Notice::direct(
        user,
        format!("TX HASH {}", outcome.tx_hash.as_deref().unwrap_or("unknown")),
    ));
}

fn transfer_notices(source: &ChatUser, receipt: &TransferReceipt, notices: &mut Vec<Notice>) {
    let outcome = &receipt.outcome;
    if !outcome.succeeded {
        failure_notices(source, outcome, notices);
        return;
    }
    notices.push(Notice::direct(
        source,
        format!(
            "SENT {} to {} ({})",
            receipt.amount,
            receipt.recipient.handle,
            outcome.ledger_message.as_deref().unwrap_or("")
        ),
    ));
    notices.push(Notice::direct(
        source,
        format!("TX HASH {}", outcome.tx_hash.as_deref().unwrap_or("unknown")),
    ));
    notices.push(Notice::direct(
        &receipt.recipient,
        format!(
            "User @{} has just tipped you with {} XEM",
            source.handle, receipt.amount
        ),
    ));
    notices.push(Notice::Channel {
        text: format!(
            "User @{} has just tipped {} with {} XEM",
            source.handle, receipt.recipient.handle, receipt.amount
        ),
    });
}

fn failure_notices(user: &ChatUser, outcome: &TransferOutcome, notices: &mut Vec<Notice>) {
    notices.push(Notice::direct(user, "FAILURE"));
    notices.push(Notice::direct(user, outcome.raw.to_string()));
}

pub fn help_text() -> &'static str {
    concat!(
        "*TIPBOT COMMANDS*\n",
        "Commands that can be used in a private chat with the bot:\n",
        " - *balance*\task the bot for your current balance\n",
        " - *send*\ttell the bot to send coins to someone: 'send @gimre 2', omitting the amount will use 10\n",
        " - *deposit*\task the bot for a deposit address\n",
        " - *withdraw*\ttell the bot to withdraw to an address: 'withdraw YOUR-NEM-ADDRESS amount', omitting the amount withdraws all funds\n\n",
        "Commands that can be used in public channels:\n",
        " - *tip*\ttell the bot to tip someone: '!tip @gimre 1', omitting the amount will use 10\n",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balance_message_formats_fraction() {
        let report = BalanceReport {
            address: LedgerAddress::new("TADDR".to_string()),
            height: 100,
            whole: 12,
            remainder: Decimal::new(5, 1),
        };
        assert_eq!(report.message(), "Your balance at block 100 is *12*.5 XEM");

        let even = BalanceReport {
            remainder: Decimal::ZERO,
            ..report
        };
        assert_eq!(even.message(), "Your balance at block 100 is *12*.0 XEM");
    }

    #[test]
    fn test_deposit_message_distinguishes_new_and_existing() {
        let account = DepositAccount::new(
            LedgerAddress::new("TADDR".to_string()),
            "pub".to_string(),
            "priv".to_string(),
        );
        let new = DepositReceipt {
            account: account.clone(),
            created: true,
        };
        let existing = DepositReceipt {
            account,
            created: false,
        };
        assert!(new.message().contains("new deposit address"));
        assert_eq!(existing.message(), "Your deposit address: *TADDR*");
    }

    #[test]
    fn test_help_lists_every_command() {
        for keyword in ["balance", "send", "deposit", "withdraw", "tip"] {
            assert!(help_text().contains(keyword));
        }
    }
}
