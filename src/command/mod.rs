//! Chat commands understood by the tip bot.

use crate::domain::{AddressParseError, LedgerAddress};
use thiserror::Error;

pub mod parser;

pub use parser::parse;

/// Amount used by `send`/`tip` when none is given.
pub const DEFAULT_TIP_AMOUNT: i64 = 10;

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Deposit,
    Balance,
    /// Send funds to another chat user. Amount defaults to
    /// [`DEFAULT_TIP_AMOUNT`].
    Transfer { target_handle: String, amount: i64 },
    /// Withdraw to an external address. `None` means everything left after
    /// the fee.
    Withdraw {
        address: LedgerAddress,
        amount: Option<i64>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Deposit => "deposit",
            Command::Balance => "balance",
            Command::Transfer { .. } => "send",
            Command::Withdraw { .. } => "withdraw",
        }
    }

    /// Whether the command may be issued in a public channel.
    pub fn allowed_in_channel(&self) -> bool {
        matches!(self, Command::Transfer { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Error in {command} command: {reason}")]
    Parse {
        command: &'static str,
        reason: String,
    },
    #[error("target address must have 40 characters, you probably have a typo ({0})")]
    InvalidAddress(#[from] AddressParseError),
}

impl CommandError {
    pub(crate) fn parse(command: &'static str, reason: impl Into<String>) -> Self {
        CommandError::Parse {
            command,
            reason: reason.into(),
        }
    }

    /// Name of the command the failing text was addressed to.
    pub fn command(&self) -> &'static str {
        match self {
            CommandError::Parse { command, .. } => command,
            CommandError::InvalidAddress(_) => "withdraw",
        }
    }
}
