//! Domain primitives: ChatUser, LedgerAddress.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Length of a ledger address once separators are removed.
pub const ADDRESS_LEN: usize = 40;

/// A chat participant, scoped to the network it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUser {
    /// Platform user id (stable, opaque).
    pub id: String,
    /// Display handle used in mentions.
    pub handle: String,
    #[serde(default)]
    pub is_bot: bool,
}

impl ChatUser {
    pub fn new(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handle: handle.into(),
            is_bot: false,
        }
    }

    pub fn bot(id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            is_bot: true,
            ..Self::new(id, handle)
        }
    }
}

impl std::fmt::Display for ChatUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.handle, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("address must have {ADDRESS_LEN} characters once dashes are removed, got {len}")]
pub struct AddressParseError {
    pub len: usize,
}

/// Ledger account address (upper-case base32, no separators).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerAddress(String);

impl LedgerAddress {
    /// Wrap an address reported by the ledger itself.
    pub fn new(addr: String) -> Self {
        LedgerAddress(addr)
    }

    /// Normalize user input: strip `-` separators and whitespace, upper-case,
    /// and require exactly [`ADDRESS_LEN`] characters.
    pub fn parse(raw: &str) -> Result<Self, AddressParseError> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();

        let len = normalized.chars().count();
        if len != ADDRESS_LEN {
            return Err(AddressParseError { len });
        }
        Ok(LedgerAddress(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for LedgerAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for LedgerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
