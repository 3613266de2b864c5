//! Custodial deposit account.

use crate::domain::LedgerAddress;
use serde::{Deserialize, Serialize};

/// A ledger keypair held by the bridge on behalf of one chat user.
///
/// Generated once by the ledger node and never modified afterwards.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositAccount {
    pub address: LedgerAddress,
    pub public_key: String,
    pub private_key: String,
}

impl DepositAccount {
    pub fn new(address: LedgerAddress, public_key: String, private_key: String) -> Self {
        Self {
            address,
            public_key,
            private_key,
        }
    }
}

// Keeps private keys out of logs.
impl std::fmt::Debug for DepositAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepositAccount")
            .field("address", &self.address)
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
