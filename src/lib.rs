pub mod api;
pub mod bridge;
pub mod command;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod store;

pub use bridge::{ChatNetwork, InboundMessage, MessageRouter, UserDirectory};
pub use command::{Command, CommandError};
pub use config::Config;
pub use domain::{fee, ChatUser, DepositAccount, LedgerAddress};
pub use engine::{Notice, TippingEngine};
pub use error::{AppError, TipError};
pub use ledger::{LedgerClient, LedgerError, MockLedger, NemLedgerClient};
pub use store::{DepositStore, FileBackend, MemoryBackend, StoreError};
