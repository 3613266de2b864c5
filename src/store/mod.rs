//! Durable mapping from chat users to their custodial deposit accounts.
//!
//! This module provides:
//! - `DepositStore`, the in-memory map reconciled with a backend on every mutation
//! - `StoreBackend` implementations: a locked JSON file and an in-process memory backend

use crate::domain::{ChatUser, DepositAccount};
use crate::locks::UserLocks;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Persisted record for one chat user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit: Option<DepositAccount>,
}

/// Full store contents keyed by chat user id.
pub type Snapshot = BTreeMap<String, UserRecord>;

/// Where snapshots are durably kept.
#[async_trait]
pub trait StoreBackend: Send + Sync + fmt::Debug {
    /// Read the last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Durably replace the saved snapshot.
    async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("gave up after {waited:?} waiting for store lock {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
}

/// Chat user id → deposit account, saved after every mutation.
///
/// `users` is only held for map reads and writes. Account generation runs
/// under a per-user lock, and saves are ordered by `save_lock`.
#[derive(Debug)]
pub struct DepositStore {
    backend: Arc<dyn StoreBackend>,
    users: Mutex<Snapshot>,
    provisioning: UserLocks,
    save_lock: Mutex<()>,
}

impl DepositStore {
    /// Load the store from `backend`, initializing and saving an empty one
    /// if nothing has been persisted yet.
    pub async fn open(backend: Arc<dyn StoreBackend>) -> Result<Self, StoreError> {
        let users = match backend.load().await? {
            Some(snapshot) => snapshot,
            None => {
                let empty = Snapshot::new();
                backend.save(&empty).await?;
                empty
            }
        };

        info!("Deposit store opened with {} users", users.len());
        Ok(Self {
            backend,
            users: Mutex::new(users),
            provisioning: UserLocks::new(),
            save_lock: Mutex::new(()),
        })
    }

    pub async fn get(&self, user_id: &str) -> Option<DepositAccount> {
        self.users
            .lock()
            .await
            .get(user_id)
            .and_then(|record| record.deposit.clone())
    }

    /// Number of users holding a deposit account.
    pub async fn deposit_count(&self) -> usize {
        self.users
            .lock()
            .await
            .values()
            .filter(|record| record.deposit.is_some())
            .count()
    }

    /// Return the user's account, creating it with `factory` if absent.
    ///
    /// The boolean is `true` only when the account was created by this call.
    /// Calls for the same user are serialized, so `factory` runs at most once
    /// per user; other users are not blocked while it runs. The new account
    /// becomes visible only after the save succeeds.
    pub async fn create_if_absent<F, Fut, E>(
        &self,
        user: &ChatUser,
        factory: F,
    ) -> Result<(DepositAccount, bool), E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<DepositAccount, E>> + Send,
        E: From<StoreError>,
    {
        let _provisioning = self.provisioning.acquire(&user.id).await;
        if let Some(existing) = self.get(&user.id).await {
            return Ok((existing, false));
        }

        let account = factory().await?;

        let _saving = self.save_lock.lock().await;
        let next = {
            let users = self.users.lock().await;
            if let Some(existing) = users.get(&user.id).and_then(|r| r.deposit.clone()) {
                return Ok((existing, false));
            }
            let mut next = users.clone();
            next.insert(
                user.id.clone(),
                UserRecord {
                    deposit: Some(account.clone()),
                },
            );
            next
        };

        if let Err(e) = self.backend.save(&next).await {
            error!(
                "Failed to persist deposit for user={} address={}: {}",
                user.id, account.address, e
            );
            return Err(e.into());
        }

        self.users.lock().await.insert(
            user.id.clone(),
            UserRecord {
                deposit: Some(account.clone()),
            },
        );
        info!("New deposit address: {} -> {}", user.id, account.address);
        Ok((account, true))
    }
}
