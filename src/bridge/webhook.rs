//! Chat network reached through an outgoing webhook.
//!
//! Outbound messages are POSTed as JSON to a fixed URL. The user directory
//! is learned from inbound events, as the webhook side has no lookup API.

use super::{ChatError, ChatNetwork, UserDirectory};
use crate::domain::ChatUser;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Name outbound messages are posted under.
pub const BOT_USERNAME: &str = "tipbot";

#[derive(Debug, Serialize)]
struct OutboundPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    text: &'a str,
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<&'a str>,
}

#[derive(Debug)]
pub struct WebhookNetwork {
    name: String,
    url: String,
    client: Client,
    users: RwLock<HashMap<String, ChatUser>>,
}

impl WebhookNetwork {
    pub fn new(name: impl Into<String>, url: String, timeout: Duration) -> Result<Self, ChatError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Delivery {
                network: name.clone(),
                reason: format!("failed to build http client: {}", e),
            })?;
        Ok(Self {
            name,
            url,
            client,
            users: RwLock::new(HashMap::new()),
        })
    }

    pub async fn known_users(&self) -> usize {
        self.users.read().await.len()
    }

    async fn post(&self, payload: &OutboundPayload<'_>) -> Result<(), ChatError> {
        debug!("POST {} ({})", self.url, self.name);
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| self.delivery_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.delivery_error(format!("HTTP {}", status.as_u16())));
        }
        Ok(())
    }

    fn delivery_error(&self, reason: String) -> ChatError {
        ChatError::Delivery {
            network: self.name.clone(),
            reason,
        }
    }
}

#[async_trait]
impl UserDirectory for WebhookNetwork {
    async fn find_by_handle(&self, handle: &str) -> Option<ChatUser> {
        let handle = handle.trim_start_matches('@');
        self.users
            .read()
            .await
            .values()
            .find(|u| u.handle.eq_ignore_ascii_case(handle))
            .cloned()
    }

    async fn find_by_id(&self, id: &str) -> Option<ChatUser> {
        self.users.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ChatNetwork for WebhookNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_to_user(&self, user: &ChatUser, text: &str) -> Result<(), ChatError> {
        self.post(&OutboundPayload {
            channel: None,
            user: Some(&user.id),
            text,
            username: BOT_USERNAME,
            author: None,
        })
        .await
    }

    async fn send_to_channel(
        &self,
        channel: &str,
        text: &str,
        author: Option<&str>,
    ) -> Result<(), ChatError> {
        self.post(&OutboundPayload {
            channel: Some(channel),
            user: None,
            text,
            username: author.unwrap_or(BOT_USERNAME),
            author,
        })
        .await
    }

    async fn remember_user(&self, user: &ChatUser) {
        let mut users = self.users.write().await;
        if users.get(&user.id) != Some(user) {
            users.insert(user.id.clone(), user.clone());
        }
    }
}
