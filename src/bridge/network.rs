use crate::domain::ChatUser;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("delivery to {network} failed: {reason}")]
    Delivery { network: String, reason: String },
}

/// Lookup of chat users on one network.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by handle. A leading `@` is ignored.
    async fn find_by_handle(&self, handle: &str) -> Option<ChatUser>;

    async fn find_by_id(&self, id: &str) -> Option<ChatUser>;
}

/// One side of the bridge.
#[async_trait]
pub trait ChatNetwork: UserDirectory + fmt::Debug {
    fn name(&self) -> &str;

    async fn send_to_user(&self, user: &ChatUser, text: &str) -> Result<(), ChatError>;

    /// Post to a channel, optionally on behalf of a relayed `author`.
    async fn send_to_channel(
        &self,
        channel: &str,
        text: &str,
        author: Option<&str>,
    ) -> Result<(), ChatError>;

    /// Record a user seen in inbound traffic.
    async fn remember_user(&self, _user: &ChatUser) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    #[default]
    Public,
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub kind: ChannelKind,
}

impl Channel {
    pub fn public(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Public,
        }
    }

    pub fn direct(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ChannelKind::Direct,
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }
}

/// A message received from either network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: ChatUser,
    pub channel: Channel,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_from_json() {
        let msg: InboundMessage = serde_json::from_str(
            r##"{"sender":{"id":"U1","handle":"alice"},"channel":{"name":"#general"},"text":"hi"}"##,
        )
        .unwrap();
        assert_eq!(msg.channel, Channel::public("#general"));
        assert!(!msg.sender.is_bot);

        let dm: InboundMessage = serde_json::from_str(
            r#"{"sender":{"id":"U1","handle":"alice","isBot":false},"channel":{"name":"D1","kind":"direct"},"text":"balance"}"#,
        )
        .unwrap();
        assert!(dm.channel.is_direct());
    }
}
