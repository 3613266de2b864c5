use super::markup::normalize;
use super::{ChannelMapping, ChatNetwork, InboundMessage};
use crate::command::{self, Command};
use crate::engine::{Notice, TippingEngine};
use crate::error::TipError;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns both networks: relays chat between mapped channels and hands
/// commands from the primary network to the engine.
#[derive(Debug)]
pub struct MessageRouter {
    primary: Arc<dyn ChatNetwork>,
    secondary: Arc<dyn ChatNetwork>,
    mapping: ChannelMapping,
    engine: Arc<TippingEngine>,
}

impl MessageRouter {
    pub fn new(
        primary: Arc<dyn ChatNetwork>,
        secondary: Arc<dyn ChatNetwork>,
        mapping: ChannelMapping,
        engine: Arc<TippingEngine>,
    ) -> Self {
        Self {
            primary,
            secondary,
            mapping,
            engine,
        }
    }

    /// Handle a message from the primary network.
    pub async fn handle_primary(&self, msg: InboundMessage) {
        self.primary.remember_user(&msg.sender).await;
        if msg.sender.is_bot {
            debug!("ignoring bot message from {}", msg.sender);
            return;
        }

        let text = normalize(&msg.text, self.primary.as_ref()).await;
        let mirror = if msg.channel.is_direct() {
            None
        } else {
            self.mapping.secondary_for(&msg.channel.name)
        };

        if let Some(notices) = self.dispatch(&msg, &text).await {
            self.deliver(&msg, mirror, notices).await;
        }

        if let Some(secondary_channel) = mirror {
            let relayed = format!("<{}> {}", msg.sender.handle, text);
            debug!("relaying {} -> {}", msg.channel.name, secondary_channel);
            if let Err(e) = self
                .secondary
                .send_to_channel(secondary_channel, &relayed, None)
                .await
            {
                warn!("relay to {} failed: {}", self.secondary.name(), e);
            }
        }
    }

    /// Handle a message from the secondary network. Only relayed, never
    /// interpreted as a command.
    pub async fn handle_secondary(&self, msg: InboundMessage) {
        self.secondary.remember_user(&msg.sender).await;
        if msg.sender.is_bot || msg.channel.is_direct() {
            return;
        }

        let Some(primary_channel) = self.mapping.primary_for(&msg.channel.name) else {
            debug!("channel {} is not mapped, not relaying", msg.channel.name);
            return;
        };
        if let Err(e) = self
            .primary
            .send_to_channel(primary_channel, &msg.text, Some(&msg.sender.handle))
            .await
        {
            warn!("relay to {} failed: {}", self.primary.name(), e);
        }
    }

    /// Notices for `text`, or `None` when it is not something to act on.
    async fn dispatch(&self, msg: &InboundMessage, text: &str) -> Option<Vec<Notice>> {
        let direct = msg.channel.is_direct();
        match command::parse(text) {
            Ok(None) => None,
            Ok(Some(cmd)) if direct || cmd.allowed_in_channel() => {
                info!(
                    "{} from {} in {}",
                    cmd.name(),
                    msg.sender,
                    msg.channel.name
                );
                Some(self.execute(msg, cmd).await)
            }
            Ok(Some(cmd)) => {
                debug!("{} is not accepted in public channels", cmd.name());
                None
            }
            Err(e) if direct || e.command() == "send" => {
                let text = TipError::from(e).user_message();
                Some(vec![Notice::Direct {
                    user: msg.sender.clone(),
                    text,
                }])
            }
            Err(e) => {
                debug!("ignoring malformed {} in public channel", e.command());
                None
            }
        }
    }

    async fn execute(&self, msg: &InboundMessage, cmd: Command) -> Vec<Notice> {
        self.engine
            .execute(&msg.sender, cmd, self.primary.as_ref())
            .await
    }

    /// Channel notices go to the originating channel and its mirror; they
    /// are dropped for direct conversations.
    async fn deliver(&self, origin: &InboundMessage, mirror: Option<&str>, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Direct { user, text } => {
                    if let Err(e) = self.primary.send_to_user(&user, &text).await {
                        warn!("could not message {}: {}", user, e);
                    }
                }
                Notice::Channel { text } => {
                    if origin.channel.is_direct() {
                        continue;
                    }
                    if let Err(e) = self
                        .primary
                        .send_to_channel(&origin.channel.name, &text, None)
                        .await
                    {
                        warn!("could not post to {}: {}", origin.channel.name, e);
                    }
                    if let Some(secondary_channel) = mirror {
                        if let Err(e) = self
                            .secondary
                            .send_to_channel(secondary_channel, &text, None)
                            .await
                        {
                            warn!("could not post to {}: {}", secondary_channel, e);
                        }
                    }
                }
            }
        }
    }
}
