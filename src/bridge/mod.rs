//! Chat side of the bridge.
//!
//! This module provides:
//! - `ChatNetwork` / `UserDirectory`, the adapter seam for each chat network
//! - `MessageRouter`, relaying between mapped channels and dispatching commands
//! - Markup normalization and channel mapping
//! - `WebhookNetwork`, an adapter posting to an HTTP webhook

pub mod mapping;
pub mod markup;
pub mod network;
pub mod router;
pub mod webhook;

pub use mapping::{ChannelMapping, MappingError};
pub use network::{
    Channel, ChannelKind, ChatError, ChatNetwork, InboundMessage, UserDirectory,
};
pub use router::MessageRouter;
pub use webhook::WebhookNetwork;
