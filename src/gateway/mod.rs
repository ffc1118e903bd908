//! Narrow interfaces to the chat gateway.

use async_trait::async_trait;
use serenity::model::id::ChannelId;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::message::{InboundMessage, Reply};

pub mod serenity_gateway;

pub use serenity_gateway::SerenityGateway;

/// Events the gateway pushes to the dispatcher after a successful login.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready,
    Message(InboundMessage),
}

pub type GatewayEvents = mpsc::UnboundedSender<GatewayEvent>;

#[async_trait]
pub trait Gateway: Send + Sync {
    /// Connects with `token`. Resolves once the connection is usable;
    /// afterwards events flow into `events` until [`Gateway::close`].
    async fn login(&self, token: &str, events: GatewayEvents) -> Result<()>;

    async fn close(&self) -> Result<()>;

    async fn set_presence(&self, text: &str);
}

/// Sends replies back to a channel.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<()>;
}
