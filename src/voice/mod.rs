//! Voice-channel collaborator used by audio commands and the idle sweep.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};

use crate::error::Result;

pub mod events;
pub mod driver;
pub mod sweep;

pub use driver::SongbirdVoice;

/// An active voice connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceConnection {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A YouTube video URL, resolved through yt-dlp.
    Youtube(String),
    /// A direct HTTP stream such as an internet radio station.
    Url(String),
}

#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()>;

    /// Queues `source` on the guild's connection. With `leave_on_end` the bot
    /// leaves once the queue drains.
    async fn play(&self, guild_id: GuildId, source: AudioSource, leave_on_end: bool) -> Result<()>;

    async fn leave(&self, guild_id: GuildId) -> Result<()>;

    async fn connections(&self) -> Vec<VoiceConnection>;

    /// Number of users in a voice channel, the bot included. `None` when the
    /// channel is not known.
    async fn member_count(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<usize>;

    /// The voice channel `user_id` is currently connected to.
    async fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId>;

    /// Finds a voice channel in the guild by its exact name.
    async fn find_channel(&self, guild_id: GuildId, name: &str) -> Option<ChannelId>;
}
