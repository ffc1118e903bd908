//! Transport-neutral message types shared by the dispatch core and the
//! gateway adapters.

use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use std::sync::Arc;

use crate::gateway::ReplySink;
use crate::voice::VoiceGateway;

/// A text message delivered by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub id: Option<MessageId>,
    pub content: String,
    pub author_id: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub channel_id: Option<ChannelId>,
    pub guild_id: Option<GuildId>,
}

impl InboundMessage {
    /// Convenience constructor for a guild-less message in a channel.
    pub fn new(content: impl Into<String>, author_id: UserId, channel_id: ChannelId) -> Self {
        Self {
            id: None,
            content: content.into(),
            author_id,
            author_name: String::new(),
            author_is_bot: false,
            channel_id: Some(channel_id),
            guild_id: None,
        }
    }

    pub fn in_guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }
}

impl From<&serenity::model::channel::Message> for InboundMessage {
    fn from(msg: &serenity::model::channel::Message) -> Self {
        Self {
            id: Some(msg.id),
            content: msg.content.clone(),
            author_id: msg.author.id,
            author_name: msg.author.name.clone(),
            author_is_bot: msg.author.bot,
            channel_id: Some(msg.channel_id),
            guild_id: msg.guild_id,
        }
    }
}

/// Extra formatting for a structured reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyOptions {
    /// Attachment URLs or local file paths.
    pub files: Vec<String>,
    /// Mention this user at the start of the reply.
    pub mention: Option<UserId>,
}

/// What a command callback hands back to be sent to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Message {
        content: String,
        options: ReplyOptions,
    },
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Reply::Text(content.into())
    }

    pub fn with_files(content: impl Into<String>, files: Vec<String>) -> Self {
        Reply::Message {
            content: content.into(),
            options: ReplyOptions {
                files,
                mention: None,
            },
        }
    }

    pub fn mentioning(user: UserId, content: impl Into<String>) -> Self {
        Reply::Message {
            content: content.into(),
            options: ReplyOptions {
                files: Vec::new(),
                mention: Some(user),
            },
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Reply::Text(content) => content,
            Reply::Message { content, .. } => content,
        }
    }
}

/// Static facts about the running bot, used by informational commands.
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub name: String,
    pub version: String,
    pub authors: String,
}

impl Default for BotInfo {
    fn default() -> Self {
        Self {
            name: "WololoBot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            authors: env!("CARGO_PKG_AUTHORS").to_string(),
        }
    }
}

/// Collaborators a command invocation can reach.
#[derive(Clone)]
pub struct Services {
    pub replies: Arc<dyn ReplySink>,
    pub voice: Option<Arc<dyn VoiceGateway>>,
    pub info: BotInfo,
}

impl Services {
    pub fn new(replies: Arc<dyn ReplySink>) -> Self {
        Self {
            replies,
            voice: None,
            info: BotInfo::default(),
        }
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceGateway>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_info(mut self, info: BotInfo) -> Self {
        self.info = info;
        self
    }
}
