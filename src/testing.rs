//! Test doubles for the collaborator traits.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::command::Invocation;
use crate::error::{BotError, Result};
use crate::gateway::ReplySink;
use crate::manager::CommandManager;
use crate::message::{InboundMessage, Reply, Services};
use crate::parse::parse_command;
use crate::voice::{AudioSource, VoiceConnection, VoiceGateway};

/// Records every reply instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingSink {
    sent: Arc<Mutex<Vec<(ChannelId, Reply)>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<(ChannelId, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .map(|(_, r)| r.content().to_string())
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<()> {
        if self.fail {
            return Err(BotError::Send("sink is failing".to_string()));
        }
        self.sent.lock().unwrap().push((channel_id, reply.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceCall {
    Join(GuildId, ChannelId),
    Play(GuildId, AudioSource, bool),
    Leave(GuildId),
}

/// A voice collaborator with a scripted view of the guild.
#[derive(Default)]
pub struct RecordingVoice {
    pub calls: Mutex<Vec<VoiceCall>>,
    pub user_channels: HashMap<UserId, ChannelId>,
    pub named_channels: HashMap<String, ChannelId>,
}

impl RecordingVoice {
    pub fn calls(&self) -> Vec<VoiceCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VoiceGateway for RecordingVoice {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(VoiceCall::Join(guild_id, channel_id));
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, source: AudioSource, leave_on_end: bool) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(VoiceCall::Play(guild_id, source, leave_on_end));
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.calls.lock().unwrap().push(VoiceCall::Leave(guild_id));
        Ok(())
    }

    async fn connections(&self) -> Vec<VoiceConnection> {
        Vec::new()
    }

    async fn member_count(&self, _: GuildId, _: ChannelId) -> Option<usize> {
        None
    }

    async fn user_channel(&self, _: GuildId, user_id: UserId) -> Option<ChannelId> {
        self.user_channels.get(&user_id).copied()
    }

    async fn find_channel(&self, _: GuildId, name: &str) -> Option<ChannelId> {
        self.named_channels.get(name).copied()
    }
}

/// Owns what an [`Invocation`] borrows.
pub struct Harness {
    pub manager: CommandManager,
    pub services: Services,
}

impl Harness {
    pub fn new(sink: &RecordingSink) -> Self {
        Self {
            manager: CommandManager::new(),
            services: Services::new(Arc::new(sink.clone())),
        }
    }

    pub fn with_manager(mut self, manager: CommandManager) -> Self {
        self.manager = manager;
        self
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceGateway>) -> Self {
        self.services = self.services.with_voice(voice);
        self
    }

    /// Builds an invocation for a `!`-prefixed message.
    pub fn invocation<'a>(&'a self, message: &'a InboundMessage) -> Invocation<'a> {
        let body = message.content.strip_prefix('!').unwrap_or(&message.content);
        let parsed = parse_command(body).expect("test message has a command name");
        Invocation {
            message,
            prefix: "!",
            name: parsed.name,
            args: parsed.args,
            remainder: parsed.remainder,
            manager: &self.manager,
            services: &self.services,
            dispatcher: None,
        }
    }
}
