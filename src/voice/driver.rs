use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::model::channel::ChannelType;
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::input::{HttpRequest, Input, YoutubeDl};
use songbird::{Event, Songbird, TrackEvent};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use super::events::LeaveWhenIdle;
use super::{AudioSource, VoiceConnection, VoiceGateway};
use crate::error::{BotError, Result};

/// [`VoiceGateway`] backed by songbird, with the serenity cache supplying
/// channel membership.
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    http_client: reqwest::Client,
    cache: RwLock<Option<Arc<Cache>>>,
    joined: Arc<Mutex<HashSet<GuildId>>>,
    idle_timeout: Duration,
}

impl SongbirdVoice {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            manager: Songbird::serenity(),
            http_client: reqwest::Client::new(),
            cache: RwLock::new(None),
            joined: Arc::new(Mutex::new(HashSet::new())),
            idle_timeout,
        }
    }

    /// The songbird instance to register with the serenity client.
    pub fn manager(&self) -> Arc<Songbird> {
        self.manager.clone()
    }

    /// Attaches the cache of a freshly built client.
    pub fn attach_cache(&self, cache: Arc<Cache>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(cache);
    }

    fn cache(&self) -> Option<Arc<Cache>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn joined_guilds(&self) -> Vec<GuildId> {
        self.joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    fn forget(&self, guild_id: GuildId) {
        self.joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&guild_id);
    }
}

fn count_members(cache: &Cache, guild_id: GuildId, channel_id: ChannelId) -> Option<usize> {
    let guild = cache.guild(guild_id)?;
    if !guild.channels.contains_key(&channel_id) {
        return None;
    }
    Some(
        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel_id))
            .count(),
    )
}

fn voice_channel_of(cache: &Cache, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = cache.guild(guild_id)?;
    guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id)
}

fn voice_channel_named(cache: &Cache, guild_id: GuildId, name: &str) -> Option<ChannelId> {
    let guild = cache.guild(guild_id)?;
    guild
        .channels
        .values()
        .find(|ch| matches!(ch.kind, ChannelType::Voice | ChannelType::Stage) && ch.name == name)
        .map(|ch| ch.id)
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn join(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<()> {
        info!("Joining voice channel {} in guild {}", channel_id, guild_id);
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| BotError::Voice(format!("failed to join {}: {}", channel_id, e)))?;
        self.joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(guild_id);
        Ok(())
    }

    async fn play(&self, guild_id: GuildId, source: AudioSource, leave_on_end: bool) -> Result<()> {
        let handler_lock = self
            .manager
            .get(guild_id)
            .ok_or_else(|| BotError::Voice(format!("not connected in guild {}", guild_id)))?;

        let input: Input = match source {
            AudioSource::Youtube(url) => YoutubeDl::new(self.http_client.clone(), url).into(),
            AudioSource::Url(url) => HttpRequest::new(self.http_client.clone(), url).into(),
        };

        let mut handler = handler_lock.lock().await;
        let track = handler.enqueue_input(input).await;
        debug!("Queued track in guild {} ({} queued)", guild_id, handler.queue().len());

        if leave_on_end {
            track
                .add_event(
                    Event::Track(TrackEvent::End),
                    LeaveWhenIdle {
                        guild_id,
                        manager: self.manager.clone(),
                        idle_timeout: self.idle_timeout,
                        joined: self.joined.clone(),
                    },
                )
                .map_err(|e| BotError::Voice(e.to_string()))?;
        }
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<()> {
        self.forget(guild_id);
        if self.manager.get(guild_id).is_none() {
            return Ok(());
        }
        info!("Leaving voice in guild {}", guild_id);
        self.manager
            .remove(guild_id)
            .await
            .map_err(|e| BotError::Voice(e.to_string()))
    }

    async fn connections(&self) -> Vec<VoiceConnection> {
        let mut connections = Vec::new();
        for guild_id in self.joined_guilds() {
            let Some(call) = self.manager.get(guild_id) else {
                self.forget(guild_id);
                continue;
            };
            let current = call.lock().await.current_channel();
            match current {
                Some(channel) => connections.push(VoiceConnection {
                    guild_id,
                    channel_id: ChannelId::new(channel.0.get()),
                }),
                None => self.forget(guild_id),
            }
        }
        connections
    }

    async fn member_count(&self, guild_id: GuildId, channel_id: ChannelId) -> Option<usize> {
        let cache = self.cache()?;
        count_members(&cache, guild_id, channel_id)
    }

    async fn user_channel(&self, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
        let cache = self.cache()?;
        voice_channel_of(&cache, guild_id, user_id)
    }

    async fn find_channel(&self, guild_id: GuildId, name: &str) -> Option<ChannelId> {
        let cache = self.cache()?;
        voice_channel_named(&cache, guild_id, name)
    }
}
