use serenity::async_trait;
use serenity::model::id::GuildId;
use songbird::{Event, EventContext, EventHandler as VoiceEventHandler};
use std::sync::{Arc, Mutex, PoisonError};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

/// Leaves the guild's voice channel when a track ends and nothing else is
/// queued after `idle_timeout`.
pub struct LeaveWhenIdle {
    pub guild_id: GuildId,
    pub manager: Arc<songbird::Songbird>,
    pub idle_timeout: Duration,
    pub joined: Arc<Mutex<HashSet<GuildId>>>,
}

#[async_trait]
impl VoiceEventHandler for LeaveWhenIdle {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(_) = ctx {
            let manager = self.manager.clone();
            let guild_id = self.guild_id;
            let idle_timeout = self.idle_timeout;
            let joined = self.joined.clone();

            tokio::spawn(async move {
                if !idle_timeout.is_zero() {
                    info!(
                        "Track ended in guild {}, leaving in {:?} unless more is queued",
                        guild_id, idle_timeout
                    );
                    tokio::time::sleep(idle_timeout).await;
                }

                let Some(handler_lock) = manager.get(guild_id) else {
                    return;
                };
                let handler = handler_lock.lock().await;
                if handler.queue().is_empty() {
                    drop(handler);
                    info!("Playback finished in guild {}, leaving channel.", guild_id);
                    if let Err(e) = manager.remove(guild_id).await {
                        warn!("Failed to leave voice in guild {}: {}", guild_id, e);
                    }
                    joined
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&guild_id);
                }
            });
        }
        None
    }
}
