use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::VoiceGateway;

pub async fn start_sweep_task(voice: Arc<dyn VoiceGateway>, every: Duration) {
    info!("Starting voice idle sweep every {:?}", every);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; nothing to sweep right after login.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let left = sweep_once(voice.as_ref()).await;
        if left > 0 {
            info!("Voice sweep left {} channel(s)", left);
        }
    }
}

/// Leaves every voice channel where the bot is the only member. Returns the
/// number of channels left. Racy against concurrent joins; best effort.
pub async fn sweep_once(voice: &dyn VoiceGateway) -> usize {
    let mut left = 0;
    for conn in voice.connections().await {
        let Some(members) = voice.member_count(conn.guild_id, conn.channel_id).await else {
            debug!(
                "Voice sweep: membership of channel {} unknown, skipping",
                conn.channel_id
            );
            continue;
        };
        if members > 1 {
            continue;
        }
        match voice.leave(conn.guild_id).await {
            Ok(()) => left += 1,
            Err(e) => warn!(
                "Voice sweep: failed to leave channel {} in guild {}: {}",
                conn.channel_id, conn.guild_id, e
            ),
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BotError, Result};
    use crate::voice::{AudioSource, VoiceConnection};
    use async_trait::async_trait;
    use serenity::model::id::{ChannelId, GuildId, UserId};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeVoice {
        connections: Vec<VoiceConnection>,
        members: HashMap<ChannelId, usize>,
        failing: Vec<GuildId>,
        left: Mutex<Vec<GuildId>>,
    }

    #[async_trait]
    impl VoiceGateway for FakeVoice {
        async fn join(&self, _: GuildId, _: ChannelId) -> Result<()> {
            Ok(())
        }
        async fn play(&self, _: GuildId, _: AudioSource, _: bool) -> Result<()> {
            Ok(())
        }
        async fn leave(&self, guild_id: GuildId) -> Result<()> {
            if self.failing.contains(&guild_id) {
                return Err(BotError::Voice("gateway hiccup".to_string()));
            }
            self.left.lock().unwrap().push(guild_id);
            Ok(())
        }
        async fn connections(&self) -> Vec<VoiceConnection> {
            self.connections.clone()
        }
        async fn member_count(&self, _: GuildId, channel_id: ChannelId) -> Option<usize> {
            self.members.get(&channel_id).copied()
        }
        async fn user_channel(&self, _: GuildId, _: UserId) -> Option<ChannelId> {
            None
        }
        async fn find_channel(&self, _: GuildId, _: &str) -> Option<ChannelId> {
            None
        }
    }

    fn conn(guild: u64, channel: u64) -> VoiceConnection {
        VoiceConnection {
            guild_id: GuildId::new(guild),
            channel_id: ChannelId::new(channel),
        }
    }

    #[tokio::test]
    async fn test_sweep_leaves_only_lonely_channels() {
        let voice = FakeVoice {
            connections: vec![conn(1, 10), conn(2, 20), conn(3, 30), conn(4, 40)],
            members: HashMap::from([
                (ChannelId::new(10), 1),
                (ChannelId::new(20), 3),
                (ChannelId::new(40), 0),
            ]),
            ..Default::default()
        };

        let left = sweep_once(&voice).await;

        assert_eq!(left, 2);
        assert_eq!(
            *voice.left.lock().unwrap(),
            vec![GuildId::new(1), GuildId::new(4)]
        );
    }

    #[tokio::test]
    async fn test_sweep_survives_leave_failure() {
        let voice = FakeVoice {
            connections: vec![conn(1, 10), conn(2, 20)],
            members: HashMap::from([(ChannelId::new(10), 1), (ChannelId::new(20), 1)]),
            failing: vec![GuildId::new(1)],
            ..Default::default()
        };

        let left = sweep_once(&voice).await;

        assert_eq!(left, 1);
        assert_eq!(*voice.left.lock().unwrap(), vec![GuildId::new(2)]);
    }
}
