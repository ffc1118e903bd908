use async_trait::async_trait;
use serenity::all::{
    ActivityData, ChannelId, Client, Context, CreateAttachment, CreateMessage, EventHandler,
    GatewayIntents, Http, Message, Ready, ShardManager,
};
use songbird::serenity::SerenityInit;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{Gateway, GatewayEvent, GatewayEvents, ReplySink};
use crate::config::DISCORD_MESSAGE_LIMIT;
use crate::error::{BotError, Result};
use crate::message::{InboundMessage, Reply, ReplyOptions};
use crate::voice::SongbirdVoice;

type ContextSlot = Arc<Mutex<Option<Context>>>;

/// Forwards serenity events into the dispatcher's event channel.
struct Forwarder {
    events: GatewayEvents,
    ready: Mutex<Option<oneshot::Sender<()>>>,
    context: ContextSlot,
}

#[async_trait]
impl EventHandler for Forwarder {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Connected to gateway as {}", ready.user.name);
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
        if let Some(tx) = self
            .ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(());
        }
        let _ = self.events.send(GatewayEvent::Ready);
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if self
            .events
            .send(GatewayEvent::Message(InboundMessage::from(&msg)))
            .is_err()
        {
            debug!("Dropping message {}: dispatcher is gone", msg.id);
        }
    }
}

struct Session {
    http: Arc<Http>,
    shard_manager: Arc<ShardManager>,
    context: ContextSlot,
    task: JoinHandle<()>,
}

/// Serenity-backed [`Gateway`] and [`ReplySink`].
pub struct SerenityGateway {
    voice: Arc<SongbirdVoice>,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl SerenityGateway {
    pub fn new(voice: Arc<SongbirdVoice>) -> Self {
        Self {
            voice,
            session: tokio::sync::Mutex::new(None),
        }
    }

    fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_VOICE_STATES
    }

    async fn http(&self) -> Result<Arc<Http>> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.http.clone())
            .ok_or(BotError::NotConnected)
    }
}

#[async_trait]
impl Gateway for SerenityGateway {
    async fn login(&self, token: &str, events: GatewayEvents) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(BotError::AlreadyConnected);
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let context: ContextSlot = Arc::new(Mutex::new(None));
        let forwarder = Forwarder {
            events,
            ready: Mutex::new(Some(ready_tx)),
            context: context.clone(),
        };

        let mut client = Client::builder(token, Self::intents())
            .event_handler(forwarder)
            .register_songbird_with(self.voice.manager())
            .await
            .map_err(|e| BotError::AuthFailure(format!("failed to create client: {}", e)))?;

        self.voice.attach_cache(client.cache.clone());
        let http = client.http.clone();
        let shard_manager = client.shard_manager.clone();

        let (failed_tx, failed_rx) = oneshot::channel::<String>();
        let task = tokio::spawn(async move {
            if let Err(why) = client.start().await {
                error!("Gateway client error: {:?}", why);
                let _ = failed_tx.send(why.to_string());
            }
        });

        tokio::select! {
            Ok(()) = ready_rx => {
                *session = Some(Session { http, shard_manager, context, task });
                Ok(())
            }
            failure = failed_rx => {
                let reason = failure.unwrap_or_else(|_| "connection ended before ready".to_string());
                shard_manager.shutdown_all().await;
                task.abort();
                Err(BotError::AuthFailure(reason))
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Err(BotError::NotConnected);
        };

        info!("Shutting down gateway shards...");
        session.shard_manager.shutdown_all().await;
        *session
            .context
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        match tokio::time::timeout(Duration::from_secs(10), session.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BotError::Teardown(e.to_string())),
            Err(_) => Err(BotError::Teardown(
                "gateway task did not stop within 10s".to_string(),
            )),
        }
    }

    async fn set_presence(&self, text: &str) {
        let session = self.session.lock().await;
        let ctx = session.as_ref().and_then(|s| {
            s.context
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        });
        match ctx {
            Some(ctx) => ctx.set_activity(Some(ActivityData::playing(text))),
            None => warn!("Cannot set presence: gateway not ready"),
        }
    }
}

/// Splits `content` into pieces of at most `limit` characters, preferring
/// line breaks.
pub fn split_for_discord(content: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            for ch in line.chars() {
                if current_len == limit {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(ch);
                current_len += 1;
            }
        } else {
            current.push_str(line);
            current_len += line_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

async fn load_attachment(http: &Arc<Http>, file: &str) -> Result<CreateAttachment> {
    let attachment = if file.starts_with("http://") || file.starts_with("https://") {
        CreateAttachment::url(http, file).await
    } else {
        CreateAttachment::path(file).await
    };
    attachment.map_err(|e| BotError::Send(format!("failed to load attachment {}: {}", file, e)))
}

#[async_trait]
impl ReplySink for SerenityGateway {
    async fn send(&self, channel_id: ChannelId, reply: &Reply) -> Result<()> {
        let http = self.http().await?;

        let (content, options) = match reply {
            Reply::Text(content) => (content.clone(), ReplyOptions::default()),
            Reply::Message { content, options } => (content.clone(), options.clone()),
        };
        let content = match options.mention {
            Some(user) => format!("<@{}> {}", user, content),
            None => content,
        };
        if content.is_empty() && options.files.is_empty() {
            return Ok(());
        }

        let mut chunks = split_for_discord(&content, DISCORD_MESSAGE_LIMIT).into_iter();
        let mut first = CreateMessage::new().content(chunks.next().unwrap_or_default());
        for file in &options.files {
            first = first.add_file(load_attachment(&http, file).await?);
        }

        debug!("Sending reply to channel {}", channel_id);
        channel_id
            .send_message(&http, first)
            .await
            .map_err(|e| BotError::Send(e.to_string()))?;
        for chunk in chunks {
            channel_id
                .send_message(&http, CreateMessage::new().content(chunk))
                .await
                .map_err(|e| BotError::Send(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_for_discord("hello", 2000), vec!["hello"]);
        assert!(split_for_discord("", 2000).is_empty());
    }

    #[test]
    fn test_split_prefers_line_breaks() {
        let chunks = split_for_discord("aaaa\nbbbb\ncc", 10);
        assert_eq!(chunks, vec!["aaaa\nbbbb\n", "cc"]);
    }

    #[test]
    fn test_split_long_line_on_char_boundaries() {
        let chunks = split_for_discord("ééééé", 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }
}
