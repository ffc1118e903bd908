use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;

use crate::command::{Callback, Invocation};
use crate::context::ExecutionContext;
use crate::message::Reply;
use crate::voice::{AudioSource, VoiceGateway};

fn voice<'a>(invocation: &'a Invocation<'_>) -> anyhow::Result<&'a Arc<dyn VoiceGateway>> {
    invocation
        .services
        .voice
        .as_ref()
        .ok_or_else(|| anyhow!("voice is not available"))
}

/// `yt <url>` plays in the author's voice channel, `yt <channel> <url>` in
/// the named one. Leaves when playback ends. Guild only.
pub struct PlayYoutube;

#[async_trait]
impl Callback for PlayYoutube {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        _ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let Some(guild_id) = invocation.message.guild_id else {
            return Ok(None);
        };
        let voice = voice(invocation)?;

        let (channel_id, url) = match invocation.args.as_slice() {
            [url] => (
                voice
                    .user_channel(guild_id, invocation.message.author_id)
                    .await,
                url,
            ),
            [name, url, ..] => (voice.find_channel(guild_id, name).await, url),
            [] => return Ok(None),
        };
        let Some(channel_id) = channel_id else {
            return Ok(None);
        };

        voice.join(guild_id, channel_id).await?;
        voice
            .play(guild_id, AudioSource::Youtube(url.clone()), true)
            .await?;
        Ok(None)
    }
}

/// `radio <station>` streams `data[station]`, or the argument itself when it
/// names no known station, into the author's voice channel.
pub struct PlayRadio;

#[async_trait]
impl Callback for PlayRadio {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let Some(guild_id) = invocation.message.guild_id else {
            return Ok(None);
        };
        let Some(station) = invocation.args.first() else {
            return Ok(None);
        };
        let voice = voice(invocation)?;

        let Some(channel_id) = voice
            .user_channel(guild_id, invocation.message.author_id)
            .await
        else {
            return Ok(None);
        };

        let url = ctx
            .data
            .get(station)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| station.clone());

        voice.join(guild_id, channel_id).await?;
        voice.play(guild_id, AudioSource::Url(url), false).await?;
        Ok(None)
    }
}
