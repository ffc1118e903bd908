use async_trait::async_trait;
use serde_json::Value;

use crate::command::{Callback, Invocation};
use crate::context::ExecutionContext;
use crate::message::Reply;

/// `note <key> <value>` stores a value in the current scope;
/// `note <key>` reads it back to the author.
pub struct Note;

#[async_trait]
impl Callback for Note {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        let author = invocation.message.author_id;
        match invocation.args.as_slice() {
            [] => Ok(None),
            [key] => {
                let text = match ctx.context().get(key) {
                    Some(Value::String(value)) => value,
                    Some(other) => other.to_string(),
                    None => format!("nothing is noted under '{}'", key),
                };
                Ok(Some(Reply::mentioning(author, text)))
            }
            [key, value, ..] => {
                ctx.context().insert(key.clone(), Value::String(value.clone()));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::message::InboundMessage;
    use crate::testing::{Harness, RecordingSink};
    use serenity::model::id::{ChannelId, GuildId, UserId};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_note_round_trip_within_guild() {
        let sink = RecordingSink::new();
        let harness = Harness::new(&sink);
        let note = Command::new(["note"]).callback(Arc::new(Note));
        let guild = GuildId::new(9);

        let store = InboundMessage::new(r#"!note "shopping list" milk"#, UserId::new(1), ChannelId::new(2))
            .in_guild(guild);
        let read = InboundMessage::new(r#"!note "shopping list""#, UserId::new(3), ChannelId::new(4))
            .in_guild(guild);

        note.execute(&harness.invocation(&store)).await.unwrap();
        assert!(sink.sent().is_empty());

        note.execute(&harness.invocation(&read)).await.unwrap();
        assert_eq!(
            sink.sent(),
            vec![(ChannelId::new(4), Reply::mentioning(UserId::new(3), "milk"))]
        );
    }

    #[tokio::test]
    async fn test_note_is_scoped_per_channel_outside_guilds() {
        let sink = RecordingSink::new();
        let harness = Harness::new(&sink);
        let note = Command::new(["note"]).callback(Arc::new(Note));

        let store = InboundMessage::new("!note key value", UserId::new(1), ChannelId::new(2));
        let elsewhere = InboundMessage::new("!note key", UserId::new(1), ChannelId::new(3));

        note.execute(&harness.invocation(&store)).await.unwrap();
        note.execute(&harness.invocation(&elsewhere)).await.unwrap();

        assert_eq!(
            sink.texts(),
            vec!["nothing is noted under 'key'"]
        );
    }
}
