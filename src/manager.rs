use std::sync::Arc;
use tracing::{debug, warn};

use crate::bot::Bot;
use crate::command::{Command, Invocation};
use crate::error::Result;
use crate::message::{InboundMessage, Services};
use crate::parse::parse_command;
use crate::permissions::PermissionResolver;

/// An ordered set of commands reachable under one prefix.
///
/// Lookup is first-match-wins; registering a name twice leaves the earlier
/// command in charge.
#[derive(Default)]
pub struct CommandManager {
    commands: Vec<Command>,
    permissions: Option<Arc<dyn PermissionResolver>>,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_commands(commands: Vec<Command>) -> Self {
        Self {
            commands,
            permissions: None,
        }
    }

    /// Sets the resolver used for commands that declare permissions.
    /// Without one, such commands never run.
    pub fn with_permissions(mut self, resolver: Arc<dyn PermissionResolver>) -> Self {
        self.permissions = Some(resolver);
        self
    }

    pub fn register_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn register_commands(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.extend(commands);
    }

    pub fn get_command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.is_command(name))
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Every alias of every command, in registration order.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands
            .iter()
            .flat_map(|c| c.names().iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Whether `message`'s author may run `command`.
    pub async fn authorize(&self, command: &Command, message: &InboundMessage) -> Result<bool> {
        if command.is_public() {
            return Ok(true);
        }

        let Some(resolver) = &self.permissions else {
            warn!(
                "Command '{}' requires permissions but no resolver is configured",
                command.name()
            );
            return Ok(false);
        };

        let granted = resolver.lookup_permissions(message.author_id).await?;
        Ok(command
            .required_permissions()
            .iter()
            .any(|p| granted.contains(p)))
    }

    /// Parses `message` (which must start with `prefix`), resolves the
    /// command and runs it if the author is authorized. Unknown commands and
    /// denied users are ignored.
    pub async fn execute(
        &self,
        message: &InboundMessage,
        prefix: &str,
        services: &Services,
        dispatcher: Option<&Bot>,
    ) -> Result<()> {
        let Some(body) = message.content.strip_prefix(prefix) else {
            return Ok(());
        };
        let Some(parsed) = parse_command(body) else {
            return Ok(());
        };
        let Some(command) = self.get_command(&parsed.name) else {
            debug!("Ignoring unknown command '{}{}'", prefix, parsed.name);
            return Ok(());
        };

        if !self.authorize(command, message).await? {
            debug!(
                "User {} is not permitted to run '{}'",
                message.author_id,
                command.name()
            );
            return Ok(());
        }

        debug!(
            "Executing '{}' for {} with {} argument(s)",
            command.name(),
            message.author_id,
            parsed.args.len()
        );

        let invocation = Invocation {
            message,
            prefix,
            name: parsed.name,
            args: parsed.args,
            remainder: parsed.remainder,
            manager: self,
            services,
            dispatcher,
        };
        command.execute(&invocation).await
    }

    /// Releases manager-held resources. Managers hold none today.
    pub async fn close(&self) -> Result<()> {
        debug!("Closing command manager with {} command(s)", self.len());
        Ok(())
    }
}

impl std::fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandManager")
            .field("commands", &self.command_names())
            .field("has_permissions", &self.permissions.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Reply;
    use crate::permissions::StaticPermissions;
    use crate::testing::RecordingSink;
    use serenity::model::id::{ChannelId, UserId};

    fn reply_with(name: &'static str, text: &'static str) -> Command {
        Command::new([name]).callback_fn(move |_, _| Ok(Some(Reply::text(text))))
    }

    #[test]
    fn test_first_registered_match_wins() {
        let mut manager = CommandManager::new();
        manager.register_command(reply_with("x", "A"));
        manager.register_command(reply_with("x", "B"));

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.command_names(), vec!["x", "x"]);
        let resolved = manager.get_command("x").unwrap();
        assert!(std::ptr::eq(resolved, &manager.commands()[0]));
        assert!(manager.get_command("y").is_none());
    }

    #[tokio::test]
    async fn test_execute_dispatches_first_match() {
        let sink = RecordingSink::new();
        let services = Services::new(Arc::new(sink.clone()));
        let manager = CommandManager::with_commands(vec![reply_with("x", "A"), reply_with("x", "B")]);
        let msg = InboundMessage::new("!x", UserId::new(1), ChannelId::new(2));

        manager.execute(&msg, "!", &services, None).await.unwrap();

        assert_eq!(sink.texts(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let sink = RecordingSink::new();
        let services = Services::new(Arc::new(sink.clone()));
        let manager = CommandManager::with_commands(vec![reply_with("ping", "pong")]);

        for content in ["!nope", "!", "!   ", "ping"] {
            let msg = InboundMessage::new(content, UserId::new(1), ChannelId::new(2));
            manager.execute(&msg, "!", &services, None).await.unwrap();
        }

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_arguments_reach_callback() {
        let sink = RecordingSink::new();
        let services = Services::new(Arc::new(sink.clone()));
        let manager = CommandManager::with_commands(vec![Command::new(["note"]).callback_fn(
            |inv, _| {
                assert_eq!(inv.name, "note");
                assert_eq!(inv.prefix, "!");
                assert_eq!(inv.remainder, r#""foo bar" 42"#);
                Ok(Some(Reply::text(inv.args.join("|"))))
            },
        )]);
        let msg = InboundMessage::new(r#"!note "foo bar" 42"#, UserId::new(1), ChannelId::new(2));

        manager.execute(&msg, "!", &services, None).await.unwrap();

        assert_eq!(sink.texts(), vec!["foo bar|42"]);
    }

    #[tokio::test]
    async fn test_permission_intersection() {
        let sink = RecordingSink::new();
        let services = Services::new(Arc::new(sink.clone()));
        let resolver = StaticPermissions::new()
            .grant(UserId::new(1), ["user"])
            .grant(UserId::new(2), ["mod", "user"]);
        let manager = CommandManager::with_commands(vec![
            reply_with("kick", "kicked").permissions(["mod"])
        ])
        .with_permissions(Arc::new(resolver));

        let plain_user = InboundMessage::new("!kick", UserId::new(1), ChannelId::new(5));
        let moderator = InboundMessage::new("!kick", UserId::new(2), ChannelId::new(5));
        let stranger = InboundMessage::new("!kick", UserId::new(3), ChannelId::new(5));

        manager.execute(&plain_user, "!", &services, None).await.unwrap();
        manager.execute(&stranger, "!", &services, None).await.unwrap();
        assert!(sink.sent().is_empty());

        manager.execute(&moderator, "!", &services, None).await.unwrap();
        assert_eq!(sink.texts(), vec!["kicked"]);
    }

    #[tokio::test]
    async fn test_restricted_command_without_resolver_is_denied() {
        let sink = RecordingSink::new();
        let services = Services::new(Arc::new(sink.clone()));
        let manager =
            CommandManager::with_commands(vec![reply_with("kick", "kicked").permissions(["mod"])]);
        let msg = InboundMessage::new("!kick", UserId::new(2), ChannelId::new(5));

        manager.execute(&msg, "!", &services, None).await.unwrap();

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_noop() {
        let manager = CommandManager::with_commands(vec![reply_with("a", "b")]);
        manager.close().await.unwrap();
        assert_eq!(manager.len(), 1);
    }
}
