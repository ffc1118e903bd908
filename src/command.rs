use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bot::Bot;
use crate::context::{ContextObject, ContextStore, ExecutionContext};
use crate::error::{BotError, Result};
use crate::manager::CommandManager;
use crate::message::{InboundMessage, Reply, Services};
use crate::templates::TemplateRegistry;

/// One runtime request to execute a command.
pub struct Invocation<'a> {
    pub message: &'a InboundMessage,
    /// The prefix that routed the message to the manager.
    pub prefix: &'a str,
    /// The name the command was invoked under.
    pub name: String,
    /// Arguments split on whitespace, double-quoted spans kept whole.
    pub args: Vec<String>,
    /// Everything after the command name, untouched.
    pub remainder: String,
    pub manager: &'a CommandManager,
    pub services: &'a Services,
    pub dispatcher: Option<&'a Bot>,
}

/// The behaviour behind a command.
#[async_trait]
pub trait Callback: Send + Sync {
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>>;
}

/// Adapts a synchronous closure into a [`Callback`].
pub struct FnCallback<F>(pub F);

#[async_trait]
impl<F> Callback for FnCallback<F>
where
    F: Fn(&Invocation<'_>, &ExecutionContext) -> anyhow::Result<Option<Reply>> + Send + Sync,
{
    async fn call(
        &self,
        invocation: &Invocation<'_>,
        ctx: &ExecutionContext,
    ) -> anyhow::Result<Option<Reply>> {
        (self.0)(invocation, ctx)
    }
}

/// One or several names for a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandNames {
    One(String),
    Many(Vec<String>),
}

impl CommandNames {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            CommandNames::One(name) => vec![name],
            CommandNames::Many(names) => names,
        }
    }
}

/// Declarative description of a command, as stored in a command set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: CommandNames,
    /// Name of a template in the [`TemplateRegistry`].
    pub callback: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// A named, invocable unit with its own execution contexts.
pub struct Command {
    names: Vec<String>,
    usage: String,
    help: String,
    permissions: Vec<String>,
    callback: Option<Arc<dyn Callback>>,
    contexts: ContextStore,
}

impl Command {
    /// Creates a command with no callback. Executing it does nothing until
    /// one is attached with [`Command::callback`].
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            usage: String::new(),
            help: String::new(),
            permissions: Vec::new(),
            callback: None,
            contexts: ContextStore::default(),
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the static data blob. Resets all scoped contexts.
    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.contexts = ContextStore::new(ContextObject::from_map(data));
        self
    }

    pub fn callback(mut self, callback: Arc<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn callback_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Invocation<'_>, &ExecutionContext) -> anyhow::Result<Option<Reply>>
            + Send
            + Sync
            + 'static,
    {
        self.callback(Arc::new(FnCallback(f)))
    }

    /// Builds a command from its declarative form, resolving the callback
    /// through `templates`.
    pub fn from_definition(def: CommandDefinition, templates: &TemplateRegistry) -> Result<Self> {
        let names = def.name.into_vec();
        let Some(primary) = names.first().cloned() else {
            return Err(BotError::InvalidDefinition(
                "command definition has no name".to_string(),
            ));
        };
        if names.iter().any(|n| n.trim().is_empty() || n.contains(char::is_whitespace)) {
            return Err(BotError::InvalidDefinition(format!(
                "command '{}' has an empty or whitespace-containing name",
                primary
            )));
        }

        let callback = templates
            .get(&def.callback)
            .ok_or_else(|| BotError::UnknownTemplate {
                command: primary,
                template: def.callback.clone(),
            })?;

        Ok(Command::new(names)
            .usage(def.usage)
            .help(def.help)
            .permissions(def.permissions)
            .data(def.data)
            .callback(callback))
    }

    /// The first registered name.
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn usage_text(&self) -> &str {
        &self.usage
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    pub fn required_permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn is_public(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Exact, case-sensitive match against every alias.
    pub fn is_command(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    /// Runs the callback in the context resolved for the invocation's
    /// channel and guild and returns its reply without sending it.
    pub async fn invoke(&self, invocation: &Invocation<'_>) -> Result<Option<Reply>> {
        let Some(callback) = &self.callback else {
            debug!("Command '{}' has no callback, nothing to do", self.name());
            return Ok(None);
        };

        let ctx = self
            .contexts
            .execution_context(invocation.message.channel_id, invocation.message.guild_id);

        callback
            .call(invocation, &ctx)
            .await
            .map_err(|source| BotError::Callback {
                command: self.name().to_string(),
                source,
            })
    }

    /// Invokes the command and sends any reply to the originating channel.
    pub async fn execute(&self, invocation: &Invocation<'_>) -> Result<()> {
        let Some(reply) = self.invoke(invocation).await? else {
            return Ok(());
        };

        if let Reply::Text(text) = &reply {
            if text.is_empty() {
                return Ok(());
            }
        }

        let Some(channel_id) = invocation.message.channel_id else {
            warn!(
                "Command '{}' produced a reply but the message has no channel",
                self.name()
            );
            return Ok(());
        };

        invocation.services.replies.send(channel_id, &reply).await
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("names", &self.names)
            .field("usage", &self.usage)
            .field("help", &self.help)
            .field("permissions", &self.permissions)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
