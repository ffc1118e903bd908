use thiserror::Error;

/// Errors surfaced by the dispatch core and its collaborators.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("gateway rejected login: {0}")]
    AuthFailure(String),

    #[error("bot is already connected")]
    AlreadyConnected,

    #[error("bot is not connected")]
    NotConnected,

    #[error("command '{command}' failed: {source}")]
    Callback {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("command '{command}' panicked")]
    CallbackPanic { command: String },

    #[error("command '{command}' references unknown template '{template}'")]
    UnknownTemplate { command: String, template: String },

    #[error("invalid command definition: {0}")]
    InvalidDefinition(String),

    #[error("permission lookup failed: {0}")]
    PermissionLookup(String),

    #[error("failed to send reply: {0}")]
    Send(String),

    #[error("voice error: {0}")]
    Voice(String),

    #[error("teardown failed: {0}")]
    Teardown(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BotError {
    /// Name of the command this error originated from, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            BotError::Callback { command, .. }
            | BotError::CallbackPanic { command }
            | BotError::UnknownTemplate { command, .. } => Some(command),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
