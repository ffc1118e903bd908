pub mod bot;
pub mod command;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod manager;
pub mod message;
pub mod parse;
pub mod permissions;
pub mod templates;
pub mod voice;

#[cfg(test)]
mod testing;

pub use bot::{Bot, BotEvent, BotOptions, BotState};
pub use command::{Callback, Command, CommandDefinition, Invocation};
pub use error::{BotError, Result};
pub use manager::CommandManager;
