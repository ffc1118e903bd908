use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Where a command set's definitions come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSetSource {
    /// A JSON file holding an array of command definitions.
    File(PathBuf),
    /// A named set in the `commands` table.
    Database(String),
}

/// One command set and the prefix its manager is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSetConfig {
    pub prefix: String,
    pub source: CommandSetSource,
}

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub status_text: String,
    pub bot_name: String,
    pub database_url: String,
    pub voice_sweep_interval_secs: u64,
    pub voice_idle_timeout_secs: u64,
    pub ignore_bot_messages: bool,
    pub command_sets: Vec<CommandSetConfig>,
}

const COMMAND_SETS_FILE: &str = "command_sets.toml";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_API_TOKEN must be set"))?,
            status_text: env::var("STATUS_TEXT").unwrap_or_else(|_| "Wololo".to_string()),
            bot_name: env::var("BOT_NAME").unwrap_or_else(|_| "WololoBot".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/wololo.db".to_string()),
            voice_sweep_interval_secs: env::var("VOICE_SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            voice_idle_timeout_secs: env::var("VOICE_IDLE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            ignore_bot_messages: env::var("IGNORE_BOT_MESSAGES")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            command_sets: Self::load_command_sets(Path::new(COMMAND_SETS_FILE))?,
        })
    }

    /// Command sets from `path` (TOML), then the `COMMAND_SETS` JSON variable,
    /// then a single set under `COMMAND_PREFIX` read from `COMMANDS_FILE`.
    pub fn load_command_sets(path: &Path) -> anyhow::Result<Vec<CommandSetConfig>> {
        #[derive(Deserialize)]
        struct SetsWrapper {
            sets: Vec<CommandSetConfig>,
        }

        if let Ok(content) = fs::read_to_string(path) {
            let wrapper: SetsWrapper = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("invalid {}: {}", path.display(), e))?;
            return Ok(wrapper.sets);
        }

        if let Ok(env_sets) = env::var("COMMAND_SETS") {
            let sets = serde_json::from_str(&env_sets)
                .map_err(|e| anyhow::anyhow!("COMMAND_SETS is not valid JSON: {}", e))?;
            return Ok(sets);
        }

        Ok(vec![CommandSetConfig {
            prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            source: CommandSetSource::File(PathBuf::from(
                env::var("COMMANDS_FILE").unwrap_or_else(|_| "commands.json".to_string()),
            )),
        }])
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("status_text", &self.status_text)
            .field("bot_name", &self.bot_name)
            .field("database_url", &self.database_url)
            .field("voice_sweep_interval_secs", &self.voice_sweep_interval_secs)
            .field("voice_idle_timeout_secs", &self.voice_idle_timeout_secs)
            .field("ignore_bot_messages", &self.ignore_bot_messages)
            .field("command_sets", &self.command_sets)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
