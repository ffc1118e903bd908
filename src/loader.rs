//! Builds commands from declarative command sets.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::command::{Command, CommandDefinition};
use crate::config::{CommandSetConfig, CommandSetSource};
use crate::db::Database;
use crate::error::Result;
use crate::manager::CommandManager;
use crate::permissions::PermissionResolver;
use crate::templates::TemplateRegistry;

#[async_trait]
pub trait CommandSource: Send + Sync {
    async fn load(&self) -> Result<Vec<CommandDefinition>>;
}

/// A JSON file holding an array of command definitions.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CommandSource for JsonFileSource {
    async fn load(&self) -> Result<Vec<CommandDefinition>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// A named set stored in the `commands` table.
pub struct DatabaseSource {
    db: Database,
    set: String,
}

impl DatabaseSource {
    pub fn new(db: Database, set: impl Into<String>) -> Self {
        Self {
            db,
            set: set.into(),
        }
    }
}

#[async_trait]
impl CommandSource for DatabaseSource {
    async fn load(&self) -> Result<Vec<CommandDefinition>> {
        let set = self.set.clone();
        self.db.run_blocking(move |db| db.load_commands(&set)).await
    }
}

pub fn source_for(source: &CommandSetSource, db: &Database) -> Box<dyn CommandSource> {
    match source {
        CommandSetSource::File(path) => Box::new(JsonFileSource::new(path.clone())),
        CommandSetSource::Database(set) => Box::new(DatabaseSource::new(db.clone(), set.clone())),
    }
}

/// Builds every definition, failing on the first one that names an unknown
/// template or has no usable name.
pub fn load_commands(
    defs: Vec<CommandDefinition>,
    templates: &TemplateRegistry,
) -> Result<Vec<Command>> {
    defs.into_iter()
        .map(|def| Command::from_definition(def, templates))
        .collect()
}

/// Loads one configured command set into a manager.
pub async fn load_command_set(
    set: &CommandSetConfig,
    db: &Database,
    templates: &TemplateRegistry,
    permissions: Arc<dyn PermissionResolver>,
) -> Result<CommandManager> {
    let defs = source_for(&set.source, db).load().await?;
    let commands = load_commands(defs, templates)?;
    info!(
        "Loaded {} command(s) for prefix '{}'",
        commands.len(),
        set.prefix
    );
    Ok(CommandManager::with_commands(commands).with_permissions(permissions))
}
