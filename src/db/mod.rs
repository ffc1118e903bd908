use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serenity::model::id::UserId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::command::{CommandDefinition, CommandNames};
use crate::error::{BotError, Result};
use crate::permissions::PermissionResolver;

/// SQLite store for user permissions and persisted command sets.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at `path`. `":memory:"` gives a
    /// private in-memory database.
    pub fn new(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && path != ":memory:" {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn execute_init(&self) -> Result<()> {
        info!("Database: Initializing schema...");
        let sql = "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                permissions TEXT NOT NULL DEFAULT '[]',
                developer BOOLEAN NOT NULL DEFAULT FALSE
            );

            CREATE TABLE IF NOT EXISTS commands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                command_set TEXT NOT NULL,
                name TEXT NOT NULL,
                callback TEXT NOT NULL,
                usage TEXT NOT NULL DEFAULT '',
                help TEXT NOT NULL DEFAULT '',
                data TEXT NOT NULL DEFAULT '{}',
                permissions TEXT NOT NULL DEFAULT '[]'
            );
            CREATE INDEX IF NOT EXISTS idx_commands_set ON commands (command_set);
        ";
        self.lock().execute_batch(sql)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs `f` on the blocking thread pool so SQLite I/O never stalls the
    /// async runtime.
    pub async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| BotError::Io(std::io::Error::other(e)))?
    }

    pub fn set_user_permissions(
        &self,
        user_id: UserId,
        permissions: &[String],
        developer: bool,
    ) -> Result<()> {
        debug!(
            "Database: Setting {} permission(s) for user {}",
            permissions.len(),
            user_id
        );
        let permissions = serde_json::to_string(permissions)?;
        self.lock().execute(
            "INSERT INTO users (id, permissions, developer) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET permissions = ?2, developer = ?3",
            params![user_id.to_string(), permissions, developer],
        )?;
        Ok(())
    }

    /// Permissions granted to `user_id`; unknown users have none.
    pub fn get_user_permissions(&self, user_id: UserId) -> Result<HashSet<String>> {
        let raw: Option<String> = self
            .lock()
            .query_row(
                "SELECT permissions FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(HashSet::new()),
        }
    }

    pub fn is_developer(&self, user_id: UserId) -> Result<bool> {
        let developer: Option<bool> = self
            .lock()
            .query_row(
                "SELECT developer FROM users WHERE id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(developer.unwrap_or(false))
    }

    /// Appends `def` to the command set `set`. Load order follows insertion.
    pub fn save_command(&self, set: &str, def: &CommandDefinition) -> Result<()> {
        let name = serde_json::to_string(&def.name)?;
        let data = serde_json::to_string(&def.data)?;
        let permissions = serde_json::to_string(&def.permissions)?;
        self.lock().execute(
            "INSERT INTO commands (command_set, name, callback, usage, help, data, permissions)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![set, name, def.callback, def.usage, def.help, data, permissions],
        )?;
        Ok(())
    }

    /// Every command definition stored under `set`, in insertion order.
    pub fn load_commands(&self, set: &str) -> Result<Vec<CommandDefinition>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT name, callback, usage, help, data, permissions
             FROM commands WHERE command_set = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([set], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut defs = Vec::new();
        for row in rows {
            let (name, callback, usage, help, data, permissions) = row?;
            defs.push(CommandDefinition {
                name: serde_json::from_str::<CommandNames>(&name)?,
                callback,
                usage,
                help,
                data: serde_json::from_str(&data)?,
                permissions: serde_json::from_str(&permissions)?,
            });
        }
        debug!("Database: Loaded {} command(s) for set '{}'", defs.len(), set);
        Ok(defs)
    }
}

#[async_trait]
impl PermissionResolver for Database {
    async fn lookup_permissions(&self, user_id: UserId) -> Result<HashSet<String>> {
        self.run_blocking(move |db| db.get_user_permissions(user_id))
            .await
            .map_err(|e| BotError::PermissionLookup(e.to_string()))
    }
}
