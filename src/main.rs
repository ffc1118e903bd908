use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wololo::bot::{Bot, BotEvent, BotOptions};
use wololo::config::Config;
use wololo::db::Database;
use wololo::gateway::SerenityGateway;
use wololo::loader::load_command_set;
use wololo::message::{BotInfo, Services};
use wololo::permissions::PermissionResolver;
use wololo::templates::TemplateRegistry;
use wololo::voice::SongbirdVoice;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration; a missing token is the one fatal error
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };
    info!("Starting with {:?}", config);

    let db = Database::new(&config.database_url)?;
    db.execute_init()?;
    let permissions: Arc<dyn PermissionResolver> = Arc::new(db.clone());

    let voice = Arc::new(SongbirdVoice::new(Duration::from_secs(
        config.voice_idle_timeout_secs,
    )));
    let gateway = Arc::new(SerenityGateway::new(voice.clone()));

    let services = Services::new(gateway.clone())
        .with_voice(voice)
        .with_info(BotInfo {
            name: config.bot_name.clone(),
            ..BotInfo::default()
        });
    let bot = Arc::new(Bot::new(BotOptions::from(&config), gateway, services));

    let templates = TemplateRegistry::with_builtins();
    for set in &config.command_sets {
        match load_command_set(set, &db, &templates, permissions.clone()).await {
            Ok(manager) => bot.register_command_manager(set.prefix.clone(), manager),
            Err(e) => error!("Skipping command set for prefix '{}': {}", set.prefix, e),
        }
    }

    let mut events = bot.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                BotEvent::Login => info!("Bot logged in"),
                BotEvent::Close => info!("Bot closed"),
                BotEvent::Message(_) | BotEvent::Error(_) => {}
            }
        }
    });

    if let Err(e) = bot.login(&config.discord_token).await {
        warn!("Login failed: {}", e);
    }

    info!("Type 'exit' to shut down");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim() == "exit" => break,
                Ok(Some(_)) => {}
                Ok(None) => {
                    // stdin closed (e.g. running detached); wait for Ctrl-C instead
                    let _ = tokio::signal::ctrl_c().await;
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bot.close().await;
    Ok(())
}
