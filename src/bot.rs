//! The dispatcher: owns the gateway session and routes inbound messages to
//! every command manager whose prefix matches.

use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::BotError;
use crate::gateway::{Gateway, GatewayEvent};
use crate::manager::CommandManager;
use crate::message::{InboundMessage, Services};
use crate::parse::parse_command;
use crate::voice::sweep::start_sweep_task;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Presence text set once the gateway is ready.
    pub status_text: String,
    /// Skip dispatch for messages written by other bots.
    pub ignore_bot_messages: bool,
    pub voice_sweep_interval: Duration,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            status_text: "Wololo".to_string(),
            ignore_bot_messages: true,
            voice_sweep_interval: Duration::from_secs(300),
        }
    }
}

impl From<&Config> for BotOptions {
    fn from(config: &Config) -> Self {
        Self {
            status_text: config.status_text.clone(),
            ignore_bot_messages: config.ignore_bot_messages,
            voice_sweep_interval: Duration::from_secs(config.voice_sweep_interval_secs),
        }
    }
}

/// Lifecycle notifications for external observers.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Login,
    Error(Arc<BotError>),
    /// Every inbound message, after dispatch.
    Message(InboundMessage),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Disconnected,
    Connected,
}

struct Lifecycle {
    state: BotState,
    pump: Option<JoinHandle<()>>,
}

type Registration = (String, Vec<Arc<CommandManager>>);

pub struct Bot {
    options: BotOptions,
    gateway: Arc<dyn Gateway>,
    services: Services,
    managers: RwLock<Vec<Registration>>,
    lifecycle: tokio::sync::Mutex<Lifecycle>,
    sweep: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<BotEvent>,
}

impl Bot {
    pub fn new(options: BotOptions, gateway: Arc<dyn Gateway>, services: Services) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            options,
            gateway,
            services,
            managers: RwLock::new(Vec::new()),
            lifecycle: tokio::sync::Mutex::new(Lifecycle {
                state: BotState::Disconnected,
                pump: None,
            }),
            sweep: Mutex::new(None),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> BotState {
        self.lifecycle.lock().await.state
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Adds `manager` under `prefix`, after any managers already registered
    /// there.
    ///
    /// A message is offered to every prefix it starts with, so registering
    /// both `!` and `!!` runs both sets for `!!ping`.
    pub fn register_command_manager(
        &self,
        prefix: impl Into<String>,
        manager: impl Into<Arc<CommandManager>>,
    ) {
        let prefix = prefix.into();
        let manager = manager.into();
        let mut registrations = self.managers.write().unwrap_or_else(PoisonError::into_inner);
        match registrations.iter_mut().find(|(p, _)| *p == prefix) {
            Some((_, managers)) => managers.push(manager),
            None => registrations.push((prefix, vec![manager])),
        }
    }

    /// Registered prefixes in registration order.
    pub fn prefixes(&self) -> Vec<String> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    fn emit(&self, event: BotEvent) {
        if let BotEvent::Error(e) = &event {
            error!("{}", e);
        }
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Connects to the gateway. On failure the gateway's error is emitted as
    /// an error event, returned unchanged, and the bot stays disconnected.
    pub async fn login(self: &Arc<Self>, token: &str) -> std::result::Result<(), Arc<BotError>> {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == BotState::Connected {
            return Err(Arc::new(BotError::AlreadyConnected));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Err(e) = self.gateway.login(token, tx).await {
            let e = Arc::new(e);
            self.emit(BotEvent::Error(e.clone()));
            return Err(e);
        }

        info!("Logged in");
        lifecycle.state = BotState::Connected;
        let bot = Arc::clone(self);
        lifecycle.pump = Some(tokio::spawn(async move { bot.pump(rx).await }));
        self.emit(BotEvent::Login);
        Ok(())
    }

    async fn pump(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<GatewayEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                GatewayEvent::Ready => self.on_ready().await,
                GatewayEvent::Message(message) => {
                    // Messages must not wait on each other's suspension points.
                    let bot = Arc::clone(&self);
                    tokio::spawn(async move { bot.handle_message(message).await });
                }
            }
        }
        debug!("Gateway event stream ended");
    }

    async fn on_ready(&self) {
        self.gateway.set_presence(&self.options.status_text).await;

        let Some(voice) = self.services.voice.clone() else {
            return;
        };
        let mut sweep = self.sweep.lock().unwrap_or_else(PoisonError::into_inner);
        if sweep.is_none() {
            let every = self.options.voice_sweep_interval;
            *sweep = Some(tokio::spawn(start_sweep_task(voice, every)));
        }
    }

    /// Offers `message` to every manager under every matching prefix. Managers
    /// start in registration order and run concurrently. Once all have
    /// finished the message is re-emitted as a [`BotEvent::Message`].
    pub async fn handle_message(&self, message: InboundMessage) {
        if self.options.ignore_bot_messages && message.author_is_bot {
            self.emit(BotEvent::Message(message));
            return;
        }

        let matching: Vec<(String, Arc<CommandManager>)> = self
            .managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(prefix, _)| message.content.starts_with(prefix.as_str()))
            .flat_map(|(prefix, managers)| managers.iter().map(move |m| (prefix.clone(), m.clone())))
            .collect();

        // Started in order, polled together.
        let runs = matching.iter().map(|(prefix, manager)| {
            AssertUnwindSafe(manager.execute(&message, prefix, &self.services, Some(self)))
                .catch_unwind()
        });
        let results = join_all(runs).await;

        for ((prefix, _), result) in matching.iter().zip(results) {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.emit(BotEvent::Error(Arc::new(e))),
                Err(_) => {
                    let command = message
                        .content
                        .strip_prefix(prefix.as_str())
                        .and_then(parse_command)
                        .map(|p| p.name)
                        .unwrap_or_default();
                    self.emit(BotEvent::Error(Arc::new(BotError::CallbackPanic { command })));
                }
            }
        }

        self.emit(BotEvent::Message(message));
    }

    /// Tears down every manager and the gateway session. The close event is
    /// emitted whether or not teardown succeeds.
    pub async fn close(&self) {
        let managers: Vec<Arc<CommandManager>> = self
            .managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .flat_map(|(_, managers)| managers.iter().cloned())
            .collect();
        for manager in managers {
            if let Err(e) = manager.close().await {
                warn!("Command manager teardown failed: {}", e);
            }
        }

        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state == BotState::Connected {
            if let Err(e) = self.gateway.close().await {
                warn!("Gateway teardown failed: {}", e);
            }
        }
        if let Some(pump) = lifecycle.pump.take() {
            pump.abort();
        }
        if let Some(sweep) = self
            .sweep
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            sweep.abort();
        }
        lifecycle.state = BotState::Disconnected;
        drop(lifecycle);

        info!("Bot closed");
        self.emit(BotEvent::Close);
    }
}
