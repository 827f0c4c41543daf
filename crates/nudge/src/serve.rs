// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge serve` and `nudge tick` command implementations.
//!
//! Both commands assemble the same engine: the SQLite reminder store, the
//! channel set built from configuration, and a dispatcher over them. `serve`
//! keeps it running behind the HTTP gateway (and the optional in-process
//! ticker); `tick` runs a single dispatch pass and exits.

use std::sync::Arc;
use std::time::Duration;

use nudge_config::model::NudgeConfig;
use nudge_core::{NudgeError, PluginAdapter};
use nudge_dispatch::{ChannelSet, Dispatcher, spawn_ticker};
use nudge_gateway::{GatewayState, start_server};
use nudge_storage::SqliteReminderStore;
use nudge_whatsapp::{BridgeDriver, SessionManager, SessionSettings, WhatsAppChannel};
use tracing::{debug, info, warn};

#[cfg(feature = "telegram")]
use nudge_telegram::TelegramChannel;

#[cfg(feature = "email")]
use nudge_email::EmailChannel;

use crate::shutdown;

/// The assembled dispatch engine.
pub(crate) struct Engine {
    pub store: Arc<SqliteReminderStore>,
    pub session: Option<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
}

impl Engine {
    /// Opens the store and builds every configured channel.
    ///
    /// Does not bring the WhatsApp session up; see [`restore_session`].
    pub async fn build(config: &NudgeConfig) -> Result<Self, NudgeError> {
        let store = open_store(config).await?;
        let session = build_session(config)?;
        let channels = build_channels(config, session.as_ref())?;
        warn_unroutable_defaults(config, &channels);

        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            channels,
            config.dispatch.clone(),
            config.service.name.clone(),
        ));
        Ok(Self {
            store,
            session,
            dispatcher,
        })
    }

    /// Stops every channel (the WhatsApp session keeps its credentials) and
    /// checkpoints the store.
    pub async fn shutdown(&self) {
        if let Err(e) = self.dispatcher.channels().shutdown().await {
            warn!(error = %e, "channel shutdown error");
        }
        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "store shutdown error");
        }
    }
}

pub(crate) async fn open_store(config: &NudgeConfig) -> Result<Arc<SqliteReminderStore>, NudgeError> {
    let store = SqliteReminderStore::new(config.storage.clone());
    store.initialize().await?;
    Ok(Arc::new(store))
}

/// The WhatsApp session, or `None` when the channel is disabled.
pub(crate) fn build_session(config: &NudgeConfig) -> Result<Option<SessionManager>, NudgeError> {
    if !config.whatsapp.enabled {
        debug!("whatsapp channel disabled");
        return Ok(None);
    }
    let driver = Arc::new(BridgeDriver::new(&config.whatsapp)?);
    Ok(Some(SessionManager::new(
        driver,
        SessionSettings::from(&config.whatsapp),
    )))
}

/// Registers every channel whose credentials are configured.
pub(crate) fn build_channels(
    config: &NudgeConfig,
    session: Option<&SessionManager>,
) -> Result<ChannelSet, NudgeError> {
    let mut channels = ChannelSet::new();

    if let Some(session) = session {
        channels.register(Arc::new(WhatsAppChannel::new(session.clone())));
    }

    #[cfg(feature = "telegram")]
    if config.telegram.bot_token.is_some() {
        channels.register(Arc::new(TelegramChannel::new(&config.telegram)?));
    }

    #[cfg(feature = "email")]
    if config.email.smtp_host.is_some() {
        channels.register(Arc::new(EmailChannel::new(&config.email)?));
    }

    let kinds: Vec<String> = channels.kinds().map(|k| k.to_string()).collect();
    info!(channels = ?kinds, "notification channels registered");
    Ok(channels)
}

fn warn_unroutable_defaults(config: &NudgeConfig, channels: &ChannelSet) {
    let missing: Vec<String> = config
        .dispatch
        .default_channels
        .iter()
        .filter(|kind| channels.get(**kind).is_none())
        .map(|kind| kind.to_string())
        .collect();
    if missing.is_empty() {
        return;
    }
    if missing.len() == config.dispatch.default_channels.len() {
        warn!(
            missing = ?missing,
            "none of dispatch.default_channels is configured; reminders without their own channels will fail"
        );
    } else {
        warn!(missing = ?missing, "some dispatch.default_channels are not configured");
    }
}

/// Brings a paired session back up, if credentials were persisted.
async fn restore_session(session: &SessionManager) {
    match session.restore().await {
        Ok(Some(state)) => info!(status = %state.status, "whatsapp session restored"),
        Ok(None) => info!("whatsapp is not paired yet; run `nudge whatsapp pair`"),
        Err(e) => warn!(error = %e, "whatsapp session restore failed"),
    }
}

/// Runs the `nudge serve` command.
///
/// Serves until SIGINT/SIGTERM, then stops the ticker, drains the gateway
/// and shuts the channels and the store down.
pub async fn run_serve(config: NudgeConfig) -> Result<(), NudgeError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting nudge serve");

    let engine = Engine::build(&config).await?;
    let cancel = shutdown::install_signal_handler();

    if let Some(session) = engine.session.clone() {
        if config.whatsapp.auto_start {
            tokio::spawn(async move { restore_session(&session).await });
        }
    }

    let ticker = if config.dispatch.internal_scheduler {
        Some(spawn_ticker(
            engine.dispatcher.clone(),
            Duration::from_secs(config.dispatch.tick_interval_secs),
            cancel.clone(),
        ))
    } else {
        info!("internal scheduler disabled; ticks come from the cron trigger");
        None
    };

    let served = if config.gateway.enabled {
        let state = GatewayState::new(engine.dispatcher.clone(), engine.session.clone());
        start_server(&config.gateway, state, cancel.clone()).await
    } else {
        if ticker.is_none() {
            warn!("gateway and internal scheduler are both disabled; nothing will trigger dispatch");
        }
        cancel.cancelled().await;
        Ok(())
    };

    cancel.cancel();
    if let Some(ticker) = ticker {
        if let Err(e) = ticker.await {
            warn!(error = %e, "ticker task ended abnormally");
        }
    }
    engine.shutdown().await;
    info!("nudge serve shutdown complete");
    served
}

/// Runs the `nudge tick` command: one dispatch pass, report on stdout.
///
/// A paired WhatsApp session is restored for the duration of the tick, so
/// this must not share a bridge with a running `nudge serve`.
pub async fn run_tick(config: NudgeConfig) -> Result<(), NudgeError> {
    init_tracing(&config.service.log_level);

    let engine = Engine::build(&config).await?;
    if let Some(session) = &engine.session {
        restore_session(session).await;
    }

    let result = engine.dispatcher.run_tick().await;
    engine.shutdown().await;
    let report = result?;

    let json = serde_json::to_string_pretty(&report)
        .map_err(|e| NudgeError::Internal(format!("failed to serialize tick report: {e}")))?;
    println!("{json}");
    Ok(())
}

/// Initializes the tracing subscriber with an env filter.
///
/// `RUST_LOG` wins over `service.log_level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nudge={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init();
}
