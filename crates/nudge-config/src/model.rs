// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Nudge dispatch engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use nudge_core::ChannelKind;
use serde::{Deserialize, Serialize};

/// Top-level Nudge configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Reminder scanning and dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// WhatsApp Web session settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Telegram bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// SMTP email settings.
    #[serde(default)]
    pub email: EmailConfig,

    /// HTTP gateway settings (cron trigger and pairing endpoints).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Display name used in logs and notification footers.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "nudge".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("nudge").join("nudge.db"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| "nudge.db".to_string())
}

fn default_true() -> bool {
    true
}

/// Reminder scanning and dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum reminders claimed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How long a claim is honored before another tick may reclaim it.
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Overall time budget of one tick.
    #[serde(default = "default_tick_budget_secs")]
    pub tick_budget_secs: u64,

    /// Dispatch attempts allowed before a failure becomes terminal.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay before a transient failure becomes claimable again.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Reminders dispatched concurrently within one tick.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Channels used when neither the reminder nor its organization names any.
    #[serde(default = "default_channels")]
    pub default_channels: Vec<ChannelKind>,

    /// Per-organization channel preference, keyed by organization id.
    #[serde(default)]
    pub organization_channels: BTreeMap<String, Vec<ChannelKind>>,

    /// Run ticks from an in-process interval instead of relying on an external cron.
    #[serde(default)]
    pub internal_scheduler: bool,

    /// Interval of the in-process scheduler.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            lease_timeout_secs: default_lease_timeout_secs(),
            tick_budget_secs: default_tick_budget_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            concurrency: default_concurrency(),
            default_channels: default_channels(),
            organization_channels: BTreeMap::new(),
            internal_scheduler: false,
            tick_interval_secs: default_tick_interval_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn lease_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_timeout_secs)
    }

    pub fn tick_budget(&self) -> Duration {
        Duration::from_secs(self.tick_budget_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

fn default_batch_size() -> usize {
    50
}

fn default_lease_timeout_secs() -> u64 {
    300
}

fn default_tick_budget_secs() -> u64 {
    50
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

fn default_channels() -> Vec<ChannelKind> {
    vec![ChannelKind::WhatsApp]
}

fn default_tick_interval_secs() -> u64 {
    60
}

/// WhatsApp Web session configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Enable the WhatsApp channel.
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the WhatsApp Web bridge sidecar (http or https).
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Bearer token presented to the bridge.
    #[serde(default)]
    pub bridge_token: Option<String>,

    /// Directory holding the persisted session credentials.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: String,

    /// Country calling code applied to numbers written in national format (e.g. "62").
    #[serde(default)]
    pub default_country_code: Option<String>,

    /// Timeout for bringing the session up to QR or CONNECTED.
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,

    /// Timeout for a single send.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Re-initialize automatically after an unexpected disconnect.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Delay before an automatic reconnect.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    /// Restore a persisted session when the service starts.
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bridge_url: default_bridge_url(),
            bridge_token: None,
            auth_dir: default_auth_dir(),
            default_country_code: None,
            init_timeout_secs: default_init_timeout_secs(),
            send_timeout_secs: default_send_timeout_secs(),
            auto_reconnect: true,
            reconnect_delay_secs: default_reconnect_delay_secs(),
            auto_start: true,
        }
    }
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("enabled", &self.enabled)
            .field("bridge_url", &self.bridge_url)
            .field("bridge_token", &self.bridge_token.as_ref().map(|_| "[redacted]"))
            .field("auth_dir", &self.auth_dir)
            .field("default_country_code", &self.default_country_code)
            .field("init_timeout_secs", &self.init_timeout_secs)
            .field("send_timeout_secs", &self.send_timeout_secs)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("auto_start", &self.auto_start)
            .finish()
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:3100".to_string()
}

fn default_auth_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("nudge").join("whatsapp-auth"))
        .and_then(|p| p.to_str().map(String::from))
        .unwrap_or_else(|| ".whatsapp-auth".to_string())
}

fn default_init_timeout_secs() -> u64 {
    60
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

/// Telegram bot configuration.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token. `None` disables the Telegram channel.
    #[serde(default)]
    pub bot_token: Option<String>,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// SMTP email configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// SMTP relay host. `None` disables the email channel.
    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Sender address, e.g. `Nudge <reminders@example.com>`.
    #[serde(default)]
    pub from_address: Option<String>,

    /// Use STARTTLS instead of implicit TLS.
    #[serde(default = "default_true")]
    pub starttls: bool,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
            starttls: true,
        }
    }
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("from_address", &self.from_address)
            .field("starttls", &self.starttls)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// HTTP gateway configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Serve the HTTP gateway.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the session/pairing API. `None` rejects those routes.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Shared secret expected from the cron trigger. `None` accepts any caller.
    #[serde(default)]
    pub cron_secret: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            api_token: None,
            cron_secret: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_token", &self.api_token.as_ref().map(|_| "[redacted]"))
            .field("cron_secret", &self.cron_secret.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3080
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_defaults() {
        let d = DispatchConfig::default();
        assert_eq!(d.max_attempts, 3);
        assert_eq!(d.default_channels, vec![ChannelKind::WhatsApp]);
        assert!(d.lease_timeout() > d.tick_budget());
        assert!(!d.internal_scheduler);
    }

    #[test]
    fn secrets_are_redacted_in_debug() {
        let config = NudgeConfig {
            telegram: TelegramConfig {
                bot_token: Some("123:secret-token".into()),
            },
            gateway: GatewayConfig {
                cron_secret: Some("cron-shh".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-token"));
        assert!(!debug.contains("cron-shh"));
        assert!(debug.contains("[redacted]"));
    }

    #[test]
    fn organization_channels_deserialize() {
        let toml_str = r#"
[dispatch.organization_channels]
acme = ["telegram", "email"]
"#;
        let config: NudgeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.dispatch.organization_channels.get("acme"),
            Some(&vec![ChannelKind::Telegram, ChannelKind::Email])
        );
    }
}
