// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram channel adapter for the Nudge dispatch engine.
//!
//! Implements [`NotificationChannel`] over the Telegram Bot API via
//! teloxide. Reminders are sent as MarkdownV2 with a plain-text fallback
//! when Telegram refuses the markup.

pub mod markdown;

use async_trait::async_trait;
use nudge_config::model::TelegramConfig;
use nudge_core::{
    AdapterType, ChannelKind, HealthStatus, MessageId, Notification, NotificationChannel,
    NudgeError, PluginAdapter,
};
use teloxide::prelude::*;
use teloxide::types::{ParseMode, Recipient};
use teloxide::{ApiError, RequestError};
use tracing::{debug, warn};

/// Telegram channel adapter implementing [`NotificationChannel`].
///
/// Stateless: every send is an independent Bot API call.
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    /// Creates a new Telegram channel adapter.
    ///
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, NudgeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            NudgeError::Config("telegram.bot_token is required for the Telegram channel".into())
        })?;

        if token.trim().is_empty() {
            return Err(NudgeError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Points the bot at another Bot API server (local server or test double).
    pub fn with_api_url(self, api_url: &str) -> Result<Self, NudgeError> {
        let url = api_url.parse().map_err(|e| {
            NudgeError::Config(format!("invalid Telegram API url `{api_url}`: {e}"))
        })?;
        Ok(Self {
            bot: self.bot.set_api_url(url),
        })
    }

    async fn send_plain(&self, recipient: Recipient, text: String) -> Result<Message, NudgeError> {
        self.bot
            .send_message(recipient, text)
            .await
            .map_err(classify)
    }
}

/// Parses a destination into a Bot API recipient.
///
/// Numeric ids address users and groups; `@name` addresses public channels.
pub fn parse_recipient(target: &str) -> Result<Recipient, NudgeError> {
    let target = target.trim();
    if let Some(name) = target.strip_prefix('@') {
        if !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Ok(Recipient::ChannelUsername(target.to_string()));
        }
    } else if let Ok(id) = target.parse::<i64>() {
        return Ok(Recipient::Id(ChatId(id)));
    }
    Err(NudgeError::InvalidDestination {
        destination: target.to_string(),
        reason: "expected a numeric chat id or @channelname".into(),
    })
}

/// Maps a Bot API failure onto the delivery error taxonomy.
///
/// API-level errors (chat not found, bot blocked, migrated chat) will repeat
/// on every retry. Transport failures and rate limits will not.
fn classify(err: RequestError) -> NudgeError {
    match err {
        RequestError::Api(api) => NudgeError::DeliveryRejected {
            channel: ChannelKind::Telegram,
            message: api.to_string(),
        },
        RequestError::MigrateToChatId(new_id) => NudgeError::DeliveryRejected {
            channel: ChannelKind::Telegram,
            message: format!("group migrated to supergroup {}", new_id.0),
        },
        other => NudgeError::Channel {
            message: format!("Telegram request failed: {other}"),
            source: Some(Box::new(other)),
        },
    }
}

#[async_trait]
impl PluginAdapter for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        // getMe both validates the token and proves the API is reachable.
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        debug!("Telegram channel shutting down");
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send(
        &self,
        target: &str,
        notification: &Notification,
    ) -> Result<MessageId, NudgeError> {
        let recipient = parse_recipient(target)?;
        let rendered = markdown::truncate(&markdown::render(
            &notification.subject,
            &notification.body,
        ));

        let sent = match self
            .bot
            .send_message(recipient.clone(), rendered)
            .parse_mode(ParseMode::MarkdownV2)
            .await
        {
            Ok(sent) => sent,
            Err(RequestError::Api(ApiError::CantParseEntities(reason))) => {
                warn!(
                    reminder_id = %notification.reminder_id,
                    reason = %reason,
                    "MarkdownV2 rejected, sending as plain text"
                );
                let plain = markdown::render_plain(&notification.subject, &notification.body);
                self.send_plain(recipient, markdown::truncate(&plain))
                    .await?
            }
            Err(e) => return Err(classify(e)),
        };

        debug!(
            reminder_id = %notification.reminder_id,
            message_id = sent.id.0,
            "Telegram reminder delivered"
        );
        Ok(MessageId(sent.id.0.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(token: Option<&str>) -> TelegramConfig {
        TelegramConfig {
            bot_token: token.map(String::from),
        }
    }

    #[test]
    fn new_requires_bot_token() {
        assert!(TelegramChannel::new(&config(None)).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        assert!(TelegramChannel::new(&config(Some("  "))).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let token = "123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11";
        assert!(TelegramChannel::new(&config(Some(token))).is_ok());
    }

    #[test]
    fn numeric_targets_are_chat_ids() {
        assert_eq!(
            parse_recipient("100200300").unwrap(),
            Recipient::Id(ChatId(100200300))
        );
        assert_eq!(
            parse_recipient(" -1001234567890 ").unwrap(),
            Recipient::Id(ChatId(-1001234567890))
        );
    }

    #[test]
    fn at_targets_are_channel_usernames() {
        assert_eq!(
            parse_recipient("@team_alerts").unwrap(),
            Recipient::ChannelUsername("@team_alerts".into())
        );
    }

    #[test]
    fn malformed_targets_are_permanent_failures() {
        for target in ["", "@", "@bad name", "not-a-chat"] {
            let err = parse_recipient(target).unwrap_err();
            assert!(matches!(err, NudgeError::InvalidDestination { .. }));
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn api_errors_are_rejections() {
        let err = classify(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(
            err,
            NudgeError::DeliveryRejected {
                channel: ChannelKind::Telegram,
                ..
            }
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn plugin_adapter_metadata() {
        let channel = TelegramChannel::new(&config(Some("test:token"))).unwrap();
        assert_eq!(channel.name(), "telegram");
        assert_eq!(channel.version(), semver::Version::new(0, 1, 0));
        assert_eq!(channel.adapter_type(), AdapterType::Channel);
        assert_eq!(channel.kind(), ChannelKind::Telegram);
    }
}
