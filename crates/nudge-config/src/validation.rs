// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as lease/budget ordering, non-empty paths, and valid bind addresses.

use tracing::{debug, warn};

use crate::diagnostic::ConfigError;
use crate::model::NudgeConfig;

/// Upper bound on `dispatch.max_attempts`.
const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &NudgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid =
        |key: &'static str, message: String| errors.push(ConfigError::Validation { key, message });

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path", "storage.database_path must not be empty".into());
    }

    let dispatch = &config.dispatch;
    if dispatch.batch_size == 0 {
        invalid("dispatch.batch_size", "dispatch.batch_size must be at least 1".into());
    }
    if dispatch.concurrency == 0 {
        invalid("dispatch.concurrency", "dispatch.concurrency must be at least 1".into());
    }
    if dispatch.max_attempts == 0 || dispatch.max_attempts > MAX_ATTEMPTS_LIMIT {
        invalid(
            "dispatch.max_attempts",
            format!(
                "dispatch.max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}, got {}",
                dispatch.max_attempts
            ),
        );
    }
    if dispatch.tick_budget_secs == 0 {
        invalid(
            "dispatch.tick_budget_secs",
            "dispatch.tick_budget_secs must be at least 1".into(),
        );
    }
    // A claim must outlive the tick holding it, or a slow tick's reminders
    // could be reclaimed and delivered twice.
    if dispatch.lease_timeout_secs <= dispatch.tick_budget_secs {
        invalid(
            "dispatch.lease_timeout_secs",
            format!(
                "dispatch.lease_timeout_secs ({}) must be greater than dispatch.tick_budget_secs ({})",
                dispatch.lease_timeout_secs, dispatch.tick_budget_secs
            ),
        );
    }
    if dispatch.default_channels.is_empty() {
        invalid(
            "dispatch.default_channels",
            "dispatch.default_channels must name at least one channel".into(),
        );
    }
    for (org, channels) in &dispatch.organization_channels {
        if channels.is_empty() {
            invalid(
                "dispatch.organization_channels",
                format!("dispatch.organization_channels.{org} must name at least one channel"),
            );
        }
    }
    if dispatch.internal_scheduler && dispatch.tick_interval_secs == 0 {
        invalid(
            "dispatch.tick_interval_secs",
            "dispatch.tick_interval_secs must be at least 1".into(),
        );
    }

    let wa = &config.whatsapp;
    if wa.enabled {
        if !(wa.bridge_url.starts_with("http://") || wa.bridge_url.starts_with("https://")) {
            invalid(
                "whatsapp.bridge_url",
                format!(
                    "whatsapp.bridge_url `{}` must start with http:// or https://",
                    wa.bridge_url
                ),
            );
        }
        if wa.auth_dir.trim().is_empty() {
            invalid("whatsapp.auth_dir", "whatsapp.auth_dir must not be empty".into());
        }
        if wa.init_timeout_secs == 0 || wa.send_timeout_secs == 0 {
            invalid(
                "whatsapp.init_timeout_secs",
                "whatsapp timeouts must be at least 1 second".into(),
            );
        }
    }
    if let Some(code) = &wa.default_country_code {
        let digits = code.strip_prefix('+').unwrap_or(code);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) || digits.len() > 3 {
            invalid(
                "whatsapp.default_country_code",
                format!(
                    "whatsapp.default_country_code `{code}` must be 1-3 digits, optionally after `+`"
                ),
            );
        }
    }

    if config.email.smtp_host.is_some() && config.email.from_address.is_none() {
        invalid(
            "email.from_address",
            "email.from_address is required when email.smtp_host is set".into(),
        );
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        invalid("gateway.host", "gateway.host must not be empty".into());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            invalid(
                "gateway.host",
                format!("gateway.host `{host}` is not a valid IP address or hostname"),
            );
        }
    }

    if errors.is_empty() {
        debug!("configuration validated");
        Ok(())
    } else {
        for error in &errors {
            if let ConfigError::Validation { key, .. } = error {
                warn!(key = *key, "configuration rule violated");
            }
        }
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message, .. } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = NudgeConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails_validation() {
        let mut config = NudgeConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "database_path"));
    }

    #[test]
    fn lease_must_exceed_tick_budget() {
        let mut config = NudgeConfig::default();
        config.dispatch.lease_timeout_secs = 30;
        config.dispatch.tick_budget_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "lease_timeout_secs"));
    }

    #[test]
    fn max_attempts_is_bounded() {
        let mut config = NudgeConfig::default();
        config.dispatch.max_attempts = 0;
        assert!(has_error(&validate_config(&config).unwrap_err(), "max_attempts"));
        config.dispatch.max_attempts = 11;
        assert!(has_error(&validate_config(&config).unwrap_err(), "max_attempts"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = NudgeConfig::default();
        config.dispatch.batch_size = 0;
        config.dispatch.default_channels.clear();
        config.whatsapp.default_country_code = Some("62a".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn country_code_accepts_leading_plus() {
        let mut config = NudgeConfig::default();
        config.whatsapp.default_country_code = Some("+62".into());
        assert!(validate_config(&config).is_ok());
        config.whatsapp.default_country_code = Some("+".into());
        assert!(has_error(&validate_config(&config).unwrap_err(), "default_country_code"));
    }

    #[test]
    fn whatsapp_bridge_url_checked_when_enabled() {
        let mut config = NudgeConfig::default();
        config.whatsapp.enabled = true;
        config.whatsapp.bridge_url = "localhost:3100".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "bridge_url"));
    }

    #[test]
    fn email_requires_sender() {
        let mut config = NudgeConfig::default();
        config.email.smtp_host = Some("smtp.example.com".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "from_address"));
    }
}
