// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge config check` command implementation.
//!
//! Validation already happened while loading; this prints what the service
//! would run with, secrets reduced to set/unset.

use nudge_config::model::NudgeConfig;

fn set_or_unset<T>(value: &Option<T>) -> &'static str {
    if value.is_some() { "set" } else { "unset" }
}

/// Human-readable summary of the effective configuration.
pub(crate) fn summary(config: &NudgeConfig) -> String {
    let dispatch = &config.dispatch;
    let join = |kinds: &[nudge_core::ChannelKind]| {
        kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut lines = vec![
        format!("service          {}", config.service.name),
        format!("database         {}", config.storage.database_path),
        format!(
            "dispatch         batch {} / concurrency {} / lease {}s / budget {}s",
            dispatch.batch_size,
            dispatch.concurrency,
            dispatch.lease_timeout_secs,
            dispatch.tick_budget_secs
        ),
        format!(
            "retry            {} attempts, {}s apart",
            dispatch.max_attempts, dispatch.retry_backoff_secs
        ),
        format!("default channels {}", join(&dispatch.default_channels)),
    ];
    for (org, kinds) in &dispatch.organization_channels {
        lines.push(format!("  org {org:<12} {}", join(kinds)));
    }
    lines.push(if dispatch.internal_scheduler {
        format!("scheduler        every {}s (in-process)", dispatch.tick_interval_secs)
    } else {
        "scheduler        external cron".to_string()
    });

    lines.push(if config.whatsapp.enabled {
        format!(
            "whatsapp         bridge {} (token {})",
            config.whatsapp.bridge_url,
            set_or_unset(&config.whatsapp.bridge_token)
        )
    } else {
        "whatsapp         disabled".to_string()
    });
    lines.push(format!(
        "telegram         {}",
        if config.telegram.bot_token.is_some() { "enabled" } else { "disabled" }
    ));
    lines.push(match &config.email.smtp_host {
        Some(host) => format!("email            {host}:{}", config.email.smtp_port),
        None => "email            disabled".to_string(),
    });
    lines.push(if config.gateway.enabled {
        format!(
            "gateway          {}:{} (api_token {}, cron_secret {})",
            config.gateway.host,
            config.gateway.port,
            set_or_unset(&config.gateway.api_token),
            set_or_unset(&config.gateway.cron_secret)
        )
    } else {
        "gateway          disabled".to_string()
    });
    lines.join("\n")
}

/// Runs the `nudge config check` command.
pub fn run_check(config: &NudgeConfig) {
    println!("configuration is valid\n");
    println!("{}", summary(config));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_never_prints_secrets() {
        let config = nudge_config::load_and_validate_str(
            r#"
[telegram]
bot_token = "123:very-secret"

[gateway]
api_token = "api-secret"
cron_secret = "cron-secret"

[dispatch.organization_channels]
acme = ["telegram", "email"]
"#,
        )
        .unwrap();
        let text = summary(&config);
        assert!(!text.contains("very-secret"));
        assert!(!text.contains("api-secret"));
        assert!(!text.contains("cron-secret"));
        assert!(text.contains("api_token set, cron_secret set"));
        assert!(text.contains("telegram         enabled"));
        assert!(text.contains("acme"));
        assert!(text.contains("telegram, email"));
    }

    #[test]
    fn defaults_summarize_cleanly() {
        let text = summary(&NudgeConfig::default());
        assert!(text.contains("default channels whatsapp"));
        assert!(text.contains("3 attempts, 60s apart"));
        assert!(text.contains("external cron"));
    }
}
