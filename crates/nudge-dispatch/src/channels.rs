// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of delivery channels and per-reminder channel resolution.
//!
//! Preference order: the reminder's own channel list, then the
//! organization's configured list, then `dispatch.default_channels`.
//! Only channels that are actually registered take part in a dispatch.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nudge_config::model::DispatchConfig;
use nudge_core::{
    AdapterType, ChannelKind, HealthStatus, NotificationChannel, NudgeError, PluginAdapter,
    Reminder,
};
use tracing::{debug, warn};

/// The set of channels available to the dispatcher, keyed by kind.
#[derive(Clone, Default)]
pub struct ChannelSet {
    channels: BTreeMap<ChannelKind, Arc<dyn NotificationChannel>>,
}

impl ChannelSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `channel` under its own kind, replacing any earlier one.
    pub fn register(&mut self, channel: Arc<dyn NotificationChannel>) {
        let kind = channel.kind();
        if self.channels.insert(kind, channel).is_some() {
            warn!(channel = %kind, "channel registered twice; keeping the latest");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.register(channel);
        self
    }

    pub fn get(&self, kind: ChannelKind) -> Option<&Arc<dyn NotificationChannel>> {
        self.channels.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = ChannelKind> + '_ {
        self.channels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Channels to deliver `reminder` through, in preference order.
    ///
    /// Falls back to the default list when none of the preferred channels
    /// is registered. An empty result means the reminder cannot be
    /// delivered by this process at all.
    pub fn resolve(
        &self,
        reminder: &Reminder,
        config: &DispatchConfig,
    ) -> Vec<(ChannelKind, Arc<dyn NotificationChannel>)> {
        let registered = |kinds: &[ChannelKind]| -> Vec<(ChannelKind, Arc<dyn NotificationChannel>)> {
            dedup(kinds)
                .into_iter()
                .filter_map(|kind| self.channels.get(&kind).map(|c| (kind, c.clone())))
                .collect()
        };

        let preferred = preferred_channels(reminder, config);
        let resolved = registered(preferred);
        if !resolved.is_empty() {
            return resolved;
        }

        debug!(
            reminder_id = %reminder.id,
            preferred = ?preferred,
            "no preferred channel registered, using defaults"
        );
        registered(&config.default_channels)
    }
}

/// The channel preference that applies to `reminder`, before registration
/// is taken into account.
pub fn preferred_channels<'a>(reminder: &'a Reminder, config: &'a DispatchConfig) -> &'a [ChannelKind] {
    if !reminder.channels.is_empty() {
        return &reminder.channels;
    }
    match config.organization_channels.get(&reminder.organization_id) {
        Some(channels) if !channels.is_empty() => channels,
        _ => &config.default_channels,
    }
}

fn dedup(kinds: &[ChannelKind]) -> Vec<ChannelKind> {
    let mut out = Vec::with_capacity(kinds.len());
    for kind in kinds {
        if !out.contains(kind) {
            out.push(*kind);
        }
    }
    out
}

#[async_trait]
impl PluginAdapter for ChannelSet {
    fn name(&self) -> &str {
        "channels"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, NudgeError> {
        let mut any_unhealthy = false;
        let mut reasons = Vec::new();

        for (kind, channel) in &self.channels {
            match channel.health_check().await? {
                HealthStatus::Healthy => {}
                HealthStatus::Degraded(reason) => reasons.push(format!("{kind}: {reason}")),
                HealthStatus::Unhealthy(reason) => {
                    any_unhealthy = true;
                    reasons.push(format!("{kind}: {reason}"));
                }
            }
        }

        // One dead channel leaves the others delivering.
        if reasons.is_empty() {
            Ok(HealthStatus::Healthy)
        } else if any_unhealthy && reasons.len() == self.channels.len() {
            Ok(HealthStatus::Unhealthy(reasons.join("; ")))
        } else {
            Ok(HealthStatus::Degraded(reasons.join("; ")))
        }
    }

    async fn shutdown(&self) -> Result<(), NudgeError> {
        for (kind, channel) in &self.channels {
            if let Err(e) = channel.shutdown().await {
                warn!(channel = %kind, error = %e, "channel shutdown error");
            }
        }
        Ok(())
    }
}
