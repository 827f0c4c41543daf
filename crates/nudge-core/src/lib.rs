// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Nudge reminder dispatch engine.
//!
//! This crate provides the trait definitions, error type, and domain types
//! shared by the store, the channel adapters, and the dispatcher.

pub mod error;
pub mod traits;
pub mod types;

pub use error::NudgeError;
pub use types::{
    AdapterType, ChannelKind, ClientEvent, DispatchAttempt, FailureDisposition, HealthStatus,
    MessageId, NewReminder, Notification, Recipient, Reminder, ReminderStatus, SessionSnapshot,
    SessionStatus, TaskSnapshot, TaskStatus, TriggerType,
};

pub use traits::{ChatDriver, NotificationChannel, PluginAdapter, ReminderStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Channel, AdapterType::Storage, AdapterType::Driver] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }

    #[test]
    fn all_traits_are_object_safe() {
        fn _channel(_: &dyn NotificationChannel) {}
        fn _store(_: &dyn ReminderStore) {}
        fn _plugin(_: &dyn PluginAdapter) {}
        fn _driver(_: &dyn ChatDriver) {}
    }
}
