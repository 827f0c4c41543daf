// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Channel, driver and store adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod channel;
pub mod driver;
pub mod store;

pub use adapter::PluginAdapter;
pub use channel::NotificationChannel;
pub use driver::ChatDriver;
pub use store::ReminderStore;
