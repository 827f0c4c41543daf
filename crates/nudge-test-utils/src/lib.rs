// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Nudge integration tests.
//!
//! Provides mock adapters and store fixtures for fast, deterministic,
//! CI-runnable tests without a WhatsApp bridge, SMTP relay or bot token.
//!
//! # Components
//!
//! - [`MockChannel`] - notification channel with scripted outcomes and captured sends
//! - [`ScriptedDriver`] - chat driver that replays QR / ready / failure scripts
//! - [`TestStore`] - temp-dir SQLite reminder store with seeding helpers

pub mod fixtures;
pub mod mock_channel;
pub mod mock_driver;

pub use fixtures::TestStore;
pub use mock_channel::MockChannel;
pub use mock_driver::ScriptedDriver;
