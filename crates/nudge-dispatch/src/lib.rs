// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder dispatch for the Nudge engine.
//!
//! A tick claims due reminders ([`ReminderScanner`]), delivers each one
//! through its resolved channels ([`ChannelSet`]) and finalizes its status
//! ([`Dispatcher`]). Ticks come from the HTTP cron trigger or from the
//! in-process [`run_ticker`] loop.

pub mod channels;
pub mod orchestrator;
pub mod recurrence;
pub mod render;
pub mod scanner;
pub mod ticker;

pub use channels::ChannelSet;
pub use orchestrator::{Dispatcher, Outcome, TickReport};
pub use scanner::{ClaimBatch, ReminderScanner};
pub use ticker::{run_ticker, spawn_ticker};
