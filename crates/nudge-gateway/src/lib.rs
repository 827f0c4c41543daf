// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Nudge dispatch engine.
//!
//! Exposes the cron trigger that runs a dispatch tick, the WhatsApp
//! session/pairing API polled by the pairing UI, and an unauthenticated
//! health probe.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, router, start_server};
