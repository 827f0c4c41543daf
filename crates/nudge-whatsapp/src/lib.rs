// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp channel for the Nudge dispatch engine.
//!
//! WhatsApp has no bot API for personal accounts, so delivery goes through a
//! linked device: a WhatsApp Web client paired once by scanning a QR code.
//! That client models one human's phone and is single-session and
//! non-reentrant. [`SessionManager`] is the idempotent facade over it;
//! [`BridgeDriver`] talks to the client running in a bridge sidecar;
//! [`WhatsAppChannel`] exposes the session as a notification channel.

pub mod bridge;
pub mod channel;
pub mod phone;
pub mod session;

pub use bridge::BridgeDriver;
pub use channel::WhatsAppChannel;
pub use session::{SessionManager, SessionSettings};
