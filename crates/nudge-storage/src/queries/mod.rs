// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the reminder store tables.

pub mod attempts;
pub mod reminders;
pub mod tasks;
