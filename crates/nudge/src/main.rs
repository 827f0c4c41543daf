// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Nudge - reminder notification dispatch engine.
//!
//! This is the binary entry point: the long-running service (`serve`), a
//! one-shot dispatch tick (`tick`), WhatsApp pairing helpers that talk to
//! a running service, and configuration checks.

mod config_check;
mod serve;
mod shutdown;
mod whatsapp;

use std::path::PathBuf;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::{Parser, Subcommand};
use nudge_config::NudgeConfig;

/// Nudge - reminder notification dispatch engine.
#[derive(Parser, Debug)]
#[command(name = "nudge", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway, the WhatsApp session and (optionally) the ticker.
    Serve,
    /// Run one dispatch tick and print its report as JSON.
    Tick,
    /// Manage the WhatsApp session of a running service.
    Whatsapp {
        #[command(subcommand)]
        action: WhatsappCommands,
    },
    /// Manage Nudge configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum WhatsappCommands {
    /// Show the session status.
    Status {
        /// Print raw JSON.
        #[arg(long)]
        json: bool,
    },
    /// Start pairing and show the QR code in the terminal until linked.
    Pair {
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Log the linked device out and delete its credentials.
    Logout,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Validate the configuration and print the effective settings.
    Check,
}

fn load_config(path: Option<&PathBuf>) -> NudgeConfig {
    let loaded = match path {
        Some(path) => nudge_config::load_and_validate_path(path),
        None => nudge_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            nudge_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Tick) => serve::run_tick(config).await,
        Some(Commands::Whatsapp { action }) => match action {
            WhatsappCommands::Status { json } => whatsapp::run_status(&config, json).await,
            WhatsappCommands::Pair { timeout } => whatsapp::run_pair(&config, timeout).await,
            WhatsappCommands::Logout => whatsapp::run_logout(&config).await,
        },
        Some(Commands::Config {
            action: ConfigCommands::Check,
        }) => {
            config_check::run_check(&config);
            Ok(())
        }
        None => {
            println!("nudge: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
