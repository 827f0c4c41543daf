// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nudge whatsapp` command implementations.
//!
//! The session lives inside the running `nudge serve` process, so these
//! commands are thin clients of its gateway session API.

use std::io::IsTerminal;
use std::time::Duration;

use nudge_config::model::NudgeConfig;
use nudge_core::NudgeError;
use qrcode::QrCode;
use qrcode::render::unicode;
use serde::Deserialize;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Session status as reported by the gateway.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    pub status: String,
    #[serde(default)]
    pub last_connected_at: Option<String>,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QrBody {
    status: String,
    qr: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Authenticated client for the gateway's `/api/whatsapp` routes.
pub(crate) struct GatewayClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl GatewayClient {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, NudgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NudgeError::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    /// Client for the gateway of the configured service.
    ///
    /// Requests may wait out a whole session bring-up, so the timeout covers
    /// `whatsapp.init_timeout_secs`.
    pub fn from_config(config: &NudgeConfig) -> Result<Self, NudgeError> {
        let token = config.gateway.api_token.as_deref().ok_or_else(|| {
            NudgeError::Config("gateway.api_token must be set to use the WhatsApp session API".into())
        })?;
        let host = match config.gateway.host.as_str() {
            "0.0.0.0" | "::" => "127.0.0.1",
            host => host,
        };
        let timeout = Duration::from_secs(config.whatsapp.init_timeout_secs + 10);
        Self::new(
            &format!("http://{host}:{}", config.gateway.port),
            token,
            timeout,
        )
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> Result<T, NudgeError> {
        let url = format!("{}/api/whatsapp/{path}", self.base_url);
        let response = self
            .client
            .request(method, &url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| NudgeError::Channel {
                message: format!("cannot reach nudge at {}: {e}", self.base_url),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NudgeError::Unauthorized(
                "gateway rejected gateway.api_token".into(),
            ));
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(NudgeError::Session(message));
        }
        response
            .json()
            .await
            .map_err(|e| NudgeError::Internal(format!("unexpected response from {url}: {e}")))
    }

    pub async fn status(&self) -> Result<StatusBody, NudgeError> {
        self.call(reqwest::Method::GET, "status").await
    }

    pub async fn initialize(&self) -> Result<StatusBody, NudgeError> {
        self.call(reqwest::Method::POST, "initialize").await
    }

    async fn qr(&self) -> Result<QrBody, NudgeError> {
        self.call(reqwest::Method::GET, "qr").await
    }

    pub async fn logout(&self) -> Result<(), NudgeError> {
        self.call::<serde_json::Value>(reqwest::Method::POST, "logout")
            .await
            .map(|_| ())
    }
}

/// Renders a pairing code for a terminal, two modules per character row.
pub(crate) fn render_qr(payload: &str) -> Result<String, NudgeError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| NudgeError::Internal(format!("failed to encode QR code: {e}")))?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

/// Runs the `nudge whatsapp status` command.
pub async fn run_status(config: &NudgeConfig, json: bool) -> Result<(), NudgeError> {
    let client = GatewayClient::from_config(config)?;
    let status = client.status().await?;

    if json {
        let value = serde_json::json!({
            "status": status.status,
            "last_connected_at": status.last_connected_at,
            "last_error": status.last_error,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        print_status(&status, std::io::stdout().is_terminal());
    }
    Ok(())
}

fn print_status(status: &StatusBody, use_color: bool) {
    println!();
    println!("  nudge whatsapp status");
    println!("  {}", "-".repeat(35));

    let connected = status.status == "CONNECTED";
    if use_color {
        use colored::Colorize;
        if connected {
            println!("    Session:  {} {}", "✓".green(), status.status.green());
        } else {
            println!("    Session:  {} {}", "✗".yellow(), status.status.yellow());
        }
    } else if connected {
        println!("    Session:  [OK] {}", status.status);
    } else {
        println!("    Session:  [--] {}", status.status);
    }
    if let Some(at) = &status.last_connected_at {
        println!("    Last up:  {at}");
    }
    if let Some(error) = &status.last_error {
        println!("    Error:    {error}");
    }
    if !connected {
        println!();
        println!("  Link a device with: nudge whatsapp pair");
    }
    println!();
}

/// Runs the `nudge whatsapp pair` command.
pub async fn run_pair(config: &NudgeConfig, timeout_secs: u64) -> Result<(), NudgeError> {
    let client = GatewayClient::from_config(config)?;
    pair(&client, Duration::from_secs(timeout_secs), POLL_INTERVAL).await
}

/// Starts pairing and prints every new QR code until the session connects.
async fn pair(client: &GatewayClient, timeout: Duration, poll: Duration) -> Result<(), NudgeError> {
    let started = client.initialize().await?;
    if started.status == "CONNECTED" {
        println!("WhatsApp is already linked.");
        return Ok(());
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut shown: Option<String> = None;
    loop {
        let current = client.qr().await?;
        match current.status.as_str() {
            "CONNECTED" => {
                println!("WhatsApp linked.");
                return Ok(());
            }
            "QR_PENDING" | "INITIALIZING" => {}
            other => {
                return Err(NudgeError::Session(format!(
                    "pairing stopped: session is {other}"
                )));
            }
        }

        if let Some(qr) = current.qr {
            if shown.as_deref() != Some(qr.as_str()) {
                println!("{}", render_qr(&qr)?);
                println!("Scan with WhatsApp > Linked devices > Link a device.");
                shown = Some(qr);
            }
        }

        if tokio::time::Instant::now() + poll > deadline {
            return Err(NudgeError::Timeout { duration: timeout });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Runs the `nudge whatsapp logout` command.
pub async fn run_logout(config: &NudgeConfig) -> Result<(), NudgeError> {
    GatewayClient::from_config(config)?.logout().await?;
    println!("WhatsApp logged out; credentials removed.");
    Ok(())
}
