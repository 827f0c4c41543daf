// SPDX-FileCopyrightText: 2026 Nudge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token middleware for the gateway.
//!
//! Two guards share one check:
//! - the session/pairing API requires `gateway.api_token` and fails closed
//!   when none is configured;
//! - the cron trigger requires `gateway.cron_secret` only when one is
//!   configured, so a scheduler without a secret can still call it.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Expected bearer token of one route group.
#[derive(Clone)]
pub struct AuthConfig {
    pub bearer_token: Option<String>,
    /// Accept every caller when no token is configured.
    pub open_when_unset: bool,
}

impl AuthConfig {
    /// Guard for the session API: no token means no access.
    pub fn required(token: Option<String>) -> Self {
        Self {
            bearer_token: normalize(token),
            open_when_unset: false,
        }
    }

    /// Guard for the cron trigger: no secret means open.
    pub fn optional(secret: Option<String>) -> Self {
        Self {
            bearer_token: normalize(secret),
            open_when_unset: true,
        }
    }

    fn allows(&self, presented: Option<&str>) -> bool {
        match (&self.bearer_token, presented) {
            (None, _) => self.open_when_unset,
            (Some(expected), Some(token)) => constant_time_eq(expected.as_bytes(), token.as_bytes()),
            (Some(_), None) => false,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .field("open_when_unset", &self.open_when_unset)
            .finish()
    }
}

fn normalize(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Rejects the request with 401 unless it carries the expected bearer token.
///
/// Runs before the handler, so a rejected cron call never touches a reminder.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() && !auth.open_when_unset {
        tracing::error!(path = %request.uri().path(), "gateway api_token not configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    if auth.allows(presented) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "rejected request with invalid credentials");
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_guard_fails_closed() {
        let auth = AuthConfig::required(None);
        assert!(!auth.allows(None));
        assert!(!auth.allows(Some("anything")));
    }

    #[test]
    fn optional_guard_is_open_without_secret() {
        let auth = AuthConfig::optional(None);
        assert!(auth.allows(None));
        assert!(auth.allows(Some("whatever")));
    }

    #[test]
    fn configured_token_must_match() {
        for auth in [
            AuthConfig::required(Some("s3cret".into())),
            AuthConfig::optional(Some("s3cret".into())),
        ] {
            assert!(auth.allows(Some("s3cret")));
            assert!(!auth.allows(Some("s3cre")));
            assert!(!auth.allows(Some("s3cret!")));
            assert!(!auth.allows(None));
        }
    }

    #[test]
    fn blank_token_counts_as_unset() {
        assert!(AuthConfig::required(Some("  ".into())).bearer_token.is_none());
        assert!(AuthConfig::optional(Some(String::new())).allows(None));
    }

    #[test]
    fn debug_redacts_token() {
        let debug_output = format!("{:?}", AuthConfig::required(Some("secret-token".into())));
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
