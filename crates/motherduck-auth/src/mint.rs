//! Read-scaling token minting
//!
//! Creates short-lived, read-only tokens for a fixed MotherDuck service
//! account by POSTing to `{base}/v1/users/{account}/tokens`, authenticated
//! with the account's long-lived admin token.
//!
//! The response is returned as decoded, without any shape check. Callers
//! must run the token through [`crate::credential::validate`] before use.

use std::fmt;
use std::time::Duration;

use common::Secret;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::TOKEN_NAME_LEN;
use crate::error::{Error, Result};

const NAME_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random alphanumeric display name for a minted token.
///
/// Not security-sensitive; the authority tolerates collisions.
pub fn random_name() -> String {
    let mut bytes = [0u8; TOKEN_NAME_LEN];
    rand::rng().fill(&mut bytes);
    bytes
        .iter()
        .map(|b| NAME_CHARSET[*b as usize % NAME_CHARSET.len()] as char)
        .collect()
}

/// Body of a token creation request.
#[derive(Debug, Clone, Serialize)]
pub struct MintRequest {
    pub name: String,
    pub ttl: i64,
    pub read_only: bool,
}

impl MintRequest {
    /// Build a read-only request with a fresh random name.
    pub fn read_only(ttl_secs: i64) -> Result<Self> {
        if ttl_secs <= 0 {
            return Err(Error::InvalidTtl(ttl_secs));
        }
        Ok(Self {
            name: random_name(),
            ttl: ttl_secs,
            read_only: true,
        })
    }
}

/// Untrusted response from the token endpoint.
///
/// Missing fields decode as `None` so a partial body reaches the caller's
/// validation instead of failing here.
#[derive(Clone, Default, Deserialize)]
pub struct MintResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expire_at: Option<String>,
}

impl fmt::Debug for MintResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintResponse")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("expire_at", &self.expire_at)
            .finish()
    }
}

/// Client for the MotherDuck token creation endpoint.
pub struct MintClient {
    http: reqwest::Client,
    base_url: String,
    account_name: String,
    admin_token: Secret<String>,
    timeout: Duration,
}

impl MintClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        account_name: impl Into<String>,
        admin_token: Secret<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            account_name: account_name.into(),
            admin_token,
            timeout,
        }
    }

    /// Full URL of the token creation endpoint.
    pub fn tokens_url(&self) -> String {
        format!(
            "{}/v1/users/{}/tokens",
            self.base_url.trim_end_matches('/'),
            self.account_name
        )
    }

    /// Mint one read-only token that expires after `ttl_secs`.
    ///
    /// Rejects a non-positive TTL before touching the network. Transport
    /// failures, non-2xx statuses, and undecodable bodies are all returned
    /// as errors.
    pub async fn create_read_scaling_token(&self, ttl_secs: i64) -> Result<MintResponse> {
        let request = MintRequest::read_only(ttl_secs)?;
        debug!(name = %request.name, ttl = request.ttl, "minting read-scaling token");

        let response = self
            .http
            .post(self.tokens_url())
            .bearer_auth(self.admin_token.expose())
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!(
                        "token endpoint did not respond within {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    Error::Http(format!("token creation request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Mint(format!(
                "token endpoint returned {status}: {}",
                truncate(&body, 200)
            )));
        }

        response
            .json::<MintResponse>()
            .await
            .map_err(|e| Error::Decode(format!("token creation response: {e}")))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
