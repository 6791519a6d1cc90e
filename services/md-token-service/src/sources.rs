//! Credential sources the broker can draw from
//!
//! Each source yields an unvalidated [`Candidate`]. The broker owns
//! validation so both sources go through the same check.

use std::future::Future;
use std::pin::Pin;

use common::Secret;
use motherduck_auth::MintClient;

use crate::error::AttemptFailure;

/// Source id for freshly minted read-scaling tokens
pub const READ_SCALING: &str = "read_scaling";
/// Source id for the configured long-lived token
pub const STATIC_FALLBACK: &str = "static";

/// An unvalidated token and its expiry as reported by a source.
#[derive(Debug, Clone, Default)]
pub struct Candidate {
    pub token: Option<String>,
    /// Empty when the source does not know the expiry
    pub expire_at: String,
}

/// Something that can produce one credential candidate per call.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn CredentialSource>`).
pub trait CredentialSource: Send + Sync {
    /// Identifier for logging and metrics
    fn id(&self) -> &'static str;

    /// Whether the source has what it needs to produce a candidate.
    fn is_configured(&self) -> bool {
        true
    }

    fn acquire(&self) -> Pin<Box<dyn Future<Output = Result<Candidate, AttemptFailure>> + Send + '_>>;
}

/// Mints a fresh read-only token per call.
pub struct ReadScalingSource {
    client: MintClient,
    ttl_secs: i64,
}

impl ReadScalingSource {
    pub fn new(client: MintClient, ttl_secs: i64) -> Self {
        Self { client, ttl_secs }
    }
}

impl CredentialSource for ReadScalingSource {
    fn id(&self) -> &'static str {
        READ_SCALING
    }

    fn acquire(&self) -> Pin<Box<dyn Future<Output = Result<Candidate, AttemptFailure>> + Send + '_>> {
        Box::pin(async move {
            let response = self.client.create_read_scaling_token(self.ttl_secs).await?;
            Ok(Candidate {
                token: response.token,
                expire_at: response.expire_at.unwrap_or_default(),
            })
        })
    }
}

/// Hands out the statically configured token. It never expires from this
/// service's point of view, so `expire_at` is always empty.
pub struct StaticSource {
    token: Option<Secret<String>>,
}

impl StaticSource {
    pub fn new(token: Option<Secret<String>>) -> Self {
        Self { token }
    }
}

impl CredentialSource for StaticSource {
    fn id(&self) -> &'static str {
        STATIC_FALLBACK
    }

    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    fn acquire(&self) -> Pin<Box<dyn Future<Output = Result<Candidate, AttemptFailure>> + Send + '_>> {
        Box::pin(async move {
            let token = self.token.as_ref().ok_or(AttemptFailure::NotConfigured)?;
            Ok(Candidate {
                token: Some(token.expose().clone()),
                expire_at: String::new(),
            })
        })
    }
}
