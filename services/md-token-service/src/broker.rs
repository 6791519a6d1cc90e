//! Credential broker
//!
//! Decides, per request, which credential sources to try and in what order,
//! then walks that plan until one source yields a token that passes the
//! structural check:
//!
//! 1. `read_scaling` requested and not in development: mint a scoped token
//! 2. Always last: the static fallback token
//!
//! Any failure of a source (error, malformed token, panic) is recorded and
//! the next source is tried. Only when every source has failed does the
//! caller receive `Outcome::Unavailable`. No state is kept between requests.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use motherduck_auth::{Credential, Validation, validate};
use tracing::{debug, error, info, warn};

use crate::config::RuntimeMode;
use crate::error::AttemptFailure;
use crate::metrics;
use crate::sources::{CredentialSource, READ_SCALING};

/// What the caller asked for.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest {
    pub read_scaling: bool,
}

/// A validated credential ready to hand to the client.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: Credential,
    pub expire_at: String,
    pub source: &'static str,
}

/// One failed source in the plan.
#[derive(Debug)]
pub struct Attempt {
    pub source: &'static str,
    pub failure: AttemptFailure,
}

/// Result of one broker invocation: exactly one of the two.
#[derive(Debug)]
pub enum Outcome {
    Issued {
        token: IssuedToken,
        attempts: Vec<Attempt>,
    },
    Unavailable {
        attempts: Vec<Attempt>,
    },
}

impl Outcome {
    /// Source that produced the issued credential, if any.
    pub fn issued_source(&self) -> Option<&'static str> {
        match self {
            Outcome::Issued { token, .. } => Some(token.source),
            Outcome::Unavailable { .. } => None,
        }
    }

    pub fn attempts(&self) -> &[Attempt] {
        match self {
            Outcome::Issued { attempts, .. } | Outcome::Unavailable { attempts } => attempts,
        }
    }

    /// Failed sources in plan order as `source:reason`, comma-separated.
    pub fn failed_sources(&self) -> String {
        self.attempts()
            .iter()
            .map(|a| format!("{}:{}", a.source, a.failure.kind()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

pub struct Broker {
    mode: RuntimeMode,
    read_scaling: Option<Arc<dyn CredentialSource>>,
    fallback: Arc<dyn CredentialSource>,
}

impl Broker {
    /// `read_scaling` is `None` when no admin token is configured.
    pub fn new(
        mode: RuntimeMode,
        read_scaling: Option<Arc<dyn CredentialSource>>,
        fallback: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            mode,
            read_scaling,
            fallback,
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Whether this request may mint a scoped token.
    pub fn read_scaling_allowed(&self, request: TokenRequest) -> bool {
        request.read_scaling && self.mode != RuntimeMode::Development
    }

    /// Whether read-scaling requests can mint at all in this process.
    pub fn read_scaling_enabled(&self) -> bool {
        self.mode != RuntimeMode::Development && self.read_scaling.is_some()
    }

    pub fn fallback_configured(&self) -> bool {
        self.fallback.is_configured()
    }

    /// Produce exactly one validated credential, or `Unavailable`.
    pub async fn issue(&self, request: TokenRequest) -> Outcome {
        let mut attempts = Vec::new();
        let mut plan: Vec<&dyn CredentialSource> = Vec::with_capacity(2);

        if self.read_scaling_allowed(request) {
            match &self.read_scaling {
                Some(source) => plan.push(source.as_ref()),
                None => record_failure(&mut attempts, READ_SCALING, AttemptFailure::NotConfigured),
            }
        } else if request.read_scaling {
            debug!(mode = %self.mode, "read-scaling requested but disabled in this mode");
        }
        plan.push(self.fallback.as_ref());

        for source in plan {
            let result = AssertUnwindSafe(async { source.acquire().await })
                .catch_unwind()
                .await;

            let failure = match result {
                Ok(Ok(candidate)) => {
                    match validate(candidate.token.as_deref().unwrap_or_default()) {
                        Validation::Valid(token) => {
                            info!(
                                source = source.id(),
                                failed_attempts = attempts.len(),
                                "issued credential"
                            );
                            metrics::record_issued(source.id());
                            return Outcome::Issued {
                                token: IssuedToken {
                                    token,
                                    expire_at: candidate.expire_at,
                                    source: source.id(),
                                },
                                attempts,
                            };
                        }
                        Validation::Invalid(reason) => AttemptFailure::Malformed(reason),
                    }
                }
                Ok(Err(failure)) => failure,
                Err(_) => AttemptFailure::Panicked,
            };
            record_failure(&mut attempts, source.id(), failure);
        }

        error!(
            attempts = attempts.len(),
            "no valid credential available from any source"
        );
        Outcome::Unavailable { attempts }
    }
}

fn record_failure(attempts: &mut Vec<Attempt>, source: &'static str, failure: AttemptFailure) {
    warn!(source, reason = failure.kind(), error = %failure, "credential source failed");
    metrics::record_source_failure(source, failure.kind());
    attempts.push(Attempt { source, failure });
}
