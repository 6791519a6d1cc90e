//! Per-source failure reasons recorded by the broker
//!
//! None of these reach the HTTP caller directly. They are logged, counted,
//! and kept in the broker outcome for diagnostics; the caller only ever sees
//! a credential or the terminal "no valid credential" response.

use motherduck_auth::InvalidReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AttemptFailure {
    #[error("source is not configured")]
    NotConfigured,

    #[error("mint failed: {0}")]
    Mint(#[from] motherduck_auth::Error),

    #[error("malformed credential: {0}")]
    Malformed(InvalidReason),

    #[error("source panicked")]
    Panicked,
}

impl AttemptFailure {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptFailure::NotConfigured => "not_configured",
            AttemptFailure::Mint(e) => e.kind(),
            AttemptFailure::Malformed(_) => "malformed",
            AttemptFailure::Panicked => "panicked",
        }
    }
}
