//! Error types for MotherDuck credential operations

use crate::credential::InvalidReason;

/// Errors from minting and fetching credentials.
///
/// Messages never contain token or secret values.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("TTL must be greater than 0, got {0}")]
    InvalidTtl(i64),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("token request rejected: {0}")]
    Mint(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(InvalidReason),
}

impl Error {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidTtl(_) => "invalid_ttl",
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Mint(_) => "rejected",
            Error::Decode(_) => "decode",
            Error::InvalidCredential(_) => "malformed",
        }
    }
}

/// Result alias for credential operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_ttl_message_includes_value() {
        assert_eq!(
            Error::InvalidTtl(-3).to_string(),
            "TTL must be greater than 0, got -3"
        );
    }

    #[test]
    fn kinds_are_distinct() {
        let kinds = [
            Error::InvalidTtl(0).kind(),
            Error::Http(String::new()).kind(),
            Error::Timeout(String::new()).kind(),
            Error::Mint(String::new()).kind(),
            Error::Decode(String::new()).kind(),
            Error::InvalidCredential(InvalidReason::Empty).kind(),
        ];
        let mut unique = kinds.to_vec();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), kinds.len());
    }
}
