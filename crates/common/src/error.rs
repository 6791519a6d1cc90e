//! Configuration and secret-loading errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building process configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The path is reported, the contents never are.
    #[error("failed to read secret file {}: {source}", path.display())]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;
