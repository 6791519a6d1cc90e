//! Secret wrapper for sensitive values

use std::fmt;
use std::path::Path;

use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Read a secret from an environment variable.
///
/// Unset, non-unicode, and whitespace-only values all count as absent.
pub fn secret_from_env(key: &str) -> Option<Secret<String>> {
    let value = std::env::var(key).ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    Some(Secret::new(value.to_owned()))
}

/// Read a secret from a file, trimming surrounding whitespace.
///
/// Returns `Ok(None)` for an empty or whitespace-only file. A file that
/// cannot be read is an error: a configured-but-missing secret file is a
/// deployment mistake, not an absent secret.
pub fn read_secret_file(path: &Path) -> Result<Option<Secret<String>>> {
    let mut contents = std::fs::read_to_string(path).map_err(|source| Error::SecretFile {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = contents.trim().to_owned();
    contents.zeroize();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(trimmed)))
}
