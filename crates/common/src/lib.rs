//! Shared types for the MotherDuck token service workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::{Secret, read_secret_file, secret_from_env};
