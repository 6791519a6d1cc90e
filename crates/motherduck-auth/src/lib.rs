//! MotherDuck credential library
//!
//! Provides the structural credential check, the read-scaling token minting
//! client, and a small client for the service's own token endpoint. This
//! crate has no dependency on the service binary and is tested on its own.
//!
//! Token flow:
//! 1. Service calls `mint::MintClient::create_read_scaling_token()`
//! 2. Service checks the result with `credential::validate()`
//! 3. Browser-side consumers call `fetch::fetch_md_token()` and hand the
//!    credential to the database connection

pub mod constants;
pub mod credential;
pub mod error;
pub mod fetch;
pub mod mint;

pub use constants::*;
pub use credential::{Credential, InvalidReason, Validation, validate};
pub use error::{Error, Result};
pub use fetch::fetch_md_token;
pub use mint::{MintClient, MintRequest, MintResponse, random_name};
