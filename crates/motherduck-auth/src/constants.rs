//! MotherDuck API defaults
//!
//! All of these can be overridden from the service configuration; the values
//! here match the hosted MotherDuck deployment.

/// Base URL of the MotherDuck REST API
pub const DEFAULT_API_BASE_URL: &str = "https://api.motherduck.com";

/// Service account that read-scaling tokens are minted for
pub const DEFAULT_ACCOUNT_NAME: &str = "vercel_service_account";

/// Lifetime requested for each read-scaling token, in seconds
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Length of the random display name attached to each minted token
pub const TOKEN_NAME_LEN: usize = 16;

/// Path of the service's own token endpoint
pub const TOKEN_ENDPOINT_PATH: &str = "/api/md-token";
