//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The MotherDuck admin token and the static fallback token are loaded from
//! env vars or secret files, never from the TOML directly.

use common::{Secret, read_secret_file, secret_from_env};
use motherduck_auth::{DEFAULT_ACCOUNT_NAME, DEFAULT_API_BASE_URL, DEFAULT_TOKEN_TTL_SECS};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Env var holding the admin token used to mint read-scaling tokens
pub const ADMIN_TOKEN_ENV: &str = "MOTHERDUCK_TOKEN";
/// Env var holding the static fallback token
pub const FALLBACK_TOKEN_ENV: &str = "MOTHERDUCK_FALLBACK_TOKEN";
/// Env var overriding `server.mode`
pub const RUNTIME_MODE_ENV: &str = "RUNTIME_MODE";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub motherduck: MotherDuckConfig,
}

/// Whether the process runs as a deployed service or on a developer machine.
///
/// Read-scaling tokens are never minted in development.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    #[default]
    Production,
    Development,
}

impl FromStr for RuntimeMode {
    type Err = common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(RuntimeMode::Production),
            "development" | "dev" => Ok(RuntimeMode::Development),
            other => Err(common::Error::Config(format!(
                "unknown runtime mode {other:?}, expected \"production\" or \"development\""
            ))),
        }
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeMode::Production => write!(f, "production"),
            RuntimeMode::Development => write!(f, "development"),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub max_connections: usize,
    pub mode: RuntimeMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_connections: 1000,
            mode: RuntimeMode::Production,
        }
    }
}

/// MotherDuck API and credential settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotherDuckConfig {
    pub api_base_url: String,
    pub account_name: String,
    pub token_ttl_secs: i64,
    pub timeout_secs: u64,
    /// Path to a file containing the admin token (alternative to MOTHERDUCK_TOKEN)
    pub token_file: Option<PathBuf>,
    /// Path to a file containing the fallback token (alternative to MOTHERDUCK_FALLBACK_TOKEN)
    pub fallback_token_file: Option<PathBuf>,
    #[serde(skip)]
    pub admin_token: Option<Secret<String>>,
    #[serde(skip)]
    pub fallback_token: Option<Secret<String>>,
}

impl Default for MotherDuckConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            account_name: DEFAULT_ACCOUNT_NAME.to_owned(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            timeout_secs: 10,
            token_file: None,
            fallback_token_file: None,
            admin_token: None,
            fallback_token: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Admin token resolution order:
    /// 1. MOTHERDUCK_TOKEN env var
    /// 2. token_file path from config
    ///
    /// Fallback token resolution order:
    /// 1. MOTHERDUCK_FALLBACK_TOKEN env var
    /// 2. fallback_token_file path from config
    /// 3. the admin token
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.validate()?;

        if let Ok(mode) = std::env::var(RUNTIME_MODE_ENV) {
            config.server.mode = mode.parse()?;
        }

        let md = &mut config.motherduck;
        md.admin_token = match secret_from_env(ADMIN_TOKEN_ENV) {
            Some(token) => Some(token),
            None => match md.token_file {
                Some(ref file) => read_secret_file(file)?,
                None => None,
            },
        };
        md.fallback_token = match secret_from_env(FALLBACK_TOKEN_ENV) {
            Some(token) => Some(token),
            None => match md.fallback_token_file {
                Some(ref file) => read_secret_file(file)?,
                None => md.admin_token.clone(),
            },
        };

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let md = &self.motherduck;

        if !md.api_base_url.starts_with("http://") && !md.api_base_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "api_base_url must start with http:// or https://, got: {}",
                md.api_base_url
            )));
        }

        if md.account_name.is_empty() || md.account_name.contains('/') {
            return Err(common::Error::Config(format!(
                "account_name must be a non-empty path segment, got: {:?}",
                md.account_name
            )));
        }

        if md.token_ttl_secs <= 0 {
            return Err(common::Error::Config(
                "token_ttl_secs must be greater than 0".into(),
            ));
        }

        if md.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("md-token-service.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    /// SAFETY: Callers must hold ENV_MUTEX.
    unsafe fn clear_secret_env() {
        unsafe {
            remove_env(ADMIN_TOKEN_ENV);
            remove_env(FALLBACK_TOKEN_ENV);
            remove_env(RUNTIME_MODE_ENV);
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn valid_toml() -> &'static str {
        r#"
[server]
listen_addr = "127.0.0.1:3000"

[motherduck]
account_name = "vercel_service_account"
"#
    }

    #[test]
    fn test_load_valid_config_applies_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.listen_addr.port(), 3000);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.mode, RuntimeMode::Production);
        assert_eq!(config.motherduck.api_base_url, "https://api.motherduck.com");
        assert_eq!(config.motherduck.token_ttl_secs, 3600);
        assert_eq!(config.motherduck.timeout_secs, 10);
        assert!(config.motherduck.admin_token.is_none());
        assert!(config.motherduck.fallback_token.is_none());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.motherduck.account_name, "vercel_service_account");
        assert_eq!(config.server.listen_addr.port(), 3000);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_development_mode_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\nmode = \"development\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.mode, RuntimeMode::Development);
    }

    #[test]
    fn test_runtime_mode_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\nmode = \"production\"\n");

        unsafe { set_env(RUNTIME_MODE_ENV, "dev") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.mode, RuntimeMode::Development);
        unsafe { remove_env(RUNTIME_MODE_ENV) };
    }

    #[test]
    fn test_unknown_runtime_mode_env_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env(RUNTIME_MODE_ENV, "staging") };
        let result = Config::load(&path);
        unsafe { remove_env(RUNTIME_MODE_ENV) };

        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown runtime mode"), "got: {err}");
    }

    #[test]
    fn test_admin_token_from_env_doubles_as_fallback() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe { set_env(ADMIN_TOKEN_ENV, "admin.env.token") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(ADMIN_TOKEN_ENV) };

        let md = &config.motherduck;
        assert_eq!(md.admin_token.as_ref().unwrap().expose(), "admin.env.token");
        assert_eq!(
            md.fallback_token.as_ref().unwrap().expose(),
            "admin.env.token",
            "fallback defaults to the admin token"
        );
    }

    #[test]
    fn test_fallback_env_overrides_admin_token() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, valid_toml());

        unsafe {
            set_env(ADMIN_TOKEN_ENV, "admin.env.token");
            set_env(FALLBACK_TOKEN_ENV, "ro.env.token");
        }
        let config = Config::load(&path).unwrap();
        unsafe { clear_secret_env() };

        assert_eq!(
            config.motherduck.fallback_token.as_ref().unwrap().expose(),
            "ro.env.token"
        );
    }

    #[test]
    fn test_tokens_from_files() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let admin_path = dir.path().join("admin");
        let fallback_path = dir.path().join("fallback");
        std::fs::write(&admin_path, "admin.file.token\n").unwrap();
        std::fs::write(&fallback_path, "ro.file.token\n").unwrap();

        let path = write_config(
            &dir,
            &format!(
                "[motherduck]\ntoken_file = \"{}\"\nfallback_token_file = \"{}\"\n",
                admin_path.display(),
                fallback_path.display()
            ),
        );

        let config = Config::load(&path).unwrap();
        let md = &config.motherduck;
        assert_eq!(md.admin_token.as_ref().unwrap().expose(), "admin.file.token");
        assert_eq!(md.fallback_token.as_ref().unwrap().expose(), "ro.file.token");
    }

    #[test]
    fn test_admin_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let admin_path = dir.path().join("admin");
        std::fs::write(&admin_path, "admin.file.token").unwrap();
        let path = write_config(
            &dir,
            &format!("[motherduck]\ntoken_file = \"{}\"\n", admin_path.display()),
        );

        unsafe { set_env(ADMIN_TOKEN_ENV, "admin.env.token") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(ADMIN_TOKEN_ENV) };

        assert_eq!(
            config.motherduck.admin_token.as_ref().unwrap().expose(),
            "admin.env.token",
            "MOTHERDUCK_TOKEN must take precedence over token_file"
        );
    }

    #[test]
    fn test_blank_token_file_yields_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let admin_path = dir.path().join("admin");
        std::fs::write(&admin_path, "  \n  ").unwrap();
        let path = write_config(
            &dir,
            &format!("[motherduck]\ntoken_file = \"{}\"\n", admin_path.display()),
        );

        let config = Config::load(&path).unwrap();
        assert!(config.motherduck.admin_token.is_none());
        assert!(config.motherduck.fallback_token.is_none());
    }

    #[test]
    fn test_missing_token_file_returns_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[motherduck]\ntoken_file = \"/nonexistent/path/admin\"\n",
        );

        assert!(
            Config::load(&path).is_err(),
            "nonexistent token_file must return an error"
        );
    }

    #[test]
    fn test_invalid_api_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[motherduck]\napi_base_url = \"api.motherduck.com\"\n");

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(
            err.contains("api_base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[motherduck]\ntoken_ttl_secs = 0\n");
        assert!(Config::load(&path).is_err(), "token_ttl_secs = 0 must be rejected");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[motherduck]\ntimeout_secs = 0\n");
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[server]\nmax_connections = 0\n");
        assert!(Config::load(&path).is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn test_account_name_with_slash_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { clear_secret_env() };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[motherduck]\naccount_name = \"a/b\"\n");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("md-token-service.toml"));
    }

    #[test]
    fn test_runtime_mode_parse_and_display() {
        assert_eq!("Production".parse::<RuntimeMode>().unwrap(), RuntimeMode::Production);
        assert_eq!(" development ".parse::<RuntimeMode>().unwrap(), RuntimeMode::Development);
        assert_eq!(RuntimeMode::Development.to_string(), "development");
    }
}
