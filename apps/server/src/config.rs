//! # Server Configuration
//!
//! Loaded once at startup.
//!
//! ## Load Order (later overrides earlier)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Defaults                                                           │
//! │  2. fifo.toml  ($FIFO_CONFIG, else the platform config dir)            │
//! │  3. Environment variables                                              │
//! │       PORT, FIFO_BIND_ADDR, DATABASE_PATH, JWT_SECRET, FRONTEND_URL,   │
//! │       FIFO_PONG_WAIT_SECS, FIFO_ADMIN_PASSWORD                         │
//! │  4. validate()                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```toml
//! [server]
//! port = 3001
//! frontend_url = "http://localhost:5173"
//!
//! [database]
//! path = "/var/lib/fifo/fifo.db"
//!
//! [auth]
//! jwt_secret = "change-me"
//!
//! [hub]
//! pong_wait_secs = 60
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fifo_db::DbConfig;
use fifo_hub::HubSettings;

/// Secret used when none is configured. Fine for a laptop, never for a floor.
pub const DEV_JWT_SECRET: &str = "fifo-dev-secret-change-in-production";

/// Full server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub hub: HubSettings,

    #[serde(default)]
    pub seed: SeedSettings,
}

// =============================================================================
// Sections
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// The only origin allowed by CORS. `*` allows any.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
            frontend_url: default_frontend_url(),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("fifo.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

fn default_jwt_secret() -> String {
    DEV_JWT_SECRET.to_string()
}

fn default_token_lifetime() -> i64 {
    30 * 24 * 60 * 60
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

/// Initial admin account, created only if the username is free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSettings {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_password() -> String {
    "admin".to_string()
}

impl Default for SeedSettings {
    fn default() -> Self {
        SeedSettings {
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl ServerConfig {
    /// Loads configuration from file, environment, and defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os("FIFO_CONFIG").map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading server config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        if config.auth.jwt_secret == DEV_JWT_SECRET {
            warn!("Using the development JWT secret; set JWT_SECRET in production");
        }

        Ok(config)
    }

    /// Applies overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!(port = %port, "Ignoring invalid PORT"),
            }
        }

        if let Some(addr) = lookup("FIFO_BIND_ADDR") {
            self.server.bind_addr = addr;
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }

        if let Some(url) = lookup("FRONTEND_URL") {
            self.server.frontend_url = url;
        }

        if let Some(secs) = lookup("FIFO_PONG_WAIT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) => self.hub.pong_wait_secs = s,
                Err(_) => warn!(value = %secs, "Ignoring invalid FIFO_PONG_WAIT_SECS"),
            }
        }

        if let Some(password) = lookup("FIFO_ADMIN_PASSWORD") {
            self.seed.admin_password = password;
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("jwt_secret must not be empty".into()));
        }

        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::Invalid(
                "token_lifetime_secs must be greater than 0".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.seed.admin_username.trim().is_empty() {
            return Err(ConfigError::Invalid("admin_username must not be empty".into()));
        }

        self.hub
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        self.socket_addr()?;

        Ok(())
    }

    /// Address the listener binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.server.bind_addr, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(format!(
                    "invalid bind address {}:{}",
                    self.server.bind_addr, self.server.port
                ))
            })
    }

    /// Database pool settings derived from the `[database]` section.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fifo", "tracker")
            .map(|dirs| dirs.config_dir().join("fifo.toml"))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
