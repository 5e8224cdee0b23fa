mod database;
mod mail;
mod observability;

pub use database::DatabaseConfig;
pub use mail::{MailConfig, MailTransport};
pub use observability::ObservabilityConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HelpdeskError, Result};

/// Root configuration, read from `helpdesk.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub app: AppConfig,

    pub database: DatabaseConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub mail: MailConfig,

    /// Mail outbox worker.
    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl HelpdeskConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| HelpdeskError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| HelpdeskError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Defaults everywhere except the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            app: AppConfig::default(),
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            gateway: GatewayConfig::default(),
            security: SecurityConfig::default(),
            storage: StorageConfig::default(),
            mail: MailConfig::default(),
            worker: WorkerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }

    /// The signing secret, or a `Config` error when unset.
    pub fn jwt_secret(&self) -> Result<&str> {
        match self.security.auth.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret),
            _ => Err(HelpdeskError::Config(
                "security.auth.jwt_secret is not set".into(),
            )),
        }
    }
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    /// Public base URL used for links in notifications.
    #[serde(default = "default_app_url")]
    pub url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            url: default_app_url(),
        }
    }
}

impl AppConfig {
    /// Absolute link to a ticket page.
    pub fn ticket_url(&self, ticket_id: i64) -> String {
        format!("{}/tickets/{}", self.url.trim_end_matches('/'), ticket_id)
    }
}

fn default_app_name() -> String {
    "Helpdesk".to_string()
}

fn default_app_url() -> String {
    "http://localhost:8080".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Allowed CORS origins; `["*"]` or empty allows any.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Request body limit; must cover a full multipart upload.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_http_port(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

/// Security configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Bearer token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for token validation and minting.
    pub jwt_secret: Option<String>,

    /// Lifetime of minted tokens.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_ttl_secs: default_session_ttl(),
        }
    }
}

fn default_session_ttl() -> u64 {
    7 * 24 * 60 * 60
}

/// Attachment storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("storage/app/private")
}

/// Mail outbox worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Rows claimed per poll.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Delivery attempts before a message is dead-lettered.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_batch_size() -> i64 {
    10
}

fn default_max_attempts() -> i32 {
    5
}

fn default_max_concurrent() -> usize {
    4
}

/// Substitute environment variables in the format ${VAR_NAME}.
/// Unset variables are left as written.
fn substitute_env_vars(content: &str) -> String {
    let Ok(re) = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") else {
        return content.to_string();
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
