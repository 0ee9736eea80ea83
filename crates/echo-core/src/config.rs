use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Domain constants — shared by the store and the dispatch pipeline.
pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_RUN_DEADLINE_SECS: u64 = 60;
pub const DEFAULT_STALE_MINUTES: i64 = 15;
/// Inactivity window before the lifecheck trigger fires when the user
/// never configured one: 3 days.
pub const DEFAULT_GRACE_MINUTES: i64 = 4320;
/// `deliveries.last_error` is capped at this many bytes.
pub const LAST_ERROR_MAX_BYTES: usize = 1000;
/// Signed media links stay valid for 7 days by default.
pub const DEFAULT_MEDIA_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Top-level config (echo.toml + ECHO_* env overrides).
///
/// Env-overridable leaves use single-word names (`worker.secret` →
/// `ECHO_WORKER_SECRET`) because the env provider splits on `_`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Settings for the delivery worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Shared secret for `Authorization: Bearer <secret>`. No default —
    /// while unset, every worker request is denied.
    pub secret: Option<String>,
    /// Max pending deliveries fetched per run.
    #[serde(default = "default_batch")]
    pub batch: u32,
    /// Whole-run wall-clock cap in seconds; exceeding it is a fatal,
    /// reported outcome.
    #[serde(default = "default_deadline")]
    pub deadline: u64,
    /// Deliveries stuck in `processing` longer than this many minutes
    /// are released back to `pending` at the start of a run.
    #[serde(default = "default_stale")]
    pub stale: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            secret: None,
            batch: DEFAULT_BATCH_SIZE,
            deadline: DEFAULT_RUN_DEADLINE_SECS,
            stale: DEFAULT_STALE_MINUTES,
        }
    }
}

/// Transactional email provider (Resend-compatible HTTP API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    /// Provider API key. No default — required for worker runs.
    pub key: Option<String>,
    #[serde(default = "default_mailer_url")]
    pub url: String,
    #[serde(default = "default_from")]
    pub from: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            key: None,
            url: default_mailer_url(),
            from: default_from(),
        }
    }
}

/// Signed media link generation. When `url`/`secret` are unset,
/// attachment resolution degrades to a placeholder notice in the email
/// body — it never blocks a delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Public base URL the signed links are rooted at.
    pub url: Option<String>,
    /// HMAC-SHA256 signing secret.
    pub secret: Option<String>,
    #[serde(default = "default_media_ttl")]
    pub ttl: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            ttl: DEFAULT_MEDIA_TTL_SECS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.echo/echo.db", home)
}
fn default_batch() -> u32 {
    DEFAULT_BATCH_SIZE
}
fn default_deadline() -> u64 {
    DEFAULT_RUN_DEADLINE_SECS
}
fn default_stale() -> i64 {
    DEFAULT_STALE_MINUTES
}
fn default_mailer_url() -> String {
    "https://api.resend.com".to_string()
}
fn default_from() -> String {
    "Echo <no-reply@echo.local>".to_string()
}
fn default_media_ttl() -> u64 {
    DEFAULT_MEDIA_TTL_SECS
}

impl EchoConfig {
    /// Load config from a TOML file with ECHO_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.echo/echo.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: EchoConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("ECHO_").split("_"))
            .extract()
            .map_err(|e| crate::error::EchoError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Names of required settings that are absent or empty, env-style.
    ///
    /// An empty list means worker runs can proceed. The worker secret is
    /// listed too, even though auth already fails without it, so the
    /// diag endpoint can point at the exact misconfiguration.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self
            .worker
            .secret
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            missing.push("ECHO_WORKER_SECRET");
        }
        if self
            .mailer
            .key
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
            .is_empty()
        {
            missing.push("ECHO_MAILER_KEY");
        }
        missing
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.echo/echo.toml", home)
}
