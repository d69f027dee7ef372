//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Storage
//! - `STOREFRONT_STORAGE` - `postgres` (default) or `memory`
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string, falls back to
//!   `DATABASE_URL`. Required when storage is `postgres`.
//!
//! ## Server
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 7000)
//!
//! ## Payment gateway (optional, all-or-nothing)
//! - `RAZORPAY_KEY_ID` - Gateway key id
//! - `RAZORPAY_KEY_SECRET` - Gateway key secret, also the signature secret
//! - `RAZORPAY_API_BASE` - API base URL (default: <https://api.razorpay.com/v1>)
//! - `RAZORPAY_CURRENCY` - Order currency (default: INR)
//!
//! ## Email (optional, enabled by `SMTP_HOST`)
//! - `SMTP_HOST`, `SMTP_PORT` (default: 587), `SMTP_USERNAME`, `SMTP_PASSWORD`
//! - `EMAIL_FROM_ADDRESS` - Sender address
//! - `EMAIL_FROM_NAME` - Sender display name (default: Q-Mart)
//! - `NOTIFICATION_TIMEOUT_SECS` - Upper bound for sending one confirmation (default: 10)
//!
//! ## Observability
//! - `LOG_FORMAT` - `pretty` (default) or `json`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Where orders and payments are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Storage backend for orders, payments and the directory
    pub storage: StorageBackend,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Payment gateway credentials, absent when not configured
    pub gateway: Option<GatewayConfig>,
    /// SMTP settings, absent when confirmations are only logged
    pub email: Option<EmailConfig>,
    /// Upper bound for the best-effort notification stage
    pub notification_timeout: Duration,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the key secret.
#[derive(Clone)]
pub struct GatewayConfig {
    pub key_id: String,
    /// Used both for API authentication and for signing callbacks
    pub key_secret: SecretString,
    pub api_base: String,
    pub currency: String,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .finish()
    }
}

/// SMTP configuration for order confirmations.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
    /// Display name shown next to the sender address
    pub from_name: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// Variable lookup, so loading can be tested without touching the process env.
type Env<'a> = dyn Fn(&str) -> Option<String> + 'a;

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::load(&|key| std::env::var(key).ok())
    }

    fn load(env: &Env<'_>) -> Result<Self, ConfigError> {
        let storage = match get_env_or_default(env, "STOREFRONT_STORAGE", "postgres").as_str() {
            "postgres" => StorageBackend::Postgres,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "STOREFRONT_STORAGE".to_string(),
                    format!("expected 'postgres' or 'memory', got '{other}'"),
                ));
            }
        };
        let database_url = match storage {
            StorageBackend::Postgres => Some(get_database_url(env, "STOREFRONT_DATABASE_URL")?),
            StorageBackend::Memory => None,
        };

        let host = get_env_or_default(env, "STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default(env, "STOREFRONT_PORT", "7000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;

        let notification_timeout = get_env_or_default(env, "NOTIFICATION_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| {
                ConfigError::InvalidEnvVar("NOTIFICATION_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        let log_format = match get_env_or_default(env, "LOG_FORMAT", "pretty").as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "LOG_FORMAT".to_string(),
                    format!("expected 'pretty' or 'json', got '{other}'"),
                ));
            }
        };

        Ok(Self {
            storage,
            database_url,
            host,
            port,
            gateway: GatewayConfig::load(env)?,
            email: EmailConfig::load(env)?,
            notification_timeout,
            log_format,
            sentry_dsn: get_optional_env(env, "SENTRY_DSN"),
            sentry_environment: get_optional_env(env, "SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GatewayConfig {
    /// Load gateway settings on their own, for tools that only sign or verify.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the credentials are incomplete or insecure.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load(&|key| std::env::var(key).ok())
    }

    fn load(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let key_id = get_optional_env(env, "RAZORPAY_KEY_ID");
        let key_secret = get_optional_env(env, "RAZORPAY_KEY_SECRET");

        let (key_id, key_secret) = match (key_id, key_secret) {
            (None, None) => return Ok(None),
            (Some(_), None) => {
                return Err(ConfigError::MissingEnvVar("RAZORPAY_KEY_SECRET".to_string()));
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingEnvVar("RAZORPAY_KEY_ID".to_string()));
            }
            (Some(id), Some(secret)) => (id, secret),
        };
        validate_secret_strength(&key_secret, "RAZORPAY_KEY_SECRET")?;

        Ok(Some(Self {
            key_id,
            key_secret: SecretString::from(key_secret),
            api_base: get_env_or_default(env, "RAZORPAY_API_BASE", "https://api.razorpay.com/v1")
                .trim_end_matches('/')
                .to_string(),
            currency: get_env_or_default(env, "RAZORPAY_CURRENCY", "INR"),
        }))
    }
}

impl EmailConfig {
    fn load(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env(env, "SMTP_HOST") else {
            return Ok(None);
        };

        let smtp_port = get_env_or_default(env, "SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env(env, "SMTP_USERNAME")?,
            smtp_password: SecretString::from(get_required_env(env, "SMTP_PASSWORD")?),
            from_address: get_required_env(env, "EMAIL_FROM_ADDRESS")?,
            from_name: get_env_or_default(env, "EMAIL_FROM_NAME", "Q-Mart"),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(env: &Env<'_>, key: &str) -> Result<String, ConfigError> {
    get_optional_env(env, key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(env: &Env<'_>, primary_key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(env, primary_key)
        .or_else(|| get_optional_env(env, "DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(env: &Env<'_>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(env: &Env<'_>, key: &str, default: &str) -> String {
    get_optional_env(env, key).unwrap_or_else(|| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the gateway dashboard."
            ),
        ));
    }

    Ok(())
}
