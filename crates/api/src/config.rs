//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `API_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `FRONTEND_URL` - Public URL of the storefront, used to build reset links
//! - `SIGNING_SECRET` - HMAC key for signed links (min 32 chars, high entropy)
//! - `STRIPE_SECRET` - Payment gateway secret key
//! - `STRIPE_KEY` - Payment gateway publishable key
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - Outbound mail relay
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4001)
//! - `STRIPE_API_BASE` - Gateway base URL (default: <https://api.stripe.com/v1>)
//! - `INVOICE_SERVICE_URL` - Invoicing microservice (default: <http://localhost:5000>)
//! - `AUTH_TOKEN_TTL_HOURS` - Bearer token lifetime (default: 24)
//! - `RESET_LINK_TTL_MINUTES` - Password reset link lifetime (default: 60)
//! - `SMTP_PORT` - Relay port (default: 587)
//! - `MAIL_FROM` - Sender address (default: info@widget.com)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT` - Error tracking
//! - `SENTRY_SAMPLE_RATE` (default: 1.0), `SENTRY_TRACES_SAMPLE_RATE` (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use chrono::TimeDelta;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
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
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
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

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Storefront URL that password reset links point at
    pub frontend_url: String,
    /// Key for signing password reset links
    pub signing_secret: SecretString,
    /// Payment gateway configuration
    pub stripe: StripeConfig,
    /// Base URL of the invoicing microservice
    pub invoice_service_url: String,
    /// Lifetime of bearer tokens, in hours
    pub auth_token_ttl_hours: i64,
    /// Lifetime of password reset links, in minutes
    pub reset_link_ttl_minutes: i64,
    /// Outbound mail configuration
    pub email: EmailConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (production, staging, ...)
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Payment gateway configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret key used for server-side calls
    pub secret_key: SecretString,
    /// Publishable key handed to the storefront
    pub publishable_key: String,
    /// API base URL, overridable for local gateway mocks
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// SMTP relay configuration.
#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Address used in the `From` header
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl ApiConfig {
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

        let database_url = get_database_url("API_DATABASE_URL")?;
        let host: IpAddr = get_parsed_or_default("API_HOST", "127.0.0.1")?;
        let port: u16 = get_parsed_or_default("API_PORT", "4001")?;
        let frontend_url = get_required_env("FRONTEND_URL")?
            .trim_end_matches('/')
            .to_string();
        let signing_secret = get_validated_secret("SIGNING_SECRET")?;
        validate_secret_length(&signing_secret, "SIGNING_SECRET")?;

        let auth_token_ttl_hours: i64 = get_parsed_or_default("AUTH_TOKEN_TTL_HOURS", "24")?;
        let reset_link_ttl_minutes: i64 = get_parsed_or_default("RESET_LINK_TTL_MINUTES", "60")?;

        Ok(Self {
            database_url,
            host,
            port,
            frontend_url,
            signing_secret,
            stripe: StripeConfig::from_env()?,
            invoice_service_url: get_env_or_default("INVOICE_SERVICE_URL", "http://localhost:5000")
                .trim_end_matches('/')
                .to_string(),
            auth_token_ttl_hours,
            reset_link_ttl_minutes,
            email: EmailConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Bearer token lifetime.
    #[must_use]
    pub fn auth_token_ttl(&self) -> TimeDelta {
        TimeDelta::hours(self.auth_token_ttl_hours)
    }

    /// Password reset link lifetime.
    #[must_use]
    pub fn reset_link_ttl(&self) -> TimeDelta {
        TimeDelta::minutes(self.reset_link_ttl_minutes)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            secret_key: get_required_secret("STRIPE_SECRET")?,
            publishable_key: get_required_env("STRIPE_KEY")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com/v1")
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port: get_parsed_or_default("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_env_or_default("MAIL_FROM", "info@widget.com"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable (or its default) parsed into `T`.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> ApiConfig {
        ApiConfig {
            database_url: SecretString::from("postgres://localhost/widgets"),
            host: "127.0.0.1".parse().unwrap(),
            port: 4001,
            frontend_url: "http://localhost:4000".to_string(),
            signing_secret: SecretString::from("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6"),
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_51Hx"),
                publishable_key: "pk_test_51Hx".to_string(),
                api_base: "https://api.stripe.com/v1".to_string(),
            },
            invoice_service_url: "http://localhost:5000".to_string(),
            auth_token_ttl_hours: 24,
            reset_link_ttl_minutes: 60,
            email: EmailConfig {
                smtp_host: "smtp.mailtrap.io".to_string(),
                smtp_port: 587,
                smtp_username: "mailer".to_string(),
                smtp_password: SecretString::from("smtp-hunter2"),
                from_address: "info@widget.com".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("changeme-signing-key", "SIGNING_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "SIGNING_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "SIGNING_SECRET");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "SIGNING_SECRET").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "SIGNING_SECRET").is_ok());
    }

    #[test]
    fn test_parse_value_reports_variable() {
        let err = parse_value::<u16>("API_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("API_PORT"));
        assert_eq!(parse_value::<u16>("API_PORT", " 4001 ").unwrap(), 4001);
    }

    #[test]
    fn test_socket_addr_and_ttls() {
        let config = sample_config();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:4001");
        assert_eq!(config.auth_token_ttl(), TimeDelta::hours(24));
        assert_eq!(config.reset_link_ttl(), TimeDelta::minutes(60));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", sample_config());

        assert!(debug_output.contains("pk_test_51Hx"));
        assert!(debug_output.contains("smtp.mailtrap.io"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_51Hx"));
        assert!(!debug_output.contains("smtp-hunter2"));
    }
}
