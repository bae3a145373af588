//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `JWT_SECRET` - HS256 signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 5000)
//! - `JWT_EXPIRY_HOURS` - Token lifetime (default: 168)
//! - `REQUEST_TIMEOUT_SECS` - Per-request wall clock limit (default: 30)
//! - `CORS_ALLOWED_ORIGINS` - Comma-separated origins, `*` for any (default: `*`)
//! - `PLATFORM_COMMISSION_PERCENT` - Commission taken from settlements (default: 10)
//! - `DELIVERY_FEE` - Flat delivery fee per order (default: 40.00)
//! - `DELIVERY_SEARCH_RADIUS_KM` - Auto-assignment search radius (default: 10)
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Sentry error tracking
//!
//! ## Integrations (all-or-nothing per group)
//! - `GOOGLE_MAPS_API_KEY`
//! - `RAZORPAY_KEY_ID`, `RAZORPAY_KEY_SECRET`, `RAZORPAY_WEBHOOK_SECRET`
//! - `S3_BUCKET`, `S3_REGION`, `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`,
//!   plus optional `S3_ENDPOINT` and `S3_PUBLIC_URL`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_JWT_SECRET_LENGTH: usize = 32;
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
    #[error("Incomplete {0} configuration: {1} is set but {2} is missing")]
    IncompleteGroup(&'static str, String, String),
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// JWT signing secret
    pub jwt_secret: SecretString,
    /// How long issued tokens stay valid
    pub jwt_expiry: Duration,
    /// Wall clock limit per request
    pub request_timeout: Duration,
    /// Allowed CORS origins (`None` means any)
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Marketplace economics
    pub marketplace: MarketplaceConfig,
    /// Google Maps web services
    pub maps: Option<MapsConfig>,
    /// Razorpay payments
    pub razorpay: Option<RazorpayConfig>,
    /// S3-compatible object storage for uploads
    pub storage: Option<StorageConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Commission, delivery fee and assignment radius.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub commission_percent: Decimal,
    pub delivery_fee: Decimal,
    pub delivery_radius_km: f64,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            commission_percent: Decimal::TEN,
            delivery_fee: Decimal::new(4000, 2),
            delivery_radius_km: 10.0,
        }
    }
}

/// Google Maps configuration.
#[derive(Clone)]
pub struct MapsConfig {
    pub api_key: SecretString,
}

impl std::fmt::Debug for MapsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapsConfig")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Razorpay configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    /// Public key id (sent to clients for checkout)
    pub key_id: String,
    /// API secret, also the payment-signature key
    pub key_secret: SecretString,
    /// Webhook signing secret
    pub webhook_secret: SecretString,
    /// API base URL (overridable for tests)
    pub base_url: String,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// S3-compatible object storage configuration.
#[derive(Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: SecretString,
    /// Custom endpoint (path-style addressing); AWS virtual-host style when `None`
    pub endpoint: Option<String>,
    /// Public base URL for uploaded files (CDN); derived from the bucket when `None`
    pub public_url: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("public_url", &self.public_url)
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
    /// Returns `ConfigError` if required variables are missing, invalid, if
    /// an integration group is only partially configured, or if the JWT
    /// secret fails validation (length, placeholder detection, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = SecretString::from(get_required_env("DATABASE_URL")?);
        let host = parse_env_or_default::<IpAddr>("HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("PORT", "5000")?;

        let jwt_secret = get_required_env("JWT_SECRET")?;
        validate_jwt_secret(&jwt_secret, "JWT_SECRET")?;
        let jwt_secret = SecretString::from(jwt_secret);

        let jwt_expiry_hours = parse_env_or_default::<u64>("JWT_EXPIRY_HOURS", "168")?;
        let timeout_secs = parse_env_or_default::<u64>("REQUEST_TIMEOUT_SECS", "30")?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let cors_allowed_origins =
            parse_origins(&get_env_or_default("CORS_ALLOWED_ORIGINS", "*"));

        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            jwt_expiry: Duration::from_secs(jwt_expiry_hours * 3600),
            request_timeout: Duration::from_secs(timeout_secs),
            cors_allowed_origins,
            marketplace: MarketplaceConfig::from_env()?,
            maps: MapsConfig::from_env(),
            razorpay: RazorpayConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MarketplaceConfig {
    /// Load the marketplace settings on their own (the CLI needs no secrets).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` for unparseable or out-of-range values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let commission_percent =
            parse_env_or_default::<Decimal>("PLATFORM_COMMISSION_PERCENT", "10")?;
        if commission_percent.is_sign_negative() || commission_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::InvalidEnvVar(
                "PLATFORM_COMMISSION_PERCENT".to_string(),
                "must be between 0 and 100".to_string(),
            ));
        }

        let delivery_fee = parse_env_or_default::<Decimal>("DELIVERY_FEE", "40.00")?;
        if delivery_fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "DELIVERY_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let delivery_radius_km = parse_env_or_default::<f64>("DELIVERY_SEARCH_RADIUS_KM", "10")?;
        if !delivery_radius_km.is_finite() || delivery_radius_km <= 0.0 {
            return Err(ConfigError::InvalidEnvVar(
                "DELIVERY_SEARCH_RADIUS_KM".to_string(),
                "must be a positive number".to_string(),
            ));
        }

        Ok(Self {
            commission_percent,
            delivery_fee,
            delivery_radius_km,
        })
    }
}

impl MapsConfig {
    fn from_env() -> Option<Self> {
        get_optional_env("GOOGLE_MAPS_API_KEY").map(|key| Self {
            api_key: SecretString::from(key),
        })
    }
}

impl RazorpayConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(values) = load_group(
            "Razorpay",
            &[
                "RAZORPAY_KEY_ID",
                "RAZORPAY_KEY_SECRET",
                "RAZORPAY_WEBHOOK_SECRET",
            ],
        )?
        else {
            return Ok(None);
        };
        let [key_id, key_secret, webhook_secret] = values;

        Ok(Some(Self {
            key_id,
            key_secret: SecretString::from(key_secret),
            webhook_secret: SecretString::from(webhook_secret),
            base_url: get_env_or_default("RAZORPAY_BASE_URL", "https://api.razorpay.com"),
        }))
    }
}

impl StorageConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(values) = load_group(
            "object storage",
            &[
                "S3_BUCKET",
                "S3_REGION",
                "S3_ACCESS_KEY_ID",
                "S3_SECRET_ACCESS_KEY",
            ],
        )?
        else {
            return Ok(None);
        };
        let [bucket, region, access_key_id, secret_access_key] = values;

        Ok(Some(Self {
            bucket,
            region,
            access_key_id,
            secret_access_key: SecretString::from(secret_access_key),
            endpoint: get_optional_env("S3_ENDPOINT").map(|e| e.trim_end_matches('/').to_string()),
            public_url: get_optional_env("S3_PUBLIC_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default`.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Load a group of variables that must be set together.
///
/// Returns `Ok(None)` when none are set.
fn load_group<const N: usize>(
    group: &'static str,
    keys: &[&str; N],
) -> Result<Option<[String; N]>, ConfigError> {
    let values = keys.map(get_optional_env);
    resolve_group(group, keys, values)
}

fn resolve_group<const N: usize>(
    group: &'static str,
    keys: &[&str; N],
    values: [Option<String>; N],
) -> Result<Option<[String; N]>, ConfigError> {
    let present = keys
        .iter()
        .zip(values.iter())
        .find_map(|(k, v)| v.as_ref().map(|_| *k));
    let Some(present) = present else {
        return Ok(None);
    };

    if let Some((missing, _)) = keys.iter().zip(values.iter()).find(|(_, v)| v.is_none()) {
        return Err(ConfigError::IncompleteGroup(
            group,
            present.to_string(),
            (*missing).to_string(),
        ));
    }

    Ok(Some(values.map(Option::unwrap_or_default)))
}

/// `*` (or an empty list) means any origin.
fn parse_origins(raw: &str) -> Option<Vec<String>> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        None
    } else {
        Some(origins)
    }
}

/// Validate that the JWT secret is long, not a placeholder, and high entropy.
fn validate_jwt_secret(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                secret.len()
            ),
        ));
    }
    validate_secret_strength(secret, var_name)
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
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
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

impl ApiConfig {
    /// Expose the JWT secret bytes for key construction.
    #[must_use]
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.expose_secret().as_bytes()
    }
}
