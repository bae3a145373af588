//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::services::auth::TokenKeys;
use crate::services::maps::MapsClient;
use crate::services::razorpay::RazorpayClient;
use crate::services::storage::Presigner;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    tokens: TokenKeys,
    maps: Option<MapsClient>,
    razorpay: Option<RazorpayClient>,
    storage: Option<Presigner>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Integrations missing from `config` stay `None`; their routes answer 503.
    ///
    /// # Errors
    ///
    /// Returns an error if the outbound HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("bazaar-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let tokens = TokenKeys::new(config.jwt_secret_bytes(), config.jwt_expiry);
        let maps = config
            .maps
            .as_ref()
            .map(|maps| MapsClient::new(http.clone(), maps));
        let razorpay = config
            .razorpay
            .as_ref()
            .map(|razorpay| RazorpayClient::new(http.clone(), razorpay));
        let storage = config.storage.as_ref().map(Presigner::new);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                tokens,
                maps,
                razorpay,
                storage,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// JWT signing and verification keys.
    #[must_use]
    pub fn tokens(&self) -> &TokenKeys {
        &self.inner.tokens
    }

    /// Google Maps client, or 503 when not configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` without a Maps API key.
    pub fn maps(&self) -> Result<&MapsClient, AppError> {
        self.inner
            .maps
            .as_ref()
            .ok_or(AppError::Unavailable("Google Maps"))
    }

    /// Razorpay client, if configured.
    #[must_use]
    pub fn razorpay(&self) -> Option<&RazorpayClient> {
        self.inner.razorpay.as_ref()
    }

    /// Razorpay client, or 503 when not configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` without Razorpay credentials.
    pub fn require_razorpay(&self) -> Result<&RazorpayClient, AppError> {
        self.razorpay().ok_or(AppError::Unavailable("Razorpay"))
    }

    /// Upload presigner, or 503 when not configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` without object storage settings.
    pub fn storage(&self) -> Result<&Presigner, AppError> {
        self.inner
            .storage
            .as_ref()
            .ok_or(AppError::Unavailable("Object storage"))
    }
}
