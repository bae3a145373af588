//! HTTP middleware stack for the API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. Envelope rewrite for framework rejections
//! 3. CORS
//! 4. `TraceLayer` (request span)
//! 5. Request ID
//! 6. Request timeout (per route group)
//! 7. Rate limiting (register and login only)
//!
//! Authentication is not a layer: handlers take one of the extractors in
//! [`auth`].

pub mod auth;
pub mod envelope;
pub mod rate_limit;
pub mod request_id;
pub mod timeout;

pub use auth::{AuthUser, RequireCustomer, RequireDelivery, RequireMerchant};
pub use envelope::envelope_rejections;
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use timeout::timeout_middleware;
