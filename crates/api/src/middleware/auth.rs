//! Bearer-token authentication extractors.
//!
//! Handlers declare who may call them by the extractor they take:
//!
//! ```rust,ignore
//! async fn my_store(RequireMerchant(user): RequireMerchant) -> Result<ApiResponse> { ... }
//! ```
//!
//! Missing or invalid tokens answer 401; a valid token with the wrong role
//! answers 403.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use bazaar_core::UserRole;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

/// Any authenticated user.
pub struct AuthUser(pub CurrentUser);

/// An authenticated customer.
pub struct RequireCustomer(pub CurrentUser);

/// An authenticated merchant.
pub struct RequireMerchant(pub CurrentUser);

/// An authenticated delivery partner.
pub struct RequireDelivery(pub CurrentUser);

/// Pull the token out of `Authorization: Bearer <token>`.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<CurrentUser, AppError> {
    let token = bearer_token(parts)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;
    let claims = state.tokens().verify(token)?;
    let user = CurrentUser::try_from(claims)?;

    set_sentry_user(&user.id, Some(&user.email));
    tracing::Span::current().record("user_id", user.id.as_i64());
    Ok(user)
}

fn require_role(user: CurrentUser, role: UserRole) -> Result<CurrentUser, AppError> {
    if user.role == role {
        Ok(user)
    } else {
        Err(AppError::Forbidden(format!(
            "This action requires a {role} account"
        )))
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}

macro_rules! role_extractor {
    ($name:ident, $role:expr) => {
        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let user = authenticate(parts, state)?;
                require_role(user, $role).map(Self)
            }
        }
    };
}

role_extractor!(RequireCustomer, UserRole::Customer);
role_extractor!(RequireMerchant, UserRole::Merchant);
role_extractor!(RequireDelivery, UserRole::Delivery);
