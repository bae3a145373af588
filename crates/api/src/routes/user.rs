//! Registration, login and the caller's own profile.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::{AuthUser, auth_rate_limiter};
use crate::models::non_blank;
use crate::models::user::{LoginInput, RegisterInput, UpdateProfileInput};
use crate::response::ApiResponse;
use crate::services::auth::AuthService;
use crate::services::optional_coordinates;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;
const MAX_ADDRESS_LENGTH: usize = 500;

/// Build the user router. Register and login are rate limited per IP.
pub fn router() -> Router<AppState> {
    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(credentials)
        .route("/me", get(me).put(update_me))
}

/// Create an account.
///
/// POST /api/v1/user/register
async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> Result<ApiResponse> {
    let session = AuthService::new(state.pool(), state.tokens())
        .register(&input)
        .await?;

    ApiResponse::created("Registration successful")
        .with("token", &session.token)?
        .with("user", &session.user)
}

/// Exchange credentials for a token.
///
/// POST /api/v1/user/login
async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<ApiResponse> {
    let session = AuthService::new(state.pool(), state.tokens())
        .login(&input.email, &input.password)
        .await?;
    tracing::info!(user_id = %session.user.id, "User logged in");

    ApiResponse::ok("Login successful")
        .with("token", &session.token)?
        .with("user", &session.user)
}

/// GET /api/v1/user/me
async fn me(AuthUser(current): AuthUser, State(state): State<AppState>) -> Result<ApiResponse> {
    let user = AuthService::new(state.pool(), state.tokens())
        .get_user(current.id)
        .await?;
    ApiResponse::ok("Profile").with("user", &user)
}

/// PUT /api/v1/user/me
async fn update_me(
    AuthUser(current): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<UpdateProfileInput>,
) -> Result<ApiResponse> {
    let input = clean_profile(input)?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &input)
        .await?;
    ApiResponse::ok("Profile updated").with("user", &user)
}

/// Trim fields and check lengths and coordinates.
fn clean_profile(input: UpdateProfileInput) -> Result<UpdateProfileInput> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name cannot be blank".to_string()));
    }
    let name = non_blank(input.name.as_deref());
    if name
        .as_ref()
        .is_some_and(|n| n.chars().count() > MAX_NAME_LENGTH)
    {
        return Err(AppError::BadRequest(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    let address = non_blank(input.address.as_deref());
    if address
        .as_ref()
        .is_some_and(|a| a.chars().count() > MAX_ADDRESS_LENGTH)
    {
        return Err(AppError::BadRequest("address is too long".to_string()));
    }
    let location = optional_coordinates(input.latitude, input.longitude)?;

    Ok(UpdateProfileInput {
        name,
        phone: non_blank(input.phone.as_deref()),
        address,
        latitude: location.map(|c| c.latitude),
        longitude: location.map(|c| c.longitude),
    })
}
