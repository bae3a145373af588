//! User management commands.
//!
//! Mostly for bootstrapping merchants and delivery partners in a fresh
//! environment; customers normally register through the API.

use bazaar_api::db::UserRepository;
use bazaar_api::db::users::NewUser;
use bazaar_api::services::auth::{AuthError, hash_password, validate_name, validate_password};
use bazaar_core::{Email, UserRole};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Invalid role: {0}. Valid roles: customer, merchant, delivery")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Database error: {0}")]
    Repository(#[from] bazaar_api::db::RepositoryError),
}

/// Create a user and print its ID.
pub async fn create(name: &str, email: &str, password: &str, role: &str) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;
    let email = Email::parse(email).map_err(|e| UserError::InvalidEmail(e.to_string()))?;
    let name = validate_name(name)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let pool = connect().await?;

    tracing::info!("Creating {} user: {}", role, email);
    let user = UserRepository::new(&pool)
        .create(&NewUser {
            name,
            email: &email,
            phone: None,
            password_hash: &password_hash,
            role,
        })
        .await?;

    tracing::info!(user_id = %user.id, "User created");
    Ok(())
}
