//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bazaar_core::assignment::Candidate;
use bazaar_core::{Coordinates, Email, UserId, UserRole};

use super::RepositoryError;
use crate::models::user::{UpdateProfileInput, User};

const USER_COLUMNS: &str = "id, name, email, phone, role, address, latitude, longitude, \
                            is_available, is_active, created_at, updated_at";

/// Matches a delivery still in progress for the partner aliased `u`.
pub(crate) const ACTIVE_DELIVERY: &str = "SELECT 1 FROM bazaar.deliveries d \
                                          WHERE d.partner_id = u.id \
                                            AND d.status IN ('assigned', 'picked_up')";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    name: String,
    email: String,
    phone: Option<String>,
    role: UserRole,
    address: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    is_available: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            name: row.name,
            email,
            phone: row.phone,
            role: row.role,
            address: row.address,
            latitude: row.latitude,
            longitude: row.longitude,
            is_available: row.is_available,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Row joined with the password hash, for login only.
#[derive(Debug, sqlx::FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fields needed to create an account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a Email,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
    pub role: UserRole,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored email is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM bazaar.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHashRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM bazaar.users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Ok((User::try_from(r.user)?, r.password_hash)))
            .transpose()
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO bazaar.users (name, email, phone, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.password_hash)
        .bind(new.role)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::unique_or(e, "email already exists"))?;

        row.try_into()
    }

    /// Apply a partial profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn update_profile(
        &self,
        id: UserId,
        input: &UpdateProfileInput,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE bazaar.users SET \
                 name = COALESCE($2, name), \
                 phone = COALESCE($3, phone), \
                 address = COALESCE($4, address), \
                 latitude = COALESCE($5, latitude), \
                 longitude = COALESCE($6, longitude) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(input.name.as_deref())
        .bind(input.phone.as_deref())
        .bind(input.address.as_deref())
        .bind(input.latitude)
        .bind(input.longitude)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Toggle a delivery partner's availability and optionally move them.
    ///
    /// A partner with a delivery in progress cannot go available; they are
    /// released when that delivery completes or is rejected.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no delivery partner has this ID,
    /// and `RepositoryError::Conflict` when going available mid-delivery.
    pub async fn set_availability(
        &self,
        id: UserId,
        is_available: bool,
        location: Option<Coordinates>,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE bazaar.users u SET \
                 is_available = $2, \
                 latitude = COALESCE($3, latitude), \
                 longitude = COALESCE($4, longitude) \
             WHERE id = $1 AND role = 'delivery' \
               AND (NOT $2 OR NOT EXISTS ({ACTIVE_DELIVERY})) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(is_available)
        .bind(location.map(|c| c.latitude))
        .bind(location.map(|c| c.longitude))
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let (is_partner,): (bool,) = sqlx::query_as(
                    "SELECT EXISTS (SELECT 1 FROM bazaar.users WHERE id = $1 AND role = 'delivery')",
                )
                .bind(id)
                .fetch_one(self.pool)
                .await?;
                if is_partner {
                    Err(RepositoryError::Conflict(
                        "Finish your current delivery before going available".to_owned(),
                    ))
                } else {
                    Err(RepositoryError::NotFound)
                }
            }
        }
    }

    /// Available, active delivery partners with a known position and no
    /// delivery in progress.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn available_partners(&self) -> Result<Vec<Candidate>, RepositoryError> {
        let rows: Vec<(UserId, f64, f64)> = sqlx::query_as(&format!(
            "SELECT id, latitude, longitude FROM bazaar.users u \
             WHERE role = 'delivery' AND is_available AND is_active \
               AND latitude IS NOT NULL AND longitude IS NOT NULL \
               AND NOT EXISTS ({ACTIVE_DELIVERY})"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(partner_id, lat, lng)| {
                Coordinates::new(lat, lng)
                    .ok()
                    .map(|location| Candidate {
                        partner_id,
                        location,
                    })
            })
            .collect())
    }
}
