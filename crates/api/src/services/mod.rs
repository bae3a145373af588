//! Business logic that spans more than one repository or talks to an
//! outside service.
//!
//! # Services
//!
//! - `auth` - Registration, login and bearer tokens
//! - `orders` - Checkout, merchant status changes, cancellation and refunds
//! - `delivery` - Partner auto-assignment
//! - `razorpay` - Razorpay orders, refunds and signatures
//! - `maps` - Google geocoding, directions and map-link resolution
//! - `storage` - Presigned uploads to S3-compatible storage

pub mod auth;
pub mod delivery;
pub mod maps;
pub mod orders;
pub mod razorpay;
pub mod storage;

use sqlx::PgPool;

use bazaar_core::{Coordinates, UserId};

use crate::db::StoreRepository;
use crate::error::AppError;
use crate::models::store::Store;

/// The merchant's live store.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the merchant has not created one yet.
pub async fn merchant_store(pool: &PgPool, owner: UserId) -> Result<Store, AppError> {
    StoreRepository::new(pool)
        .get_by_owner(owner)
        .await?
        .ok_or_else(|| AppError::NotFound("You have not created a store yet".to_string()))
}

/// Validate an optional coordinate pair from a request body.
///
/// # Errors
///
/// Returns `AppError::BadRequest` when only one half is given or a value is
/// out of range.
pub fn optional_coordinates(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinates>, AppError> {
    match (latitude, longitude) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => Coordinates::new(lat, lng)
            .map(Some)
            .map_err(|e| AppError::BadRequest(e.to_string())),
        _ => Err(AppError::BadRequest(
            "latitude and longitude must be given together".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_coordinates() {
        assert!(matches!(optional_coordinates(None, None), Ok(None)));
        assert!(matches!(
            optional_coordinates(Some(12.9), Some(77.6)),
            Ok(Some(_))
        ));
        assert!(matches!(
            optional_coordinates(Some(12.9), None),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            optional_coordinates(Some(120.0), Some(77.6)),
            Err(AppError::BadRequest(_))
        ));
    }
}
