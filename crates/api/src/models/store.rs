//! Store domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use bazaar_core::{Coordinates, StoreId, UserId};

/// A merchant's shop.
#[derive(Debug, Clone, Serialize)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Distance from the search origin, only set on proximity searches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl Store {
    /// Pickup point, if the store has coordinates.
    #[must_use]
    pub fn location(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

/// `POST /store` body.
#[derive(Debug, Deserialize)]
pub struct CreateStoreInput {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
}

/// `PUT /store/{id}` body.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateStoreInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub phone: Option<String>,
    pub image_url: Option<String>,
    pub is_open: Option<bool>,
}

/// `GET /store` query string.
#[derive(Debug, Default, Deserialize)]
pub struct StoreFilter {
    pub q: Option<String>,
    pub category: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl StoreFilter {
    /// Search origin, if both `lat` and `lng` were given.
    #[must_use]
    pub fn origin(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.lat, self.lng)
    }
}
