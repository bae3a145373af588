//! Domain models for the marketplace API.
//!
//! Each module holds the serialized view of an entity plus the request
//! bodies and query strings that create or filter it. Database row types
//! stay private to `crate::db`.

pub mod cart;
pub mod cod;
pub mod delivery;
pub mod favorite;
pub mod order;
pub mod payment;
pub mod product;
pub mod settlement;
pub mod store;
pub mod user;

use serde::Deserialize;

use bazaar_core::Pagination;

pub use user::CurrentUser;

/// `page`/`limit` query parameters shared by every list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    /// Clamp into a [`Pagination`].
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.limit)
    }
}

/// Trim a user-supplied string, mapping blank input to `None`.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
