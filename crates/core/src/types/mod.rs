//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod geo;
pub mod id;
pub mod money;
pub mod pagination;
pub mod status;

pub use email::{Email, EmailError};
pub use geo::{Coordinates, GeoError, extract_coordinates, is_short_map_link};
pub use id::*;
pub use money::{CURRENCY, from_paise, percent_of, round_money, to_paise};
pub use pagination::{DEFAULT_LIMIT, MAX_LIMIT, PageMeta, Pagination};
pub use status::*;
