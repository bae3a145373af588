//! Bazaar Core - Shared domain library.
//!
//! This crate provides the types and pure rules used across the Bazaar
//! marketplace components:
//! - `api` - REST backend for customers, merchants and delivery partners
//! - `cli` - Command-line tools for migrations, users and settlements
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. The optional `postgres` feature adds
//! `sqlx` encodings for IDs, emails and status enums.
//!
//! # Modules
//!
//! - [`types`] - IDs, email, roles and statuses (with transition rules),
//!   money, coordinates, pagination
//! - [`settlement`] - Merchant payout arithmetic
//! - [`assignment`] - Nearest delivery-partner ranking

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod assignment;
pub mod settlement;
pub mod types;

pub use types::*;
