//! Vivero Core - Shared domain types.
//!
//! This crate provides the types shared by the Vivero components:
//! - `storefront` - Public plant shop (catalog, cart, favorites, accounts)
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, category kinds
//!   and device fingerprints

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
