//! Core types for Vivero.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod category;
pub mod email;
pub mod fingerprint;
pub mod id;
pub mod price;

pub use category::{CategoryKind, CategoryKindError};
pub use email::{Email, EmailError};
pub use fingerprint::{DeviceFingerprint, FingerprintError};
pub use id::*;
pub use price::{CurrencyCode, Price};
