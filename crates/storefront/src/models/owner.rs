//! Ownership of carts and favorite collections.

use serde::{Deserialize, Serialize};
use vivero_core::{DeviceFingerprint, UserId};

/// The identity a cart or favorite collection belongs to.
///
/// Exactly one of `user_id` / `device_fingerprint` is set on the backing
/// rows; this enum is the in-memory form of that rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Owner {
    /// A signed-in shopper.
    User(UserId),
    /// An anonymous browser.
    Device(DeviceFingerprint),
}

impl Owner {
    /// The user id, if this is a signed-in owner.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Device(_) => None,
        }
    }

    /// The device fingerprint, if this is an anonymous owner.
    #[must_use]
    pub const fn device(&self) -> Option<&DeviceFingerprint> {
        match self {
            Self::User(_) => None,
            Self::Device(fingerprint) => Some(fingerprint),
        }
    }

    /// Short label for tracing fields.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::User(id) => format!("user:{id}"),
            Self::Device(fp) => format!("device:{fp}"),
        }
    }
}
