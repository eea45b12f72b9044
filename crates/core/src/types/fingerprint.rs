//! Anonymous device identifiers.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors that can occur when parsing a [`DeviceFingerprint`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FingerprintError {
    /// Shorter than [`DeviceFingerprint::MIN_LENGTH`].
    #[error("fingerprint must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// Longer than [`DeviceFingerprint::MAX_LENGTH`].
    #[error("fingerprint must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// Contains a character outside `[A-Za-z0-9_-]`.
    #[error("fingerprint contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Identifier a browser carries before it signs in.
///
/// Anonymous carts and favorite collections are keyed by this value and
/// merged into the shopper's account on login.
///
/// ```
/// use vivero_core::DeviceFingerprint;
///
/// assert!(DeviceFingerprint::parse("3f1c2b9e-device").is_ok());
/// assert!(DeviceFingerprint::parse("short").is_err());
/// assert!(DeviceFingerprint::parse("has spaces in it").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Minimum accepted length.
    pub const MIN_LENGTH: usize = 8;
    /// Maximum accepted length.
    pub const MAX_LENGTH: usize = 128;

    /// Parse a client-supplied fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is outside 8-128 characters or contains
    /// anything other than ASCII letters, digits, `-` and `_`.
    pub fn parse(s: &str) -> Result<Self, FingerprintError> {
        if s.len() < Self::MIN_LENGTH {
            return Err(FingerprintError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(FingerprintError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(FingerprintError::InvalidCharacter(c));
        }
        Ok(Self(s.to_owned()))
    }

    /// Generate a fresh random fingerprint (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceFingerprint {
    type Error = FingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DeviceFingerprint> for String {
    fn from(value: DeviceFingerprint) -> Self {
        value.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for DeviceFingerprint {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for DeviceFingerprint {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::parse(s)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for DeviceFingerprint {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
