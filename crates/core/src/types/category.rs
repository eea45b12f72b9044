//! Category kinds for the plant catalog.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a category kind string is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown category kind: {0}")]
pub struct CategoryKindError(pub String);

/// The kind of goods a category groups.
///
/// Stored as lowercase text in the `categories.kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Living plants.
    Plant,
    /// Pots, tools, substrates.
    Accessory,
    /// Curated bundles of plants and accessories.
    Kit,
}

impl CategoryKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 3] = [Self::Plant, Self::Accessory, Self::Kit];

    /// Database and query-string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plant => "plant",
            Self::Accessory => "accessory",
            Self::Kit => "kit",
        }
    }

    /// Shopper-facing label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plant => "Plantas",
            Self::Accessory => "Accesorios",
            Self::Kit => "Kits",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryKind {
    type Err = CategoryKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plant" => Ok(Self::Plant),
            "accessory" => Ok(Self::Accessory),
            "kit" => Ok(Self::Kit),
            other => Err(CategoryKindError(other.to_owned())),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CategoryKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for CategoryKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CategoryKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}
