//! Newtype document IDs for type-safe entity references.
//!
//! Every entity is keyed by a 24-character lowercase hex document id: a
//! 4-byte big-endian creation timestamp (seconds) followed by 8 random bytes.
//! Ids sort roughly by creation time and keep the shape clients already use,
//! so "exactly 24 characters" remains a meaningful boundary check.
//!
//! Use the `define_id!` macro to create wrappers that prevent accidentally
//! mixing ids from different entity types.

use chrono::Utc;
use uuid::Uuid;

/// Length of a hex-encoded document id.
pub const ID_LENGTH: usize = 24;

/// Errors that can occur when parsing a document id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input does not have exactly [`ID_LENGTH`] characters.
    #[error("id must be exactly {ID_LENGTH} characters (got {0})")]
    Length(usize),
    /// The input contains a character that is not a hex digit.
    #[error("id must contain only hexadecimal characters")]
    NonHex,
}

/// Generate a fresh hex document id.
#[must_use]
pub fn generate_hex_id() -> String {
    // Seconds since the epoch fit in u32 until 2106.
    let secs = u32::try_from(Utc::now().timestamp()).unwrap_or(u32::MAX);
    let random = Uuid::new_v4();

    let mut bytes = Vec::with_capacity(ID_LENGTH / 2);
    bytes.extend_from_slice(&secs.to_be_bytes());
    bytes.extend(random.as_bytes().iter().take(8));
    hex::encode(bytes)
}

/// Check that `s` is a well-formed hex document id.
///
/// # Errors
///
/// Returns [`IdError`] if the length is wrong or a character is not hex.
pub fn validate_hex_id(s: &str) -> Result<(), IdError> {
    let len = s.chars().count();
    if len != ID_LENGTH {
        return Err(IdError::Length(len));
    }
    if !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IdError::NonHex);
    }
    Ok(())
}

/// Macro to define a type-safe document id wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` that validate the hex shape on input
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `generate()`, `parse()` and `as_str()`
/// - `Display`, `FromStr`, `TryFrom<String>` and `From<Id> for String`
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use qmart_core::define_id;
/// define_id!(CouponId);
///
/// let id = CouponId::generate();
/// assert_eq!(id.as_str().len(), 24);
/// assert!(CouponId::parse("not-an-id").is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Generate a new, unique id.
            #[must_use]
            pub fn generate() -> Self {
                Self($crate::types::id::generate_hex_id())
            }

            /// Parse an id, normalising hex digits to lowercase.
            ///
            /// # Errors
            ///
            /// Returns an error unless the input is exactly 24 hex characters.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::IdError> {
                $crate::types::id::validate_hex_id(s)?;
                Ok(Self(s.to_ascii_lowercase()))
            }

            /// Get the id as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::types::id::IdError;

            fn try_from(s: String) -> ::core::result::Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let raw = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self::parse(&raw)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(LineItemId);
define_id!(PaymentId);
