// File: src/core/ids.rs

//! Identifier types for workspaces, sessions, messages, files and invites.
//!
//! Every entity gets its own newtype so a `SessionId` can never be passed
//! where a `WorkspaceId` is expected. UUID-backed ids share one macro; file
//! ids are string-backed because URL references use a prefixed id that must
//! stay distinguishable from stored files.
//!
//! ## Cargo features used by this module
//! - `uuid_v7`: enables `UUIDv7` generation via `uuid/v7`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate an ID intended to have good DB insert locality.
///
/// With feature `uuid_v7` enabled, this uses `Uuid::now_v7()`.
/// Otherwise it falls back to `Uuid::new_v4()`.
#[inline]
#[must_use]
fn uuid_time_ordered() -> Uuid {
    #[cfg(feature = "uuid_v7")]
    {
        Uuid::now_v7()
    }
    #[cfg(not(feature = "uuid_v7"))]
    {
        Uuid::new_v4()
    }
}

/// Generate a random UUID (v4).
#[inline]
#[must_use]
fn uuid_random() -> Uuid {
    Uuid::new_v4()
}

/// Declare a UUID newtype with a consistent API.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        $name:ident,
        generator = $gen:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl Default for $name {
            #[inline]
            fn default() -> Self {
                Self::new()
            }
        }

        impl $name {
            /// Create a new identifier.
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self($gen())
            }

            /// Wrap an existing UUID.
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Borrow the underlying UUID.
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            #[inline]
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

// ===== Entity IDs ===========================================================

define_uuid_id!(
    /// Authenticated account identifier.
    ///
    /// Random (`UUIDv4`) to avoid leaking account creation time.
    UserId,
    generator = uuid_random
);

define_uuid_id!(
    /// Identifier of a workspace (container for sessions and files).
    WorkspaceId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Identifier of a chat session.
    SessionId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Identifier of a single chat message.
    MessageId,
    generator = uuid_time_ordered
);

define_uuid_id!(
    /// Identifier of a session-sharing invite.
    InviteId,
    generator = uuid_random
);

// ===== File IDs =============================================================

/// Identifier of a workspace file.
///
/// Stored files carry a plain UUID. URL references carry
/// [`FileId::URL_REFERENCE_PREFIX`] so deletion can skip the blob store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    /// Prefix marking a URL-reference pseudo-file.
    pub const URL_REFERENCE_PREFIX: &'static str = "url-";

    /// New id for a file persisted to blob storage.
    #[must_use]
    pub fn stored() -> Self {
        Self(uuid_time_ordered().to_string())
    }

    /// New id for a URL reference.
    #[must_use]
    pub fn url_reference() -> Self {
        Self(format!("{}{}", Self::URL_REFERENCE_PREFIX, uuid_random()))
    }

    /// Whether this id names a URL reference rather than a stored file.
    #[must_use]
    pub fn is_url_reference(&self) -> bool {
        self.0.starts_with(Self::URL_REFERENCE_PREFIX)
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FileId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("file id must not be empty".to_string());
        }
        Ok(Self(trimmed.to_owned()))
    }
}

// ===== Rusqlite integration ================================================

mod rusqlite_impl {
    use super::{FileId, InviteId, MessageId, SessionId, UserId, WorkspaceId};
    use std::fmt;

    use rusqlite::types::{
        FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef,
    };

    #[derive(Debug)]
    struct InvalidUuidBlobLen {
        got: usize,
    }

    impl fmt::Display for InvalidUuidBlobLen {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "invalid UUID blob length: got {}, expected 16", self.got)
        }
    }

    impl std::error::Error for InvalidUuidBlobLen {}

    fn uuid_from_blob(b: &[u8]) -> FromSqlResult<uuid::Uuid> {
        let bytes: [u8; 16] = b
            .try_into()
            .map_err(|_| FromSqlError::Other(Box::new(InvalidUuidBlobLen { got: b.len() })))?;
        Ok(uuid::Uuid::from_bytes(bytes))
    }

    fn uuid_from_text(t: &[u8]) -> FromSqlResult<uuid::Uuid> {
        let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        uuid::Uuid::parse_str(s).map_err(|e| FromSqlError::Other(Box::new(e)))
    }

    macro_rules! impl_rusqlite_uuid_newtype {
        ($t:ty) => {
            impl ToSql for $t {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    // Stored as TEXT so rows stay readable in any SQLite shell
                    Ok(ToSqlOutput::Owned(Value::Text(self.0.to_string())))
                }
            }

            impl FromSql for $t {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    match value {
                        ValueRef::Blob(b) => uuid_from_blob(b).map(Self),
                        ValueRef::Text(t) => uuid_from_text(t).map(Self),
                        _ => Err(FromSqlError::InvalidType),
                    }
                }
            }
        };
    }

    impl_rusqlite_uuid_newtype!(UserId);
    impl_rusqlite_uuid_newtype!(WorkspaceId);
    impl_rusqlite_uuid_newtype!(SessionId);
    impl_rusqlite_uuid_newtype!(MessageId);
    impl_rusqlite_uuid_newtype!(InviteId);

    impl ToSql for FileId {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(ToSqlOutput::Owned(Value::Text(self.as_str().to_owned())))
        }
    }

    impl FromSql for FileId {
        fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
            match value {
                ValueRef::Text(t) => {
                    let s = std::str::from_utf8(t).map_err(|e| FromSqlError::Other(Box::new(e)))?;
                    s.parse().map_err(|e: String| FromSqlError::Other(e.into()))
                }
                _ => Err(FromSqlError::InvalidType),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_reference_ids_are_distinguishable() {
        let stored = FileId::stored();
        let reference = FileId::url_reference();

        assert!(!stored.is_url_reference());
        assert!(reference.is_url_reference());
        assert!(reference.as_str().starts_with("url-"));
    }

    #[test]
    fn test_session_id_round_trips_through_string() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_file_id_rejects_blank() {
        assert!("   ".parse::<FileId>().is_err());
        assert_eq!("abc".parse::<FileId>().unwrap().as_str(), "abc");
    }
}
