//! Error types shared by every store component.

use thiserror::Error;

/// Errors reported by a [`KvAdapter`](crate::kv::KvAdapter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KvError {
    /// The backing store has no room left for the value.
    #[error("storage is full")]
    Full,

    /// The backing store could not be reached or failed the operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by store operations.
///
/// Unreadable values are never reported here; they are read as empty and
/// recorded in [`Diagnostics`](crate::diagnostics::Diagnostics) instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The adapter rejected a read or write.
    #[error(transparent)]
    Kv(#[from] KvError),

    /// A value could not be serialized for writing.
    #[error("failed to encode {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The addressed record does not exist.
    #[error("{collection} not found: {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// The caller supplied a record that violates a data invariant.
    #[error("invalid record: {0}")]
    Invalid(String),
}

impl StoreError {
    pub(crate) fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection,
            id: id.into(),
        }
    }

    /// Returns true if this error means the addressed record is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::not_found("meal", "abc");
        assert_eq!(err.to_string(), "meal not found: abc");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_kv_error_is_transparent() {
        let err: StoreError = KvError::Full.into();
        assert_eq!(err.to_string(), "storage is full");
        assert!(!err.is_not_found());
    }
}
