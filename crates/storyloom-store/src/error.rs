//! Store-level errors.

use std::fmt::Display;

use storyloom_core::error::DomainError;
use thiserror::Error;

/// Failures raised while reading or writing rows.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database rejected a query or the connection failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored value no longer decodes into its domain type.
    #[error("corrupt {column} value: {reason}")]
    Corrupt {
        /// The offending column.
        column: &'static str,
        /// Why decoding failed.
        reason: String,
    },
}

impl StoreError {
    pub(crate) fn corrupt(column: &'static str, reason: impl Display) -> Self {
        Self::Corrupt {
            column,
            reason: reason.to_string(),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

/// Narrows a stored counter to its domain width.
pub(crate) fn to_u32(value: i64, column: &'static str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|e| StoreError::corrupt(column, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_surface_as_infrastructure() {
        let err: DomainError = StoreError::Corrupt {
            column: "color",
            reason: "not a hex code".to_owned(),
        }
        .into();

        match err {
            DomainError::Infrastructure(message) => {
                assert_eq!(message, "corrupt color value: not a hex code");
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_counters_are_corrupt() {
        assert!(matches!(
            to_u32(-1, "round"),
            Err(StoreError::Corrupt { column: "round", .. })
        ));
        assert_eq!(to_u32(7, "round").unwrap(), 7);
    }
}
