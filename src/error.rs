//! Error types for the scoring engine

use thiserror::Error;

use crate::landmarks::{Scheme, Side};

/// Errors raised by the repository, cache and session controller
#[derive(Error, Debug)]
pub enum ScorerError {
    /// A record pair already exists for this case
    #[error("Case already exists: {0}")]
    DuplicateCase(String),

    /// No record for this (case, side)
    #[error("No record for case {case} side {side}")]
    NotFound { case: String, side: Side },

    /// No case at this position in the file list
    #[error("Case not found: {0}")]
    CaseNotFound(String),

    /// Persisted session could not be parsed or failed validation
    #[error("Corrupt session data: {0}")]
    CorruptData(String),

    #[error("Unknown {scheme} landmark: {name}")]
    UnknownLandmark { scheme: Scheme, name: String },

    #[error("Score {value} is not valid for {scheme}")]
    InvalidScore { scheme: Scheme, value: i64 },

    /// Session could not be written out
    #[error("Failed to serialize session: {0}")]
    Serialize(String),

    /// Bulk score text that does not fit the current landmark order
    #[error("Bulk entry rejected: {0}")]
    BulkEntry(String),

    /// Operation needs an open case
    #[error("No case selected")]
    NoCaseSelected,
}

impl From<serde_json::Error> for ScorerError {
    fn from(err: serde_json::Error) -> Self {
        ScorerError::CorruptData(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScorerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failure_is_corrupt_data() {
        let err: ScorerError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, ScorerError::CorruptData(_)));
    }

    #[test]
    fn test_write_and_input_errors_are_distinct_from_load_errors() {
        let err = ScorerError::Serialize("key must be a string".into());
        assert_eq!(err.to_string(), "Failed to serialize session: key must be a string");

        let err = ScorerError::BulkEntry("17 values for 16 BE landmarks".into());
        assert_eq!(err.to_string(), "Bulk entry rejected: 17 values for 16 BE landmarks");
    }
}
