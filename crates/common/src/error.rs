//! Error types for the neonmock harness

use thiserror::Error;

/// Result type alias using the harness error
pub type MockResult<T> = std::result::Result<T, MockError>;

/// Harness error types
#[derive(Error, Debug)]
pub enum MockError {
    #[error("No handler registered for query: {sql}")]
    UnmatchedQuery { sql: String },

    #[error("Record not found: no row with {column} = {value}")]
    RecordNotFound { column: String, value: String },

    #[error("Ambiguous record: {count} rows with {column} = {value}")]
    AmbiguousRecord {
        column: String,
        value: String,
        count: usize,
    },

    #[error("Row shape mismatch: expected columns [{}], found [{}]", .expected.join(", "), .found.join(", "))]
    ShapeMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Missing bound parameter ${} (query has {len} parameter(s))", .index + 1)]
    MissingParam { index: usize, len: usize },

    #[error("Invalid bound parameter ${}: expected {expected}, found {found}", .index + 1)]
    InvalidParam {
        index: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Invalid mock spec: {0}")]
    InvalidSpec(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MockError {
    /// True when the failure points at a misconfigured mock rather than at
    /// the request the application sent.
    pub fn is_harness_defect(&self) -> bool {
        matches!(
            self,
            MockError::UnmatchedQuery { .. }
                | MockError::ShapeMismatch { .. }
                | MockError::InvalidSchema(_)
                | MockError::UnknownColumn(_)
                | MockError::InvalidSpec(_)
                | MockError::Config(_)
        )
    }

    /// Short machine-readable code reported in error response bodies
    pub fn code(&self) -> &'static str {
        match self {
            MockError::UnmatchedQuery { .. } => "unmatched_query",
            MockError::RecordNotFound { .. } => "record_not_found",
            MockError::AmbiguousRecord { .. } => "ambiguous_record",
            MockError::ShapeMismatch { .. } => "shape_mismatch",
            MockError::InvalidSchema(_) => "invalid_schema",
            MockError::UnknownColumn(_) => "unknown_column",
            MockError::MissingParam { .. } => "missing_param",
            MockError::InvalidParam { .. } => "invalid_param",
            MockError::MalformedRequest(_) => "malformed_request",
            MockError::InvalidSpec(_) => "invalid_spec",
            MockError::Config(_) => "config",
            MockError::Json(_) => "json",
            MockError::Yaml(_) => "yaml",
            MockError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_query_carries_sql() {
        let err = MockError::UnmatchedQuery {
            sql: "DROP TABLE todos;".to_string(),
        };
        assert!(err.to_string().contains("DROP TABLE todos;"));
        assert!(err.is_harness_defect());
    }

    #[test]
    fn test_param_index_is_one_based_in_message() {
        let err = MockError::MissingParam { index: 1, len: 1 };
        assert_eq!(
            err.to_string(),
            "Missing bound parameter $2 (query has 1 parameter(s))"
        );
        assert!(!err.is_harness_defect());
    }
}
