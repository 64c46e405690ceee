//! Custom error types for the transit data-quality engine.
//!
//! This module provides the error hierarchy using `thiserror` so every stage
//! (outlier capping, imputation, densification, scoring) reports failures the
//! same way.
//!
//! Errors are serializable so that batch reports can embed them as
//! `{ "code": ..., "message": ... }` objects.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning and densification engine.
#[derive(Error, Debug)]
pub enum QualityError {
    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// One or more declared key columns are absent from densification input.
    #[error("Missing key columns: {}", .0.join(", "))]
    MissingKeyColumns(Vec<String>),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A column required for numeric computation is not numeric.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// Two aligned sequences have different lengths.
    #[error("Length mismatch for '{field}': expected {expected}, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// Tables that should share columns do not.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A field has no non-missing anchors, so it cannot be interpolated.
    #[error("Field '{0}' has no non-missing values to interpolate from")]
    Unresolved(String),

    /// The scoring collaborator failed or returned unusable predictions.
    #[error("Scoring failed: {0}")]
    ScoringFailed(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<QualityError>,
    },
}

impl QualityError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        QualityError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a type error for a column that is not numeric.
    pub fn not_numeric(column: impl Into<String>, dtype: impl std::fmt::Display) -> Self {
        QualityError::TypeConversionFailed {
            column: column.into(),
            target_type: "Float64".to_string(),
            reason: format!("column has non-numeric dtype {}", dtype),
        }
    }

    /// Get a stable error code for report consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MissingKeyColumns(_) => "MISSING_KEY_COLUMNS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::LengthMismatch { .. } => "LENGTH_MISMATCH",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::Unresolved(_) => "UNRESOLVED",
            Self::ScoringFailed(_) => "SCORING_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is an unresolved-field condition.
    pub fn is_unresolved(&self) -> bool {
        match self {
            Self::Unresolved(_) => true,
            Self::WithContext { source, .. } => source.is_unresolved(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for QualityError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("QualityError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, QualityError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| QualityError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            QualityError::ColumnNotFound("temperature".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            QualityError::MissingKeyColumns(vec!["hour".to_string()]).error_code(),
            "MISSING_KEY_COLUMNS"
        );
    }

    #[test]
    fn test_missing_key_columns_message_lists_all() {
        let error = QualityError::MissingKeyColumns(vec!["dow".to_string(), "hour".to_string()]);
        assert_eq!(error.to_string(), "Missing key columns: dow, hour");
    }

    #[test]
    fn test_not_numeric_names_column() {
        let error = QualityError::not_numeric("wind_speed", "str");
        assert_eq!(error.error_code(), "TYPE_CONVERSION_FAILED");
        assert!(error.to_string().contains("wind_speed"));
        assert!(error.to_string().contains("str"));
    }

    #[test]
    fn test_is_unresolved_through_context() {
        let error = QualityError::Unresolved("temperature".to_string()).with_context("weather");
        assert!(error.is_unresolved());
        assert!(!QualityError::InvalidConfig("x".to_string()).is_unresolved());
    }

    #[test]
    fn test_error_serialization() {
        let error = QualityError::ColumnNotFound("route".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("route"));
    }

    #[test]
    fn test_with_context() {
        let error = QualityError::ColumnNotFound("hour".to_string()).with_context("During densify");
        assert!(error.to_string().contains("During densify"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
