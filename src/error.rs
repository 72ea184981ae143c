// ⚠️ Error taxonomy
// Format problems in uploaded files, opaque store failures, and form validation.

use serde::Serialize;
use thiserror::Error;

// ============================================================================
// FORMAT ERRORS (uploaded files)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormatError {
    #[error("file '{file_name}' has no data rows")]
    Empty { file_name: String },

    #[error("missing required column '{column}' (accepted headers: {accepted})")]
    MissingColumn { column: &'static str, accepted: String },

    #[error("invalid rate value '{raw}' on row {row}")]
    InvalidRate { raw: String, row: usize },

    #[error("rate value is empty")]
    EmptyRate,

    #[error("rate value '{raw}' is not a number")]
    NotANumber { raw: String },

    #[error("invalid date '{raw}' on row {row}")]
    InvalidDate { raw: String, row: usize },

    #[error("row {row}: required field '{field}' is empty")]
    MissingField { field: &'static str, row: usize },

    #[error("could not decode '{file_name}': {detail}")]
    Undecodable { file_name: String, detail: String },
}

impl FormatError {
    /// Attach a 1-based row number to a value-level error.
    pub fn at_row(self, row: usize) -> Self {
        match self {
            FormatError::NotANumber { raw } => FormatError::InvalidRate { raw, row },
            FormatError::EmptyRate => FormatError::InvalidRate {
                raw: String::new(),
                row,
            },
            other => other,
        }
    }
}

// ============================================================================
// STORE ERRORS (backing data store, opaque)
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store error: {0}")]
    Backend(String),

    #[error("{table} row {id} not found")]
    NotFound { table: String, id: i64 },

    #[error("unknown table '{0}'")]
    UnknownTable(String),

    #[error("unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("could not decode {table} row: {detail}")]
    Decode { table: String, detail: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

// ============================================================================
// VALIDATION ERRORS (form submissions)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failing field of one submission, collected in a single pass.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("validation failed: {}", join_errors(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationErrors(vec![ValidationError::new(field, message)])
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Ok when nothing was collected.
    pub fn into_result(errors: Vec<ValidationError>) -> Result<(), ValidationErrors> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// UMBRELLA
// ============================================================================

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

pub type ConsoleResult<T> = Result<T, ConsoleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rate_message_names_row_and_value() {
        let err = FormatError::NotANumber {
            raw: "abc".to_string(),
        }
        .at_row(4);

        assert_eq!(err.to_string(), "invalid rate value 'abc' on row 4");
    }

    #[test]
    fn test_validation_errors_display_joins_fields() {
        let errors = ValidationErrors(vec![
            ValidationError::new("name", "is required"),
            ValidationError::new("carrier", "is required"),
        ]);

        assert_eq!(
            errors.to_string(),
            "validation failed: name: is required; carrier: is required"
        );
        assert!(errors.has_field("carrier"));
        assert!(!errors.has_field("plan_type"));
    }

    #[test]
    fn test_into_result_empty_is_ok() {
        assert!(ValidationErrors::into_result(vec![]).is_ok());
        assert!(ValidationErrors::into_result(vec![ValidationError::new("a", "b")]).is_err());
    }
}
