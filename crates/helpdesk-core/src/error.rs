use thiserror::Error;

use crate::validation::ValidationErrors;

/// Message shown to callers when a policy denies an action.
pub const UNAUTHORIZED_ACTION: &str = "This action is unauthorized.";

/// Message shown when a ticket already carries a solution followup.
pub const DUPLICATE_SOLUTION: &str = "A solution follow-up already exists for this ticket.";

/// Core error type for helpdesk operations.
#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    #[error("{}", DUPLICATE_SOLUTION)]
    DuplicateSolution,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HelpdeskError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        HelpdeskError::Validation(errors)
    }

    /// Whether the error is caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HelpdeskError::InvalidArgument(_)
                | HelpdeskError::NotFound(_)
                | HelpdeskError::Unauthorized(_)
                | HelpdeskError::Forbidden(_)
                | HelpdeskError::Validation(_)
                | HelpdeskError::DuplicateSolution
        )
    }
}

impl From<serde_json::Error> for HelpdeskError {
    fn from(e: serde_json::Error) -> Self {
        HelpdeskError::Serialization(e.to_string())
    }
}

impl From<ValidationErrors> for HelpdeskError {
    fn from(errors: ValidationErrors) -> Self {
        HelpdeskError::Validation(errors)
    }
}

/// Result type alias using HelpdeskError.
pub type Result<T> = std::result::Result<T, HelpdeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_solution_message() {
        assert_eq!(
            HelpdeskError::DuplicateSolution.to_string(),
            "A solution follow-up already exists for this ticket."
        );
    }

    #[test]
    fn test_invalid_field() {
        let err = HelpdeskError::invalid_field("title", "The title field is required.");
        match err {
            HelpdeskError::Validation(errors) => {
                assert_eq!(errors.first("title"), Some("The title field is required."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_client_error_classification() {
        assert!(HelpdeskError::NotFound("x".into()).is_client_error());
        assert!(HelpdeskError::DuplicateSolution.is_client_error());
        assert!(!HelpdeskError::Storage("disk".into()).is_client_error());
        assert!(!HelpdeskError::Internal("boom".into()).is_client_error());
    }
}
