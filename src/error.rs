//! Error types for filter parsing, validation, compilation and execution

use thiserror::Error;

/// Errors that can occur while turning a filter request into results
///
/// `Parse` and `Validation` are batched: they carry one message per
/// malformed segment or violated rule instead of stopping at the first.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("{message}: {}", .errors.join("; "))]
    Parse { message: String, errors: Vec<String> },

    #[error("{message}: {}", .errors.join("; "))]
    Validation { message: String, errors: Vec<String> },

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid entity descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No value bound for parameter ':{0}'")]
    MissingParameter(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl FilterError {
    pub fn parse(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Parse {
            message: message.into(),
            errors,
        }
    }

    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn unknown_entity(name: impl Into<String>) -> Self {
        Self::UnknownEntity(name.into())
    }

    pub fn invalid_descriptor(msg: impl Into<String>) -> Self {
        Self::InvalidDescriptor(msg.into())
    }

    /// Individual messages of a batched parse or validation failure
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Parse { errors, .. } | Self::Validation { errors, .. } => errors,
            _ => &[],
        }
    }

    /// Whether the failure was caused by the caller's input rather than execution
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::Validation { .. } | Self::UnknownEntity(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batched_display_joins_errors() {
        let err = FilterError::parse(
            "Filter parsing failed",
            vec!["first".to_string(), "second".to_string()],
        );
        assert_eq!(err.to_string(), "Filter parsing failed: first; second");
        assert_eq!(err.errors().len(), 2);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_non_batched_errors_have_no_list() {
        let err = FilterError::MissingParameter("p1".to_string());
        assert!(err.errors().is_empty());
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "No value bound for parameter ':p1'");
    }

    #[test]
    fn test_execution_errors_are_not_client_errors() {
        let err: FilterError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, FilterError::Sql(_)));
        assert!(!err.is_client_error());

        let err = FilterError::Connection("refused".to_string());
        assert_eq!(err.to_string(), "Connection error: refused");
        assert!(!err.is_client_error());
    }
}
