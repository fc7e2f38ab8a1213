// Error types for template context operations

use thiserror::Error;

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors raised by the scope maps, the identifier counter and the context facade
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A scope was exited while already at level 0
    #[error("Cannot decrease variable map level below 0")]
    ScopeUnderflow,

    /// `peek_previous` was asked for an id that was never incremented
    #[error("Cannot obtain previous ID count for ID '{id}'")]
    NoPreviousIdentifier {
        /// Identifier requested
        id: String,
    },

    /// Variable names cannot be empty
    #[error("Variable name cannot be empty")]
    InvalidName,

    /// The name is reserved by the variable map
    #[error("Cannot bind variable called '{name}': such name is a reserved word")]
    ReservedName {
        /// Rejected variable name
        name: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid context configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

impl ContextError {
    /// Build an [`ContextError::InvalidConfiguration`] from any displayable cause
    pub fn configuration(message: impl std::fmt::Display) -> Self {
        ContextError::InvalidConfiguration {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ContextError::ScopeUnderflow.to_string(),
            "Cannot decrease variable map level below 0"
        );
        assert_eq!(
            ContextError::NoPreviousIdentifier { id: "row".into() }.to_string(),
            "Cannot obtain previous ID count for ID 'row'"
        );
        assert_eq!(
            ContextError::ReservedName {
                name: "session".into()
            }
            .to_string(),
            "Cannot bind variable called 'session': such name is a reserved word"
        );
    }
}
