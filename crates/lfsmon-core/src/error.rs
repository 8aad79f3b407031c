//! Error types for the monitoring core.

use thiserror::Error;

/// Result type alias for monitoring operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Error variants for monitoring operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A caller-supplied value could not be accepted.
    #[error("Invalid argument '{token}': {reason}")]
    InvalidArgument {
        /// The offending input token.
        token: String,
        /// Why the token was rejected.
        reason: String,
    },

    /// A referenced entity does not exist.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Entity kind, e.g. "host" or "filesystem".
        kind: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// Credentials presented by an agent did not match.
    #[error("Forbidden")]
    Forbidden,

    /// A lookup that must be unique matched more than one entity.
    #[error("Ambiguous {what}: {count} matches")]
    Ambiguous {
        /// What was being resolved.
        what: String,
        /// Number of matching entities.
        count: usize,
    },

    /// The resource graph violates a structural invariant.
    #[error("Integrity violation: {0}")]
    Integrity(String),

    /// Wraps I/O errors from inventory loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wraps JSON decoding errors from inventory loading.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    /// Builds an `InvalidArgument` error.
    pub fn invalid(token: impl Into<String>, reason: impl Into<String>) -> Self {
        MonitorError::InvalidArgument {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Builds a `NotFound` error.
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        MonitorError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_carries_token() {
        let err = MonitorError::invalid("XYZ", "kinds are MGT, MDT, OST");
        match &err {
            MonitorError::InvalidArgument { token, .. } => assert_eq!(token, "XYZ"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.to_string(), "Invalid argument 'XYZ': kinds are MGT, MDT, OST");
    }

    #[test]
    fn test_not_found_display() {
        let err = MonitorError::not_found("host", 7);
        assert_eq!(err.to_string(), "host 7 not found");
    }
}
