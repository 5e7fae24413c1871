//! Error types for filter operations

use thiserror::Error;

/// Errors that can occur during filter construction and operations
#[derive(Debug, Error)]
pub enum FilterError {
    /// Invalid parameter provided to a builder or operation
    #[error("invalid parameter '{param}': value '{value}' {constraint}")]
    InvalidParameter {
        /// Parameter name
        param: String,
        /// Invalid value provided
        value: String,
        /// Constraint that was violated
        constraint: String,
    },

    /// Attempted to merge incompatible filters or bit vectors
    #[error("incompatible merge: {reason}")]
    IncompatibleMerge {
        /// Reason for incompatibility
        reason: String,
    },

    /// Operation not supported by this filter variant
    #[error("{operation} is not supported by {variant}")]
    Unsupported {
        /// Name of the rejected operation
        operation: &'static str,
        /// Filter variant that rejected it
        variant: &'static str,
    },

    /// I/O failure while opening, extending, or mapping a backing file
    #[error("storage i/o error")]
    Io(#[from] std::io::Error),
}

impl FilterError {
    /// Builds an [`FilterError::InvalidParameter`] from displayable parts
    pub fn invalid_parameter(
        param: &str,
        value: impl std::fmt::Display,
        constraint: impl Into<String>,
    ) -> Self {
        FilterError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Builds an [`FilterError::IncompatibleMerge`] from a reason
    pub fn incompatible(reason: impl Into<String>) -> Self {
        FilterError::IncompatibleMerge {
            reason: reason.into(),
        }
    }
}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_display() {
        let err = FilterError::invalid_parameter("fpp", 1.5, "must be in (0, 1)");
        assert_eq!(
            err.to_string(),
            "invalid parameter 'fpp': value '1.5' must be in (0, 1)"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = FilterError::Unsupported {
            operation: "remove",
            variant: "ClassicFilter",
        };
        assert_eq!(err.to_string(), "remove is not supported by ClassicFilter");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: FilterError = io.into();
        assert!(matches!(err, FilterError::Io(_)));
    }
}
