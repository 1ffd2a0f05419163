//! Result and error types for Contar.

use thiserror::Error;

/// Result type for Contar operations
pub type ContarResult<T> = Result<T, ContarError>;

/// Errors that can occur in Contar
#[derive(Debug, Error)]
pub enum ContarError {
    /// A compiled class could not be parsed or has an unrecognized layout
    #[error("Malformed class {class}: {message}")]
    MalformedClass {
        /// Internal class name (may be empty if unknown)
        class: String,
        /// Error message
        message: String,
    },

    /// The class was already instrumented during this run
    #[error("Class {class} is already instrumented")]
    AlreadyInstrumented {
        /// Internal class name
        class: String,
    },

    /// Hits storage was requested before identifier allocation finished
    #[error("Identifiers of class {class} are not finalized")]
    IdsNotFinalized {
        /// Internal class name
        class: String,
    },

    /// A hit identifier points outside the hits array
    #[error("Hit id {id} out of range for hits array of size {size}")]
    HitIdOutOfRange {
        /// Offending id
        id: i32,
        /// Size of the hits array
        size: usize,
    },

    /// Input ended before a complete value could be read
    #[error("Unexpected end of coverage data while reading {context}")]
    Truncated {
        /// What was being read
        context: String,
    },

    /// Coverage data is structurally invalid
    #[error("Invalid coverage data: {message}")]
    InvalidFormat {
        /// Error message
        message: String,
    },

    /// Coverage data was written with an unknown protocol version
    #[error("Unsupported coverage protocol version {version}")]
    UnsupportedVersion {
        /// Version found in the header
        version: u32,
    },

    /// The simulator could not execute an instrumented method
    #[error("Execution failed: {message}")]
    Execution {
        /// Error message
        message: String,
    },

    /// A class include/exclude pattern did not compile
    #[error("Invalid class pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Raw class stream encoding error
    #[error("Class codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContarError {
    /// Shorthand for a [`ContarError::MalformedClass`]
    pub(crate) fn malformed(class: &str, message: impl Into<String>) -> Self {
        Self::MalformedClass {
            class: class.to_string(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`ContarError::Truncated`]
    pub(crate) fn truncated(context: impl Into<String>) -> Self {
        Self::Truncated {
            context: context.into(),
        }
    }

    /// Shorthand for a [`ContarError::InvalidFormat`]
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Whether this error only affects a single compiled unit
    #[must_use]
    pub fn is_unit_local(&self) -> bool {
        matches!(
            self,
            Self::MalformedClass { .. } | Self::AlreadyInstrumented { .. } | Self::Codec(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message() {
        let err = ContarError::malformed("a/B", "label 3 is never bound");
        assert_eq!(
            err.to_string(),
            "Malformed class a/B: label 3 is never bound"
        );
        assert!(err.is_unit_local());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ContarError = io.into();
        assert!(matches!(err, ContarError::Io(_)));
        assert!(!err.is_unit_local());
    }
}
