//! WolfDAV Error Types

use thiserror::Error;

/// Result type alias for WolfDAV operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfDAV error types
#[derive(Error, Debug)]
pub enum Error {
    // Davfile errors
    #[error("Davfile line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Invalid rule pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid scope {scope:?}: {reason}")]
    Scope { scope: String, reason: String },

    // Server configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),
}

impl Error {
    /// Build a Davfile syntax error for the given line
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Check if this error was caused by the mount configuration itself.
    ///
    /// These are deterministic input errors: retrying with the same Davfile
    /// will fail the same way.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::Syntax { .. }
                | Error::Pattern { .. }
                | Error::Scope { .. }
                | Error::Config(_)
                | Error::ConfigParse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = Error::syntax(7, "wrong argument count");
        assert_eq!(err.to_string(), "Davfile line 7: wrong argument count");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_io_is_not_config_error() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(!err.is_config_error());
    }
}
