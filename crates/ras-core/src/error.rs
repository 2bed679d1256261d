//! Error types for RAS

use thiserror::Error;

/// Result type alias using RAS's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Contract violations raised by the registry.
///
/// Lock contention and ownership violations are not errors; they come back
/// as `LockFailed` / `UnlockFailed` inside a `CommandResponse`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Input errors (E100-E199)
    #[error("Invalid owner: {0:?}. A user name must contain at least one non-whitespace character.")]
    InvalidOwner(String),

    #[error("'{0}' command is not supported. Use `lock` or `unlock`.")]
    UnsupportedCommand(String),

    // Scheduler errors (E200-E299)
    #[error("No tokio runtime available to schedule auto-unlock timers.")]
    NoRuntime,

    // Config errors (E300-E399)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidOwner(_) => "E100",
            Self::UnsupportedCommand(_) => "E101",
            Self::NoRuntime => "E200",
            Self::Config(_) => "E300",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = [
            Error::InvalidOwner(String::new()),
            Error::UnsupportedCommand("renew".to_string()),
            Error::NoRuntime,
            Error::Config("bad".to_string()),
        ];

        let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_unsupported_command_message() {
        let err = Error::UnsupportedCommand("renew".to_string());
        assert_eq!(
            err.to_string(),
            "'renew' command is not supported. Use `lock` or `unlock`."
        );
    }
}
