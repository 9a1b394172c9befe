// Error types for the migration engine

use thiserror::Error;

/// Errors surfaced by the SQL execution driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Execute(String),

    #[error("no native driver for subprotocol: {0}")]
    NoNativeDriver(String),
}

/// Top-level error type for parsing, compilation and migration runs.
#[derive(Debug, Error)]
pub enum TernError {
    /// A command map carried a dispatch key outside the supported set.
    #[error("don't know how to process: {0}")]
    UnknownCommand(String),

    /// Malformed migration data (shape errors, missing required fields).
    #[error("{0}")]
    Validation(String),

    #[error("unsupported subprotocol: {0}")]
    UnsupportedBackend(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("invalid migration file {path}: {message}")]
    InvalidMigration { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Strip the noise prefixes MySQL and PostgreSQL put in front of batch-update
/// error messages so the operator sees the actual cause.
pub fn clean_driver_message(message: &str) -> String {
    let trimmed = message.trim();
    for prefix in ["FATAL: ", "ERROR: "] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_driver_message_strips_prefixes() {
        assert_eq!(
            clean_driver_message("ERROR: relation \"foo\" does not exist"),
            "relation \"foo\" does not exist"
        );
        assert_eq!(
            clean_driver_message("FATAL: database \"bar\" does not exist"),
            "database \"bar\" does not exist"
        );
        assert_eq!(clean_driver_message("plain message"), "plain message");
    }

    #[test]
    fn test_unknown_command_display() {
        let err = TernError::UnknownCommand("create-view".to_string());
        assert_eq!(err.to_string(), "don't know how to process: create-view");
    }
}
