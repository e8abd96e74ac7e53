//! Error types for command dispatch and session handling.
//!
//! The `Display` text of the dispatch and validation variants is exactly what
//! the simulated terminal prints, so callers render these errors directly.

use thiserror::Error;

/// Errors that can occur while dispatching commands or running a session.
#[derive(Error, Debug)]
pub enum CliError {
    /// No rule registered for the current mode matches the input line.
    #[error("Invalid command")]
    InvalidCommand,

    /// A matched command carried an argument that failed validation.
    ///
    /// The payload is the usage line of the command.
    #[error("Invalid format. Use: {0}")]
    InvalidFormat(String),

    /// A matched command carried fewer arguments than its action needs.
    #[error("Not enough arguments. Use: {0}")]
    MissingArgument(String),

    /// The hostname does not consist solely of ASCII letters and digits.
    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    /// Reading from the line source or writing to the output sink failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A transcript entry could not be encoded or decoded.
    #[error("record error: {0}")]
    RecordError(String),

    /// A replayed transcript diverged from the recorded behavior.
    #[error("replay mismatch: {0}")]
    ReplayMismatchError(String),
}

impl CliError {
    /// Returns true for errors reported to the user without ending the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CliError::InvalidCommand | CliError::InvalidFormat(_) | CliError::MissingArgument(_)
        )
    }
}
