//! Error types for the game simulation.
//!
//! Only malformed input is an error. A reference to an object that has
//! died in the meantime, or a search that finds nothing, is normal
//! operation and is reported through `Option` or [`Coord::INVALID`].
//!
//! [`Coord::INVALID`]: crate::coord::Coord::INVALID

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    /// A command or call carried arguments that do not fit its definition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An item ID that does not name any structure or unit type.
    #[error("Unknown item ID: {0}")]
    UnknownItem(u32),

    /// A serialized command whose byte length breaks the wire format.
    #[error("Malformed command of {length} bytes: {reason}")]
    MalformedCommand {
        /// Total length of the rejected buffer.
        length: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A save stream that does not start with the save magic number.
    #[error("Not a save game: bad magic number {0:#010x}")]
    BadMagic(u32),

    /// A save stream written by an incompatible version.
    #[error("Save game version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version this build writes and reads.
        expected: u32,
        /// Version found in the stream.
        found: u32,
    },

    /// A save stream ended before all fields were read.
    #[error("Save stream truncated while reading {0}")]
    Truncated(&'static str),

    /// A save stream decoded to values that cannot be valid.
    #[error("Corrupt save stream: {0}")]
    CorruptSave(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Shorthand for [`GameError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether this error belongs to the malformed-input category that the
    /// caller outside the core must report.
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        !matches!(self, Self::InvalidState(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_mismatch_message() {
        let err = GameError::VersionMismatch {
            expected: 3,
            found: 2,
        };
        assert_eq!(
            err.to_string(),
            "Save game version mismatch: expected 3, found 2"
        );
    }

    #[test]
    fn test_malformed_category() {
        assert!(GameError::UnknownItem(99).is_malformed_input());
        assert!(GameError::Truncated("health").is_malformed_input());
        assert!(!GameError::InvalidState("x".into()).is_malformed_input());
    }
}
