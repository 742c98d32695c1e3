//! Error taxonomy shared by the store, the API and the client controller.
//!
//! Every core operation returns a `Result` carrying one of these kinds instead of
//! panicking past its boundary. The optimistic controller inspects the kind to decide
//! whether a failure should also surface a user-visible notice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for board operations.
pub type BoardResult<T> = Result<T, BoardError>;

/// Errors produced by board operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardError {
    /// No session, invalid token, or resource owned by someone else.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Container or item missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing transaction failed or the transport could not complete the call.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),

    /// Input rejected before touching storage.
    #[error("Malformed input: {0}")]
    MalformedInput(String),
}

impl BoardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BoardError::Unauthorized(_) => ErrorKind::Unauthorized,
            BoardError::NotFound(_) => ErrorKind::NotFound,
            BoardError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
            BoardError::MalformedInput(_) => ErrorKind::MalformedInput,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            BoardError::Unauthorized(m)
            | BoardError::NotFound(m)
            | BoardError::PersistenceFailure(m)
            | BoardError::MalformedInput(m) => m,
        }
    }

    /// Rebuild an error from its wire representation.
    pub fn from_parts(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Unauthorized => BoardError::Unauthorized(message),
            ErrorKind::NotFound => BoardError::NotFound(message),
            ErrorKind::PersistenceFailure => BoardError::PersistenceFailure(message),
            ErrorKind::MalformedInput => BoardError::MalformedInput(message),
        }
    }

    pub fn task_not_found(id: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("Task {} not found", id))
    }

    pub fn list_not_found(id: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("List {} not found", id))
    }

    pub fn board_not_found(id: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("Board {} not found", id))
    }

    pub fn workspace_not_found(id: impl std::fmt::Display) -> Self {
        BoardError::NotFound(format!("Workspace {} not found", id))
    }
}

/// Error kind as it travels over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    NotFound,
    PersistenceFailure,
    MalformedInput,
}

impl From<rusqlite::Error> for BoardError {
    fn from(e: rusqlite::Error) -> Self {
        BoardError::PersistenceFailure(e.to_string())
    }
}

impl From<tokio::task::JoinError> for BoardError {
    fn from(e: tokio::task::JoinError) -> Self {
        BoardError::PersistenceFailure(format!("Task join error: {}", e))
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(e: serde_json::Error) -> Self {
        BoardError::PersistenceFailure(format!("Serialization error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_round_trip_preserves_kind_and_message() {
        let err = BoardError::NotFound("List x not found".to_string());
        let rebuilt = BoardError::from_parts(err.kind(), err.message());
        assert_eq!(rebuilt, err);
    }

    #[test]
    fn test_display_includes_kind() {
        let err = BoardError::MalformedInput("title must not be empty".to_string());
        assert_eq!(format!("{}", err), "Malformed input: title must not be empty");
    }
}
