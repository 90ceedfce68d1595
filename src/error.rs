use thiserror::Error;

/// Failures of a single chat action.
///
/// Only `InvalidInput` is ever reported back to the requester, and only for
/// token export/import. Everything else is dropped by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("no such room: {0}")]
    NoSuchRoom(String),

    #[error("no such message: {0}")]
    NoSuchMessage(uuid::Uuid),

    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("not the owner of this message")]
    NotAuthorized,
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}
