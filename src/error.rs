use std::time::Duration;

use sea_orm::DbErr;
use thiserror::Error;

/// Errors returned by [`DatabaseStore`](crate::DatabaseStore).
///
/// A session that does not exist is never an error: reads return an empty
/// payload and lookups return `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be reached or rejected a statement.
    #[error("session storage unavailable: {0}")]
    Storage(#[from] DbErr),

    /// The per-session lock was still held by another request when the
    /// configured wait ran out.
    #[error("timed out after {waited:?} waiting for the lock on session {id}")]
    LockTimeout { id: String, waited: Duration },

    /// The lock row was taken over as stale before the holder wrote. The
    /// write was not applied.
    #[error("lock on session {id} was taken over by another request")]
    LockLost { id: String },

    /// A stored payload could not be decoded for inspection.
    #[error("malformed session payload: {0}")]
    MalformedPayload(String),

    #[error("invalid session id {0:?}: must be 1 to 32 bytes")]
    InvalidSessionId(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether the failure came from the storage layer rather than from the
    /// lock protocol or the caller's input.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
