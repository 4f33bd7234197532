use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{RoomBounds, RoomId};

#[derive(Debug)]
pub enum EngineError {
    /// The candidate range collides with this stored reservation.
    Conflict(Ulid),
    InvalidRange {
        start: NaiveDate,
        end: NaiveDate,
    },
    InvalidRoom {
        room_id: RoomId,
        bounds: RoomBounds,
    },
    NotFound(Ulid),
    LimitExceeded(&'static str),
    CredentialsRejected(String),
    WalError(String),
}

impl EngineError {
    /// Errors caused by the request rather than the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::WalError(_) | EngineError::CredentialsRejected(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Conflict(id) => write!(f, "conflict with reservation: {id}"),
            EngineError::InvalidRange { start, end } => {
                write!(f, "invalid range: start {start} is after end {end}")
            }
            EngineError::InvalidRoom { room_id, bounds } => write!(
                f,
                "invalid room {room_id}: must be between {} and {}",
                bounds.min, bounds.max
            ),
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::CredentialsRejected(principal) => {
                write!(f, "store credentials rejected for principal {principal}")
            }
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
