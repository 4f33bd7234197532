use crate::limits::*;
use crate::model::*;

use super::availability::first_conflict;
use super::EngineError;

pub(crate) fn check_no_conflict(rs: &RoomState, candidate: &DateRange) -> Result<(), EngineError> {
    match first_conflict(rs, candidate) {
        Some(existing) => Err(EngineError::Conflict(existing.id)),
        None => Ok(()),
    }
}

pub(crate) fn validate_range(range: &DateRange) -> Result<(), EngineError> {
    if !range.is_ordered() {
        return Err(EngineError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    Ok(())
}

pub(crate) fn validate_room(room_id: RoomId, bounds: RoomBounds) -> Result<(), EngineError> {
    if !bounds.contains(room_id) {
        return Err(EngineError::InvalidRoom { room_id, bounds });
    }
    Ok(())
}

pub(crate) fn validate_limits(rs: &RoomState) -> Result<(), EngineError> {
    if rs.reservations.len() >= MAX_RESERVATIONS_PER_ROOM {
        return Err(EngineError::LimitExceeded("too many reservations on room"));
    }
    Ok(())
}
