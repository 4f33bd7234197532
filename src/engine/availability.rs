use chrono::NaiveDate;

use crate::model::*;

use super::Engine;

/// First stored reservation in `rs` that blocks `candidate`, in start order.
pub(crate) fn first_conflict<'a>(rs: &'a RoomState, candidate: &'a DateRange) -> Option<&'a StoredReservation> {
    rs.conflicting(candidate).next()
}

impl Engine {
    /// Whether `room_id` has no reservation colliding with `[start_date, end_date]`.
    ///
    /// Read-only. Neither the room bound nor the range ordering is checked
    /// here; a room with no reservations is always available.
    pub async fn is_available(&self, room_id: RoomId, start_date: NaiveDate, end_date: NaiveDate) -> bool {
        let Some(room) = self.get_room(room_id) else {
            return true;
        };
        let guard = room.read().await;
        first_conflict(&guard, &DateRange::new(start_date, end_date)).is_none()
    }
}
