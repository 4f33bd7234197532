use ulid::Ulid;

use crate::model::*;

use super::Engine;

impl Engine {
    /// Every reservation held for `room_id`, in start-date order.
    pub async fn query_by_room(&self, room_id: RoomId) -> Vec<Reservation> {
        let Some(room) = self.get_room(room_id) else {
            return Vec::new();
        };
        let guard = room.read().await;
        guard.reservations.iter().map(|r| r.reservation.clone()).collect()
    }

    /// Every reservation under guest `name`, ordered by room then start date.
    pub async fn query_by_name(&self, name: &str) -> Vec<Reservation> {
        let mut room_ids: Vec<RoomId> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort_unstable();

        let mut found = Vec::new();
        for room_id in room_ids {
            let Some(room) = self.get_room(room_id) else {
                continue;
            };
            let guard = room.read().await;
            found.extend(
                guard
                    .reservations
                    .iter()
                    .filter(|r| r.reservation.name == name)
                    .map(|r| r.reservation.clone()),
            );
        }
        found
    }

    pub async fn get(&self, id: Ulid) -> Option<Reservation> {
        let room_id = self.reservation_rooms.get(&id).map(|e| *e.value())?;
        let room = self.get_room(room_id)?;
        let guard = room.read().await;
        guard.get(id).map(|r| r.reservation.clone())
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_rooms.len()
    }
}
