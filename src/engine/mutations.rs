use chrono::NaiveDate;
use tracing::{debug, info};
use ulid::Ulid;

use crate::model::*;

use super::conflict::{check_no_conflict, validate_limits, validate_range, validate_room};
use super::{Engine, EngineError, SharedRoomState, WalCommand};

impl Engine {
    /// Admit a new reservation and return its generated id.
    ///
    /// Checks run in a fixed order and the first failure is reported:
    /// conflict, then start after end, then room out of bounds.
    pub async fn create(&self, reservation: Reservation) -> Result<Ulid, EngineError> {
        let _commit = self.commit_gate.read().await;
        let range = reservation.range();
        let room = match self.get_room(reservation.room_id) {
            Some(room) => room,
            None => {
                // An absent room holds nothing to conflict with. Only a valid
                // request may bring it into existence.
                validate_range(&range)?;
                validate_room(reservation.room_id, self.bounds)?;
                self.room_entry(reservation.room_id)
            }
        };
        let mut guard = room.write_owned().await;

        check_no_conflict(&guard, &range)?;
        validate_range(&range)?;
        validate_room(reservation.room_id, self.bounds)?;
        validate_limits(&guard)?;

        let id = Ulid::new();
        let room_id = reservation.room_id;
        let event = Event::ReservationCreated { id, reservation };
        self.persist_and_apply(&mut guard, &event).await?;
        info!("reservation {id} created in room {room_id}");
        Ok(id)
    }

    /// Move the reservation equal to `reservation` onto new dates.
    ///
    /// The new range is checked against every stored record of the room,
    /// the one being moved included. A same-day range passes validation but
    /// is never written, and an original that matches nothing is a no-op.
    pub async fn update(
        &self,
        reservation: &Reservation,
        new_start_date: NaiveDate,
        new_end_date: NaiveDate,
    ) -> Result<RescheduleOutcome, EngineError> {
        let _commit = self.commit_gate.read().await;
        let new_range = DateRange::new(new_start_date, new_end_date);
        let Some(room) = self.get_room(reservation.room_id) else {
            validate_range(&new_range)?;
            if new_start_date != new_end_date {
                debug!("update names unknown room {}", reservation.room_id);
                return Ok(RescheduleOutcome::NotFound);
            }
            return Ok(RescheduleOutcome::ZeroLengthIgnored);
        };
        let mut guard = room.write_owned().await;

        check_no_conflict(&guard, &new_range)?;
        validate_range(&new_range)?;
        if new_start_date == new_end_date {
            debug!("ignoring same-day update in room {}", reservation.room_id);
            return Ok(RescheduleOutcome::ZeroLengthIgnored);
        }

        let Some(id) = guard.find_exact(reservation).map(|r| r.id) else {
            debug!("no reservation in room {} matches update", reservation.room_id);
            return Ok(RescheduleOutcome::NotFound);
        };
        self.apply_reschedule(&mut guard, id, new_range).await
    }

    /// Same gates as [`Engine::update`], addressed by reservation id.
    pub async fn reschedule_by_id(
        &self,
        id: Ulid,
        new_start_date: NaiveDate,
        new_end_date: NaiveDate,
    ) -> Result<RescheduleOutcome, EngineError> {
        let _commit = self.commit_gate.read().await;
        let mut guard = self.resolve_write(id).await?;
        // Cancelled between index lookup and lock.
        if guard.get(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let new_range = DateRange::new(new_start_date, new_end_date);

        check_no_conflict(&guard, &new_range)?;
        validate_range(&new_range)?;
        if new_start_date == new_end_date {
            return Ok(RescheduleOutcome::ZeroLengthIgnored);
        }
        self.apply_reschedule(&mut guard, id, new_range).await
    }

    async fn apply_reschedule(
        &self,
        rs: &mut RoomState,
        id: Ulid,
        range: DateRange,
    ) -> Result<RescheduleOutcome, EngineError> {
        let event = Event::ReservationRescheduled {
            id,
            room_id: rs.room_id,
            start_date: range.start,
            end_date: range.end,
        };
        self.persist_and_apply(rs, &event).await?;
        info!("reservation {id} in room {} moved to {}..={}", rs.room_id, range.start, range.end);
        Ok(RescheduleOutcome::Rescheduled(id))
    }

    /// Remove one reservation equal to `reservation`. `None` when nothing matched.
    pub async fn cancel(&self, reservation: &Reservation) -> Result<Option<Ulid>, EngineError> {
        let _commit = self.commit_gate.read().await;
        // Rooms that never held anything have nothing to cancel.
        let Some(room) = self.get_room(reservation.room_id) else {
            return Ok(None);
        };
        let mut guard = room.write_owned().await;
        let Some(id) = guard.find_exact(reservation).map(|r| r.id) else {
            debug!("no reservation in room {} matches cancel", reservation.room_id);
            return Ok(None);
        };
        self.apply_cancel(&mut guard, id).await?;
        Ok(Some(id))
    }

    pub async fn cancel_by_id(&self, id: Ulid) -> Result<Reservation, EngineError> {
        let _commit = self.commit_gate.read().await;
        let mut guard = self.resolve_write(id).await?;
        let reservation = guard
            .get(id)
            .map(|r| r.reservation.clone())
            .ok_or(EngineError::NotFound(id))?;
        self.apply_cancel(&mut guard, id).await?;
        Ok(reservation)
    }

    async fn apply_cancel(&self, rs: &mut RoomState, id: Ulid) -> Result<(), EngineError> {
        let event = Event::ReservationCancelled { id, room_id: rs.room_id };
        self.persist_and_apply(rs, &event).await?;
        info!("reservation {id} in room {} cancelled", rs.room_id);
        Ok(())
    }

    /// Rewrite the WAL with just the header and one creation per live reservation.
    ///
    /// Waits for in-flight mutations and blocks new ones until the swap is done.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _exclusive = self.commit_gate.write().await;

        let rooms: Vec<SharedRoomState> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut events = vec![self.header_event()];
        for room in rooms {
            let guard = room.read().await;
            events.extend(guard.reservations.iter().map(|r| Event::ReservationCreated {
                id: r.id,
                reservation: r.reservation.clone(),
            }));
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
