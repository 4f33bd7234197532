use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Room number. Rooms are not stored entities; a room exists if its id falls
/// inside the configured [`RoomBounds`].
pub type RoomId = i64;

/// Inclusive range of valid room ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomBounds {
    pub min: RoomId,
    pub max: RoomId,
}

impl RoomBounds {
    pub fn new(min: RoomId, max: RoomId) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, room_id: RoomId) -> bool {
        self.min <= room_id && room_id <= self.max
    }
}

impl Default for RoomBounds {
    fn default() -> Self {
        Self { min: 1, max: 10 }
    }
}

/// Inclusive calendar-date interval `[start, end]`.
///
/// Not required to be ordered: candidate ranges reach the availability check
/// before their ordering is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    /// Whether this candidate range collides with a stored range.
    ///
    /// A stored `[s, e]` blocks candidate `[S, E]` when the candidate start
    /// falls inside it, the candidate end falls inside it, or the candidate
    /// swallows it whole. Touching endpoints collide.
    pub fn conflicts_with(&self, stored: &DateRange) -> bool {
        let (s, e) = (stored.start, stored.end);
        let (cs, ce) = (self.start, self.end);
        (s <= cs && cs <= e) || (s <= ce && ce <= e) || (cs <= s && e <= ce)
    }

    /// Latest date a conflicting stored range may start on.
    pub(crate) fn search_limit(&self) -> NaiveDate {
        self.start.max(self.end)
    }
}

/// A reservation record as clients see it. Addressed by full value equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reservation {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: RoomId,
}

impl Reservation {
    pub fn new(name: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate, room_id: RoomId) -> Self {
        Self {
            name: name.into(),
            start_date,
            end_date,
            room_id,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}

/// A reservation plus the identifier generated when it was admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReservation {
    pub id: Ulid,
    pub reservation: Reservation,
}

impl StoredReservation {
    pub fn range(&self) -> DateRange {
        self.reservation.range()
    }
}

/// All reservations held for one room, sorted by `start_date`.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room_id: RoomId,
    pub reservations: Vec<StoredReservation>,
}

impl RoomState {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            reservations: Vec::new(),
        }
    }

    /// Insert keeping sort order. Equal start dates keep insertion order.
    pub fn insert(&mut self, stored: StoredReservation) {
        let start = stored.reservation.start_date;
        let pos = self
            .reservations
            .partition_point(|r| r.reservation.start_date <= start);
        self.reservations.insert(pos, stored);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<StoredReservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    pub fn get(&self, id: Ulid) -> Option<&StoredReservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// First stored record equal to `reservation` on all four fields.
    pub fn find_exact(&self, reservation: &Reservation) -> Option<&StoredReservation> {
        self.reservations
            .iter()
            .find(|r| &r.reservation == reservation)
    }

    /// Replace the dates of a stored record, re-sorting it into place.
    pub fn reschedule(&mut self, id: Ulid, start_date: NaiveDate, end_date: NaiveDate) -> bool {
        let Some(mut stored) = self.remove(id) else {
            return false;
        };
        stored.reservation.start_date = start_date;
        stored.reservation.end_date = end_date;
        self.insert(stored);
        true
    }

    /// Stored records that conflict with `candidate`.
    ///
    /// Every conflicting record starts no later than the later candidate
    /// endpoint, so the scan stops there.
    pub fn conflicting<'a>(&'a self, candidate: &'a DateRange) -> impl Iterator<Item = &'a StoredReservation> {
        let limit = candidate.search_limit();
        let right_bound = self
            .reservations
            .partition_point(|r| r.reservation.start_date <= limit);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| candidate.conflicts_with(&r.range()))
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StoreInitialized {
        principal: String,
        secret_fingerprint: u32,
    },
    ReservationCreated {
        id: Ulid,
        reservation: Reservation,
    },
    ReservationRescheduled {
        id: Ulid,
        room_id: RoomId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    ReservationCancelled {
        id: Ulid,
        room_id: RoomId,
    },
}

impl Event {
    pub fn room_id(&self) -> Option<RoomId> {
        match self {
            Event::ReservationCreated { reservation, .. } => Some(reservation.room_id),
            Event::ReservationRescheduled { room_id, .. } | Event::ReservationCancelled { room_id, .. } => {
                Some(*room_id)
            }
            Event::StoreInitialized { .. } => None,
        }
    }
}

/// Result of a reschedule request that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescheduleOutcome {
    Rescheduled(Ulid),
    /// No stored record matched the original fields.
    NotFound,
    /// `new_start_date == new_end_date`: accepted, never written.
    ZeroLengthIgnored,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn range(s: &str, e: &str) -> DateRange {
        DateRange::new(d(s), d(e))
    }

    fn stored(name: &str, s: &str, e: &str, room: RoomId) -> StoredReservation {
        StoredReservation {
            id: Ulid::new(),
            reservation: Reservation::new(name, d(s), d(e), room),
        }
    }

    #[test]
    fn overlap_cases() {
        let existing = range("2024-01-10", "2024-01-15");

        // disjoint before / after
        assert!(!range("2024-01-01", "2024-01-09").conflicts_with(&existing));
        assert!(!range("2024-01-16", "2024-01-20").conflicts_with(&existing));
        // touching at either end
        assert!(range("2024-01-05", "2024-01-10").conflicts_with(&existing));
        assert!(range("2024-01-15", "2024-01-20").conflicts_with(&existing));
        // inside, containing, identical
        assert!(range("2024-01-11", "2024-01-12").conflicts_with(&existing));
        assert!(range("2024-01-01", "2024-01-31").conflicts_with(&existing));
        assert!(range("2024-01-10", "2024-01-15").conflicts_with(&existing));
        // partial from either side
        assert!(range("2024-01-08", "2024-01-12").conflicts_with(&existing));
        assert!(range("2024-01-13", "2024-01-18").conflicts_with(&existing));
    }

    #[test]
    fn single_day_ranges() {
        let day = range("2024-03-01", "2024-03-01");
        assert!(day.conflicts_with(&day));
        assert!(!range("2024-03-02", "2024-03-02").conflicts_with(&day));
        assert!(range("2024-02-28", "2024-03-05").conflicts_with(&day));
    }

    #[test]
    fn reversed_candidate_uses_literal_clauses() {
        let existing = range("2024-01-10", "2024-01-15");
        // Neither endpoint inside and start after the stored start: no clause holds.
        assert!(!range("2024-01-20", "2024-01-05").conflicts_with(&existing));
        // Reversed but one endpoint inside.
        assert!(range("2024-01-12", "2024-01-01").conflicts_with(&existing));
        assert!(!range("2024-01-20", "2024-01-05").is_ordered());
    }

    #[test]
    fn room_bounds_default() {
        let b = RoomBounds::default();
        assert!(b.contains(1));
        assert!(b.contains(10));
        assert!(!b.contains(0));
        assert!(!b.contains(11));
        assert!(!b.contains(-3));
    }

    #[test]
    fn room_state_keeps_start_order() {
        let mut rs = RoomState::new(3);
        rs.insert(stored("c", "2024-05-01", "2024-05-03", 3));
        rs.insert(stored("a", "2024-01-01", "2024-01-03", 3));
        rs.insert(stored("b", "2024-03-01", "2024-03-03", 3));
        let names: Vec<_> = rs.reservations.iter().map(|r| r.reservation.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn equal_starts_keep_insertion_order() {
        let mut rs = RoomState::new(1);
        let first = stored("x", "2024-01-01", "2024-01-02", 1);
        let second = stored("x", "2024-01-01", "2024-01-02", 1);
        rs.insert(first.clone());
        rs.insert(second.clone());
        assert_eq!(rs.reservations[0].id, first.id);
        assert_eq!(rs.find_exact(&first.reservation).unwrap().id, first.id);
    }

    #[test]
    fn reschedule_resorts() {
        let mut rs = RoomState::new(2);
        let early = stored("early", "2024-01-01", "2024-01-02", 2);
        let late = stored("late", "2024-02-01", "2024-02-02", 2);
        rs.insert(early.clone());
        rs.insert(late.clone());

        assert!(rs.reschedule(early.id, d("2024-03-01"), d("2024-03-04")));
        assert_eq!(rs.reservations[0].id, late.id);
        assert_eq!(rs.reservations[1].reservation.start_date, d("2024-03-01"));
        assert!(!rs.reschedule(Ulid::new(), d("2024-03-01"), d("2024-03-04")));
    }

    #[test]
    fn conflicting_skips_later_records() {
        let mut rs = RoomState::new(4);
        rs.insert(stored("past", "2024-01-01", "2024-01-05", 4));
        rs.insert(stored("hit", "2024-01-08", "2024-01-12", 4));
        rs.insert(stored("future", "2024-02-01", "2024-02-05", 4));

        let candidate = range("2024-01-10", "2024-01-20");
        let hits: Vec<_> = rs.conflicting(&candidate).map(|r| r.reservation.name.as_str()).collect();
        assert_eq!(hits, ["hit"]);
    }

    #[test]
    fn conflicting_long_stay_spanning_candidate() {
        let mut rs = RoomState::new(4);
        rs.insert(stored("long", "2024-01-01", "2024-12-31", 4));
        let candidate = range("2024-06-01", "2024-06-02");
        assert_eq!(rs.conflicting(&candidate).count(), 1);
    }

    #[test]
    fn remove_unknown_returns_none() {
        let mut rs = RoomState::new(1);
        rs.insert(stored("a", "2024-01-01", "2024-01-02", 1));
        assert!(rs.remove(Ulid::new()).is_none());
        assert_eq!(rs.reservations.len(), 1);
    }

    #[test]
    fn record_json_shape() {
        let r = Reservation::new("alice", d("2024-01-10"), d("2024-01-15"), 3);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "alice",
                "start_date": "2024-01-10",
                "end_date": "2024-01-15",
                "room_id": 3
            })
        );
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::ReservationCreated {
            id: Ulid::new(),
            reservation: Reservation::new("bob", d("2024-02-01"), d("2024-02-03"), 7),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
        assert_eq!(decoded.room_id(), Some(7));
    }
}
