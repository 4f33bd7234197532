mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::EngineError;

use std::io;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::config::StoreConfig;
use crate::limits::*;
use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the WAL. Takes the first pending append, drains whatever else is
/// already queued, and commits the batch with a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

/// All or nothing: on any failure the log is cut back to its last synced length.
fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event))
        .and_then(|()| wal.flush_sync());
    if result.is_err()
        && let Err(e) = wal.discard_uncommitted()
    {
        error!("failed to roll back WAL after a failed batch: {e}");
    }
    result
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Stable fingerprint of the store secret, recorded in the log header.
fn secret_fingerprint(secret: &str) -> u32 {
    crc32fast::hash(secret.as_bytes())
}

/// Reduce a principal to a safe file stem.
fn wal_file_name(principal: &str) -> Result<String, EngineError> {
    if principal.len() > MAX_PRINCIPAL_LEN {
        return Err(EngineError::LimitExceeded("store principal too long"));
    }
    let stem: String = principal
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if stem.is_empty() {
        return Err(EngineError::CredentialsRejected(principal.to_string()));
    }
    Ok(format!("{stem}.wal"))
}

/// The reservation store.
///
/// State lives in memory, one lock per room; every mutation is committed to
/// the WAL before it is applied. Holding a room's write lock across the
/// availability check and the write makes check-then-insert atomic per room.
/// Lock order: `commit_gate`, then a single room.
pub struct Engine {
    pub rooms: DashMap<RoomId, SharedRoomState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Reverse lookup: reservation id → room id.
    pub(super) reservation_rooms: DashMap<Ulid, RoomId>,
    pub(super) bounds: RoomBounds,
    /// Mutations hold this shared; compaction holds it exclusively.
    pub(super) commit_gate: RwLock<()>,
    principal: String,
    secret_fingerprint: u32,
}

fn apply_to_room(rs: &mut RoomState, event: &Event, index: &DashMap<Ulid, RoomId>) {
    match event {
        Event::ReservationCreated { id, reservation } => {
            rs.insert(StoredReservation {
                id: *id,
                reservation: reservation.clone(),
            });
            index.insert(*id, reservation.room_id);
        }
        Event::ReservationRescheduled {
            id,
            start_date,
            end_date,
            ..
        } => {
            rs.reschedule(*id, *start_date, *end_date);
        }
        Event::ReservationCancelled { id, .. } => {
            rs.remove(*id);
            index.remove(id);
        }
        Event::StoreInitialized { .. } => {}
    }
}

impl Engine {
    /// Open (or initialise) the store described by `config`.
    ///
    /// The log lives at `<endpoint>/<principal>.wal`. A new log is stamped
    /// with the principal and secret fingerprint; an existing one must match.
    pub async fn open(config: &StoreConfig, bounds: RoomBounds) -> Result<Self, EngineError> {
        let file_name = wal_file_name(&config.principal)?;
        tokio::fs::create_dir_all(&config.endpoint).await.map_err(wal_err)?;
        let wal_path = config.endpoint.join(file_name);
        Self::open_at(&wal_path, &config.principal, &config.secret, bounds)
    }

    fn open_at(wal_path: &Path, principal: &str, secret: &str, bounds: RoomBounds) -> Result<Self, EngineError> {
        let replay = Wal::replay(wal_path).map_err(wal_err)?;
        let mut wal = Wal::open(wal_path).map_err(wal_err)?;
        if replay.discarded_tail {
            // Rewrite without the bad tail so new appends stay reachable on replay.
            warn!("discarded unreadable tail of {}", wal_path.display());
            Wal::write_compact_file(wal_path, &replay.events).map_err(wal_err)?;
            wal.swap_compact_file().map_err(wal_err)?;
        }
        let fingerprint = secret_fingerprint(secret);

        let mut events = replay.events.into_iter();
        match events.next() {
            Some(Event::StoreInitialized {
                principal: stored_principal,
                secret_fingerprint,
            }) => {
                if stored_principal != principal || secret_fingerprint != fingerprint {
                    return Err(EngineError::CredentialsRejected(principal.to_string()));
                }
            }
            Some(_) => return Err(EngineError::WalError("log does not start with a store header".into())),
            None => {
                wal.append(&Event::StoreInitialized {
                    principal: principal.to_string(),
                    secret_fingerprint: fingerprint,
                })
                .map_err(wal_err)?;
            }
        }

        let (wal_tx, wal_rx) = mpsc::channel(WAL_CHANNEL_CAPACITY);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            rooms: DashMap::new(),
            wal_tx,
            reservation_rooms: DashMap::new(),
            bounds,
            commit_gate: RwLock::new(()),
            principal: principal.to_string(),
            secret_fingerprint: fingerprint,
        };

        // Sole owner of every room lock during replay, so try_write never contends.
        let mut replayed = 0usize;
        for event in events {
            let Some(room_id) = event.room_id() else {
                continue;
            };
            let room = engine.room_entry(room_id);
            let mut guard = room.try_write().map_err(|_| EngineError::WalError("replay lock contended".into()))?;
            apply_to_room(&mut guard, &event, &engine.reservation_rooms);
            replayed += 1;
        }
        metrics::gauge!(crate::observability::RESERVATIONS_STORED).set(engine.reservation_rooms.len() as f64);
        info!(
            "opened store {} ({replayed} events, {} reservations)",
            wal_path.display(),
            engine.reservation_rooms.len()
        );

        Ok(engine)
    }

    pub fn bounds(&self) -> RoomBounds {
        self.bounds
    }

    /// Write one event through the group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(wal_err)
    }

    pub fn get_room(&self, room_id: RoomId) -> Option<SharedRoomState> {
        self.rooms.get(&room_id).map(|e| e.value().clone())
    }

    /// Room state, created empty on first use.
    pub(super) fn room_entry(&self, room_id: RoomId) -> SharedRoomState {
        self.rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(RwLock::new(RoomState::new(room_id))))
            .value()
            .clone()
    }

    pub(super) async fn room_write(&self, room_id: RoomId) -> OwnedRwLockWriteGuard<RoomState> {
        self.room_entry(room_id).write_owned().await
    }

    /// WAL-append, then apply to the locked room.
    pub(super) async fn persist_and_apply(&self, rs: &mut RoomState, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_room(rs, event, &self.reservation_rooms);
        metrics::gauge!(crate::observability::RESERVATIONS_STORED).set(self.reservation_rooms.len() as f64);
        Ok(())
    }

    /// Lookup reservation → room and take that room's write lock.
    pub(super) async fn resolve_write(
        &self,
        id: Ulid,
    ) -> Result<OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .reservation_rooms
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(id))?;
        Ok(self.room_write(room_id).await)
    }

    pub(super) fn header_event(&self) -> Event {
        Event::StoreInitialized {
            principal: self.principal.clone(),
            secret_fingerprint: self.secret_fingerprint,
        }
    }
}

fn wal_err(e: io::Error) -> EngineError {
    EngineError::WalError(e.to_string())
}
