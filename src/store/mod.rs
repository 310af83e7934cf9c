mod account;
mod mutations;
mod queries;
mod state;

pub use account::{AccountService, SessionAccount};
pub use state::GroomerState;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::warn;
use ulid::Ulid;

use crate::error::BookingError;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedGroomerState = Arc<RwLock<GroomerState>>;

/// Read predicate for [`DocumentStore::run_atomic`]: sees the confirmed
/// reservations inside the window and rejects the write by returning `Err`.
pub type AtomicCheck = dyn Fn(&[Reservation]) -> Result<(), BookingError> + Send + Sync;

/// Document-store collaborator consumed by the scheduler.
///
/// Reads are eventually consistent and may be cached by callers.
/// `run_atomic` is the only operation that must serialize against
/// concurrent writers for the same groomer.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get_user(&self, id: &str) -> Result<User, BookingError>;
    /// Create or replace the profile stored under `user.id`.
    async fn put_user(&self, user: User) -> Result<(), BookingError>;

    async fn get_groomer(&self, id: Ulid) -> Result<Groomer, BookingError>;
    async fn list_groomers(&self) -> Result<Vec<Groomer>, BookingError>;
    async fn insert_groomer(&self, groomer: Groomer) -> Result<(), BookingError>;

    async fn get_service(&self, id: Ulid) -> Result<Service, BookingError>;
    async fn list_services(&self) -> Result<Vec<Service>, BookingError>;
    async fn insert_service(&self, service: Service) -> Result<(), BookingError>;

    async fn get_pet(&self, id: Ulid) -> Result<Pet, BookingError>;
    async fn list_pets(&self, owner_id: &str) -> Result<Vec<Pet>, BookingError>;
    async fn insert_pet(&self, pet: Pet) -> Result<(), BookingError>;

    async fn get_reservation(&self, id: Ulid) -> Result<Reservation, BookingError>;
    async fn list_reservations_for_owner(
        &self,
        owner_id: &str,
        pet_id: Option<Ulid>,
    ) -> Result<Vec<Reservation>, BookingError>;

    /// Confirmed reservations of `groomer_id` intersecting `window`, ordered by start.
    async fn list_confirmed_reservations(
        &self,
        groomer_id: Ulid,
        window: Span,
    ) -> Result<Vec<Reservation>, BookingError>;

    /// Read the confirmed reservations in `window`, run `check`, and persist
    /// `write` only if it passes, all as one unit.
    async fn run_atomic(
        &self,
        groomer_id: Ulid,
        window: Span,
        check: &AtomicCheck,
        write: Reservation,
    ) -> Result<(), BookingError>;

    async fn update_reservation_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<StatusChange, BookingError>;
}

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

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first append, drains whatever else is queued, then
/// flushes once and answers every sender with the shared result.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        warn!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even on append error so partial bytes don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// In-process document store: one lock per groomer, a WAL behind every
/// mutation, and a notify hub for dependent views.
pub struct GroomingStore {
    pub(super) users: DashMap<OwnerId, User>,
    pub(super) groomers: DashMap<Ulid, SharedGroomerState>,
    pub(super) services: DashMap<Ulid, Service>,
    pub(super) pets: DashMap<Ulid, Pet>,
    /// Reverse lookup: reservation id → groomer id
    pub(super) reservation_to_groomer: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared; compaction holds it exclusively so no
    /// append lands in the log being replaced.
    pub(super) commit_gate: RwLock<()>,
    pub notify: Arc<NotifyHub>,
}

impl GroomingStore {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            users: DashMap::new(),
            groomers: DashMap::new(),
            services: DashMap::new(),
            pets: DashMap::new(),
            reservation_to_groomer: DashMap::new(),
            wal_tx,
            commit_gate: RwLock::new(()),
            notify,
        };

        // Sole owner of these Arcs during replay: try_write never contends.
        for event in events {
            store.apply_replayed(event);
        }
        metrics::gauge!(crate::observability::GROOMERS_ACTIVE).set(store.groomers.len() as f64);

        Ok(store)
    }

    fn apply_replayed(&self, event: Event) {
        match event {
            Event::UserSaved { user } => {
                self.users.insert(user.id.clone(), user);
            }
            Event::GroomerRegistered { groomer } => {
                self.groomers
                    .insert(groomer.id, Arc::new(RwLock::new(GroomerState::new(groomer))));
            }
            Event::ServiceAdded { service } => {
                self.services.insert(service.id, service);
            }
            Event::PetRegistered { pet } => {
                self.pets.insert(pet.id, pet);
            }
            other => {
                let Some(groomer_id) = other.groomer_id() else { return };
                let Some(rs) = self.get_state(&groomer_id) else {
                    warn!("replay: event for unknown groomer {groomer_id}, skipped");
                    return;
                };
                match rs.try_write() {
                    Ok(mut guard) => guard.apply_event(&other, &self.reservation_to_groomer),
                    Err(_) => warn!("replay: groomer {groomer_id} unexpectedly locked"),
                }
            }
        }
    }

    pub(super) fn get_state(&self, id: &Ulid) -> Option<SharedGroomerState> {
        self.groomers.get(id).map(|e| e.value().clone())
    }

    pub(super) fn all_states(&self) -> Vec<SharedGroomerState> {
        self.groomers.iter().map(|e| e.value().clone()).collect()
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), BookingError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| BookingError::Store("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Store("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Store(e.to_string()))
    }

    /// WAL-append + apply + notify for a groomer-scoped event. Caller holds the groomer lock.
    pub(super) async fn persist_and_apply(
        &self,
        groomer_id: Ulid,
        rs: &mut GroomerState,
        event: &Event,
    ) -> Result<(), BookingError> {
        self.wal_append(event).await?;
        rs.apply_event(event, &self.reservation_to_groomer);
        self.notify.send(groomer_id, event);
        Ok(())
    }

    /// Lookup reservation → groomer, acquire the groomer's write lock.
    pub(super) async fn resolve_reservation_write(
        &self,
        reservation_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<GroomerState>), BookingError> {
        let groomer_id = self
            .reservation_to_groomer
            .get(reservation_id)
            .map(|e| *e.value())
            .ok_or(BookingError::NotFound(*reservation_id))?;
        let rs = self
            .get_state(&groomer_id)
            .ok_or(BookingError::NotFound(groomer_id))?;
        Ok((groomer_id, rs.write_owned().await))
    }

    pub fn groomer_count(&self) -> usize {
        self.groomers.len()
    }

    pub fn reservation_count(&self) -> usize {
        self.reservation_to_groomer.len()
    }
}

#[async_trait]
impl DocumentStore for GroomingStore {
    async fn get_user(&self, id: &str) -> Result<User, BookingError> {
        GroomingStore::get_user(self, id).await
    }

    async fn put_user(&self, user: User) -> Result<(), BookingError> {
        GroomingStore::put_user(self, user).await
    }

    async fn get_groomer(&self, id: Ulid) -> Result<Groomer, BookingError> {
        GroomingStore::get_groomer(self, id).await
    }

    async fn list_groomers(&self) -> Result<Vec<Groomer>, BookingError> {
        GroomingStore::list_groomers(self).await
    }

    async fn insert_groomer(&self, groomer: Groomer) -> Result<(), BookingError> {
        GroomingStore::insert_groomer(self, groomer).await
    }

    async fn get_service(&self, id: Ulid) -> Result<Service, BookingError> {
        GroomingStore::get_service(self, id).await
    }

    async fn list_services(&self) -> Result<Vec<Service>, BookingError> {
        GroomingStore::list_services(self).await
    }

    async fn insert_service(&self, service: Service) -> Result<(), BookingError> {
        GroomingStore::insert_service(self, service).await
    }

    async fn get_pet(&self, id: Ulid) -> Result<Pet, BookingError> {
        GroomingStore::get_pet(self, id).await
    }

    async fn list_pets(&self, owner_id: &str) -> Result<Vec<Pet>, BookingError> {
        GroomingStore::list_pets(self, owner_id).await
    }

    async fn insert_pet(&self, pet: Pet) -> Result<(), BookingError> {
        GroomingStore::insert_pet(self, pet).await
    }

    async fn get_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        GroomingStore::get_reservation(self, id).await
    }

    async fn list_reservations_for_owner(
        &self,
        owner_id: &str,
        pet_id: Option<Ulid>,
    ) -> Result<Vec<Reservation>, BookingError> {
        GroomingStore::list_reservations_for_owner(self, owner_id, pet_id).await
    }

    async fn list_confirmed_reservations(
        &self,
        groomer_id: Ulid,
        window: Span,
    ) -> Result<Vec<Reservation>, BookingError> {
        GroomingStore::list_confirmed_reservations(self, groomer_id, window).await
    }

    async fn run_atomic(
        &self,
        groomer_id: Ulid,
        window: Span,
        check: &AtomicCheck,
        write: Reservation,
    ) -> Result<(), BookingError> {
        GroomingStore::run_atomic(self, groomer_id, window, check, write).await
    }

    async fn update_reservation_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<StatusChange, BookingError> {
        GroomingStore::update_reservation_status(self, id, status).await
    }
}
