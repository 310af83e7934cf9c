use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use tokio::sync::broadcast;
use tracing::debug;
use ulid::Ulid;

use crate::availability::AvailableSlot;
use crate::clock;
use crate::error::BookingError;
use crate::model::*;
use crate::scheduler::Scheduler;
use crate::store::DocumentStore;

/// The request key a slot list was computed for.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotQuery {
    pub groomer_id: Ulid,
    pub date: NaiveDate,
    pub services: Vec<Service>,
}

/// What a booking screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionView {
    pub query: Option<SlotQuery>,
    pub slots: Vec<AvailableSlot>,
    pub error: Option<BookingError>,
    pub loading: bool,
}

impl SessionView {
    pub fn slot_labels(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.label()).collect()
    }
}

/// One client's booking flow.
///
/// Slot refreshes are last-write-wins: each one takes a generation number and
/// its result is dropped if a newer refresh started while it was in flight.
pub struct BookingSession<S: DocumentStore + ?Sized> {
    scheduler: Scheduler<S>,
    generation: AtomicU64,
    view: Mutex<SessionView>,
}

impl<S: DocumentStore + ?Sized> BookingSession<S> {
    pub fn new(scheduler: Scheduler<S>) -> Self {
        Self {
            scheduler,
            generation: AtomicU64::new(0),
            view: Mutex::new(SessionView::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionView> {
        self.view.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self) -> SessionView {
        self.lock().clone()
    }

    /// Change groomer, date or services and recompute the offered slots.
    pub async fn select(
        &self,
        groomer_id: Ulid,
        date: NaiveDate,
        services: Vec<Service>,
    ) -> bool {
        self.lock().query = Some(SlotQuery {
            groomer_id,
            date,
            services,
        });
        self.refresh_slots().await
    }

    /// Recompute slots for the current query. Returns false if the result
    /// was discarded because a newer refresh superseded it.
    pub async fn refresh_slots(&self) -> bool {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = {
            let mut view = self.lock();
            view.loading = true;
            view.query.clone()
        };

        let result = match &query {
            Some(q) => {
                self.scheduler
                    .available_slots(q.groomer_id, q.date, &q.services)
                    .await
            }
            None => Ok(Vec::new()),
        };

        let mut view = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("discarding superseded slot refresh (generation {generation})");
            return false;
        }
        view.loading = false;
        match result {
            Ok(slots) => {
                view.slots = slots;
                view.error = None;
            }
            Err(e) => {
                view.slots.clear();
                view.error = Some(e);
            }
        }
        true
    }

    /// Book the offered slot `label` ("HH:mm - HH:mm") for `pet_id`.
    ///
    /// On success the slots are recomputed. On failure the offered slots stay
    /// as they were and the error is recorded so another slot can be picked.
    pub async fn book(&self, pet_id: Option<Ulid>, label: &str) -> Result<Reservation, BookingError> {
        match self.try_book(pet_id, label).await {
            Ok(reservation) => {
                self.refresh_slots().await;
                Ok(reservation)
            }
            Err(e) => {
                self.lock().error = Some(e.clone());
                Err(e)
            }
        }
    }

    async fn try_book(&self, pet_id: Option<Ulid>, label: &str) -> Result<Reservation, BookingError> {
        let query = self
            .lock()
            .query
            .clone()
            .ok_or_else(|| BookingError::validation("no groomer selected"))?;
        let span = clock::parse_slot_label(query.date, label)?;
        self.scheduler
            .reserve(
                query.groomer_id,
                pet_id,
                query.services,
                Some(span.start),
                Some(span.end),
            )
            .await
    }

    pub async fn cancel(&self, reservation_id: Ulid) -> Result<StatusChange, BookingError> {
        match self.scheduler.cancel_reservation(reservation_id).await {
            Ok(change) => {
                self.refresh_slots().await;
                Ok(change)
            }
            Err(e) => {
                self.lock().error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Re-query whenever an event for the selected groomer arrives.
    /// Runs until the feed closes.
    pub async fn follow(&self, mut events: broadcast::Receiver<Event>) {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let selected = self.lock().query.as_ref().map(|q| q.groomer_id);
                    if event.groomer_id().is_some() && event.groomer_id() == selected {
                        self.refresh_slots().await;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("session feed lagged by {skipped} events, refreshing");
                    self.refresh_slots().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
