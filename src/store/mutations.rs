use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::error::BookingError;
use crate::limits::*;
use crate::model::*;

use super::{AtomicCheck, GroomerState, GroomingStore, WalCommand};

impl GroomingStore {
    /// Upsert: a second save under the same id replaces the profile.
    pub async fn put_user(&self, user: User) -> Result<(), BookingError> {
        let _gate = self.commit_gate.read().await;
        let event = Event::UserSaved { user: user.clone() };
        self.wal_append(&event).await?;
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    pub async fn insert_groomer(&self, groomer: Groomer) -> Result<(), BookingError> {
        if self.groomers.len() >= MAX_GROOMERS {
            return Err(BookingError::LimitExceeded("too many groomers"));
        }
        let _gate = self.commit_gate.read().await;
        if self.groomers.contains_key(&groomer.id) {
            return Err(BookingError::validation(format!(
                "groomer already exists: {}",
                groomer.id
            )));
        }

        let id = groomer.id;
        let event = Event::GroomerRegistered { groomer: groomer.clone() };
        self.wal_append(&event).await?;
        self.groomers
            .insert(id, Arc::new(RwLock::new(GroomerState::new(groomer))));
        metrics::gauge!(crate::observability::GROOMERS_ACTIVE).set(self.groomers.len() as f64);
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn insert_service(&self, service: Service) -> Result<(), BookingError> {
        let _gate = self.commit_gate.read().await;
        if self.services.contains_key(&service.id) {
            return Err(BookingError::validation(format!(
                "service already exists: {}",
                service.id
            )));
        }
        let event = Event::ServiceAdded { service: service.clone() };
        self.wal_append(&event).await?;
        self.services.insert(service.id, service);
        Ok(())
    }

    pub async fn insert_pet(&self, pet: Pet) -> Result<(), BookingError> {
        let _gate = self.commit_gate.read().await;
        if self.pets.contains_key(&pet.id) {
            return Err(BookingError::validation(format!("pet already exists: {}", pet.id)));
        }
        let event = Event::PetRegistered { pet: pet.clone() };
        self.wal_append(&event).await?;
        self.pets.insert(pet.id, pet);
        Ok(())
    }

    /// Check-and-insert under the groomer's write lock. Two writers for the
    /// same groomer serialize here; the second one sees the first's reservation.
    pub async fn run_atomic(
        &self,
        groomer_id: Ulid,
        window: Span,
        check: &AtomicCheck,
        write: Reservation,
    ) -> Result<(), BookingError> {
        if write.groomer_id != groomer_id {
            return Err(BookingError::validation(
                "reservation belongs to a different groomer",
            ));
        }
        let rs = self
            .get_state(&groomer_id)
            .ok_or(BookingError::NotFound(groomer_id))?;
        let _gate = self.commit_gate.read().await;
        let mut guard = rs.write().await;

        let existing = guard.confirmed_in(&window);
        check(&existing)?;

        if existing.len() >= MAX_RESERVATIONS_PER_GROOMER_DAY {
            return Err(BookingError::LimitExceeded("too many reservations on groomer"));
        }
        if self.reservation_to_groomer.contains_key(&write.id) {
            return Err(BookingError::validation(format!(
                "reservation already exists: {}",
                write.id
            )));
        }

        let event = Event::ReservationConfirmed { reservation: write };
        self.persist_and_apply(groomer_id, &mut guard, &event).await
    }

    pub async fn update_reservation_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<StatusChange, BookingError> {
        let _gate = self.commit_gate.read().await;
        let (groomer_id, mut guard) = self.resolve_reservation_write(&id).await?;
        let current = guard
            .find(&id)
            .cloned()
            .ok_or(BookingError::NotFound(id))?;

        if !current.status.can_become(status) {
            return Err(BookingError::validation(format!(
                "reservation {id} is {} and cannot become {status}",
                current.status
            )));
        }
        if current.status == status {
            return Ok(StatusChange {
                reservation: current,
                changed: false,
            });
        }

        let event = Event::ReservationCancelled { id, groomer_id };
        self.persist_and_apply(groomer_id, &mut guard, &event).await?;
        let reservation = guard
            .find(&id)
            .cloned()
            .ok_or(BookingError::NotFound(id))?;
        Ok(StatusChange {
            reservation,
            changed: true,
        })
    }

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let _gate = self.commit_gate.write().await;
        let mut events = Vec::new();

        for entry in self.users.iter() {
            events.push(Event::UserSaved {
                user: entry.value().clone(),
            });
        }
        for entry in self.services.iter() {
            events.push(Event::ServiceAdded {
                service: entry.value().clone(),
            });
        }
        for entry in self.pets.iter() {
            events.push(Event::PetRegistered {
                pet: entry.value().clone(),
            });
        }

        for rs in self.all_states() {
            let guard = rs.read().await;
            events.push(Event::GroomerRegistered {
                groomer: guard.groomer.clone(),
            });
            for r in &guard.reservations {
                let mut confirmed = r.clone();
                confirmed.status = ReservationStatus::Confirmed;
                events.push(Event::ReservationConfirmed {
                    reservation: confirmed,
                });
                if r.status == ReservationStatus::Cancelled {
                    events.push(Event::ReservationCancelled {
                        id: r.id,
                        groomer_id: r.groomer_id,
                    });
                }
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::Store("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Store("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Store(e.to_string()))?;
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
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
