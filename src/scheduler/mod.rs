mod catalog;

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::availability::{self, AvailableSlot, OverrunPolicy};
use crate::clock;
use crate::error::BookingError;
use crate::limits::*;
use crate::model::*;
use crate::observability;
use crate::store::{AccountService, DocumentStore};

/// Availability, commit and cancellation on top of a [`DocumentStore`].
///
/// Holds no booking state of its own; every check re-reads the store.
pub struct Scheduler<S: DocumentStore + ?Sized> {
    store: Arc<S>,
    accounts: Arc<dyn AccountService>,
    policy: OverrunPolicy,
}

impl<S: DocumentStore + ?Sized> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            accounts: self.accounts.clone(),
            policy: self.policy,
        }
    }
}

impl<S: DocumentStore + ?Sized> Scheduler<S> {
    pub fn new(store: Arc<S>, accounts: Arc<dyn AccountService>) -> Self {
        Self {
            store,
            accounts,
            policy: OverrunPolicy::default(),
        }
    }

    pub fn with_overrun_policy(mut self, policy: OverrunPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn current_user(&self) -> Option<OwnerId> {
        self.accounts.current_user_id()
    }

    fn require_user(&self) -> Result<OwnerId, BookingError> {
        self.current_user()
            .ok_or_else(|| BookingError::validation("no user logged in"))
    }

    /// The signed-in user's stored profile.
    pub async fn current_user_profile(&self) -> Result<User, BookingError> {
        let user_id = self.require_user()?;
        self.store.get_user(&user_id).await
    }

    async fn require_admin(&self) -> Result<User, BookingError> {
        match self.current_user_profile().await {
            Ok(user) if user.is_admin() => Ok(user),
            Ok(_) | Err(BookingError::UserNotFound(_)) => {
                Err(BookingError::Forbidden("admin role required"))
            }
            Err(e) => Err(e),
        }
    }

    // ── Availability ─────────────────────────────────────

    /// Free slots for `services` at `groomer_id` on `date`.
    ///
    /// Advisory only: the result may be stale by the time a slot is chosen,
    /// [`Scheduler::create_reservation`] re-checks against the store.
    pub async fn available_slots(
        &self,
        groomer_id: Ulid,
        date: NaiveDate,
        services: &[Service],
    ) -> Result<Vec<AvailableSlot>, BookingError> {
        metrics::counter!(observability::SLOT_QUERIES_TOTAL).increment(1);
        if total_duration(services) <= 0 {
            return Ok(Vec::new());
        }
        let groomer = self.store.get_groomer(groomer_id).await?;
        let reservations = self
            .store
            .list_confirmed_reservations(groomer_id, clock::day_span(date)?)
            .await?;
        availability::available_slots(&groomer, date, services, &reservations, self.policy)
    }

    // ── Commit ───────────────────────────────────────────

    /// Validate `request` and persist it as a confirmed reservation.
    ///
    /// The overlap check and the insert run inside one
    /// [`DocumentStore::run_atomic`] call, so of two callers racing for
    /// overlapping intervals at most one commits and the other gets
    /// `SlotConflict`.
    pub async fn create_reservation(
        &self,
        request: ReservationRequest,
    ) -> Result<Reservation, BookingError> {
        let start = Instant::now();
        let groomer_id = request.groomer_id;
        let result = self.commit(request).await;
        metrics::histogram!(observability::COMMIT_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(r) => {
                metrics::counter!(observability::RESERVATIONS_COMMITTED_TOTAL).increment(1);
                info!(
                    "reservation {} confirmed at groomer {groomer_id}: {}",
                    r.id,
                    clock::format_slot_label(&r.span)
                );
            }
            Err(e) => {
                metrics::counter!(observability::RESERVATION_CONFLICTS_TOTAL, "stage" => e.kind())
                    .increment(1);
                warn!("reservation at groomer {groomer_id} rejected: {e}");
            }
        }
        result
    }

    /// Book for the signed-in user.
    pub async fn reserve(
        &self,
        groomer_id: Ulid,
        pet_id: Option<Ulid>,
        services: Vec<Service>,
        start: Option<Timestamp>,
        end: Option<Timestamp>,
    ) -> Result<Reservation, BookingError> {
        let owner_id = self.require_user()?;
        self.create_reservation(ReservationRequest {
            groomer_id,
            pet_id,
            owner_id,
            services,
            start,
            end,
        })
        .await
    }

    async fn commit(&self, request: ReservationRequest) -> Result<Reservation, BookingError> {
        let (pet_id, span) = validate_request(&request)?;

        let pet = self.store.get_pet(pet_id).await?;
        if pet.owner_id != request.owner_id {
            return Err(BookingError::validation(format!(
                "pet {pet_id} does not belong to {}",
                request.owner_id
            )));
        }
        // Durations come from the catalog, never from the caller's copy.
        let mut services = Vec::with_capacity(request.services.len());
        for requested in &request.services {
            services.push(self.store.get_service(requested.id).await?);
        }
        check_duration(&span, &services)?;

        let groomer = self.store.get_groomer(request.groomer_id).await?;
        let (open, close) = groomer.hours_on(span.date());
        if open >= close {
            return Err(BookingError::InvalidSchedule {
                opening: groomer.opening_hour,
                closing: groomer.closing_hour,
            });
        }
        if !Span::new(open, close).contains_span(&span) {
            return Err(BookingError::OutOfHours {
                requested: span,
                opening: groomer.opening_hour,
                closing: groomer.closing_hour,
            });
        }

        let reservation = Reservation {
            id: Ulid::new(),
            groomer_id: groomer.id,
            pet_id,
            owner_id: request.owner_id,
            services,
            span,
            status: ReservationStatus::Confirmed,
        };

        let check = move |existing: &[Reservation]| -> Result<(), BookingError> {
            match existing
                .iter()
                .find(|r| r.is_confirmed() && r.span.overlaps(&span))
            {
                Some(taken) => Err(BookingError::SlotConflict(taken.id)),
                None => Ok(()),
            }
        };
        self.store
            .run_atomic(groomer.id, clock::day_span(span.date())?, &check, reservation.clone())
            .await?;
        Ok(reservation)
    }

    // ── Lifecycle ────────────────────────────────────────

    /// Move a reservation to cancelled. Cancelling twice is a no-op
    /// (`changed == false`); a cancelled reservation never comes back.
    pub async fn cancel_reservation(&self, id: Ulid) -> Result<StatusChange, BookingError> {
        self.store.get_reservation(id).await?;
        let change = self
            .store
            .update_reservation_status(id, ReservationStatus::Cancelled)
            .await?;
        if change.changed {
            metrics::counter!(observability::RESERVATIONS_CANCELLED_TOTAL).increment(1);
            info!(
                "reservation {id} cancelled at groomer {}",
                change.reservation.groomer_id
            );
        } else {
            debug!("reservation {id} already cancelled");
        }
        Ok(change)
    }

    pub async fn get_reservation(&self, id: Ulid) -> Result<Reservation, BookingError> {
        self.store.get_reservation(id).await
    }

    /// Confirmed reservations at `groomer_id` on `date`. Admins see every
    /// booking of the day; other users see only their own.
    pub async fn reservations_for_groomer(
        &self,
        groomer_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, BookingError> {
        let user = self.current_user_profile().await?;
        let mut reservations = self
            .store
            .list_confirmed_reservations(groomer_id, clock::day_span(date)?)
            .await?;
        if !user.is_admin() {
            reservations.retain(|r| r.owner_id == user.id);
        }
        debug!(
            "{} reservations at groomer {groomer_id} on {date} visible to {} ({})",
            reservations.len(),
            user.id,
            user.role
        );
        Ok(reservations)
    }
}

/// Shape checks that need no store access. Returns the pet and the minute-aligned span.
fn validate_request(request: &ReservationRequest) -> Result<(Ulid, Span), BookingError> {
    let pet_id = request
        .pet_id
        .ok_or_else(|| BookingError::validation("no pet selected"))?;
    if request.owner_id.trim().is_empty() {
        return Err(BookingError::validation("no user logged in"));
    }
    if request.services.is_empty() {
        return Err(BookingError::validation("no services selected"));
    }
    if request.services.len() > MAX_SERVICES_PER_RESERVATION {
        return Err(BookingError::LimitExceeded("too many services in one reservation"));
    }
    let (Some(start), Some(end)) = (request.start, request.end) else {
        return Err(BookingError::validation("no time slot selected"));
    };
    let (start, end) = (clock::to_minute(start), clock::to_minute(end));
    if end <= start {
        return Err(BookingError::validation("slot must end after it starts"));
    }
    Ok((pet_id, Span::new(start, end)))
}

/// `span` must last exactly as long as the services it books.
fn check_duration(span: &Span, services: &[Service]) -> Result<(), BookingError> {
    let total = total_duration(services);
    if total <= 0 {
        return Err(BookingError::validation("selected services have no duration"));
    }
    if total > MAX_RESERVATION_MINUTES {
        return Err(BookingError::LimitExceeded("reservation longer than a day"));
    }
    if span.duration_minutes() != total {
        return Err(BookingError::validation(format!(
            "slot {} lasts {} minutes but the services need {total}",
            clock::format_slot_label(span),
            span.duration_minutes()
        )));
    }
    Ok(())
}
