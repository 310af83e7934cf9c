use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// A groomer and its reservation history, guarded as one unit.
#[derive(Debug, Clone)]
pub struct GroomerState {
    pub groomer: Groomer,
    /// Every reservation ever made (cancelled included), sorted by `span.start`.
    pub reservations: Vec<Reservation>,
}

impl GroomerState {
    pub fn new(groomer: Groomer) -> Self {
        Self {
            groomer,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .partition_point(|r| r.span.start <= reservation.span.start);
        self.reservations.insert(pos, reservation);
    }

    pub fn find(&self, id: &Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == *id)
    }

    fn find_mut(&mut self, id: &Ulid) -> Option<&mut Reservation> {
        self.reservations.iter_mut().find(|r| r.id == *id)
    }

    /// Reservations whose span overlaps `query`, any status.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }

    pub fn confirmed_in(&self, query: &Span) -> Vec<Reservation> {
        self.overlapping(query)
            .filter(|r| r.is_confirmed())
            .cloned()
            .collect()
    }

    /// Apply a groomer-scoped event (caller holds the lock).
    pub fn apply_event(&mut self, event: &Event, index: &DashMap<Ulid, Ulid>) {
        match event {
            Event::ReservationConfirmed { reservation } => {
                index.insert(reservation.id, reservation.groomer_id);
                self.insert_reservation(reservation.clone());
            }
            Event::ReservationCancelled { id, .. } => {
                if let Some(r) = self.find_mut(id) {
                    r.status = ReservationStatus::Cancelled;
                }
            }
            Event::GroomerRegistered { groomer } => {
                self.groomer = groomer.clone();
            }
            // Catalog events live outside groomer state
            Event::UserSaved { .. } | Event::ServiceAdded { .. } | Event::PetRegistered { .. } => {}
        }
    }
}
