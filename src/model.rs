use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::{self, ClockTime};
use crate::error::BookingError;

/// Local wall-clock instant. No timezone handling.
pub type Timestamp = NaiveDateTime;

/// Account identity as handed out by the account collaborator.
pub type OwnerId = String;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Span {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `[start, start + minutes)`. Fails when the end is past the last representable instant.
    pub fn starting_at(start: Timestamp, minutes: i64) -> Result<Self, BookingError> {
        let end = Duration::try_minutes(minutes)
            .and_then(|d| start.checked_add_signed(d))
            .ok_or_else(|| BookingError::validation(format!("{minutes} minutes after {start} is out of range")))?;
        Ok(Self::new(start, end))
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        clock::intervals_overlap(self.start, self.end, other.start, other.end)
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Groomer {
    pub id: Ulid,
    pub name: String,
    pub address: String,
    pub description: String,
    pub location: GeoPoint,
    pub photo_url: String,
    pub opening_hour: ClockTime,
    pub closing_hour: ClockTime,
}

impl Groomer {
    /// Operating window on the given calendar day.
    pub fn hours_on(&self, date: NaiveDate) -> (Timestamp, Timestamp) {
        (
            clock::combine(date, self.opening_hour),
            clock::combine(date, self.closing_hour),
        )
    }
}

/// Catalog entry. Price is held in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: u64,
}

pub fn total_duration(services: &[Service]) -> i64 {
    services.iter().map(|s| s.duration_minutes as i64).sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Ulid,
    pub owner_id: OwnerId,
    pub name: String,
    pub breed: String,
    pub notes: Option<String>,
    pub photo_url: String,
}

/// Account role. Admins run a groomer business and manage the catalog;
/// everyone else books for their own pets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// Profile stored under the account collaborator's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: OwnerId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    /// Only `Confirmed -> Cancelled` moves; everything else is either a no-op or forbidden.
    pub fn can_become(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Confirmed, _) | (ReservationStatus::Cancelled, ReservationStatus::Cancelled)
        )
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationStatus::Confirmed => write!(f, "confirmed"),
            ReservationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub groomer_id: Ulid,
    pub pet_id: Ulid,
    pub owner_id: OwnerId,
    pub services: Vec<Service>,
    pub span: Span,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn is_confirmed(&self) -> bool {
        self.status == ReservationStatus::Confirmed
    }

    /// Key-value document shape for external document stores.
    pub fn to_document(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id.to_string(),
            "groomerID": self.groomer_id.to_string(),
            "petID": self.pet_id.to_string(),
            "ownerID": self.owner_id,
            "services": self.services.iter().map(|s| serde_json::json!({
                "id": s.id.to_string(),
                "name": s.name,
                "duration": s.duration_minutes,
                "priceCents": s.price_cents,
            })).collect::<Vec<_>>(),
            "date": self.span.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "endDate": self.span.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            "status": self.status.to_string(),
        })
    }
}

/// Flat event types, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UserSaved { user: User },
    GroomerRegistered { groomer: Groomer },
    ServiceAdded { service: Service },
    PetRegistered { pet: Pet },
    ReservationConfirmed { reservation: Reservation },
    ReservationCancelled { id: Ulid, groomer_id: Ulid },
}

impl Event {
    /// Groomer whose dependent views must re-query after this event.
    pub fn groomer_id(&self) -> Option<Ulid> {
        match self {
            Event::GroomerRegistered { groomer } => Some(groomer.id),
            Event::ReservationConfirmed { reservation } => Some(reservation.groomer_id),
            Event::ReservationCancelled { groomer_id, .. } => Some(*groomer_id),
            Event::UserSaved { .. } | Event::ServiceAdded { .. } | Event::PetRegistered { .. } => None,
        }
    }
}

// ── Input types ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewGroomer {
    pub name: String,
    pub address: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub photo_url: String,
    pub opening_hour: String,
    pub closing_hour: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewService {
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPet {
    pub name: String,
    pub breed: String,
    pub notes: Option<String>,
    pub photo_url: String,
}

/// A client's request to book. `pet_id` and the chosen interval may be
/// missing when the form was incomplete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub groomer_id: Ulid,
    pub pet_id: Option<Ulid>,
    pub owner_id: OwnerId,
    pub services: Vec<Service>,
    pub start: Option<Timestamp>,
    pub end: Option<Timestamp>,
}

/// Outcome of a status update: the stored reservation and whether anything changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub reservation: Reservation,
    pub changed: bool,
}
