use ulid::Ulid;

use crate::clock::ClockTime;
use crate::model::{OwnerId, Span};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Malformed "HH:mm" string.
    Format(String),
    /// Opening hour is not strictly before closing hour.
    InvalidSchedule {
        opening: ClockTime,
        closing: ClockTime,
    },
    /// A required selection is missing or inconsistent.
    Validation(String),
    /// Chosen interval is not inside the groomer's operating window.
    OutOfHours {
        requested: Span,
        opening: ClockTime,
        closing: ClockTime,
    },
    /// Overlaps the confirmed reservation with this id.
    SlotConflict(Ulid),
    NotFound(Ulid),
    /// No profile stored for this account id.
    UserNotFound(OwnerId),
    /// The signed-in account lacks the role the operation needs.
    Forbidden(&'static str),
    LimitExceeded(&'static str),
    /// Transport/persistence failure from the store collaborator.
    Store(String),
}

impl BookingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        BookingError::Validation(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Format(_) => "format",
            BookingError::InvalidSchedule { .. } => "invalid_schedule",
            BookingError::Validation(_) => "validation",
            BookingError::OutOfHours { .. } => "out_of_hours",
            BookingError::SlotConflict(_) => "slot_conflict",
            BookingError::NotFound(_) | BookingError::UserNotFound(_) => "not_found",
            BookingError::Forbidden(_) => "forbidden",
            BookingError::LimitExceeded(_) => "limit_exceeded",
            BookingError::Store(_) => "store",
        }
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Format(s) => write!(f, "invalid time format: {s:?} (expected HH:mm)"),
            BookingError::InvalidSchedule { opening, closing } => {
                write!(f, "opening hour {opening} must be before closing hour {closing}")
            }
            BookingError::Validation(msg) => write!(f, "validation failed: {msg}"),
            BookingError::OutOfHours {
                requested,
                opening,
                closing,
            } => write!(
                f,
                "reservation {} - {} outside operating hours ({opening}-{closing})",
                requested.start.format("%H:%M"),
                requested.end.format("%H:%M"),
            ),
            BookingError::SlotConflict(id) => {
                write!(f, "time slot overlaps with reservation: {id}")
            }
            BookingError::NotFound(id) => write!(f, "not found: {id}"),
            BookingError::UserNotFound(id) => write!(f, "no profile for user: {id}"),
            BookingError::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<std::io::Error> for BookingError {
    fn from(e: std::io::Error) -> Self {
        BookingError::Store(e.to_string())
    }
}
