use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::clock;
use crate::error::BookingError;
use crate::model::*;

// ── Slot Generator ───────────────────────────────────────────────

/// Candidate start times between opening and closing, stepped by `total_minutes`.
///
/// Starts at `open` and stops once a start reaches `close`. The trailing
/// candidate's end may run past closing; generation does not trim it.
/// No services (`total_minutes <= 0`) means no slots.
pub fn generate_slots(
    groomer: &Groomer,
    date: NaiveDate,
    total_minutes: i64,
) -> Result<Vec<Timestamp>, BookingError> {
    if total_minutes <= 0 {
        return Ok(Vec::new());
    }
    let (open, close) = groomer.hours_on(date);
    if open >= close {
        return Err(BookingError::InvalidSchedule {
            opening: groomer.opening_hour,
            closing: groomer.closing_hour,
        });
    }

    let step = Duration::minutes(total_minutes);
    let mut starts = Vec::new();
    let mut t = open;
    while t < close {
        starts.push(t);
        match t.checked_add_signed(step) {
            Some(next) => t = next,
            None => break,
        }
    }
    Ok(starts)
}

// ── Availability Filter ──────────────────────────────────────────

/// What to do with a candidate whose end runs past closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OverrunPolicy {
    /// Keep it; the committer rejects it with `OutOfHours` if chosen.
    #[default]
    Offer,
    /// Drop it before it is offered.
    Drop,
}

/// A free slot ready for presentation and for the commit step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub span: Span,
}

impl AvailableSlot {
    pub fn label(&self) -> String {
        clock::format_slot_label(&self.span)
    }
}

/// Keep each candidate whose `[s, s + total)` overlaps none of `occupied`.
/// Output preserves candidate order.
pub fn filter_available(
    candidates: &[Timestamp],
    total_minutes: i64,
    occupied: &[Span],
    close: Timestamp,
    policy: OverrunPolicy,
) -> Vec<AvailableSlot> {
    if total_minutes <= 0 {
        return Vec::new();
    }
    candidates
        .iter()
        .filter_map(|&s| Span::starting_at(s, total_minutes).ok())
        .filter(|span| policy == OverrunPolicy::Offer || span.end <= close)
        .filter(|span| !occupied.iter().any(|o| span.overlaps(o)))
        .map(|span| AvailableSlot { span })
        .collect()
}

/// Occupied intervals contributed by confirmed reservations.
pub fn occupied_spans(reservations: &[Reservation]) -> Vec<Span> {
    let mut spans: Vec<Span> = reservations
        .iter()
        .filter(|r| r.is_confirmed())
        .map(|r| r.span)
        .collect();
    spans.sort_by_key(|s| s.start);
    spans
}

/// Generator + filter in one pass, for callers that already hold the inputs.
pub fn available_slots(
    groomer: &Groomer,
    date: NaiveDate,
    services: &[Service],
    reservations: &[Reservation],
    policy: OverrunPolicy,
) -> Result<Vec<AvailableSlot>, BookingError> {
    let total = total_duration(services);
    let candidates = generate_slots(groomer, date, total)?;
    let (_, close) = groomer.hours_on(date);
    Ok(filter_available(
        &candidates,
        total,
        &occupied_spans(reservations),
        close,
        policy,
    ))
}
