use ulid::Ulid;

use crate::model::Span;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// Malformed or nonexistent wall-clock input (e.g. a DST gap time).
    InvalidTimeInput(String),
    /// The requested slot lost a race or went stale; the caller must
    /// re-fetch availability before retrying.
    SlotNoLongerAvailable(Span),
    /// Monthly appointment quota for the effective plan is exhausted.
    PlanLimitExceeded(u32),
    /// The acting member holds no write privilege under the current plan.
    ReadOnlyRestriction(Ulid),
    /// Per-professional lock acquisition exceeded its bound; retryable.
    BookingTimeout(Ulid),
    /// Schedules of one professional may not overlap on the same weekday.
    ScheduleOverlap(Ulid),
    /// Illegal appointment status transition (only booked appointments can
    /// be cancelled or completed).
    InvalidStatus(Ulid),
    LimitExceeded(&'static str),
    /// Storage infrastructure failure; safe to retry.
    Unavailable(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::InvalidTimeInput(msg) => write!(f, "invalid time input: {msg}"),
            EngineError::SlotNoLongerAvailable(span) => write!(
                f,
                "slot [{}, {}) is no longer available",
                span.start, span.end
            ),
            EngineError::PlanLimitExceeded(cap) => {
                write!(f, "plan limit exceeded: {cap} appointments this month")
            }
            EngineError::ReadOnlyRestriction(id) => {
                write!(f, "member {id} is read-only under the current plan")
            }
            EngineError::BookingTimeout(id) => {
                write!(f, "timed out waiting for professional {id}; retry")
            }
            EngineError::ScheduleOverlap(id) => {
                write!(f, "overlaps existing schedule {id}")
            }
            EngineError::InvalidStatus(id) => {
                write!(f, "appointment {id} is not in a bookable state for this change")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Unavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
