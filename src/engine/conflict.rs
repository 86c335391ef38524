use crate::limits::*;
use crate::model::*;
use crate::tz;

use super::slots::windows_for_date;
use super::EngineError;

pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.end <= span.start {
        return Err(EngineError::InvalidTimeInput(format!(
            "span end {} not after start {}",
            span.end, span.start
        )));
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// Commit-time re-validation, run under the professional's write lock: the
/// requested span must lie fully inside a schedule window serving the
/// service on its local date and intersect no break or non-cancelled
/// appointment. Anything else means the displayed slot went stale.
pub(crate) fn check_slot_free(
    state: &ProfessionalState,
    service: &Service,
    span: &Span,
) -> Result<(), EngineError> {
    let (date, _) = tz::to_local(span.start, state.timezone)?;
    let windows = windows_for_date(state, date, service)?;
    if !windows.iter().any(|w| w.contains_span(span)) {
        return Err(EngineError::SlotNoLongerAvailable(*span));
    }
    if !state.occupancy(span).is_empty() {
        return Err(EngineError::SlotNoLongerAvailable(*span));
    }
    Ok(())
}
