use chrono::{Datelike, NaiveDate};

use crate::model::*;
use crate::tz;

use super::EngineError;

// ── Slot Generation ───────────────────────────────────────────────
//
// Pure functions over immutable interval lists. The pipeline for one
// professional/date/service:
//
//   schedule windows  (weekday + service filter, wall → absolute)
//   − breaks          (coalesced)
//   − appointments    (non-cancelled, coalesced with breaks)
//   → free intervals  → fixed-size candidate slots

/// Expand the schedules matching `date`'s weekday and `service` into
/// absolute windows, sorted by start. A schedule bound falling in a DST gap
/// is an error, never a silent shift.
pub fn windows_for_date(
    state: &ProfessionalState,
    date: NaiveDate,
    service: &Service,
) -> Result<Vec<Span>, EngineError> {
    let weekday = date.weekday();
    let mut windows = Vec::new();
    for sched in &state.schedules {
        if sched.weekday != weekday || !sched.serves(&service.id) {
            continue;
        }
        let start = tz::to_absolute(date, sched.start, state.timezone)?;
        let end = tz::to_absolute(date, sched.end, state.timezone)?;
        if start < end {
            windows.push(Span::new(start, end));
        }
    }
    windows.sort_by_key(|s| s.start);
    Ok(windows)
}

/// Candidate slots for a professional/date/service, ordered and
/// deduplicated. Deterministic for a given snapshot of state.
pub fn candidate_slots(
    state: &ProfessionalState,
    date: NaiveDate,
    service: &Service,
) -> Result<Vec<Span>, EngineError> {
    let windows = windows_for_date(state, date, service)?;
    let Some(&first) = windows.first() else {
        return Ok(Vec::new());
    };
    let last = windows[windows.len() - 1];
    let range = Span::new(first.start, last.end);

    let occupied = merge_overlapping(&state.occupancy(&range));
    let free = subtract_intervals(&windows, &occupied);

    let mut slots = emit_slots(&free, service.duration_ms(), service.step_ms());
    slots.dedup();
    Ok(slots)
}

/// Merge sorted overlapping/adjacent intervals into disjoint intervals.
pub fn merge_overlapping(sorted: &[Span]) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    for &span in sorted {
        if let Some(last) = merged.last_mut()
            && span.start <= last.end {
                last.end = last.end.max(span.end);
                continue;
            }
        merged.push(span);
    }
    merged
}

/// Interval difference: `base − to_remove`. Both inputs sorted by start;
/// `to_remove` must be disjoint (coalesce first). Zero-length remainders
/// are never emitted.
pub fn subtract_intervals(base: &[Span], to_remove: &[Span]) -> Vec<Span> {
    let mut result = Vec::new();
    let mut ri = 0;

    for &b in base {
        let mut current_start = b.start;
        let current_end = b.end;

        while ri < to_remove.len() && to_remove[ri].end <= current_start {
            ri += 1;
        }

        let mut j = ri;
        while j < to_remove.len() && to_remove[j].start < current_end {
            let r = &to_remove[j];
            if r.start > current_start {
                result.push(Span::new(current_start, r.start));
            }
            current_start = current_start.max(r.end);
            j += 1;
        }

        if current_start < current_end {
            result.push(Span::new(current_start, current_end));
        }
    }

    result
}

/// Walk free intervals in order, emitting `duration`-sized slots every
/// `step` from each interval's start. A slot is emitted only when it fits
/// entirely inside the interval.
pub fn emit_slots(free: &[Span], duration: Ms, step: Ms) -> Vec<Span> {
    debug_assert!(duration > 0 && step > 0);
    let mut slots = Vec::new();
    for interval in free {
        let mut t = interval.start;
        while t + duration <= interval.end {
            slots.push(Span::new(t, t + duration));
            t += step;
        }
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use chrono_tz::America::Toronto;
    use ulid::Ulid;

    const H: Ms = 3_600_000;
    const M: Ms = 60_000;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, mo: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, mo, day).unwrap()
    }

    fn svc(duration_min: u32, step_min: Option<u32>) -> Service {
        Service { id: Ulid::new(), name: None, duration_min, step_min }
    }

    fn state_with_schedules(schedules: Vec<Schedule>) -> ProfessionalState {
        let mut rs = ProfessionalState::new(Ulid::new(), None, Toronto, HourFormat::H24);
        rs.schedules = schedules;
        rs
    }

    fn sched(weekday: Weekday, start: NaiveTime, end: NaiveTime) -> Schedule {
        Schedule { id: Ulid::new(), weekday, start, end, service_ids: None }
    }

    // ── subtract_intervals ────────────────────────────────

    #[test]
    fn subtract_no_overlap() {
        let base = vec![Span::new(100, 200), Span::new(300, 400)];
        let remove = vec![Span::new(200, 300)];
        assert_eq!(subtract_intervals(&base, &remove), base);
    }

    #[test]
    fn subtract_full_overlap() {
        let base = vec![Span::new(100, 200)];
        let remove = vec![Span::new(50, 250)];
        assert!(subtract_intervals(&base, &remove).is_empty());
    }

    #[test]
    fn subtract_partial_edges() {
        let base = vec![Span::new(100, 200)];
        assert_eq!(
            subtract_intervals(&base, &[Span::new(50, 150)]),
            vec![Span::new(150, 200)]
        );
        assert_eq!(
            subtract_intervals(&base, &[Span::new(150, 250)]),
            vec![Span::new(100, 150)]
        );
    }

    #[test]
    fn subtract_middle_punch() {
        let base = vec![Span::new(100, 300)];
        let remove = vec![Span::new(150, 200)];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![Span::new(100, 150), Span::new(200, 300)]
        );
    }

    #[test]
    fn subtract_multiple_punches() {
        let base = vec![Span::new(0, 1000)];
        let remove = vec![Span::new(100, 200), Span::new(400, 500), Span::new(800, 900)];
        assert_eq!(
            subtract_intervals(&base, &remove),
            vec![
                Span::new(0, 100),
                Span::new(200, 400),
                Span::new(500, 800),
                Span::new(900, 1000),
            ]
        );
    }

    #[test]
    fn subtract_exact_cover_leaves_nothing() {
        let base = vec![Span::new(100, 200)];
        let remove = vec![Span::new(100, 200)];
        assert!(subtract_intervals(&base, &remove).is_empty());
    }

    // ── merge_overlapping ────────────────────────────────

    #[test]
    fn merge_overlapping_basic() {
        let spans = vec![Span::new(100, 300), Span::new(200, 400), Span::new(500, 600)];
        assert_eq!(
            merge_overlapping(&spans),
            vec![Span::new(100, 400), Span::new(500, 600)]
        );
    }

    #[test]
    fn merge_overlapping_adjacent() {
        let spans = vec![Span::new(100, 200), Span::new(200, 300)];
        assert_eq!(merge_overlapping(&spans), vec![Span::new(100, 300)]);
    }

    #[test]
    fn merge_contained() {
        let spans = vec![Span::new(100, 500), Span::new(200, 300)];
        assert_eq!(merge_overlapping(&spans), vec![Span::new(100, 500)]);
    }

    // ── emit_slots ───────────────────────────────────────

    #[test]
    fn emit_back_to_back() {
        let free = vec![Span::new(0, 2 * H)];
        let slots = emit_slots(&free, 30 * M, 30 * M);
        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0], Span::new(0, 30 * M));
        assert_eq!(slots[3], Span::new(90 * M, 120 * M));
    }

    #[test]
    fn emit_skips_short_interval() {
        let free = vec![Span::new(0, 20 * M)];
        assert!(emit_slots(&free, 30 * M, 30 * M).is_empty());
    }

    #[test]
    fn emit_partial_tail_dropped() {
        // 70 minutes of freedom holds two 30-minute slots, not three.
        let free = vec![Span::new(0, 70 * M)];
        assert_eq!(emit_slots(&free, 30 * M, 30 * M).len(), 2);
    }

    #[test]
    fn emit_overlapping_step() {
        // 45-minute slots offered every 15 minutes.
        let free = vec![Span::new(0, 75 * M)];
        let slots = emit_slots(&free, 45 * M, 15 * M);
        assert_eq!(
            slots,
            vec![
                Span::new(0, 45 * M),
                Span::new(15 * M, 60 * M),
                Span::new(30 * M, 75 * M),
            ]
        );
    }

    #[test]
    fn emit_restarts_at_each_interval() {
        let free = vec![Span::new(0, 30 * M), Span::new(45 * M, 75 * M)];
        let slots = emit_slots(&free, 30 * M, 30 * M);
        assert_eq!(slots, vec![Span::new(0, 30 * M), Span::new(45 * M, 75 * M)]);
    }

    // ── windows_for_date ─────────────────────────────────

    #[test]
    fn windows_match_weekday_only() {
        // 2026-03-02 is a Monday.
        let rs = state_with_schedules(vec![
            sched(Weekday::Mon, t(9, 0), t(12, 0)),
            sched(Weekday::Tue, t(9, 0), t(12, 0)),
        ]);
        let service = svc(30, None);
        let windows = windows_for_date(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].duration_ms(), 3 * H);
    }

    #[test]
    fn windows_sorted_split_shift() {
        let rs = state_with_schedules(vec![
            sched(Weekday::Mon, t(14, 0), t(17, 0)),
            sched(Weekday::Mon, t(9, 0), t(12, 0)),
        ]);
        let service = svc(30, None);
        let windows = windows_for_date(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(windows.len(), 2);
        assert!(windows[0].end <= windows[1].start);
    }

    #[test]
    fn windows_respect_service_filter() {
        let service = svc(30, None);
        let other = svc(60, None);
        let mut filtered = sched(Weekday::Mon, t(9, 0), t(12, 0));
        filtered.service_ids = Some(vec![service.id]);
        let rs = state_with_schedules(vec![filtered]);
        assert_eq!(windows_for_date(&rs, d(2026, 3, 2), &service).unwrap().len(), 1);
        assert!(windows_for_date(&rs, d(2026, 3, 2), &other).unwrap().is_empty());
    }

    #[test]
    fn window_in_dst_gap_is_rejected() {
        // 2026-03-08 is the spring-forward Sunday in America/Toronto.
        let rs = state_with_schedules(vec![sched(Weekday::Sun, t(2, 0), t(2, 45))]);
        let service = svc(30, None);
        let err = windows_for_date(&rs, d(2026, 3, 8), &service).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTimeInput(_)));
    }

    // ── candidate_slots ──────────────────────────────────

    #[test]
    fn candidates_subtract_occupancy() {
        let service = svc(30, None);
        let mut rs = state_with_schedules(vec![sched(Weekday::Mon, t(9, 0), t(11, 0))]);
        let nine = tz::to_absolute(d(2026, 3, 2), t(9, 0), Toronto).unwrap();
        rs.insert_appointment(Appointment {
            id: Ulid::new(),
            service_id: service.id,
            patient_id: Ulid::new(),
            span: Span::new(nine + 30 * M, nine + 60 * M),
            status: AppointmentStatus::Booked,
        });

        let slots = candidate_slots(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(
            slots,
            vec![
                Span::new(nine, nine + 30 * M),
                Span::new(nine + 60 * M, nine + 90 * M),
                Span::new(nine + 90 * M, nine + 120 * M),
            ]
        );
    }

    #[test]
    fn candidates_empty_without_schedule() {
        let rs = state_with_schedules(vec![]);
        let service = svc(30, None);
        assert!(candidate_slots(&rs, d(2026, 3, 2), &service).unwrap().is_empty());
    }

    #[test]
    fn cancelled_appointment_does_not_occupy() {
        let service = svc(60, None);
        let mut rs = state_with_schedules(vec![sched(Weekday::Mon, t(9, 0), t(10, 0))]);
        let nine = tz::to_absolute(d(2026, 3, 2), t(9, 0), Toronto).unwrap();
        rs.insert_appointment(Appointment {
            id: Ulid::new(),
            service_id: service.id,
            patient_id: Ulid::new(),
            span: Span::new(nine, nine + H),
            status: AppointmentStatus::Cancelled,
        });
        let slots = candidate_slots(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(slots, vec![Span::new(nine, nine + H)]);
    }

    #[test]
    fn overlapping_breaks_coalesce_before_subtraction() {
        let service = svc(30, None);
        let mut rs = state_with_schedules(vec![sched(Weekday::Mon, t(9, 0), t(12, 0))]);
        let nine = tz::to_absolute(d(2026, 3, 2), t(9, 0), Toronto).unwrap();
        // Two overlapping breaks covering 09:30–10:30 jointly.
        rs.insert_break(Break {
            id: Ulid::new(),
            span: Span::new(nine + 30 * M, nine + 70 * M),
        });
        rs.insert_break(Break {
            id: Ulid::new(),
            span: Span::new(nine + 60 * M, nine + 90 * M),
        });

        let slots = candidate_slots(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(
            slots,
            vec![
                Span::new(nine, nine + 30 * M),
                Span::new(nine + 90 * M, nine + 120 * M),
                Span::new(nine + 120 * M, nine + 150 * M),
                Span::new(nine + 150 * M, nine + 180 * M),
            ]
        );
    }

    #[test]
    fn generation_is_deterministic() {
        let service = svc(30, None);
        let mut rs = state_with_schedules(vec![
            sched(Weekday::Mon, t(9, 0), t(12, 0)),
            sched(Weekday::Mon, t(14, 0), t(16, 0)),
        ]);
        let nine = tz::to_absolute(d(2026, 3, 2), t(9, 0), Toronto).unwrap();
        rs.insert_break(Break {
            id: Ulid::new(),
            span: Span::new(nine + H, nine + 2 * H),
        });

        let a = candidate_slots(&rs, d(2026, 3, 2), &service).unwrap();
        let b = candidate_slots(&rs, d(2026, 3, 2), &service).unwrap();
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].start < w[1].start));
    }
}
