use chrono::{NaiveDateTime, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only absolute time type.
pub type Ms = i64;

/// Half-open interval `[start, end)` on the absolute timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Intersection with `other`. Caller guarantees the spans overlap.
    pub fn clamp_to(&self, other: &Span) -> Span {
        Span::new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// Wall-clock display preference stored per professional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HourFormat {
    H24,
    H12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanTier {
    Free,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Lapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    Professional,
    Secretary,
}

/// Practice member, kept in join order. Join order decides who keeps write
/// access when the effective plan covers only part of the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: Ulid,
    pub role: MemberRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable service. `step_min` is the slot-emission granularity and
/// defaults to the duration (back-to-back slots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: Ulid,
    pub name: Option<String>,
    pub duration_min: u32,
    pub step_min: Option<u32>,
}

impl Service {
    pub fn duration_ms(&self) -> Ms {
        Ms::from(self.duration_min) * 60_000
    }

    pub fn step_ms(&self) -> Ms {
        Ms::from(self.step_min.unwrap_or(self.duration_min)) * 60_000
    }
}

/// Recurring weekly availability window in the professional's wall clock.
/// `end` is exclusive and must be after `start` on the same day; overnight
/// shifts are expressed as two schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// None serves every service; Some restricts the window to these.
    pub service_ids: Option<Vec<Ulid>>,
}

impl Schedule {
    pub fn serves(&self, service_id: &Ulid) -> bool {
        match &self.service_ids {
            None => true,
            Some(ids) => ids.contains(service_id),
        }
    }

    /// Wall-clock overlap on the same weekday.
    pub fn overlaps_wall(&self, other: &Schedule) -> bool {
        self.weekday == other.weekday && self.start < other.end && other.start < self.end
    }
}

/// One-off block of absolute time removing availability. May span days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Break {
    pub id: Ulid,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Ulid,
    pub service_id: Ulid,
    pub patient_id: Ulid,
    pub span: Span,
    pub status: AppointmentStatus,
}

impl Appointment {
    /// Non-cancelled appointments occupy time and count toward plan quotas.
    pub fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// A time argument at the engine boundary: already absolute, or wall clock
/// awaiting normalization in the professional's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Instant(Ms),
    Wall(NaiveDateTime),
}

/// Partial update for a professional. None leaves the field untouched;
/// `name: Some(None)` clears the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfessionalPatch {
    pub name: Option<Option<String>>,
    pub timezone: Option<Tz>,
    pub hour_format: Option<HourFormat>,
}

/// Partial update for a schedule; same None-leaves-untouched convention.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulePatch {
    pub weekday: Option<Weekday>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub service_ids: Option<Option<Vec<Ulid>>>,
}

/// In-memory state of one professional. Breaks and appointments stay sorted
/// by span start so overlap scans can binary-search past the query window.
#[derive(Debug, Clone)]
pub struct ProfessionalState {
    pub id: Ulid,
    pub name: Option<String>,
    pub timezone: Tz,
    pub hour_format: HourFormat,
    pub services: Vec<Service>,
    pub schedules: Vec<Schedule>,
    pub breaks: Vec<Break>,
    pub appointments: Vec<Appointment>,
}

impl ProfessionalState {
    pub fn new(id: Ulid, name: Option<String>, timezone: Tz, hour_format: HourFormat) -> Self {
        Self {
            id,
            name,
            timezone,
            hour_format,
            services: Vec::new(),
            schedules: Vec::new(),
            breaks: Vec::new(),
            appointments: Vec::new(),
        }
    }

    pub fn service(&self, id: &Ulid) -> Option<&Service> {
        self.services.iter().find(|s| s.id == *id)
    }

    pub fn schedule(&self, id: &Ulid) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == *id)
    }

    pub fn appointment(&self, id: &Ulid) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == *id)
    }

    pub fn appointment_mut(&mut self, id: &Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == *id)
    }

    /// Insert a break maintaining sort order by span start.
    pub fn insert_break(&mut self, brk: Break) {
        let pos = self
            .breaks
            .binary_search_by_key(&brk.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.breaks.insert(pos, brk);
    }

    pub fn remove_break(&mut self, id: Ulid) -> Option<Break> {
        let pos = self.breaks.iter().position(|b| b.id == id)?;
        Some(self.breaks.remove(pos))
    }

    /// Insert an appointment maintaining sort order by span start.
    pub fn insert_appointment(&mut self, appt: Appointment) {
        let pos = self
            .appointments
            .binary_search_by_key(&appt.span.start, |a| a.span.start)
            .unwrap_or_else(|e| e);
        self.appointments.insert(pos, appt);
    }

    /// Breaks + appointments currently held in memory.
    pub fn interval_count(&self) -> usize {
        self.breaks.len() + self.appointments.len()
    }

    /// Occupied spans (breaks and non-cancelled appointments) overlapping
    /// `query`, clamped to it and sorted by start. Not coalesced — callers
    /// merge before subtracting.
    pub fn occupancy(&self, query: &Span) -> Vec<Span> {
        let mut out = Vec::new();

        let right = self.breaks.partition_point(|b| b.span.start < query.end);
        for b in &self.breaks[..right] {
            if b.span.end > query.start {
                out.push(b.span.clamp_to(query));
            }
        }

        let right = self
            .appointments
            .partition_point(|a| a.span.start < query.end);
        for a in &self.appointments[..right] {
            if a.is_active() && a.span.end > query.start {
                out.push(a.span.clamp_to(query));
            }
        }

        out.sort_by_key(|s| s.start);
        out
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ProfessionalRegistered {
        id: Ulid,
        name: Option<String>,
        timezone: Tz,
        hour_format: HourFormat,
    },
    ProfessionalUpdated {
        id: Ulid,
        name: Option<String>,
        timezone: Tz,
        hour_format: HourFormat,
    },
    ProfessionalRemoved {
        id: Ulid,
    },
    ServiceAdded {
        id: Ulid,
        professional_id: Ulid,
        name: Option<String>,
        duration_min: u32,
        step_min: Option<u32>,
    },
    ServiceRemoved {
        id: Ulid,
        professional_id: Ulid,
    },
    ScheduleAdded {
        id: Ulid,
        professional_id: Ulid,
        weekday: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        service_ids: Option<Vec<Ulid>>,
    },
    ScheduleUpdated {
        id: Ulid,
        professional_id: Ulid,
        weekday: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        service_ids: Option<Vec<Ulid>>,
    },
    ScheduleRemoved {
        id: Ulid,
        professional_id: Ulid,
    },
    BreakAdded {
        id: Ulid,
        professional_id: Ulid,
        span: Span,
    },
    BreakRemoved {
        id: Ulid,
        professional_id: Ulid,
    },
    AppointmentBooked {
        id: Ulid,
        professional_id: Ulid,
        service_id: Ulid,
        patient_id: Ulid,
        span: Span,
    },
    AppointmentCancelled {
        id: Ulid,
        professional_id: Ulid,
    },
    AppointmentCompleted {
        id: Ulid,
        professional_id: Ulid,
    },
    MemberAdded {
        id: Ulid,
        role: MemberRole,
    },
    MemberRemoved {
        id: Ulid,
    },
    PlanChanged {
        plan: PlanTier,
        status: SubscriptionStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionalInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub timezone: Tz,
    pub hour_format: HourFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub id: Ulid,
    pub role: MemberRole,
    pub writable: bool,
}

/// A bookable candidate slot, with local wall-clock renderings for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub span: Span,
    pub start_local: String,
    pub end_local: String,
}
