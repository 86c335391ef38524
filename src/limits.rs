//! Structural limits. Everything the engine refuses to grow past, plus the
//! plan-tier numbers the policy gate enforces.

use crate::model::Ms;

pub const MAX_PROFESSIONALS_PER_PRACTICE: usize = 10_000;
pub const MAX_MEMBERS_PER_PRACTICE: usize = 1_000;
pub const MAX_SERVICES_PER_PROFESSIONAL: usize = 200;
pub const MAX_SCHEDULES_PER_PROFESSIONAL: usize = 100;
/// Breaks + appointments kept in memory per professional.
pub const MAX_INTERVALS_PER_PROFESSIONAL: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;

/// Timestamps must fall in [2000-01-01, 2200-01-01) UTC.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
pub const MAX_VALID_TIMESTAMP_MS: Ms = 7_258_118_400_000;
/// A single break or appointment may not span more than 32 days.
pub const MAX_SPAN_DURATION_MS: Ms = 32 * 24 * 3_600_000;

pub const MIN_SERVICE_DURATION_MIN: u32 = 5;
pub const MAX_SERVICE_DURATION_MIN: u32 = 24 * 60;

/// Bound on waiting for a professional's write lock before a mutating call
/// gives up with `BookingTimeout` instead of queueing forever.
pub const BOOKING_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Free-tier booking quota per calendar month per professional.
pub const FREE_MONTHLY_APPOINTMENT_CAP: u32 = 100;
/// Free plan write allowance: first N members of each role keep write access.
pub const FREE_PLAN_PROFESSIONALS: usize = 1;
pub const FREE_PLAN_SECRETARIES: usize = 1;

pub const MAX_PRACTICES: usize = 1_000;
pub const MAX_PRACTICE_NAME_LEN: usize = 256;
