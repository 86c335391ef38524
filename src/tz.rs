//! Timezone normalization. Wall-clock date+time pairs exist only at this
//! boundary; everything past it compares unix-millisecond instants.
//!
//! Conversions go through the IANA zone database (`chrono-tz`), never fixed
//! offsets. A wall time inside a spring-forward gap is rejected with
//! `InvalidTimeInput`; an ambiguous fall-back time resolves to the earlier
//! of the two instants.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;

use crate::engine::EngineError;
use crate::model::{HourFormat, Ms, Span, When};

/// Wall clock → absolute instant in `zone`.
pub fn to_absolute(date: NaiveDate, time: NaiveTime, zone: Tz) -> Result<Ms, EngineError> {
    match zone.from_local_datetime(&date.and_time(time)) {
        LocalResult::Single(dt) => Ok(dt.timestamp_millis()),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.timestamp_millis()),
        LocalResult::None => Err(EngineError::InvalidTimeInput(format!(
            "{date} {time} does not exist in {zone}"
        ))),
    }
}

/// Absolute instant → wall clock in `zone`. Fails only for instants outside
/// the representable range, which span validation already excludes.
pub fn to_local(instant: Ms, zone: Tz) -> Result<(NaiveDate, NaiveTime), EngineError> {
    let utc = DateTime::from_timestamp_millis(instant)
        .ok_or_else(|| EngineError::InvalidTimeInput(format!("instant {instant} out of range")))?;
    let local = utc.with_timezone(&zone);
    Ok((local.date_naive(), local.time()))
}

/// Resolve a boundary time argument against the professional's zone.
pub fn when_to_instant(when: When, zone: Tz) -> Result<Ms, EngineError> {
    match when {
        When::Instant(ms) => Ok(ms),
        When::Wall(dt) => to_absolute(dt.date(), dt.time(), zone),
    }
}

/// Render an instant as local wall-clock text honoring the display format.
pub fn format_local(instant: Ms, zone: Tz, format: HourFormat) -> Result<String, EngineError> {
    let utc = DateTime::from_timestamp_millis(instant)
        .ok_or_else(|| EngineError::InvalidTimeInput(format!("instant {instant} out of range")))?;
    let local = utc.with_timezone(&zone);
    let rendered = match format {
        HourFormat::H24 => local.format("%Y-%m-%d %H:%M"),
        HourFormat::H12 => local.format("%Y-%m-%d %I:%M %p"),
    };
    Ok(rendered.to_string())
}

/// Absolute span of the calendar month (in `zone`) containing `instant`.
/// Used by the plan quota gate.
pub fn month_window(instant: Ms, zone: Tz) -> Result<Span, EngineError> {
    let (date, _) = to_local(instant, zone)?;
    let first = month_first_day(date.year(), date.month())?;
    let next = if date.month() == 12 {
        month_first_day(date.year() + 1, 1)?
    } else {
        month_first_day(date.year(), date.month() + 1)?
    };
    Ok(Span::new(
        month_start_instant(first, zone)?,
        month_start_instant(next, zone)?,
    ))
}

fn month_first_day(year: i32, month: u32) -> Result<NaiveDate, EngineError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::InvalidTimeInput(format!("bad month {year}-{month:02}")))
}

/// Local midnight of `date`, sliding forward in 15-minute steps when the
/// month boundary's midnight falls in a DST gap.
fn month_start_instant(date: NaiveDate, zone: Tz) -> Result<Ms, EngineError> {
    let mut time = NaiveTime::MIN;
    for _ in 0..8 {
        if let Ok(ms) = to_absolute(date, time, zone) {
            return Ok(ms);
        }
        time = time + Duration::minutes(15);
    }
    Err(EngineError::InvalidTimeInput(format!(
        "no representable start of day for {date} in {zone}"
    )))
}
