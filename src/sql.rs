use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use chrono_tz::Tz;
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input. The virtual tables are the engine's
/// entire external contract.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertProfessional {
        id: Ulid,
        name: Option<String>,
        timezone: Tz,
        hour_format: HourFormat,
    },
    UpdateProfessional {
        id: Ulid,
        patch: ProfessionalPatch,
    },
    DeleteProfessional {
        id: Ulid,
    },
    InsertService {
        id: Ulid,
        professional_id: Ulid,
        name: Option<String>,
        duration_min: u32,
        step_min: Option<u32>,
    },
    DeleteService {
        id: Ulid,
    },
    InsertSchedule {
        id: Ulid,
        professional_id: Ulid,
        weekday: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        service_ids: Option<Vec<Ulid>>,
    },
    UpdateSchedule {
        id: Ulid,
        patch: SchedulePatch,
    },
    DeleteSchedule {
        id: Ulid,
    },
    InsertBreak {
        id: Ulid,
        professional_id: Ulid,
        start: When,
        end: When,
    },
    DeleteBreak {
        id: Ulid,
    },
    InsertAppointment {
        id: Ulid,
        professional_id: Ulid,
        service_id: Ulid,
        patient_id: Ulid,
        start: When,
    },
    UpdateAppointmentStatus {
        id: Ulid,
        status: AppointmentStatus,
    },
    InsertMember {
        id: Ulid,
        role: MemberRole,
    },
    DeleteMember {
        id: Ulid,
    },
    UpdatePractice {
        plan: Option<PlanTier>,
        status: Option<SubscriptionStatus>,
    },
    SelectProfessionals,
    SelectMembers,
    SelectPractice,
    SelectServices {
        professional_id: Ulid,
    },
    SelectSchedules {
        professional_id: Ulid,
    },
    SelectBreaks {
        professional_id: Ulid,
    },
    SelectAppointments {
        professional_id: Ulid,
    },
    SelectAvailability {
        professional_id: Ulid,
        date: NaiveDate,
        service_id: Ulid,
        viewer_tz: Option<Tz>,
    },
    Listen {
        channel: String,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.to_uppercase().starts_with("LISTEN ") {
        let channel = trimmed[7..].trim().trim_matches(';').to_string();
        return Ok(Command::Listen { channel });
    }

    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Update { table, assignments, selection, .. } => {
            parse_update(table, assignments, selection)
        }
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let values = extract_insert_values(insert)?;

    match table.as_str() {
        "professionals" => {
            if values.len() < 3 {
                return Err(SqlError::WrongArity("professionals", 3, values.len()));
            }
            let hour_format = if values.len() >= 4 {
                parse_hour_format(&values[3])?
            } else {
                HourFormat::H24
            };
            Ok(Command::InsertProfessional {
                id: parse_ulid(&values[0])?,
                name: parse_string_or_null(&values[1])?,
                timezone: parse_tz(&values[2])?,
                hour_format,
            })
        }
        "services" => {
            if values.len() < 4 {
                return Err(SqlError::WrongArity("services", 4, values.len()));
            }
            let step_min = if values.len() >= 5 {
                parse_u32_or_null(&values[4])?
            } else {
                None
            };
            Ok(Command::InsertService {
                id: parse_ulid(&values[0])?,
                professional_id: parse_ulid(&values[1])?,
                name: parse_string_or_null(&values[2])?,
                duration_min: parse_u32(&values[3])?,
                step_min,
            })
        }
        "schedules" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("schedules", 5, values.len()));
            }
            let service_ids = if values.len() >= 6 {
                parse_service_ids(&values[5])?
            } else {
                None
            };
            Ok(Command::InsertSchedule {
                id: parse_ulid(&values[0])?,
                professional_id: parse_ulid(&values[1])?,
                weekday: parse_weekday(&values[2])?,
                start: parse_naive_time(&values[3])?,
                end: parse_naive_time(&values[4])?,
                service_ids,
            })
        }
        "breaks" => {
            if values.len() < 4 {
                return Err(SqlError::WrongArity("breaks", 4, values.len()));
            }
            Ok(Command::InsertBreak {
                id: parse_ulid(&values[0])?,
                professional_id: parse_ulid(&values[1])?,
                start: parse_when(&values[2])?,
                end: parse_when(&values[3])?,
            })
        }
        "appointments" => {
            if values.len() < 5 {
                return Err(SqlError::WrongArity("appointments", 5, values.len()));
            }
            Ok(Command::InsertAppointment {
                id: parse_ulid(&values[0])?,
                professional_id: parse_ulid(&values[1])?,
                service_id: parse_ulid(&values[2])?,
                patient_id: parse_ulid(&values[3])?,
                start: parse_when(&values[4])?,
            })
        }
        "members" => {
            if values.len() < 2 {
                return Err(SqlError::WrongArity("members", 2, values.len()));
            }
            Ok(Command::InsertMember {
                id: parse_ulid(&values[0])?,
                role: parse_role(&values[1])?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let id = extract_where_id(&delete.selection)?;

    match table.as_str() {
        "professionals" => Ok(Command::DeleteProfessional { id }),
        "services" => Ok(Command::DeleteService { id }),
        "schedules" => Ok(Command::DeleteSchedule { id }),
        "breaks" => Ok(Command::DeleteBreak { id }),
        "members" => Ok(Command::DeleteMember { id }),
        // Appointment rows are never deleted; status transitions only.
        "appointments" => Err(SqlError::Unsupported(
            "appointments are cancelled via UPDATE, not deleted".into(),
        )),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
) -> Result<Command, SqlError> {
    let table = table_factor_name(&table.relation)?;

    match table.as_str() {
        "practice" => {
            let mut plan = None;
            let mut status = None;
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "plan" => plan = Some(parse_plan(&a.value)?),
                    "status" => status = Some(parse_subscription_status(&a.value)?),
                    col => return Err(SqlError::Parse(format!("unknown practice column: {col}"))),
                }
            }
            Ok(Command::UpdatePractice { plan, status })
        }
        "appointments" => {
            let id = extract_where_id(selection)?;
            let mut status = None;
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "status" => status = Some(parse_status(&a.value)?),
                    col => {
                        return Err(SqlError::Parse(format!("unknown appointments column: {col}")))
                    }
                }
            }
            let status = status.ok_or(SqlError::MissingFilter("status"))?;
            Ok(Command::UpdateAppointmentStatus { id, status })
        }
        "professionals" => {
            let id = extract_where_id(selection)?;
            let mut patch = ProfessionalPatch::default();
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "name" => patch.name = Some(parse_string_or_null(&a.value)?),
                    "timezone" => patch.timezone = Some(parse_tz(&a.value)?),
                    "hour_format" => patch.hour_format = Some(parse_hour_format(&a.value)?),
                    col => {
                        return Err(SqlError::Parse(format!(
                            "unknown professionals column: {col}"
                        )))
                    }
                }
            }
            Ok(Command::UpdateProfessional { id, patch })
        }
        "schedules" => {
            let id = extract_where_id(selection)?;
            let mut patch = SchedulePatch::default();
            for a in assignments {
                match assignment_column(a)?.as_str() {
                    "weekday" => patch.weekday = Some(parse_weekday(&a.value)?),
                    "start" => patch.start = Some(parse_naive_time(&a.value)?),
                    "end" => patch.end = Some(parse_naive_time(&a.value)?),
                    "service_ids" => patch.service_ids = Some(parse_service_ids(&a.value)?),
                    col => {
                        return Err(SqlError::Parse(format!("unknown schedules column: {col}")))
                    }
                }
            }
            Ok(Command::UpdateSchedule { id, patch })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Vec::new();
    if let Some(selection) = &select.selection {
        collect_eq_filters(selection, &mut filters);
    }
    let filter = |col: &str| filters.iter().find(|(c, _)| c == col).map(|(_, e)| *e);

    match table.as_str() {
        "professionals" => Ok(Command::SelectProfessionals),
        "members" => Ok(Command::SelectMembers),
        "practice" => Ok(Command::SelectPractice),
        "services" | "schedules" | "breaks" | "appointments" => {
            let professional_id = filter("professional_id")
                .ok_or(SqlError::MissingFilter("professional_id"))
                .and_then(parse_ulid)?;
            Ok(match table.as_str() {
                "services" => Command::SelectServices { professional_id },
                "schedules" => Command::SelectSchedules { professional_id },
                "breaks" => Command::SelectBreaks { professional_id },
                _ => Command::SelectAppointments { professional_id },
            })
        }
        "availability" => {
            let professional_id = filter("professional_id")
                .ok_or(SqlError::MissingFilter("professional_id"))
                .and_then(parse_ulid)?;
            let date = filter("date")
                .ok_or(SqlError::MissingFilter("date"))
                .and_then(parse_date)?;
            let service_id = filter("service_id")
                .ok_or(SqlError::MissingFilter("service_id"))
                .and_then(parse_ulid)?;
            let viewer_tz = match filter("viewer_tz") {
                Some(expr) => Some(parse_tz(expr)?),
                None => None,
            };
            Ok(Command::SelectAvailability { professional_id, date, service_id, viewer_tz })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten AND-chained `col = value` terms; anything else is ignored.
fn collect_eq_filters<'a>(expr: &'a Expr, out: &mut Vec<(String, &'a Expr)>) {
    match expr {
        Expr::BinaryOp { left, op: ast::BinaryOperator::And, right } => {
            collect_eq_filters(left, out);
            collect_eq_filters(right, out);
        }
        Expr::BinaryOp { left, op: ast::BinaryOperator::Eq, right } => {
            if let Some(col) = expr_column_name(left) {
                out.push((col, right));
            }
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        _ => {}
    }
}

// ── AST helpers ───────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    if let Some(first) = tables_with_joins.first() {
        table_factor_name(&first.relation)
    } else {
        Err(SqlError::Parse("DELETE without table".into()))
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn assignment_column(a: &ast::Assignment) -> Result<String, SqlError> {
    match &a.target {
        AssignmentTarget::ColumnName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))
        }
        _ => Err(SqlError::Parse("unsupported assignment target".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.len() != 1 {
                return Err(SqlError::Parse("expected exactly one VALUES row".into()));
            }
            Ok(values.rows[0].clone())
        }
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Option<Expr>) -> Result<Ulid, SqlError> {
    let sel = selection.as_ref().ok_or(SqlError::MissingFilter("id"))?;
    match sel {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

// ── Value parsers ─────────────────────────────────────────────

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(other) => Err(SqlError::Parse(format!("expected string, got {other:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_string(expr)?)),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad i64: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_u32_or_null(expr: &Expr) -> Result<Option<u32>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => Ok(Some(parse_u32(expr)?)),
    }
}

/// A break/appointment time: integer unix millis, or quoted wall-clock
/// text (`YYYY-MM-DD HH:MM[:SS]`) to be normalized in the professional's
/// zone by the engine.
fn parse_when(expr: &Expr) -> Result<When, SqlError> {
    match extract_value(expr) {
        Some(Value::Number(s, _)) => s
            .parse()
            .map(When::Instant)
            .map_err(|e| SqlError::Parse(format!("bad timestamp: {e}"))),
        Some(Value::SingleQuotedString(s)) => {
            if let Ok(ms) = s.parse::<i64>() {
                return Ok(When::Instant(ms));
            }
            parse_wall_datetime(s).map(When::Wall)
        }
        _ => Err(SqlError::Parse(format!("expected time value, got {expr:?}"))),
    }
}

fn parse_wall_datetime(s: &str) -> Result<NaiveDateTime, SqlError> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(SqlError::Parse(format!("bad wall-clock datetime: {s}")))
}

fn parse_naive_time(expr: &Expr) -> Result<NaiveTime, SqlError> {
    let s = parse_string(expr)?;
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(&s, fmt) {
            return Ok(t);
        }
    }
    Err(SqlError::Parse(format!("bad time of day: {s}")))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s}: {e}")))
}

fn parse_weekday(expr: &Expr) -> Result<Weekday, SqlError> {
    let s = parse_string(expr)?;
    s.parse::<Weekday>()
        .map_err(|_| SqlError::Parse(format!("bad weekday: {s}")))
}

fn parse_tz(expr: &Expr) -> Result<Tz, SqlError> {
    let s = parse_string(expr)?;
    s.parse::<Tz>()
        .map_err(|_| SqlError::Parse(format!("unknown timezone: {s}")))
}

fn parse_hour_format(expr: &Expr) -> Result<HourFormat, SqlError> {
    let s = parse_string(expr)?;
    match s.to_lowercase().as_str() {
        "h24" | "24" => Ok(HourFormat::H24),
        "h12" | "12" => Ok(HourFormat::H12),
        _ => Err(SqlError::Parse(format!("bad hour format: {s}"))),
    }
}

fn parse_role(expr: &Expr) -> Result<MemberRole, SqlError> {
    let s = parse_string(expr)?;
    match s.to_lowercase().as_str() {
        "professional" => Ok(MemberRole::Professional),
        "secretary" => Ok(MemberRole::Secretary),
        _ => Err(SqlError::Parse(format!("bad member role: {s}"))),
    }
}

fn parse_status(expr: &Expr) -> Result<AppointmentStatus, SqlError> {
    let s = parse_string(expr)?;
    match s.to_lowercase().as_str() {
        "cancelled" => Ok(AppointmentStatus::Cancelled),
        "completed" => Ok(AppointmentStatus::Completed),
        // Booked is only ever set by the booking transaction itself.
        _ => Err(SqlError::Parse(format!("bad status transition: {s}"))),
    }
}

fn parse_plan(expr: &Expr) -> Result<PlanTier, SqlError> {
    let s = parse_string(expr)?;
    match s.to_lowercase().as_str() {
        "free" => Ok(PlanTier::Free),
        "plus" => Ok(PlanTier::Plus),
        _ => Err(SqlError::Parse(format!("bad plan tier: {s}"))),
    }
}

fn parse_subscription_status(expr: &Expr) -> Result<SubscriptionStatus, SqlError> {
    let s = parse_string(expr)?;
    match s.to_lowercase().as_str() {
        "active" => Ok(SubscriptionStatus::Active),
        "lapsed" => Ok(SubscriptionStatus::Lapsed),
        _ => Err(SqlError::Parse(format!("bad subscription status: {s}"))),
    }
}

/// `service_ids` column: NULL (all services) or a quoted JSON array of
/// ULID strings, e.g. `'["01ARZ3…","01BX5…"]'`.
fn parse_service_ids(expr: &Expr) -> Result<Option<Vec<Ulid>>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) => {
            let raw: Vec<String> = serde_json::from_str(s)
                .map_err(|e| SqlError::Parse(format!("bad service_ids JSON: {e}")))?;
            let mut ids = Vec::with_capacity(raw.len());
            for r in raw {
                ids.push(
                    Ulid::from_string(&r)
                        .map_err(|e| SqlError::Parse(format!("bad ULID in service_ids: {e}")))?,
                );
            }
            Ok(Some(ids))
        }
        _ => Err(SqlError::Parse(format!(
            "expected JSON array or NULL, got {expr:?}"
        ))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const U1: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";
    const U2: &str = "01BX5ZZKBKACTAV9WEVGEMMVRZ";

    #[test]
    fn parse_insert_professional() {
        let sql = format!(
            "INSERT INTO professionals (id, name, timezone) VALUES ('{U1}', 'Dr. Osei', 'America/Toronto')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertProfessional { id, name, timezone, hour_format } => {
                assert_eq!(id.to_string(), U1);
                assert_eq!(name.as_deref(), Some("Dr. Osei"));
                assert_eq!(timezone, chrono_tz::America::Toronto);
                assert_eq!(hour_format, HourFormat::H24);
            }
            cmd => panic!("expected InsertProfessional, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_professional_with_hour_format() {
        let sql = format!(
            "INSERT INTO professionals (id, name, timezone, hour_format) VALUES ('{U1}', NULL, 'UTC', 'h12')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertProfessional { name, hour_format, .. } => {
                assert_eq!(name, None);
                assert_eq!(hour_format, HourFormat::H12);
            }
            cmd => panic!("expected InsertProfessional, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_professional_bad_zone() {
        let sql = format!(
            "INSERT INTO professionals (id, name, timezone) VALUES ('{U1}', NULL, 'Mars/Olympus')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_update_professional_patch() {
        let sql = format!(
            "UPDATE professionals SET timezone = 'Europe/Paris', hour_format = 'h12' WHERE id = '{U1}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::UpdateProfessional { id, patch } => {
                assert_eq!(id.to_string(), U1);
                assert_eq!(patch.name, None);
                assert_eq!(patch.timezone, Some(chrono_tz::Europe::Paris));
                assert_eq!(patch.hour_format, Some(HourFormat::H12));
            }
            cmd => panic!("expected UpdateProfessional, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_service() {
        let sql = format!(
            "INSERT INTO services (id, professional_id, name, duration) VALUES ('{U1}', '{U2}', 'Consultation', 30)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertService { duration_min, step_min, .. } => {
                assert_eq!(duration_min, 30);
                assert_eq!(step_min, None);
            }
            cmd => panic!("expected InsertService, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_service_with_step() {
        let sql = format!(
            "INSERT INTO services (id, professional_id, name, duration, step) VALUES ('{U1}', '{U2}', NULL, 45, 15)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertService { duration_min, step_min, .. } => {
                assert_eq!(duration_min, 45);
                assert_eq!(step_min, Some(15));
            }
            cmd => panic!("expected InsertService, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_schedule() {
        let sql = format!(
            r#"INSERT INTO schedules (id, professional_id, weekday, start, "end") VALUES ('{U1}', '{U2}', 'mon', '09:00', '12:00')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertSchedule { weekday, start, end, service_ids, .. } => {
                assert_eq!(weekday, Weekday::Mon);
                assert_eq!(start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
                assert_eq!(end, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
                assert_eq!(service_ids, None);
            }
            cmd => panic!("expected InsertSchedule, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_schedule_with_service_filter() {
        let sql = format!(
            r#"INSERT INTO schedules (id, professional_id, weekday, start, "end", service_ids) VALUES ('{U1}', '{U2}', 'friday', '14:00', '17:30', '["{U2}"]')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertSchedule { weekday, service_ids, .. } => {
                assert_eq!(weekday, Weekday::Fri);
                assert_eq!(service_ids.unwrap()[0].to_string(), U2);
            }
            cmd => panic!("expected InsertSchedule, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_update_schedule_patch() {
        let sql = format!(r#"UPDATE schedules SET "end" = '13:00' WHERE id = '{U1}'"#);
        match parse_sql(&sql).unwrap() {
            Command::UpdateSchedule { patch, .. } => {
                assert_eq!(patch.weekday, None);
                assert_eq!(patch.end, Some(NaiveTime::from_hms_opt(13, 0, 0).unwrap()));
            }
            cmd => panic!("expected UpdateSchedule, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_break_absolute() {
        let sql = format!(
            r#"INSERT INTO breaks (id, professional_id, start, "end") VALUES ('{U1}', '{U2}', 1767355200000, 1767358800000)"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBreak { start, end, .. } => {
                assert_eq!(start, When::Instant(1_767_355_200_000));
                assert_eq!(end, When::Instant(1_767_358_800_000));
            }
            cmd => panic!("expected InsertBreak, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_break_wall_clock() {
        let sql = format!(
            r#"INSERT INTO breaks (id, professional_id, start, "end") VALUES ('{U1}', '{U2}', '2026-03-02 10:00', '2026-03-02 10:30')"#
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertBreak { start, .. } => {
                let When::Wall(dt) = start else {
                    panic!("expected wall-clock start, got {start:?}")
                };
                assert_eq!(dt.to_string(), "2026-03-02 10:00:00");
            }
            cmd => panic!("expected InsertBreak, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_appointment() {
        let sql = format!(
            "INSERT INTO appointments (id, professional_id, service_id, patient_id, start) VALUES ('{U1}', '{U2}', '{U1}', '{U2}', '2026-03-02 10:30')"
        );
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::InsertAppointment { .. }
        ));
    }

    #[test]
    fn parse_delete_appointment_rejected() {
        let sql = format!("DELETE FROM appointments WHERE id = '{U1}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_cancel_via_update() {
        let sql = format!("UPDATE appointments SET status = 'cancelled' WHERE id = '{U1}'");
        match parse_sql(&sql).unwrap() {
            Command::UpdateAppointmentStatus { status, .. } => {
                assert_eq!(status, AppointmentStatus::Cancelled);
            }
            cmd => panic!("expected UpdateAppointmentStatus, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_status_booked_rejected() {
        let sql = format!("UPDATE appointments SET status = 'booked' WHERE id = '{U1}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_members_and_practice() {
        let sql = format!("INSERT INTO members (id, role) VALUES ('{U1}', 'secretary')");
        match parse_sql(&sql).unwrap() {
            Command::InsertMember { role, .. } => assert_eq!(role, MemberRole::Secretary),
            cmd => panic!("expected InsertMember, got {cmd:?}"),
        }

        match parse_sql("UPDATE practice SET plan = 'plus', status = 'active'").unwrap() {
            Command::UpdatePractice { plan, status } => {
                assert_eq!(plan, Some(PlanTier::Plus));
                assert_eq!(status, Some(SubscriptionStatus::Active));
            }
            cmd => panic!("expected UpdatePractice, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_availability() {
        let sql = format!(
            "SELECT * FROM availability WHERE professional_id = '{U1}' AND date = '2026-03-02' AND service_id = '{U2}'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability { professional_id, date, service_id, viewer_tz } => {
                assert_eq!(professional_id.to_string(), U1);
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
                assert_eq!(service_id.to_string(), U2);
                assert_eq!(viewer_tz, None);
            }
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_availability_with_viewer_tz() {
        let sql = format!(
            "SELECT * FROM availability WHERE professional_id = '{U1}' AND date = '2026-03-02' AND service_id = '{U2}' AND viewer_tz = 'Europe/Paris'"
        );
        match parse_sql(&sql).unwrap() {
            Command::SelectAvailability { viewer_tz, .. } => {
                assert_eq!(viewer_tz, Some(chrono_tz::Europe::Paris));
            }
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_availability_missing_date() {
        let sql = format!(
            "SELECT * FROM availability WHERE professional_id = '{U1}' AND service_id = '{U2}'"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::MissingFilter("date"))));
    }

    #[test]
    fn parse_select_listings() {
        assert!(matches!(
            parse_sql("SELECT * FROM professionals").unwrap(),
            Command::SelectProfessionals
        ));
        assert!(matches!(
            parse_sql("SELECT * FROM practice").unwrap(),
            Command::SelectPractice
        ));
        let sql = format!("SELECT * FROM appointments WHERE professional_id = '{U1}'");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectAppointments { .. }
        ));
    }

    #[test]
    fn parse_listen() {
        let sql = format!("LISTEN professional_{U1}");
        match parse_sql(&sql).unwrap() {
            Command::Listen { channel } => assert_eq!(channel, format!("professional_{U1}")),
            cmd => panic!("expected Listen, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_unknown_table_errors() {
        let sql = format!("INSERT INTO foobar (id) VALUES ('{U1}')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::UnknownTable(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
