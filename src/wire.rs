use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::auth::TurnoAuthSource;
use crate::engine::{Actor, Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::practice::PracticeManager;
use crate::sql::{self, Command};

pub struct TurnoHandler {
    practices: Arc<PracticeManager>,
    query_parser: Arc<TurnoQueryParser>,
}

impl TurnoHandler {
    pub fn new(practices: Arc<PracticeManager>) -> Self {
        Self {
            practices,
            query_parser: Arc::new(TurnoQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.practices.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("practice error: {e}"),
            )))
        })
    }

    /// The acting identity. A ULID user names a member (role resolved from
    /// the roster, never from client claims); anything else is the platform
    /// backend.
    fn resolve_actor<C: ClientInfo>(client: &C) -> Actor {
        client
            .metadata()
            .get("user")
            .and_then(|u| Ulid::from_string(u).ok())
            .map(Actor::Member)
            .unwrap_or(Actor::Backend)
    }

    async fn run_command(
        &self,
        engine: &Engine,
        actor: Actor,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let start = Instant::now();
        let result = self.execute_command(engine, actor, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(start.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        result
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        actor: Actor,
        cmd: Command,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::InsertProfessional { id, name, timezone, hour_format } => {
                engine
                    .register_professional(id, name, timezone, hour_format)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateProfessional { id, patch } => {
                engine.update_professional(id, patch).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteProfessional { id } => {
                engine.remove_professional(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertService { id, professional_id, name, duration_min, step_min } => {
                engine
                    .add_service(id, professional_id, name, duration_min, step_min)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteService { id } => {
                engine.remove_service(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertSchedule { id, professional_id, weekday, start, end, service_ids } => {
                engine
                    .add_schedule(actor, id, professional_id, weekday, start, end, service_ids)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateSchedule { id, patch } => {
                engine.update_schedule(actor, id, patch).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::DeleteSchedule { id } => {
                engine.remove_schedule(actor, id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertBreak { id, professional_id, start, end } => {
                engine
                    .add_break(actor, id, professional_id, start, end)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteBreak { id } => {
                engine.remove_break(actor, id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::InsertAppointment { id, professional_id, service_id, patient_id, start } => {
                engine
                    .book_appointment(actor, id, professional_id, service_id, patient_id, start)
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::UpdateAppointmentStatus { id, status } => {
                match status {
                    AppointmentStatus::Cancelled => {
                        engine.cancel_appointment(actor, id).await.map_err(engine_err)?
                    }
                    AppointmentStatus::Completed => {
                        engine.complete_appointment(actor, id).await.map_err(engine_err)?
                    }
                    AppointmentStatus::Booked => {
                        return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                            "ERROR".into(),
                            "22023".into(),
                            "cannot transition an appointment back to booked".into(),
                        ))))
                    }
                };
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::InsertMember { id, role } => {
                engine.add_member(id, role).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
            Command::DeleteMember { id } => {
                engine.remove_member(id).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("DELETE").with_rows(1))])
            }
            Command::UpdatePractice { plan, status } => {
                let (cur_plan, cur_status) = engine.plan().await;
                engine
                    .set_plan(plan.unwrap_or(cur_plan), status.unwrap_or(cur_status))
                    .await
                    .map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
            }
            Command::SelectProfessionals => {
                let professionals = engine.list_professionals().await;
                let schema = Arc::new(professionals_schema());
                let rows: Vec<PgWireResult<_>> = professionals
                    .into_iter()
                    .map(|p| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&p.id.to_string())?;
                        encoder.encode_field(&p.name)?;
                        encoder.encode_field(&p.timezone.name())?;
                        encoder.encode_field(&hour_format_str(p.hour_format))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectMembers => {
                let members = engine.members().await;
                let schema = Arc::new(members_schema());
                let rows: Vec<PgWireResult<_>> = members
                    .into_iter()
                    .map(|m| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&m.id.to_string())?;
                        encoder.encode_field(&role_str(m.role))?;
                        encoder.encode_field(&m.writable)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectPractice => {
                let (plan, status) = engine.plan().await;
                let schema = Arc::new(practice_schema());
                let mut encoder = DataRowEncoder::new(schema.clone());
                encoder.encode_field(&plan_str(plan))?;
                encoder.encode_field(&subscription_status_str(status))?;
                let rows = vec![Ok(encoder.take_row())];
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectServices { professional_id } => {
                let services = engine.get_services(professional_id).await.map_err(engine_err)?;
                let schema = Arc::new(services_schema());
                let pid = professional_id.to_string();
                let rows: Vec<PgWireResult<_>> = services
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id.to_string())?;
                        encoder.encode_field(&pid)?;
                        encoder.encode_field(&s.name)?;
                        encoder.encode_field(&(s.duration_min as i32))?;
                        encoder.encode_field(&s.step_min.map(|v| v as i32))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectSchedules { professional_id } => {
                let schedules = engine.get_schedules(professional_id).await.map_err(engine_err)?;
                let schema = Arc::new(schedules_schema());
                let pid = professional_id.to_string();
                let rows: Vec<PgWireResult<_>> = schedules
                    .into_iter()
                    .map(|s| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&s.id.to_string())?;
                        encoder.encode_field(&pid)?;
                        encoder.encode_field(&s.weekday.to_string().to_lowercase())?;
                        encoder.encode_field(&s.start.format("%H:%M").to_string())?;
                        encoder.encode_field(&s.end.format("%H:%M").to_string())?;
                        encoder.encode_field(&service_ids_json(&s.service_ids))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectBreaks { professional_id } => {
                let breaks = engine.get_breaks(professional_id).await.map_err(engine_err)?;
                let schema = Arc::new(breaks_schema());
                let pid = professional_id.to_string();
                let rows: Vec<PgWireResult<_>> = breaks
                    .into_iter()
                    .map(|b| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&b.id.to_string())?;
                        encoder.encode_field(&pid)?;
                        encoder.encode_field(&b.span.start)?;
                        encoder.encode_field(&b.span.end)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectAppointments { professional_id } => {
                let appointments =
                    engine.get_appointments(professional_id).await.map_err(engine_err)?;
                let schema = Arc::new(appointments_schema());
                let pid = professional_id.to_string();
                let rows: Vec<PgWireResult<_>> = appointments
                    .into_iter()
                    .map(|a| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&a.id.to_string())?;
                        encoder.encode_field(&pid)?;
                        encoder.encode_field(&a.service_id.to_string())?;
                        encoder.encode_field(&a.patient_id.to_string())?;
                        encoder.encode_field(&a.span.start)?;
                        encoder.encode_field(&a.span.end)?;
                        encoder.encode_field(&a.status.as_str())?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectAvailability { professional_id, date, service_id, viewer_tz } => {
                let slots = engine
                    .availability(professional_id, date, service_id, viewer_tz)
                    .await
                    .map_err(engine_err)?;
                let schema = Arc::new(availability_schema());
                let pid = professional_id.to_string();
                let rows: Vec<PgWireResult<_>> = slots
                    .into_iter()
                    .map(|slot| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&pid)?;
                        encoder.encode_field(&slot.start_local)?;
                        encoder.encode_field(&slot.end_local)?;
                        encoder.encode_field(&slot.span.start)?;
                        encoder.encode_field(&slot.span.end)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::Listen { channel } => {
                let professional_id_str = channel.strip_prefix("professional_").ok_or_else(|| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("invalid channel: {channel} (expected professional_{{id}})"),
                    )))
                })?;
                let _professional_id = Ulid::from_string(professional_id_str).map_err(|e| {
                    PgWireError::UserError(Box::new(ErrorInfo::new(
                        "ERROR".into(),
                        "42000".into(),
                        format!("bad ULID in channel: {e}"),
                    )))
                })?;
                Ok(vec![Response::Execution(Tag::new("LISTEN"))])
            }
        }
    }
}

// ── Result schemas ───────────────────────────────────────────────

fn varchar(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn int8(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::INT8, FieldFormat::Text)
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        varchar("professional_id"),
        varchar("start_local"),
        varchar("end_local"),
        int8("start"),
        int8("end"),
    ]
}

fn professionals_schema() -> Vec<FieldInfo> {
    vec![varchar("id"), varchar("name"), varchar("timezone"), varchar("hour_format")]
}

fn members_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("role"),
        FieldInfo::new("writable".into(), None, None, Type::BOOL, FieldFormat::Text),
    ]
}

fn practice_schema() -> Vec<FieldInfo> {
    vec![varchar("plan"), varchar("status")]
}

fn services_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("professional_id"),
        varchar("name"),
        FieldInfo::new("duration".into(), None, None, Type::INT4, FieldFormat::Text),
        FieldInfo::new("step".into(), None, None, Type::INT4, FieldFormat::Text),
    ]
}

fn schedules_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("professional_id"),
        varchar("weekday"),
        varchar("start"),
        varchar("end"),
        varchar("service_ids"),
    ]
}

fn breaks_schema() -> Vec<FieldInfo> {
    vec![varchar("id"), varchar("professional_id"), int8("start"), int8("end")]
}

fn appointments_schema() -> Vec<FieldInfo> {
    vec![
        varchar("id"),
        varchar("professional_id"),
        varchar("service_id"),
        varchar("patient_id"),
        int8("start"),
        int8("end"),
        varchar("status"),
    ]
}

/// Schema for a statement text, used by the extended protocol's Describe.
fn schema_for_statement(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    if !upper.contains("SELECT") {
        return vec![];
    }
    if upper.contains("AVAILABILITY") {
        availability_schema()
    } else if upper.contains("PROFESSIONALS") {
        professionals_schema()
    } else if upper.contains("MEMBERS") {
        members_schema()
    } else if upper.contains("PRACTICE") {
        practice_schema()
    } else if upper.contains("SERVICES") {
        services_schema()
    } else if upper.contains("SCHEDULES") {
        schedules_schema()
    } else if upper.contains("BREAKS") {
        breaks_schema()
    } else if upper.contains("APPOINTMENTS") {
        appointments_schema()
    } else {
        vec![]
    }
}

fn hour_format_str(f: HourFormat) -> &'static str {
    match f {
        HourFormat::H24 => "h24",
        HourFormat::H12 => "h12",
    }
}

fn role_str(r: MemberRole) -> &'static str {
    match r {
        MemberRole::Professional => "professional",
        MemberRole::Secretary => "secretary",
    }
}

fn plan_str(p: PlanTier) -> &'static str {
    match p {
        PlanTier::Free => "free",
        PlanTier::Plus => "plus",
    }
}

fn subscription_status_str(s: SubscriptionStatus) -> &'static str {
    match s {
        SubscriptionStatus::Active => "active",
        SubscriptionStatus::Lapsed => "lapsed",
    }
}

fn service_ids_json(ids: &Option<Vec<Ulid>>) -> Option<String> {
    ids.as_ref().map(|ids| {
        serde_json::Value::from(
            ids.iter().map(|id| id.to_string()).collect::<Vec<_>>(),
        )
        .to_string()
    })
}

#[async_trait]
impl SimpleQueryHandler for TurnoHandler {
    async fn do_query<C>(&self, client: &mut C, query: &str) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let actor = Self::resolve_actor(client);
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.run_command(&engine, actor, cmd).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct TurnoQueryParser;

#[async_trait]
impl QueryParser for TurnoQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for_statement(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for TurnoHandler {
    type Statement = String;
    type QueryParser = TurnoQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let actor = Self::resolve_actor(client);
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self.run_command(&engine, actor, cmd).await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            schema_for_statement(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for_statement(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start
                && let Ok(n) = sql[start..i].parse::<usize>()
                && n > max {
                    max = n;
                }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let sql = portal.statement.statement.to_string();
    let params = &portal.parameters;
    let mut result = sql;

    for (i, param) in params.iter().enumerate().rev() {
        let placeholder = format!("${}", i + 1);
        let value = match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                format!("'{}'", text.replace('\'', "''"))
            }
            None => "NULL".to_string(),
        };
        result = result.replace(&placeholder, &value);
    }

    result
}

// ── Factory & connection entry point ─────────────────────────────

pub struct TurnoFactory {
    handler: Arc<TurnoHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<TurnoAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl TurnoFactory {
    pub fn new(practices: Arc<PracticeManager>, password: String) -> Self {
        let auth_source = TurnoAuthSource::new(password);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(TurnoHandler::new(practices)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for TurnoFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    practices: Arc<PracticeManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let factory = Arc::new(TurnoFactory::new(practices, password));
    pgwire::tokio::process_socket(socket, tls, factory).await?;
    Ok(())
}

fn engine_err(e: EngineError) -> PgWireError {
    // Distinct SQLSTATEs per error kind: business-rule failures must reach
    // the caller typed, never as a generic failure.
    let code = match &e {
        EngineError::InvalidTimeInput(_) => "22007",
        EngineError::SlotNoLongerAvailable(_) => "40001",
        EngineError::BookingTimeout(_) => "55P03",
        EngineError::ReadOnlyRestriction(_) => "42501",
        EngineError::PlanLimitExceeded(_) => "53400",
        EngineError::LimitExceeded(_) => "54000",
        EngineError::ScheduleOverlap(_) => "23P01",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::NotFound(_) => "P0002",
        EngineError::InvalidStatus(_) => "P0001",
        EngineError::Unavailable(_) => "58000",
    };
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        e.to_string(),
    )))
}

fn sql_err(e: sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}
