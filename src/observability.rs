use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total commands executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "turno_queries_total";

/// Histogram: command latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "turno_query_duration_seconds";

/// Counter: successful bookings committed.
pub const BOOKINGS_TOTAL: &str = "turno_bookings_total";

/// Counter: bookings rejected at commit-time re-validation (lost races and
/// stale slots).
pub const BOOKING_CONFLICTS_TOTAL: &str = "turno_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "turno_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "turno_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "turno_connections_rejected_total";

/// Gauge: number of active practices (loaded engines).
pub const PRACTICES_ACTIVE: &str = "turno_practices_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "turno_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "turno_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertProfessional { .. } => "insert_professional",
        Command::UpdateProfessional { .. } => "update_professional",
        Command::DeleteProfessional { .. } => "delete_professional",
        Command::InsertService { .. } => "insert_service",
        Command::DeleteService { .. } => "delete_service",
        Command::InsertSchedule { .. } => "insert_schedule",
        Command::UpdateSchedule { .. } => "update_schedule",
        Command::DeleteSchedule { .. } => "delete_schedule",
        Command::InsertBreak { .. } => "insert_break",
        Command::DeleteBreak { .. } => "delete_break",
        Command::InsertAppointment { .. } => "insert_appointment",
        Command::UpdateAppointmentStatus { .. } => "update_appointment_status",
        Command::InsertMember { .. } => "insert_member",
        Command::DeleteMember { .. } => "delete_member",
        Command::UpdatePractice { .. } => "update_practice",
        Command::SelectProfessionals => "select_professionals",
        Command::SelectMembers => "select_members",
        Command::SelectPractice => "select_practice",
        Command::SelectServices { .. } => "select_services",
        Command::SelectSchedules { .. } => "select_schedules",
        Command::SelectBreaks { .. } => "select_breaks",
        Command::SelectAppointments { .. } => "select_appointments",
        Command::SelectAvailability { .. } => "select_availability",
        Command::Listen { .. } => "listen",
    }
}
