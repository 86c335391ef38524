mod conflict;
mod error;
mod mutations;
mod policy;
mod queries;
mod slots;

pub use error::EngineError;
pub use policy::{AccountState, Actor};
pub use slots::{candidate_slots, emit_slots, merge_overlapping, subtract_intervals};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::limits::BOOKING_LOCK_TIMEOUT_MS;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedProfessionalState = Arc<RwLock<ProfessionalState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// One practice's engine: the professional lock arena, the account state
/// the policy gate reads, and the durable event log.
pub struct Engine {
    pub professionals: DashMap<Ulid, SharedProfessionalState>,
    /// Plan, subscription status, member roster.
    pub(super) account: RwLock<AccountState>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    /// Reverse lookup: entity (service/schedule/break/appointment) id →
    /// professional id.
    pub(super) entity_to_professional: DashMap<Ulid, Ulid>,
}

/// Apply an event directly to a ProfessionalState (no locking — caller
/// holds the lock).
fn apply_to_professional(rs: &mut ProfessionalState, event: &Event, entity_map: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ProfessionalUpdated { name, timezone, hour_format, .. } => {
            rs.name = name.clone();
            rs.timezone = *timezone;
            rs.hour_format = *hour_format;
        }
        Event::ServiceAdded { id, professional_id, name, duration_min, step_min } => {
            rs.services.push(Service {
                id: *id,
                name: name.clone(),
                duration_min: *duration_min,
                step_min: *step_min,
            });
            entity_map.insert(*id, *professional_id);
        }
        Event::ServiceRemoved { id, .. } => {
            rs.services.retain(|s| s.id != *id);
            entity_map.remove(id);
        }
        Event::ScheduleAdded { id, professional_id, weekday, start, end, service_ids } => {
            rs.schedules.push(Schedule {
                id: *id,
                weekday: *weekday,
                start: *start,
                end: *end,
                service_ids: service_ids.clone(),
            });
            entity_map.insert(*id, *professional_id);
        }
        Event::ScheduleUpdated { id, weekday, start, end, service_ids, .. } => {
            if let Some(sched) = rs.schedules.iter_mut().find(|s| s.id == *id) {
                sched.weekday = *weekday;
                sched.start = *start;
                sched.end = *end;
                sched.service_ids = service_ids.clone();
            }
        }
        Event::ScheduleRemoved { id, .. } => {
            rs.schedules.retain(|s| s.id != *id);
            entity_map.remove(id);
        }
        Event::BreakAdded { id, professional_id, span } => {
            rs.insert_break(Break { id: *id, span: *span });
            entity_map.insert(*id, *professional_id);
        }
        Event::BreakRemoved { id, .. } => {
            rs.remove_break(*id);
            entity_map.remove(id);
        }
        Event::AppointmentBooked { id, professional_id, service_id, patient_id, span } => {
            rs.insert_appointment(Appointment {
                id: *id,
                service_id: *service_id,
                patient_id: *patient_id,
                span: *span,
                status: AppointmentStatus::Booked,
            });
            entity_map.insert(*id, *professional_id);
        }
        // Cancelled rows stay in the ledger; only the status flips.
        Event::AppointmentCancelled { id, .. } => {
            if let Some(appt) = rs.appointment_mut(id) {
                appt.status = AppointmentStatus::Cancelled;
            }
        }
        Event::AppointmentCompleted { id, .. } => {
            if let Some(appt) = rs.appointment_mut(id) {
                appt.status = AppointmentStatus::Completed;
            }
        }
        // Registration/removal and account events are handled above the
        // professional map.
        Event::ProfessionalRegistered { .. }
        | Event::ProfessionalRemoved { .. }
        | Event::MemberAdded { .. }
        | Event::MemberRemoved { .. }
        | Event::PlanChanged { .. } => {}
    }
}

fn apply_to_account(account: &mut AccountState, event: &Event) {
    match event {
        Event::MemberAdded { id, role } => {
            account.members.push(Member { id: *id, role: *role });
        }
        Event::MemberRemoved { id } => {
            account.members.retain(|m| m.id != *id);
        }
        Event::PlanChanged { plan, status } => {
            account.plan = *plan;
            account.status = *status;
        }
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> std::io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            professionals: DashMap::new(),
            account: RwLock::new(AccountState::new()),
            wal_tx,
            notify,
            entity_to_professional: DashMap::new(),
        };

        // Replay events — we're the sole owner of these Arcs, so try_read/
        // try_write always succeed instantly (no contention). Never use
        // blocking_read/blocking_write here because this may run inside an
        // async context (e.g. lazy practice creation).
        for event in &events {
            match event {
                Event::ProfessionalRegistered { id, name, timezone, hour_format } => {
                    let rs = ProfessionalState::new(*id, name.clone(), *timezone, *hour_format);
                    engine.professionals.insert(*id, Arc::new(RwLock::new(rs)));
                }
                Event::ProfessionalRemoved { id } => {
                    engine.professionals.remove(id);
                    engine.entity_to_professional.retain(|_, pid| pid != id);
                }
                Event::MemberAdded { .. } | Event::MemberRemoved { .. } | Event::PlanChanged { .. } => {
                    let mut account = engine
                        .account
                        .try_write()
                        .expect("replay: uncontended account write");
                    apply_to_account(&mut account, event);
                }
                other => {
                    if let Some(professional_id) = event_professional_id(other)
                        && let Some(entry) = engine.professionals.get(&professional_id) {
                            let rs_arc = entry.clone();
                            let mut guard =
                                rs_arc.try_write().expect("replay: uncontended write");
                            apply_to_professional(&mut guard, other, &engine.entity_to_professional);
                        }
                }
            }
        }

        Ok(engine)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    pub fn get_professional(&self, id: &Ulid) -> Option<SharedProfessionalState> {
        self.professionals.get(id).map(|e| e.value().clone())
    }

    pub fn professional_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_professional.get(entity_id).map(|e| *e.value())
    }

    /// WAL-append + apply + notify in one call. The notification is
    /// fire-and-forget: a full or missing channel never affects the commit.
    pub(super) async fn persist_and_apply(
        &self,
        professional_id: Ulid,
        rs: &mut ProfessionalState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_professional(rs, event, &self.entity_to_professional);
        self.notify.send(professional_id, event);
        Ok(())
    }

    /// Acquire a professional's write lock with the bounded wait the
    /// concurrency model requires. Expiry is the retryable BookingTimeout —
    /// a stuck writer must not queue other bookings forever.
    pub(super) async fn write_lock_bounded(
        &self,
        professional_id: Ulid,
        rs: &SharedProfessionalState,
    ) -> Result<OwnedRwLockWriteGuard<ProfessionalState>, EngineError> {
        tokio::time::timeout(
            Duration::from_millis(BOOKING_LOCK_TIMEOUT_MS),
            rs.clone().write_owned(),
        )
        .await
        .map_err(|_| EngineError::BookingTimeout(professional_id))
    }

    /// Lookup entity → professional, then acquire the write lock (bounded).
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, OwnedRwLockWriteGuard<ProfessionalState>), EngineError> {
        let professional_id = self
            .professional_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = self.write_lock_bounded(professional_id, &rs).await?;
        Ok((professional_id, guard))
    }
}

/// Extract the professional_id from an entity-scoped event.
fn event_professional_id(event: &Event) -> Option<Ulid> {
    match event {
        Event::ServiceAdded { professional_id, .. }
        | Event::ServiceRemoved { professional_id, .. }
        | Event::ScheduleAdded { professional_id, .. }
        | Event::ScheduleUpdated { professional_id, .. }
        | Event::ScheduleRemoved { professional_id, .. }
        | Event::BreakAdded { professional_id, .. }
        | Event::BreakRemoved { professional_id, .. }
        | Event::AppointmentBooked { professional_id, .. }
        | Event::AppointmentCancelled { professional_id, .. }
        | Event::AppointmentCompleted { professional_id, .. } => Some(*professional_id),
        Event::ProfessionalUpdated { id, .. } => Some(*id),
        Event::ProfessionalRegistered { .. }
        | Event::ProfessionalRemoved { .. }
        | Event::MemberAdded { .. }
        | Event::MemberRemoved { .. }
        | Event::PlanChanged { .. } => None,
    }
}
