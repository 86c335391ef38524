use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::tz;

use super::conflict::{check_slot_free, validate_span};
use super::{policy, Actor, Engine, EngineError, WalCommand};
use tokio::sync::oneshot;

impl Engine {
    /// Read-only gate for appointment/schedule/break mutations. Evaluated
    /// against the roster on every call — never cached.
    async fn write_access(&self, actor: Actor) -> Result<(), EngineError> {
        let account = self.account.read().await;
        policy::ensure_writable(&account, actor)
    }

    // ── Professionals ────────────────────────────────────────

    pub async fn register_professional(
        &self,
        id: Ulid,
        name: Option<String>,
        timezone: Tz,
        hour_format: HourFormat,
    ) -> Result<(), EngineError> {
        if self.professionals.len() >= MAX_PROFESSIONALS_PER_PRACTICE {
            return Err(EngineError::LimitExceeded("too many professionals"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("professional name too long"));
            }
        if self.professionals.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ProfessionalRegistered {
            id,
            name: name.clone(),
            timezone,
            hour_format,
        };
        self.wal_append(&event).await?;
        let rs = ProfessionalState::new(id, name, timezone, hour_format);
        self.professionals
            .insert(id, std::sync::Arc::new(tokio::sync::RwLock::new(rs)));
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_professional(
        &self,
        id: Ulid,
        patch: ProfessionalPatch,
    ) -> Result<(), EngineError> {
        if let Some(Some(ref n)) = patch.name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("professional name too long"));
            }
        let rs = self.get_professional(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = self.write_lock_bounded(id, &rs).await?;

        let event = Event::ProfessionalUpdated {
            id,
            name: patch.name.unwrap_or_else(|| guard.name.clone()),
            timezone: patch.timezone.unwrap_or(guard.timezone),
            hour_format: patch.hour_format.unwrap_or(guard.hour_format),
        };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Account-deletion cascade: drops the professional with every owned
    /// schedule, break, and appointment. Administrative, not engine logic —
    /// the ledger rows go away with their owner.
    pub async fn remove_professional(&self, id: Ulid) -> Result<(), EngineError> {
        let rs = self.get_professional(&id).ok_or(EngineError::NotFound(id))?;
        let guard = self.write_lock_bounded(id, &rs).await?;

        let event = Event::ProfessionalRemoved { id };
        self.wal_append(&event).await?;
        self.professionals.remove(&id);
        self.entity_to_professional.retain(|_, pid| pid != &id);
        self.notify.send(id, &event);
        drop(guard);
        Ok(())
    }

    // ── Services ─────────────────────────────────────────────

    pub async fn add_service(
        &self,
        id: Ulid,
        professional_id: Ulid,
        name: Option<String>,
        duration_min: u32,
        step_min: Option<u32>,
    ) -> Result<(), EngineError> {
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("service name too long"));
            }
        if !(MIN_SERVICE_DURATION_MIN..=MAX_SERVICE_DURATION_MIN).contains(&duration_min) {
            return Err(EngineError::LimitExceeded("service duration out of range"));
        }
        if let Some(step) = step_min
            && !(MIN_SERVICE_DURATION_MIN..=MAX_SERVICE_DURATION_MIN).contains(&step) {
                return Err(EngineError::LimitExceeded("service step out of range"));
            }
        if self.entity_to_professional.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let mut guard = self.write_lock_bounded(professional_id, &rs).await?;
        if guard.services.len() >= MAX_SERVICES_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many services"));
        }

        let event = Event::ServiceAdded { id, professional_id, name, duration_min, step_min };
        self.persist_and_apply(professional_id, &mut guard, &event).await
    }

    pub async fn remove_service(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.service(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::ServiceRemoved { id, professional_id };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    // ── Schedules ────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn add_schedule(
        &self,
        actor: Actor,
        id: Ulid,
        professional_id: Ulid,
        weekday: Weekday,
        start: NaiveTime,
        end: NaiveTime,
        service_ids: Option<Vec<Ulid>>,
    ) -> Result<(), EngineError> {
        self.write_access(actor).await?;
        if start >= end {
            return Err(EngineError::InvalidTimeInput(format!(
                "schedule end {end} not after start {start}"
            )));
        }
        if self.entity_to_professional.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let mut guard = self.write_lock_bounded(professional_id, &rs).await?;
        if guard.schedules.len() >= MAX_SCHEDULES_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many schedules"));
        }
        if let Some(ref ids) = service_ids {
            for sid in ids {
                if guard.service(sid).is_none() {
                    return Err(EngineError::NotFound(*sid));
                }
            }
        }

        let candidate = Schedule {
            id,
            weekday,
            start,
            end,
            service_ids: service_ids.clone(),
        };
        if let Some(existing) = guard.schedules.iter().find(|s| s.overlaps_wall(&candidate)) {
            return Err(EngineError::ScheduleOverlap(existing.id));
        }

        let event = Event::ScheduleAdded { id, professional_id, weekday, start, end, service_ids };
        self.persist_and_apply(professional_id, &mut guard, &event).await
    }

    pub async fn update_schedule(
        &self,
        actor: Actor,
        id: Ulid,
        patch: SchedulePatch,
    ) -> Result<Ulid, EngineError> {
        self.write_access(actor).await?;
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard.schedule(&id).ok_or(EngineError::NotFound(id))?;

        let candidate = Schedule {
            id,
            weekday: patch.weekday.unwrap_or(current.weekday),
            start: patch.start.unwrap_or(current.start),
            end: patch.end.unwrap_or(current.end),
            service_ids: patch
                .service_ids
                .unwrap_or_else(|| current.service_ids.clone()),
        };
        if candidate.start >= candidate.end {
            return Err(EngineError::InvalidTimeInput(format!(
                "schedule end {} not after start {}",
                candidate.end, candidate.start
            )));
        }
        if let Some(ref ids) = candidate.service_ids {
            for sid in ids {
                if guard.service(sid).is_none() {
                    return Err(EngineError::NotFound(*sid));
                }
            }
        }
        if let Some(existing) = guard
            .schedules
            .iter()
            .find(|s| s.id != id && s.overlaps_wall(&candidate))
        {
            return Err(EngineError::ScheduleOverlap(existing.id));
        }

        let event = Event::ScheduleUpdated {
            id,
            professional_id,
            weekday: candidate.weekday,
            start: candidate.start,
            end: candidate.end,
            service_ids: candidate.service_ids,
        };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    pub async fn remove_schedule(&self, actor: Actor, id: Ulid) -> Result<Ulid, EngineError> {
        self.write_access(actor).await?;
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        if guard.schedule(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::ScheduleRemoved { id, professional_id };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    // ── Breaks ───────────────────────────────────────────────

    pub async fn add_break(
        &self,
        actor: Actor,
        id: Ulid,
        professional_id: Ulid,
        start: When,
        end: When,
    ) -> Result<Span, EngineError> {
        self.write_access(actor).await?;
        if self.entity_to_professional.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let mut guard = self.write_lock_bounded(professional_id, &rs).await?;
        if guard.interval_count() >= MAX_INTERVALS_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many intervals"));
        }

        // Wall-clock bounds resolve against the zone stored right now.
        let start_ms = tz::when_to_instant(start, guard.timezone)?;
        let end_ms = tz::when_to_instant(end, guard.timezone)?;
        if end_ms <= start_ms {
            return Err(EngineError::InvalidTimeInput(format!(
                "break end {end_ms} not after start {start_ms}"
            )));
        }
        let span = Span::new(start_ms, end_ms);
        validate_span(&span)?;

        let event = Event::BreakAdded { id, professional_id, span };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(span)
    }

    pub async fn remove_break(&self, actor: Actor, id: Ulid) -> Result<Ulid, EngineError> {
        self.write_access(actor).await?;
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        if !guard.breaks.iter().any(|b| b.id == id) {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::BreakRemoved { id, professional_id };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    // ── Booking transaction ──────────────────────────────────

    /// The booking transaction: one locked section covering the plan gate,
    /// the occupancy re-check, and the insert, in that order. Slot
    /// generation and booking are separate reads, so the re-check here is
    /// what makes a lost race surface as `SlotNoLongerAvailable` instead of
    /// a double booking.
    #[allow(clippy::too_many_arguments)]
    pub async fn book_appointment(
        &self,
        actor: Actor,
        id: Ulid,
        professional_id: Ulid,
        service_id: Ulid,
        patient_id: Ulid,
        start: When,
    ) -> Result<Span, EngineError> {
        self.write_access(actor).await?;
        if self.entity_to_professional.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let mut guard = self.write_lock_bounded(professional_id, &rs).await?;
        if guard.interval_count() >= MAX_INTERVALS_PER_PROFESSIONAL {
            return Err(EngineError::LimitExceeded("too many intervals"));
        }

        let service = guard
            .service(&service_id)
            .ok_or(EngineError::NotFound(service_id))?
            .clone();
        let start_ms = tz::when_to_instant(start, guard.timezone)?;
        let span = Span::new(start_ms, start_ms + service.duration_ms());
        validate_span(&span)?;

        // Plan quota first: a capped account fails before any slot math,
        // and the count reads the same ledger the insert will write.
        let plan = self.account.read().await.effective_plan();
        if let Some(cap) = policy::monthly_cap(plan) {
            policy::check_monthly_quota(&guard, span.start, cap)?;
        }

        if let Err(e) = check_slot_free(&guard, &service, &span) {
            if matches!(e, EngineError::SlotNoLongerAvailable(_)) {
                metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            }
            return Err(e);
        }

        let event = Event::AppointmentBooked { id, professional_id, service_id, patient_id, span };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        metrics::counter!(crate::observability::BOOKINGS_TOTAL).increment(1);
        Ok(span)
    }

    pub async fn cancel_appointment(&self, actor: Actor, id: Ulid) -> Result<Ulid, EngineError> {
        self.write_access(actor).await?;
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        match guard.appointment(&id) {
            None => return Err(EngineError::NotFound(id)),
            Some(appt) if appt.status != AppointmentStatus::Booked => {
                return Err(EngineError::InvalidStatus(id));
            }
            Some(_) => {}
        }
        let event = Event::AppointmentCancelled { id, professional_id };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    pub async fn complete_appointment(&self, actor: Actor, id: Ulid) -> Result<Ulid, EngineError> {
        self.write_access(actor).await?;
        let (professional_id, mut guard) = self.resolve_entity_write(&id).await?;
        match guard.appointment(&id) {
            None => return Err(EngineError::NotFound(id)),
            Some(appt) if appt.status != AppointmentStatus::Booked => {
                return Err(EngineError::InvalidStatus(id));
            }
            Some(_) => {}
        }
        let event = Event::AppointmentCompleted { id, professional_id };
        self.persist_and_apply(professional_id, &mut guard, &event).await?;
        Ok(professional_id)
    }

    // ── Account (members + plan) ─────────────────────────────

    pub async fn add_member(&self, id: Ulid, role: MemberRole) -> Result<(), EngineError> {
        let mut account = self.account.write().await;
        if account.members.len() >= MAX_MEMBERS_PER_PRACTICE {
            return Err(EngineError::LimitExceeded("too many members"));
        }
        if account.member(&id).is_some() {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::MemberAdded { id, role };
        self.wal_append(&event).await?;
        account.members.push(Member { id, role });
        Ok(())
    }

    pub async fn remove_member(&self, id: Ulid) -> Result<(), EngineError> {
        let mut account = self.account.write().await;
        if account.member(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        let event = Event::MemberRemoved { id };
        self.wal_append(&event).await?;
        account.members.retain(|m| m.id != id);
        Ok(())
    }

    /// Written by the billing collaborator; the engine never mutates plan
    /// state on its own.
    pub async fn set_plan(
        &self,
        plan: PlanTier,
        status: SubscriptionStatus,
    ) -> Result<(), EngineError> {
        let mut account = self.account.write().await;
        let event = Event::PlanChanged { plan, status };
        self.wal_append(&event).await?;
        account.plan = plan;
        account.status = status;
        Ok(())
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state. Cancelled/completed appointments keep
    /// their status via a booked+transition event pair.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        {
            let account = self.account.read().await;
            events.push(Event::PlanChanged { plan: account.plan, status: account.status });
            for m in &account.members {
                events.push(Event::MemberAdded { id: m.id, role: m.role });
            }
        }

        let ids: Vec<Ulid> = self.professionals.iter().map(|e| *e.key()).collect();
        for id in ids {
            let Some(rs) = self.get_professional(&id) else { continue };
            let guard = rs.read().await;

            events.push(Event::ProfessionalRegistered {
                id: guard.id,
                name: guard.name.clone(),
                timezone: guard.timezone,
                hour_format: guard.hour_format,
            });
            for s in &guard.services {
                events.push(Event::ServiceAdded {
                    id: s.id,
                    professional_id: guard.id,
                    name: s.name.clone(),
                    duration_min: s.duration_min,
                    step_min: s.step_min,
                });
            }
            for s in &guard.schedules {
                events.push(Event::ScheduleAdded {
                    id: s.id,
                    professional_id: guard.id,
                    weekday: s.weekday,
                    start: s.start,
                    end: s.end,
                    service_ids: s.service_ids.clone(),
                });
            }
            for b in &guard.breaks {
                events.push(Event::BreakAdded {
                    id: b.id,
                    professional_id: guard.id,
                    span: b.span,
                });
            }
            for a in &guard.appointments {
                events.push(Event::AppointmentBooked {
                    id: a.id,
                    professional_id: guard.id,
                    service_id: a.service_id,
                    patient_id: a.patient_id,
                    span: a.span,
                });
                match a.status {
                    AppointmentStatus::Booked => {}
                    AppointmentStatus::Cancelled => events.push(Event::AppointmentCancelled {
                        id: a.id,
                        professional_id: guard.id,
                    }),
                    AppointmentStatus::Completed => events.push(Event::AppointmentCompleted {
                        id: a.id,
                        professional_id: guard.id,
                    }),
                }
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::Unavailable("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Unavailable("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
