use chrono::NaiveDate;
use chrono_tz::Tz;
use ulid::Ulid;

use crate::model::*;
use crate::tz;

use super::slots::candidate_slots;
use super::{Engine, EngineError};

impl Engine {
    /// Candidate slots for one professional/date/service, rendered in the
    /// viewer's zone (default: the professional's own). Read-only; takes
    /// only a read guard and tolerates staleness — the booking transaction
    /// is the final authority.
    pub async fn availability(
        &self,
        professional_id: Ulid,
        date: NaiveDate,
        service_id: Ulid,
        viewer_tz: Option<Tz>,
    ) -> Result<Vec<Slot>, EngineError> {
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = rs.read().await;
        let service = guard
            .service(&service_id)
            .ok_or(EngineError::NotFound(service_id))?;

        let spans = candidate_slots(&guard, date, service)?;
        let zone = viewer_tz.unwrap_or(guard.timezone);
        spans
            .into_iter()
            .map(|span| {
                Ok(Slot {
                    span,
                    start_local: tz::format_local(span.start, zone, guard.hour_format)?,
                    end_local: tz::format_local(span.end, zone, guard.hour_format)?,
                })
            })
            .collect()
    }

    pub async fn list_professionals(&self) -> Vec<ProfessionalInfo> {
        let arcs: Vec<_> = self
            .professionals
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut out = Vec::with_capacity(arcs.len());
        for rs in arcs {
            let guard = rs.read().await;
            out.push(ProfessionalInfo {
                id: guard.id,
                name: guard.name.clone(),
                timezone: guard.timezone,
                hour_format: guard.hour_format,
            });
        }
        out.sort_by_key(|p| p.id);
        out
    }

    pub async fn get_services(&self, professional_id: Ulid) -> Result<Vec<Service>, EngineError> {
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = rs.read().await;
        Ok(guard.services.clone())
    }

    pub async fn get_schedules(&self, professional_id: Ulid) -> Result<Vec<Schedule>, EngineError> {
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = rs.read().await;
        Ok(guard.schedules.clone())
    }

    pub async fn get_breaks(&self, professional_id: Ulid) -> Result<Vec<Break>, EngineError> {
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = rs.read().await;
        Ok(guard.breaks.clone())
    }

    pub async fn get_appointments(
        &self,
        professional_id: Ulid,
    ) -> Result<Vec<Appointment>, EngineError> {
        let rs = self
            .get_professional(&professional_id)
            .ok_or(EngineError::NotFound(professional_id))?;
        let guard = rs.read().await;
        Ok(guard.appointments.clone())
    }

    pub async fn members(&self) -> Vec<MemberInfo> {
        self.account.read().await.member_infos()
    }

    pub async fn plan(&self) -> (PlanTier, SubscriptionStatus) {
        let account = self.account.read().await;
        (account.plan, account.status)
    }
}
