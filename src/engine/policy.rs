use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::tz;

use super::EngineError;

/// The acting identity on a mutating call, as vouched for by the auth
/// collaborator. Roles are never taken from client claims; they are
/// resolved against the member roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The platform backend itself (patient-initiated flows, admin glue).
    Backend,
    /// A practice member acting on their own behalf.
    Member(Ulid),
}

/// Practice-wide account state: plan, subscription, and the member roster
/// in join order. The billing collaborator writes plan/status; the gate
/// only ever reads them at evaluation time.
#[derive(Debug, Clone)]
pub struct AccountState {
    pub plan: PlanTier,
    pub status: SubscriptionStatus,
    pub members: Vec<Member>,
}

impl Default for AccountState {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountState {
    pub fn new() -> Self {
        Self {
            plan: PlanTier::Free,
            status: SubscriptionStatus::Active,
            members: Vec::new(),
        }
    }

    /// A lapsed subscription degrades to free-tier limits.
    pub fn effective_plan(&self) -> PlanTier {
        match (self.plan, self.status) {
            (PlanTier::Plus, SubscriptionStatus::Active) => PlanTier::Plus,
            _ => PlanTier::Free,
        }
    }

    pub fn member(&self, id: &Ulid) -> Option<&Member> {
        self.members.iter().find(|m| m.id == *id)
    }

    /// Whether `member_id` holds write privilege under the effective plan.
    /// The free plan admits the first professional and the first secretary
    /// by join order; everyone later becomes read-only on downgrade.
    pub fn writable(&self, member_id: &Ulid) -> bool {
        match self.effective_plan() {
            PlanTier::Plus => self.members.iter().any(|m| m.id == *member_id),
            PlanTier::Free => {
                let mut professionals = 0usize;
                let mut secretaries = 0usize;
                for m in &self.members {
                    let allowed = match m.role {
                        MemberRole::Professional => {
                            professionals += 1;
                            professionals <= FREE_PLAN_PROFESSIONALS
                        }
                        MemberRole::Secretary => {
                            secretaries += 1;
                            secretaries <= FREE_PLAN_SECRETARIES
                        }
                    };
                    if m.id == *member_id {
                        return allowed;
                    }
                }
                false
            }
        }
    }

    pub fn member_infos(&self) -> Vec<MemberInfo> {
        self.members
            .iter()
            .map(|m| MemberInfo {
                id: m.id,
                role: m.role,
                writable: self.writable(&m.id),
            })
            .collect()
    }
}

/// Gate every mutating call on appointments, schedules, and breaks.
pub fn ensure_writable(account: &AccountState, actor: Actor) -> Result<(), EngineError> {
    match actor {
        Actor::Backend => Ok(()),
        Actor::Member(id) => {
            if account.writable(&id) {
                Ok(())
            } else {
                Err(EngineError::ReadOnlyRestriction(id))
            }
        }
    }
}

/// Monthly booking quota for the effective plan. None means unlimited.
pub fn monthly_cap(plan: PlanTier) -> Option<u32> {
    match plan {
        PlanTier::Free => Some(FREE_MONTHLY_APPOINTMENT_CAP),
        PlanTier::Plus => None,
    }
}

/// Count non-cancelled appointments starting inside the calendar month (in
/// the professional's zone) that contains `slot_start`; reject once the cap
/// is reached. Re-evaluated on every booking, under the same lock as the
/// overlap check.
pub fn check_monthly_quota(
    state: &ProfessionalState,
    slot_start: Ms,
    cap: u32,
) -> Result<(), EngineError> {
    let window = tz::month_window(slot_start, state.timezone)?;
    let right = state
        .appointments
        .partition_point(|a| a.span.start < window.end);
    let mut count = 0u32;
    for a in &state.appointments[..right] {
        if a.is_active() && a.span.start >= window.start {
            count += 1;
            if count >= cap {
                return Err(EngineError::PlanLimitExceeded(cap));
            }
        }
    }
    Ok(())
}
