use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::Event;

const CHANNEL_CAPACITY: usize = 256;

/// Per-professional broadcast hub — the seam the notification collaborator
/// subscribes on. Sends are fire-and-forget: a lagging or absent listener
/// never affects the booking that produced the event.
pub struct NotifyHub {
    channels: DashMap<Ulid, broadcast::Sender<Event>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a professional. Creates the channel if needed.
    pub fn subscribe(&self, professional_id: Ulid) -> broadcast::Receiver<Event> {
        let sender = self
            .channels
            .entry(professional_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, professional_id: Ulid, event: &Event) {
        if let Some(sender) = self.channels.get(&professional_id) {
            let _ = sender.send(event.clone());
        }
    }

    /// Remove a channel (e.g. when a professional is deleted).
    pub fn remove(&self, professional_id: &Ulid) {
        self.channels.remove(professional_id);
    }
}

/// Compact JSON payload for wire-level consumers of a booking event.
pub fn event_payload(event: &Event) -> String {
    let (kind, id) = match event {
        Event::AppointmentBooked { id, .. } => ("appointment_booked", Some(id)),
        Event::AppointmentCancelled { id, .. } => ("appointment_cancelled", Some(id)),
        Event::AppointmentCompleted { id, .. } => ("appointment_completed", Some(id)),
        Event::BreakAdded { id, .. } => ("break_added", Some(id)),
        Event::BreakRemoved { id, .. } => ("break_removed", Some(id)),
        Event::ScheduleAdded { id, .. } => ("schedule_added", Some(id)),
        Event::ScheduleUpdated { id, .. } => ("schedule_updated", Some(id)),
        Event::ScheduleRemoved { id, .. } => ("schedule_removed", Some(id)),
        Event::ServiceAdded { id, .. } => ("service_added", Some(id)),
        Event::ServiceRemoved { id, .. } => ("service_removed", Some(id)),
        Event::ProfessionalRegistered { id, .. } => ("professional_registered", Some(id)),
        Event::ProfessionalUpdated { id, .. } => ("professional_updated", Some(id)),
        Event::ProfessionalRemoved { id } => ("professional_removed", Some(id)),
        Event::MemberAdded { id, .. } => ("member_added", Some(id)),
        Event::MemberRemoved { id } => ("member_removed", Some(id)),
        Event::PlanChanged { .. } => ("plan_changed", None),
    };
    match id {
        Some(id) => serde_json::json!({ "event": kind, "id": id.to_string() }).to_string(),
        None => serde_json::json!({ "event": kind }).to_string(),
    }
}
