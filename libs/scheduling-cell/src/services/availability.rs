use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::models::{CanonicalDay, SchedulingError, SlotAvailability, SlotTime};
use crate::store::{BookingLedger, SlotTemplateStore};

/// Combines the recurring templates with the day's ledger entries into a
/// per-date view of open and taken slots. The view is a snapshot: it can
/// go stale between read and a concurrent booking, so allocation truth
/// always stays with the ledger's conditional insert.
pub struct AvailabilityResolver {
    templates: Arc<dyn SlotTemplateStore>,
    ledger: Arc<dyn BookingLedger>,
}

impl AvailabilityResolver {
    pub fn new(templates: Arc<dyn SlotTemplateStore>, ledger: Arc<dyn BookingLedger>) -> Self {
        Self { templates, ledger }
    }

    pub async fn resolve(
        &self,
        doctor_id: Uuid,
        date: CanonicalDay,
    ) -> Result<Vec<SlotAvailability>, SchedulingError> {
        self.resolve_at(doctor_id, date, CanonicalDay::today(), SlotTime::now())
            .await
    }

    /// Clock-injected variant of `resolve`. Slots on the current calendar
    /// day whose start time is not strictly after `now` are dropped: a
    /// slot starting exactly now cannot be booked-and-attended.
    pub async fn resolve_at(
        &self,
        doctor_id: Uuid,
        date: CanonicalDay,
        today: CanonicalDay,
        now: SlotTime,
    ) -> Result<Vec<SlotAvailability>, SchedulingError> {
        let Some(day) = date.clinic_day() else {
            // Weekends carry no templates by construction.
            return Ok(Vec::new());
        };

        let templates = self.templates.templates_for(doctor_id, day).await?;
        if templates.is_empty() {
            return Ok(Vec::new());
        }

        let appointments = self.ledger.list_for(doctor_id, date).await?;
        let booked: HashSet<Uuid> = appointments
            .iter()
            .filter(|a| a.status.blocks_slot())
            .map(|a| a.slot_template_id)
            .collect();

        let mut slots: Vec<SlotAvailability> = templates
            .into_iter()
            .filter(|t| date != today || t.time_of_day > now)
            .map(|t| SlotAvailability {
                slot_template_id: t.id,
                time_of_day: t.time_of_day,
                is_booked: booked.contains(&t.id),
            })
            .collect();

        slots.sort_by_key(|s| s.time_of_day);

        debug!(
            "Resolved {} slots for doctor {} on {} ({} booked)",
            slots.len(),
            doctor_id,
            date,
            slots.iter().filter(|s| s.is_booked).count()
        );
        Ok(slots)
    }
}
