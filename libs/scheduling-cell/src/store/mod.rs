use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, CanonicalDay, ClinicDay, Doctor, NewAppointment,
    SchedulingError, SlotTemplate,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

/// Read-only reference data: each doctor's recurring weekly offerings.
#[async_trait]
pub trait SlotTemplateStore: Send + Sync {
    /// Templates for one doctor on one weekday, ascending by time of day.
    /// Unknown doctors and empty days yield an empty sequence, not an error.
    async fn templates_for(
        &self,
        doctor_id: Uuid,
        day: ClinicDay,
    ) -> Result<Vec<SlotTemplate>, SchedulingError>;

    async fn template(&self, template_id: Uuid) -> Result<Option<SlotTemplate>, SchedulingError>;
}

/// The durable, authoritative appointment record. The only component
/// allowed to decide whether a slot is taken.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Atomic conditional insert: succeeds only if no appointment with a
    /// slot-holding status shares the (doctor, template, date) key. The
    /// check and the insert are indivisible with respect to concurrent
    /// `create` calls; losers get `SlotAlreadyBooked`.
    async fn create(&self, new: NewAppointment) -> Result<Appointment, SchedulingError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError>;

    /// Idempotent: cancelling an already-cancelled appointment succeeds
    /// and leaves state unchanged.
    async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError>;

    async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError>;

    async fn list_for(
        &self,
        doctor_id: Uuid,
        date: CanonicalDay,
    ) -> Result<Vec<Appointment>, SchedulingError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, SchedulingError>;
}

/// Doctor reference lookups needed by booking and the public listing.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError>;

    async fn list(&self) -> Result<Vec<Doctor>, SchedulingError>;
}
