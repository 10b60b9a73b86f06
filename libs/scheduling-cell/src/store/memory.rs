use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentStatus, CanonicalDay, ClinicDay, Doctor, NewAppointment,
    SchedulingError, SlotTemplate, SlotTime,
};
use crate::services::lifecycle;
use crate::store::{BookingLedger, DoctorDirectory, SlotTemplateStore};

#[derive(Default)]
struct Inner {
    doctors: HashMap<Uuid, Doctor>,
    templates: HashMap<Uuid, SlotTemplate>,
    appointments: HashMap<Uuid, Appointment>,
}

/// Mutex-backed store for tests and local development. The single lock
/// makes `create` a genuine atomic conditional insert: the occupancy check
/// and the insert happen under one critical section, the same guarantee
/// the Postgres backend gets from its partial unique index.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doctor(&self, name: &str, specialty: &str) -> Doctor {
        let doctor = Doctor {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialty: specialty.to_string(),
        };
        self.inner
            .lock()
            .expect("store lock poisoned")
            .doctors
            .insert(doctor.id, doctor.clone());
        doctor
    }

    pub fn add_template(&self, doctor_id: Uuid, day: ClinicDay, time_of_day: SlotTime) -> SlotTemplate {
        let template = SlotTemplate {
            id: Uuid::new_v4(),
            doctor_id,
            day,
            time_of_day,
        };
        self.inner
            .lock()
            .expect("store lock poisoned")
            .templates
            .insert(template.id, template.clone());
        template
    }
}

#[async_trait]
impl SlotTemplateStore for InMemoryStore {
    async fn templates_for(
        &self,
        doctor_id: Uuid,
        day: ClinicDay,
    ) -> Result<Vec<SlotTemplate>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut templates: Vec<SlotTemplate> = inner
            .templates
            .values()
            .filter(|t| t.doctor_id == doctor_id && t.day == day)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.time_of_day);
        Ok(templates)
    }

    async fn template(&self, template_id: Uuid) -> Result<Option<SlotTemplate>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.templates.get(&template_id).cloned())
    }
}

#[async_trait]
impl BookingLedger for InMemoryStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");

        let taken = inner.appointments.values().any(|a| {
            a.doctor_id == new.doctor_id
                && a.slot_template_id == new.slot_template_id
                && a.date == new.date
                && a.status.blocks_slot()
        });
        if taken {
            debug!(
                "Slot {} on {} already held, rejecting create",
                new.slot_template_id, new.date
            );
            return Err(SchedulingError::SlotAlreadyBooked);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            doctor_id: new.doctor_id,
            slot_template_id: new.slot_template_id,
            user_id: new.user_id,
            date: new.date,
            reason: new.reason,
            status: AppointmentStatus::Pending,
            created_at: Utc::now(),
        };
        inner.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.appointments.get(&appointment_id).cloned())
    }

    async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let appointment = inner
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Ok(appointment.clone());
        }

        lifecycle::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
        appointment.status = AppointmentStatus::Cancelled;
        Ok(appointment.clone())
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let appointment = inner
            .appointments
            .get_mut(&appointment_id)
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;

        lifecycle::validate_transition(appointment.status, new_status)?;
        appointment.status = new_status;
        Ok(appointment.clone())
    }

    async fn list_for(
        &self,
        doctor_id: Uuid,
        date: CanonicalDay,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.created_at);
        Ok(appointments)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut appointments: Vec<Appointment> = inner
            .appointments
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| (a.date, a.created_at));
        Ok(appointments)
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryStore {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        Ok(inner.doctors.get(&doctor_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Doctor>, SchedulingError> {
        let inner = self.inner.lock().expect("store lock poisoned");
        let mut doctors: Vec<Doctor> = inner.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }
}
