use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Appointment, AppointmentStatus, CanonicalDay, ClinicDay, Doctor, NewAppointment,
    SchedulingError, SlotTemplate,
};
use crate::services::lifecycle;
use crate::store::{BookingLedger, DoctorDirectory, SlotTemplateStore};

/// PostgREST-backed store. The uniqueness invariant is enforced by the
/// database, not here: `appointments` carries a partial unique index on
/// (doctor_id, slot_template_id, date) where status <> 'cancelled', so a
/// losing concurrent insert comes back as HTTP 409 regardless of what any
/// earlier read said.
pub struct SupabaseStore {
    client: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Arc::new(SupabaseClient::new(config)),
        }
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, SchedulingError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()
            .map_err(|e| SchedulingError::Storage(format!("Failed to parse row: {}", e)))
    }

    fn storage_err(err: DbError) -> SchedulingError {
        SchedulingError::Storage(err.to_string())
    }

    async fn fetch_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Ok(Self::parse_rows::<Appointment>(rows)?.into_iter().next())
    }

    async fn patch_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "status": new_status.to_string() })),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(Self::storage_err)?;

        Self::parse_rows::<Appointment>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))
    }
}

#[async_trait]
impl SlotTemplateStore for SupabaseStore {
    async fn templates_for(
        &self,
        doctor_id: Uuid,
        day: ClinicDay,
    ) -> Result<Vec<SlotTemplate>, SchedulingError> {
        let path = format!(
            "/rest/v1/slot_templates?doctor_id=eq.{}&day=eq.{}&order=time_of_day.asc",
            doctor_id, day
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Self::parse_rows(rows)
    }

    async fn template(&self, template_id: Uuid) -> Result<Option<SlotTemplate>, SchedulingError> {
        let path = format!("/rest/v1/slot_templates?id=eq.{}", template_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Ok(Self::parse_rows::<SlotTemplate>(rows)?.into_iter().next())
    }
}

#[async_trait]
impl BookingLedger for SupabaseStore {
    async fn create(&self, new: NewAppointment) -> Result<Appointment, SchedulingError> {
        let appointment_data = json!({
            "doctor_id": new.doctor_id,
            "slot_template_id": new.slot_template_id,
            "user_id": new.user_id,
            "date": new.date,
            "reason": new.reason,
            "status": AppointmentStatus::Pending.to_string(),
            "created_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(appointment_data),
                Some(Self::representation_headers()),
            )
            .await
            .map_err(|e| match e {
                // Unique-index violation on the slot key: lost the race.
                DbError::Conflict(detail) => {
                    debug!("Conditional insert rejected by storage: {}", detail);
                    SchedulingError::SlotAlreadyBooked
                }
                other => Self::storage_err(other),
            })?;

        let appointment = Self::parse_rows::<Appointment>(rows)?
            .into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Storage("Create returned no row".to_string()))?;

        info!("Appointment {} created for slot {} on {}",
              appointment.id, appointment.slot_template_id, appointment.date);
        Ok(appointment)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        self.fetch_appointment(appointment_id).await
    }

    async fn cancel(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .fetch_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;

        if appointment.status == AppointmentStatus::Cancelled {
            return Ok(appointment);
        }

        lifecycle::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
        self.patch_status(appointment_id, AppointmentStatus::Cancelled).await
    }

    async fn transition(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .fetch_appointment(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))?;

        lifecycle::validate_transition(appointment.status, new_status)?;
        self.patch_status(appointment_id, new_status).await
    }

    async fn list_for(
        &self,
        doctor_id: Uuid,
        date: CanonicalDay,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&order=created_at.asc",
            doctor_id, date.0
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Self::parse_rows(rows)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?user_id=eq.{}&order=date.asc,created_at.asc",
            user_id
        );
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Self::parse_rows(rows)
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseStore {
    async fn doctor(&self, doctor_id: Uuid) -> Result<Option<Doctor>, SchedulingError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, &path, None)
            .await
            .map_err(Self::storage_err)?;

        Ok(Self::parse_rows::<Doctor>(rows)?.into_iter().next())
    }

    async fn list(&self) -> Result<Vec<Doctor>, SchedulingError> {
        let rows: Vec<Value> = self
            .client
            .request(Method::GET, "/rest/v1/doctors?order=name.asc", None)
            .await
            .map_err(Self::storage_err)?;

        Self::parse_rows(rows)
    }
}
