use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_models::auth::User;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingConfirmation, CanonicalDay,
    Doctor, NewAppointment, SchedulingError, SlotAvailability,
};
use crate::services::availability::AvailabilityResolver;
use crate::services::notify::{ConfirmationNotice, NotificationDispatcher};
use crate::store::{BookingLedger, DoctorDirectory, SlotTemplateStore};

/// Orchestrates a booking request: validates, resolves, lets the ledger
/// make the atomic allocation decision, then formats the confirmation and
/// fires the notification. Stateless per call; safe to share across any
/// number of concurrent requests.
pub struct SchedulingEngine {
    directory: Arc<dyn DoctorDirectory>,
    templates: Arc<dyn SlotTemplateStore>,
    ledger: Arc<dyn BookingLedger>,
    resolver: AvailabilityResolver,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl SchedulingEngine {
    pub fn new(
        directory: Arc<dyn DoctorDirectory>,
        templates: Arc<dyn SlotTemplateStore>,
        ledger: Arc<dyn BookingLedger>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        let resolver = AvailabilityResolver::new(Arc::clone(&templates), Arc::clone(&ledger));
        Self {
            directory,
            templates,
            ledger,
            resolver,
            notifier,
        }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        user: &User,
    ) -> Result<BookingConfirmation, SchedulingError> {
        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(SchedulingError::Validation(
                "A reason for the visit is required".to_string(),
            ));
        }

        let date = CanonicalDay::parse(&request.date)?;

        // A template belonging to a different doctor must read as unknown,
        // not leak that the id exists elsewhere.
        let template = self
            .templates
            .template(request.slot_template_id)
            .await?
            .filter(|t| t.doctor_id == request.doctor_id)
            .ok_or_else(|| SchedulingError::NotFound("Time slot".to_string()))?;

        let doctor = self
            .directory
            .doctor(request.doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Doctor".to_string()))?;

        // Advisory pre-check. It fast-fails the deterministic cases (slot
        // not offered on that weekday, slot already past for today, slot
        // visibly taken); the create below remains the only allocation
        // truth under concurrency.
        let open_slots = self.resolver.resolve(request.doctor_id, date).await?;
        match open_slots.iter().find(|s| s.slot_template_id == template.id) {
            Some(slot) if slot.is_booked => return Err(SchedulingError::SlotAlreadyBooked),
            Some(_) => {}
            None => {
                let message = if date.clinic_day() == Some(template.day) {
                    format!("The {} slot has already passed for {}", template.time_of_day, date)
                } else {
                    format!("This slot is not offered on {}", date.format_long())
                };
                return Err(SchedulingError::Validation(message));
            }
        }

        let appointment = self
            .ledger
            .create(NewAppointment {
                doctor_id: request.doctor_id,
                slot_template_id: request.slot_template_id,
                user_id: user.id.clone(),
                date,
                reason: reason.to_string(),
            })
            .await?;

        info!(
            "Appointment {} booked: doctor {} slot {} on {}",
            appointment.id, doctor.id, template.id, date
        );

        let confirmation = BookingConfirmation {
            appointment_id: appointment.id,
            doctor_name: doctor.name.clone(),
            formatted_date: date.format_long(),
            formatted_time: template.time_of_day.to_string(),
        };

        self.dispatch_confirmation(user, &doctor, &confirmation).await;

        Ok(confirmation)
    }

    /// Thin pass-through to the resolver.
    pub async fn list_availability(
        &self,
        doctor_id: Uuid,
        date: &str,
    ) -> Result<Vec<SlotAvailability>, SchedulingError> {
        let date = CanonicalDay::parse(date)?;
        self.resolver.resolve(doctor_id, date).await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        self.ledger
            .get(appointment_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Appointment".to_string()))
    }

    /// Requester authorization happens at the handler boundary; the engine
    /// only enforces the status state machine (via the ledger).
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.ledger.cancel(appointment_id).await?;
        info!("Appointment {} cancelled", appointment_id);
        Ok(appointment)
    }

    pub async fn transition_appointment(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, SchedulingError> {
        self.ledger.transition(appointment_id, new_status).await
    }

    pub async fn appointments_for_user(&self, user_id: &str) -> Result<Vec<Appointment>, SchedulingError> {
        self.ledger.list_for_user(user_id).await
    }

    pub async fn appointments_for_doctor(
        &self,
        doctor_id: Uuid,
        date: &str,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let date = CanonicalDay::parse(date)?;
        self.ledger.list_for(doctor_id, date).await
    }

    pub async fn doctors(&self) -> Result<Vec<Doctor>, SchedulingError> {
        self.directory.list().await
    }

    pub async fn doctor(&self, doctor_id: Uuid) -> Result<Doctor, SchedulingError> {
        self.directory
            .doctor(doctor_id)
            .await?
            .ok_or_else(|| SchedulingError::NotFound("Doctor".to_string()))
    }

    /// Best effort: a mailer outage must never roll back a booking.
    async fn dispatch_confirmation(
        &self,
        user: &User,
        doctor: &Doctor,
        confirmation: &BookingConfirmation,
    ) {
        let Some(email) = user.email.clone() else {
            warn!("No email on file for user {}, skipping confirmation", user.id);
            return;
        };

        let notice = ConfirmationNotice {
            recipient_email: email,
            recipient_name: user.name.clone().unwrap_or_else(|| "Patient".to_string()),
            doctor_name: doctor.name.clone(),
            formatted_date: confirmation.formatted_date.clone(),
            formatted_time: confirmation.formatted_time.clone(),
        };

        if let Err(err) = self.notifier.send_confirmation(notice).await {
            warn!(
                "Failed to send confirmation for appointment {}: {}",
                confirmation.appointment_id, err
            );
        }
    }
}
