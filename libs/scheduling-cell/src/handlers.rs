use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{Appointment, BookAppointmentRequest, TransitionRequest};
use crate::router::SchedulingState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct TimeslotQuery {
    pub doctor_id: Uuid,
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct DaySheetQuery {
    pub date: String,
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let confirmation = state.engine.book_appointment(request, &user).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment booked successfully!",
        "confirmation": confirmation,
    })))
}

/// Advisory availability view for the booking UI.
#[axum::debug_handler]
pub async fn list_timeslots(
    State(state): State<Arc<SchedulingState>>,
    Query(query): Query<TimeslotQuery>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .engine
        .list_availability(query.doctor_id, &query.date)
        .await?;

    Ok(Json(json!(slots)))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.engine.appointments_for_user(&user.id).await?;
    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.engine.get_appointment(appointment_id).await?;
    authorize_record_access(&user, &appointment)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment = state.engine.get_appointment(appointment_id).await?;
    authorize_record_access(&user, &appointment)?;

    let cancelled = state.engine.cancel_appointment(appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Appointment cancelled",
        "appointment": cancelled,
    })))
}

/// Confirm or complete an appointment. Staff only; the state machine does
/// the rest.
#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.role.is_staff() {
        return Err(AppError::Forbidden(
            "Only clinic staff may change appointment status".to_string(),
        ));
    }

    let appointment = state
        .engine
        .transition_appointment(appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

// ==============================================================================
// DOCTOR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<SchedulingState>>,
) -> Result<Json<Value>, AppError> {
    let doctors = state.engine.doctors().await?;
    Ok(Json(json!(doctors)))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<SchedulingState>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let doctor = state.engine.doctor(doctor_id).await?;
    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn doctor_appointments(
    State(state): State<Arc<SchedulingState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DaySheetQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.role.is_staff() {
        return Err(AppError::Forbidden(
            "Only clinic staff may view a doctor's schedule".to_string(),
        ));
    }

    let appointments = state
        .engine
        .appointments_for_doctor(doctor_id, &query.date)
        .await?;

    Ok(Json(json!(appointments)))
}

/// Patients may only see their own records; staff see everything.
fn authorize_record_access(user: &User, appointment: &Appointment) -> Result<(), AppError> {
    if user.role.is_staff() || appointment.user_id == user.id {
        return Ok(());
    }

    Err(AppError::Forbidden(
        "Not authorized to access this appointment".to_string(),
    ))
}
