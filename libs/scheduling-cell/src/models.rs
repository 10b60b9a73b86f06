use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_models::error::AppError;

// ==============================================================================
// CALENDAR PRIMITIVES
// ==============================================================================

/// Days from the Common Era to 1970-01-01, used to anchor `CanonicalDay`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A calendar day with no time-of-day component, stored as days since the
/// Unix epoch. This is the booking key: it never crosses a UTC/local
/// normalization boundary, so two requests for "2025-03-03" always collide
/// on the same integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalDay(pub i32);

impl CanonicalDay {
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
    }

    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_num_days_from_ce_opt(self.0 + UNIX_EPOCH_DAYS_FROM_CE)
    }

    /// Parse a `YYYY-MM-DD` string. Anything else is an invalid calendar
    /// date, including real-looking but impossible dates like 2025-02-30.
    pub fn parse(input: &str) -> Result<Self, SchedulingError> {
        NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
            .map(Self::from_naive)
            .map_err(|_| SchedulingError::InvalidDate(input.to_string()))
    }

    pub fn today() -> Self {
        Self::from_naive(Utc::now().date_naive())
    }

    /// The clinic weekday for this date, if it falls on a working day.
    pub fn clinic_day(self) -> Option<ClinicDay> {
        self.to_naive().and_then(|d| ClinicDay::from_weekday(d.weekday()))
    }

    /// Human-readable form used in confirmations, e.g. "Monday, March 3, 2025".
    pub fn format_long(self) -> String {
        match self.to_naive() {
            Some(date) => format!(
                "{}, {} {}, {}",
                date.format("%A"),
                date.format("%B"),
                date.day(),
                date.year()
            ),
            None => format!("day {}", self.0),
        }
    }
}

impl fmt::Display for CanonicalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_naive() {
            Some(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            None => write!(f, "day {}", self.0),
        }
    }
}

/// Working days the clinic offers recurring slots on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClinicDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl ClinicDay {
    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(ClinicDay::Monday),
            Weekday::Tue => Some(ClinicDay::Tuesday),
            Weekday::Wed => Some(ClinicDay::Wednesday),
            Weekday::Thu => Some(ClinicDay::Thursday),
            Weekday::Fri => Some(ClinicDay::Friday),
            Weekday::Sat | Weekday::Sun => None,
        }
    }
}

impl fmt::Display for ClinicDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClinicDay::Monday => write!(f, "Monday"),
            ClinicDay::Tuesday => write!(f, "Tuesday"),
            ClinicDay::Wednesday => write!(f, "Wednesday"),
            ClinicDay::Thursday => write!(f, "Thursday"),
            ClinicDay::Friday => write!(f, "Friday"),
        }
    }
}

/// Minute-of-day (0–1439) a recurring slot starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotTime(pub u16);

impl SlotTime {
    pub const MINUTES_PER_DAY: u16 = 1440;

    pub fn from_hm(hour: u16, minute: u16) -> Self {
        Self(hour * 60 + minute)
    }

    pub fn is_valid(self) -> bool {
        self.0 < Self::MINUTES_PER_DAY
    }

    /// Current minute of the UTC day.
    pub fn now() -> Self {
        let now = Utc::now();
        Self((now.hour() * 60 + now.minute()) as u16)
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ==============================================================================
// PERSISTED ENTITIES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
}

/// A recurring weekly offering (day-of-week + time), not tied to a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day: ClinicDay,
    pub time_of_day: SlotTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Whether an appointment in this status holds its slot. Cancelled
    /// appointments free the slot for re-booking on the same date.
    pub fn blocks_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_template_id: Uuid,
    pub user_id: String,
    pub date: CanonicalDay,
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields of an appointment-to-be, handed to the ledger's atomic create.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub doctor_id: Uuid,
    pub slot_template_id: Uuid,
    pub user_id: String,
    pub date: CanonicalDay,
    pub reason: String,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub slot_template_id: Uuid,
    /// Calendar date as `YYYY-MM-DD`.
    pub date: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub doctor_name: String,
    pub formatted_date: String,
    pub formatted_time: String,
}

/// One row of the availability view. Advisory only: a snapshot that may be
/// stale by the time a booking lands; the ledger has the final word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub slot_template_id: Uuid,
    pub time_of_day: SlotTime,
    pub is_booked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("This time slot is already booked")]
    SlotAlreadyBooked,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Invalid calendar date: {0}")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match &err {
            SchedulingError::Validation(_) => AppError::ValidationError(err.to_string()),
            SchedulingError::NotFound(_) => AppError::NotFound(err.to_string()),
            SchedulingError::SlotAlreadyBooked => AppError::Conflict(err.to_string()),
            SchedulingError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
            SchedulingError::InvalidDate(_) => AppError::BadRequest(err.to_string()),
            SchedulingError::Storage(_) => AppError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_day_round_trips() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let day = CanonicalDay::from_naive(date);
        assert_eq!(day.to_naive(), Some(date));
        assert_eq!(day.to_string(), "2025-03-03");
        assert_eq!(day.clinic_day(), Some(ClinicDay::Monday));
    }

    #[test]
    fn epoch_is_day_zero() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(CanonicalDay::from_naive(epoch), CanonicalDay(0));
    }

    #[test]
    fn parse_rejects_malformed_dates() {
        assert_eq!(
            CanonicalDay::parse("not-a-date"),
            Err(SchedulingError::InvalidDate("not-a-date".to_string()))
        );
        assert!(CanonicalDay::parse("2025-02-30").is_err());
        assert!(CanonicalDay::parse("2025-03-03").is_ok());
    }

    #[test]
    fn weekend_has_no_clinic_day() {
        // 2025-03-01 is a Saturday
        let sat = CanonicalDay::parse("2025-03-01").unwrap();
        assert_eq!(sat.clinic_day(), None);
    }

    #[test]
    fn slot_time_formats_as_wall_clock() {
        assert_eq!(SlotTime::from_hm(9, 0).to_string(), "09:00");
        assert_eq!(SlotTime::from_hm(14, 30).to_string(), "14:30");
    }

    #[test]
    fn confirmation_date_matches_display_format() {
        let day = CanonicalDay::parse("2025-03-03").unwrap();
        assert_eq!(day.format_long(), "Monday, March 3, 2025");
    }
}
