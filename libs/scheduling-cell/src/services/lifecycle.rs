use tracing::{debug, warn};

use crate::models::{AppointmentStatus, SchedulingError};

/// Valid next statuses for a given current status. Cancelled and completed
/// are terminal.
pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Pending => {
            &[AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Confirmed => {
            &[AppointmentStatus::Cancelled, AppointmentStatus::Completed]
        }
        AppointmentStatus::Cancelled | AppointmentStatus::Completed => &[],
    }
}

pub fn validate_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), SchedulingError> {
    debug!("Validating status transition {} -> {}", from, to);

    if !valid_transitions(from).contains(&to) {
        warn!("Invalid status transition attempted: {} -> {}", from, to);
        return Err(SchedulingError::InvalidTransition { from, to });
    }

    Ok(())
}
