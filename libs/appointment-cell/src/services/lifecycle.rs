// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentAction, AppointmentStatus, ConflictCheck, TransitionError};
use crate::policy::ClinicPolicy;
use crate::services::conflict::ConflictDetectionService;
use crate::services::rules;
use crate::services::store::AppointmentStore;

/// Status an action leads to from `status`. `Ok(None)` means the action is
/// read-only and permitted.
pub fn transition_target(
    status: AppointmentStatus,
    action: AppointmentAction,
) -> Result<Option<AppointmentStatus>, TransitionError> {
    use AppointmentAction as A;
    use AppointmentStatus as S;

    let target = match (status, action) {
        (_, A::ViewHistory) => return Ok(None),

        (S::Scheduled | S::Rescheduled, A::Confirm) => S::Confirmed,
        (S::Scheduled | S::Confirmed | S::Rescheduled, A::CheckIn) => S::CheckedIn,
        (S::CheckedIn, A::Complete) => S::Completed,
        (S::Scheduled | S::Confirmed | S::Rescheduled, A::Cancel) => S::Cancelled,
        (S::Scheduled | S::Confirmed | S::Rescheduled, A::NoShow) => S::NoShow,
        (S::Scheduled | S::Confirmed | S::Cancelled | S::Rescheduled, A::Reschedule) => S::Rescheduled,

        // Every status is listed so that a new one has to be placed in the table.
        (
            S::Scheduled | S::Confirmed | S::CheckedIn | S::Completed | S::Cancelled | S::NoShow | S::Rescheduled,
            A::Confirm | A::CheckIn | A::Complete | A::Cancel | A::NoShow | A::Reschedule,
        ) => return Err(TransitionError::InvalidCurrentStatus { status, action }),
    };

    Ok(Some(target))
}

pub fn can_transition(status: AppointmentStatus, action: AppointmentAction) -> bool {
    transition_target(status, action).is_ok()
}

/// Actions accepted from `status`, `view_history` included.
pub fn allowed_actions(status: AppointmentStatus) -> Vec<AppointmentAction> {
    AppointmentAction::ALL
        .into_iter()
        .filter(|action| can_transition(status, *action))
        .collect()
}

/// Inputs needed by actions that re-validate the schedule.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub policy: &'a ClinicPolicy,
    pub now: DateTime<Utc>,
    /// New start time; required for `reschedule`.
    pub reschedule_to: Option<DateTime<Utc>>,
}

impl<'a> TransitionContext<'a> {
    pub fn new(policy: &'a ClinicPolicy, now: DateTime<Utc>) -> Self {
        Self { policy, now, reschedule_to: None }
    }

    pub fn rescheduling_to(mut self, scheduled_at: DateTime<Utc>) -> Self {
        self.reschedule_to = Some(scheduled_at);
        self
    }
}

pub struct AppointmentLifecycleService {
    store: Arc<dyn AppointmentStore>,
    conflict_service: ConflictDetectionService,
}

impl AppointmentLifecycleService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&store)),
            store,
        }
    }

    /// Apply `action` to `appointment` without persisting it.
    ///
    /// A reschedule re-runs the business rules and the conflict check for the
    /// new time, ignoring the appointment's own booking.
    pub async fn apply_transition(
        &self,
        appointment: &Appointment,
        action: AppointmentAction,
        context: &TransitionContext<'_>,
    ) -> Result<Appointment, TransitionError> {
        debug!("Applying {} to appointment {} in status {}", action, appointment.id, appointment.status);

        let target = match transition_target(appointment.status, action) {
            Ok(target) => target,
            Err(err) => {
                warn!("Invalid transition attempted on {}: {} from {}", appointment.id, action, appointment.status);
                return Err(err);
            }
        };

        let Some(target) = target else {
            return Ok(appointment.clone());
        };

        let mut updated = appointment.clone();
        updated.status = target;

        if action == AppointmentAction::Reschedule {
            let new_time = context.reschedule_to.ok_or(TransitionError::MissingRescheduleTime)?;

            rules::evaluate(new_time, context.policy, context.now)?;

            let conflict = self.conflict_service
                .check_conflict(appointment.doctor_id, new_time, Some(appointment.id))
                .await?;
            if let ConflictCheck::Conflict { existing_appointment_id } = conflict {
                return Err(TransitionError::ScheduleConflict { existing_appointment_id });
            }

            updated.scheduled_at = new_time;
        }

        Ok(updated)
    }

    /// Load, transition and persist an appointment.
    pub async fn perform_action(
        &self,
        appointment_id: Uuid,
        action: AppointmentAction,
        context: &TransitionContext<'_>,
    ) -> Result<Appointment, TransitionError> {
        let current = self.store.get_appointment(appointment_id).await?
            .ok_or(TransitionError::NotFound)?;

        let updated = self.apply_transition(&current, action, context).await?;
        if action == AppointmentAction::ViewHistory {
            return Ok(current);
        }

        let new_scheduled_at = (updated.scheduled_at != current.scheduled_at).then_some(updated.scheduled_at);
        let persisted = self.store
            .update_appointment_status(appointment_id, updated.status, new_scheduled_at)
            .await?;

        info!("Appointment {} moved {} -> {} via {}", appointment_id, current.status, persisted.status, action);
        Ok(persisted)
    }
}
