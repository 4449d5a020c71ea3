// libs/appointment-cell/src/services/conflict.rs
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use std::sync::Arc;
use shared_database::StoreError;

use crate::models::{AppointmentFilter, AppointmentStatus, ConflictCheck};
use crate::policy::ClinicPolicy;
use crate::services::rules;
use crate::services::store::AppointmentStore;

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Check whether `doctor_id` already holds a non-cancelled booking at
    /// exactly `scheduled_at`. Appointments without a doctor never conflict.
    pub async fn check_conflict(
        &self,
        doctor_id: Option<Uuid>,
        scheduled_at: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<ConflictCheck, StoreError> {
        let Some(doctor_id) = doctor_id else {
            debug!("No doctor assigned, skipping conflict check for {}", scheduled_at);
            return Ok(ConflictCheck::Clear);
        };

        debug!("Checking conflicts for doctor {} at {}", doctor_id, scheduled_at);

        let filter = AppointmentFilter {
            doctor_id: Some(doctor_id),
            exact_timestamp: Some(scheduled_at),
            exclude_id: exclude_appointment_id,
            status_not_in: vec![AppointmentStatus::Cancelled],
            ..AppointmentFilter::default()
        };

        let existing = self.store.find_appointments(&filter).await?;

        match existing.first() {
            Some(appointment) => {
                warn!("Conflict detected for doctor {} at {} with appointment {}",
                      doctor_id, scheduled_at, appointment.id);
                Ok(ConflictCheck::Conflict { existing_appointment_id: appointment.id })
            }
            None => Ok(ConflictCheck::Clear),
        }
    }

    /// Free slots on the clinic-local `date`, in order, that pass the business
    /// rules and are not taken by `doctor_id`.
    pub async fn suggest_slots(
        &self,
        doctor_id: Option<Uuid>,
        date: NaiveDate,
        policy: &ClinicPolicy,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        debug!("Suggesting up to {} slots on {} for doctor {:?}", limit, date, doctor_id);

        let candidates: Vec<DateTime<Utc>> = policy.slot_starts()
            .into_iter()
            .filter_map(|time| policy.utc_offset.from_local_datetime(&date.and_time(time)).single())
            .map(|local| local.with_timezone(&Utc))
            .filter(|candidate| rules::evaluate(*candidate, policy, now).is_ok())
            .collect();

        let taken: Vec<DateTime<Utc>> = match (doctor_id, candidates.first(), candidates.last()) {
            (Some(doctor_id), Some(first), Some(last)) => {
                let filter = AppointmentFilter {
                    doctor_id: Some(doctor_id),
                    scheduled_from: Some(*first),
                    scheduled_until: Some(*last + Duration::minutes(1)),
                    status_not_in: vec![AppointmentStatus::Cancelled],
                    ..AppointmentFilter::default()
                };
                self.store.find_appointments(&filter).await?
                    .into_iter()
                    .map(|appointment| appointment.scheduled_at)
                    .collect()
            }
            _ => Vec::new(),
        };

        Ok(candidates.into_iter()
            .filter(|candidate| !taken.contains(candidate))
            .take(limit)
            .collect())
    }
}
