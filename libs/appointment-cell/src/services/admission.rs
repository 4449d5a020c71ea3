// libs/appointment-cell/src/services/admission.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use patient_cell::{PatientDraft, PatientStore};
use shared_database::StoreError;

use crate::models::{
    AdmissionError, AdmissionOutcome, AppointmentDraft, AppointmentStatus, ConflictCheck, NewAppointment,
};
use crate::policy::ClinicPolicy;
use crate::services::conflict::ConflictDetectionService;
use crate::services::rules;
use crate::services::store::AppointmentStore;

/// Creates a patient together with their first appointment.
///
/// Steps run strictly in order and the first failure short-circuits the rest.
/// The only rollback is deleting the freshly created patient when the
/// appointment write fails; if that delete fails too it is logged and
/// reported on the error, never retried.
pub struct AdmissionService {
    appointments: Arc<dyn AppointmentStore>,
    patients: Arc<dyn PatientStore>,
    conflict_service: ConflictDetectionService,
    policy: ClinicPolicy,
}

impl AdmissionService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        patients: Arc<dyn PatientStore>,
        policy: ClinicPolicy,
    ) -> Self {
        Self {
            conflict_service: ConflictDetectionService::new(Arc::clone(&appointments)),
            appointments,
            patients,
            policy,
        }
    }

    pub async fn admit(
        &self,
        patient: &PatientDraft,
        appointment: &AppointmentDraft,
        now: DateTime<Utc>,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        info!("Admitting patient {} {} for {}", patient.first_name, patient.last_name, appointment.scheduled_at);

        patient.validate()?;
        let reasons = appointment.normalized_reasons();
        if reasons.is_empty() {
            return Err(AdmissionError::InvalidDraft("at least one consultation reason is required".to_string()));
        }

        // **Step 1: Business rules**
        rules::evaluate(appointment.scheduled_at, &self.policy, now)?;

        // **Step 2: Doctor conflict**
        if let ConflictCheck::Conflict { existing_appointment_id } = self.conflict_service
            .check_conflict(appointment.doctor_id, appointment.scheduled_at, None)
            .await?
        {
            return Err(AdmissionError::ScheduleConflict { existing_appointment_id });
        }

        // **Step 3: Duplicate patient**
        if let Some((first_name, last_name, birth_date)) = patient.identity() {
            if let Some(existing) = self.patients
                .find_patient_by_name_and_birth_date(first_name, last_name, birth_date)
                .await?
            {
                warn!("Duplicate patient detected: {}", existing.id);
                return Err(AdmissionError::DuplicatePatient { existing_patient_id: existing.id });
            }
        }

        // **Step 4: Patient record**
        let created_patient = self.patients.create_patient(patient).await
            .map_err(|e| {
                error!("Patient creation failed: {}", e);
                AdmissionError::PatientCreationFailed(e)
            })?;

        // **Step 5: Appointment record**
        let new_appointment = NewAppointment {
            patient_id: created_patient.id,
            doctor_id: appointment.doctor_id,
            scheduled_at: appointment.scheduled_at,
            reasons,
            status: AppointmentStatus::Scheduled,
            is_first_visit: appointment.is_first_visit.unwrap_or(true),
            notes: appointment.notes.clone(),
        };

        match self.appointments.create_appointment(&new_appointment).await {
            Ok(created) => {
                info!("Admission completed: patient {} appointment {}", created_patient.id, created.id);
                Ok(AdmissionOutcome {
                    patient_id: created_patient.id,
                    appointment_id: created.id,
                })
            }
            Err(source) => {
                error!("Appointment creation failed for patient {}: {}", created_patient.id, source);
                let compensation_warning = self.compensate(created_patient.id).await;

                if compensation_warning.is_none() && matches!(source, StoreError::Constraint(_)) {
                    if let Some(existing_appointment_id) = self.lost_race(appointment).await {
                        return Err(AdmissionError::ScheduleConflict { existing_appointment_id });
                    }
                }

                Err(AdmissionError::AppointmentCreationFailed { source, compensation_warning })
            }
        }
    }

    /// Delete the patient created earlier in this admission. Returns a warning
    /// when the delete failed and the patient record is left behind.
    async fn compensate(&self, patient_id: Uuid) -> Option<String> {
        debug!("Compensating admission by deleting patient {}", patient_id);

        match self.patients.delete_patient(patient_id).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Compensating delete of patient {} failed, record left orphaned: {}", patient_id, e);
                Some(format!("patient {} could not be removed after the failed admission: {}", patient_id, e))
            }
        }
    }

    /// After the store rejected the insert on a uniqueness rule, find the
    /// booking that won the slot.
    async fn lost_race(&self, appointment: &AppointmentDraft) -> Option<Uuid> {
        match self.conflict_service
            .check_conflict(appointment.doctor_id, appointment.scheduled_at, None)
            .await
        {
            Ok(ConflictCheck::Conflict { existing_appointment_id }) => Some(existing_appointment_id),
            Ok(ConflictCheck::Clear) => None,
            Err(e) => {
                debug!("Could not identify conflicting booking: {}", e);
                None
            }
        }
    }
}
