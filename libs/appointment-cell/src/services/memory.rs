// libs/appointment-cell/src/services/memory.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment};
use crate::services::store::AppointmentStore;

/// Process-local appointment store with failure injection.
///
/// Mirrors the database uniqueness rule: two appointments that occupy a slot
/// cannot share `(doctor_id, scheduled_at)`.
#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
    create_failure: Mutex<Option<StoreError>>,
    find_failure: Mutex<Option<StoreError>>,
    find_calls: AtomicUsize,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, appointment: Appointment) {
        self.appointments.lock().await.insert(appointment.id, appointment);
    }

    pub async fn get(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.appointments.lock().await.get(&appointment_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.appointments.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of `find_appointments` calls served so far.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub async fn fail_next_create(&self, err: StoreError) {
        *self.create_failure.lock().await = Some(err);
    }

    pub async fn fail_next_find(&self, err: StoreError) {
        *self.find_failure.lock().await = Some(err);
    }
}

fn slot_taken(
    appointments: &HashMap<Uuid, Appointment>,
    doctor_id: Option<Uuid>,
    scheduled_at: DateTime<Utc>,
    ignore_id: Option<Uuid>,
) -> bool {
    let Some(doctor_id) = doctor_id else {
        return false;
    };
    appointments.values().any(|existing| {
        Some(existing.id) != ignore_id
            && existing.doctor_id == Some(doctor_id)
            && existing.scheduled_at == scheduled_at
            && existing.status.occupies_slot()
    })
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.find_failure.lock().await.take() {
            return Err(err);
        }

        let appointments = self.appointments.lock().await;
        let mut found: Vec<Appointment> = appointments.values()
            .filter(|appointment| filter.matches(appointment))
            .cloned()
            .collect();
        found.sort_by_key(|appointment| appointment.scheduled_at);
        Ok(found)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.get(appointment_id).await)
    }

    async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        if let Some(err) = self.create_failure.lock().await.take() {
            return Err(err);
        }

        let mut appointments = self.appointments.lock().await;
        if appointment.status.occupies_slot()
            && slot_taken(&appointments, appointment.doctor_id, appointment.scheduled_at, None)
        {
            return Err(StoreError::Constraint(format!(
                "doctor {:?} already booked at {}",
                appointment.doctor_id, appointment.scheduled_at
            )));
        }

        let now = Utc::now();
        let created = Appointment {
            id: Uuid::new_v4(),
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
            scheduled_at: appointment.scheduled_at,
            reasons: appointment.reasons.clone(),
            status: appointment.status,
            is_first_visit: appointment.is_first_visit,
            notes: appointment.notes.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        appointments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        new_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.lock().await;

        let (doctor_id, current_at) = match appointments.get(&appointment_id) {
            Some(existing) => (existing.doctor_id, existing.scheduled_at),
            None => {
                return Err(StoreError::Persistence(format!(
                    "Appointment {} was not updated", appointment_id
                )))
            }
        };

        let scheduled_at = new_scheduled_at.unwrap_or(current_at);
        if status.occupies_slot() && slot_taken(&appointments, doctor_id, scheduled_at, Some(appointment_id)) {
            return Err(StoreError::Constraint(format!(
                "doctor {:?} already booked at {}", doctor_id, scheduled_at
            )));
        }

        let appointment = appointments.get_mut(&appointment_id)
            .ok_or_else(|| StoreError::Persistence(format!("Appointment {} vanished", appointment_id)))?;
        appointment.status = status;
        appointment.scheduled_at = scheduled_at;
        appointment.updated_at = Some(Utc::now());
        Ok(appointment.clone())
    }
}
