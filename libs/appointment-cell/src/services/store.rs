// libs/appointment-cell/src/services/store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{return_representation, StoreError, SupabaseClient};

use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment};

/// Appointment persistence consumed by the scheduling core.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError>;

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        new_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Appointment, StoreError>;
}

/// `appointments` table behind PostgREST.
///
/// Double booking is ultimately prevented by the database, which is expected
/// to carry a partial unique index on `(doctor_id, scheduled_at)` for rows
/// whose status is not `CANCELADA`; a rejected insert surfaces as
/// [`StoreError::Constraint`].
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(StoreError::from)
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// PostgREST query string for a filter.
pub fn filter_query(filter: &AppointmentFilter) -> String {
    let mut query_parts = Vec::new();

    if let Some(doctor_id) = filter.doctor_id {
        query_parts.push(format!("doctor_id=eq.{}", doctor_id));
    }
    if let Some(at) = filter.exact_timestamp {
        query_parts.push(format!("scheduled_at=eq.{}", timestamp(at)));
    }
    if let Some(from) = filter.scheduled_from {
        query_parts.push(format!("scheduled_at=gte.{}", timestamp(from)));
    }
    if let Some(until) = filter.scheduled_until {
        query_parts.push(format!("scheduled_at=lt.{}", timestamp(until)));
    }
    if let Some(exclude_id) = filter.exclude_id {
        query_parts.push(format!("id=neq.{}", exclude_id));
    }
    if !filter.status_not_in.is_empty() {
        let statuses: Vec<&str> = filter.status_not_in.iter().map(|s| s.as_str()).collect();
        query_parts.push(format!("status=not.in.({})", statuses.join(",")));
    }

    query_parts.push("order=scheduled_at.asc".to_string());
    query_parts.join("&")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?{}", filter_query(filter));
        debug!("Querying appointments: {}", path);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Self::parse_rows(result)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Ok(Self::parse_rows(result)?.into_iter().next())
    }

    async fn create_appointment(&self, appointment: &NewAppointment) -> Result<Appointment, StoreError> {
        debug!("Creating appointment for patient {} at {}", appointment.patient_id, appointment.scheduled_at);

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "scheduled_at": timestamp(appointment.scheduled_at),
            "reasons": appointment.reasons,
            "status": appointment.status,
            "is_first_visit": appointment.is_first_visit,
            "notes": appointment.notes,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(&self.auth_token),
            Some(appointment_data),
            Some(return_representation()),
        ).await?;

        let created = Self::parse_rows(result)?.into_iter().next()
            .ok_or_else(|| StoreError::Persistence("Failed to create appointment record".to_string()))?;

        info!("Appointment record created with ID: {}", created.id);
        Ok(created)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        new_scheduled_at: Option<DateTime<Utc>>,
    ) -> Result<Appointment, StoreError> {
        debug!("Updating appointment {} to status {}", appointment_id, status);

        let mut update_data = serde_json::Map::new();
        update_data.insert("status".to_string(), json!(status));
        if let Some(at) = new_scheduled_at {
            update_data.insert("scheduled_at".to_string(), json!(timestamp(at)));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(&self.auth_token),
            Some(Value::Object(update_data)),
            Some(return_representation()),
        ).await?;

        Self::parse_rows(result)?.into_iter().next()
            .ok_or_else(|| StoreError::Persistence(format!("Appointment {} was not updated", appointment_id)))
    }
}
