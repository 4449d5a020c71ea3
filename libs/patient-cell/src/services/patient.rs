use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{return_representation, StoreError, SupabaseClient};

use crate::models::{Patient, PatientDraft};

/// Patient persistence as seen by the admission flow.
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_patient_by_name_and_birth_date(
        &self,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
    ) -> Result<Option<Patient>, StoreError>;

    async fn create_patient(&self, draft: &PatientDraft) -> Result<Patient, StoreError>;

    /// Only used to compensate a failed admission.
    async fn delete_patient(&self, patient_id: Uuid) -> Result<(), StoreError>;
}

/// `patients` table behind PostgREST, scoped to the caller's bearer token so
/// row-level security applies.
pub struct SupabasePatientStore {
    supabase: Arc<SupabaseClient>,
    auth_token: String,
}

impl SupabasePatientStore {
    pub fn new(supabase: Arc<SupabaseClient>, auth_token: impl Into<String>) -> Self {
        Self {
            supabase,
            auth_token: auth_token.into(),
        }
    }
}

/// Escape PostgREST pattern metacharacters so `ilike` acts as a
/// case-insensitive equality.
fn ilike_exact(value: &str) -> String {
    let escaped = value.trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    urlencoding::encode(&escaped).into_owned()
}

#[async_trait]
impl PatientStore for SupabasePatientStore {
    async fn find_patient_by_name_and_birth_date(
        &self,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
    ) -> Result<Option<Patient>, StoreError> {
        debug!("Looking up existing patient {} {} born {}", first_name, last_name, birth_date);

        let path = format!(
            "/rest/v1/patients?first_name=ilike.{}&last_name=ilike.{}&birth_date=eq.{}&limit=1",
            ilike_exact(first_name),
            ilike_exact(last_name),
            birth_date.format("%Y-%m-%d"),
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        match result.into_iter().next() {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    async fn create_patient(&self, draft: &PatientDraft) -> Result<Patient, StoreError> {
        debug!("Creating patient record for {} {}", draft.first_name, draft.last_name);

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "first_name": draft.first_name.trim(),
            "last_name": draft.last_name.trim(),
            "phone": draft.phone,
            "email": draft.email,
            "age": draft.age,
            "birth_date": draft.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "gender": draft.gender,
            "diagnosis_code": draft.diagnosis_code,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(&self.auth_token),
            Some(patient_data),
            Some(return_representation()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| StoreError::Persistence("Failed to create patient record".to_string()))?;

        let patient: Patient = serde_json::from_value(row)?;
        info!("Patient record created with ID: {}", patient.id);

        Ok(patient)
    }

    async fn delete_patient(&self, patient_id: Uuid) -> Result<(), StoreError> {
        debug!("Deleting patient record {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.supabase.execute(
            Method::DELETE,
            &path,
            Some(&self.auth_token),
            None,
        ).await?;

        Ok(())
    }
}
