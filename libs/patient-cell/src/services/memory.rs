use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_database::StoreError;

use crate::models::{Patient, PatientDraft};
use crate::services::patient::PatientStore;

/// Process-local patient store with failure injection, for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: Mutex<HashMap<Uuid, Patient>>,
    create_failure: Mutex<Option<StoreError>>,
    delete_failure: Mutex<Option<StoreError>>,
    lookup_failure: Mutex<Option<StoreError>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, patient: Patient) {
        self.patients.lock().await.insert(patient.id, patient);
    }

    pub async fn get(&self, patient_id: Uuid) -> Option<Patient> {
        self.patients.lock().await.get(&patient_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.patients.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The next `create_patient` call fails with `err`.
    pub async fn fail_next_create(&self, err: StoreError) {
        *self.create_failure.lock().await = Some(err);
    }

    /// The next `delete_patient` call fails with `err`.
    pub async fn fail_next_delete(&self, err: StoreError) {
        *self.delete_failure.lock().await = Some(err);
    }

    /// The next duplicate lookup fails with `err`.
    pub async fn fail_next_lookup(&self, err: StoreError) {
        *self.lookup_failure.lock().await = Some(err);
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn find_patient_by_name_and_birth_date(
        &self,
        first_name: &str,
        last_name: &str,
        birth_date: NaiveDate,
    ) -> Result<Option<Patient>, StoreError> {
        if let Some(err) = self.lookup_failure.lock().await.take() {
            return Err(err);
        }

        let patients = self.patients.lock().await;
        Ok(patients.values()
            .find(|p| {
                p.birth_date == Some(birth_date)
                    && same_name(&p.first_name, first_name)
                    && same_name(&p.last_name, last_name)
            })
            .cloned())
    }

    async fn create_patient(&self, draft: &PatientDraft) -> Result<Patient, StoreError> {
        if let Some(err) = self.create_failure.lock().await.take() {
            return Err(err);
        }

        let now = Utc::now();
        let patient = Patient {
            id: Uuid::new_v4(),
            first_name: draft.first_name.trim().to_string(),
            last_name: draft.last_name.trim().to_string(),
            phone: draft.phone.clone(),
            email: draft.email.clone(),
            age: draft.age,
            birth_date: draft.birth_date,
            gender: draft.gender.clone(),
            diagnosis_code: draft.diagnosis_code.clone(),
            patient_status: None,
            created_at: Some(now),
            updated_at: Some(now),
        };

        self.patients.lock().await.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn delete_patient(&self, patient_id: Uuid) -> Result<(), StoreError> {
        if let Some(err) = self.delete_failure.lock().await.take() {
            return Err(err);
        }

        self.patients.lock().await.remove(&patient_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_lookup_ignores_case_and_padding() {
        let store = InMemoryPatientStore::new();
        let draft = PatientDraft {
            first_name: "Ana".into(),
            last_name: "López".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..PatientDraft::default()
        };
        let created = store.create_patient(&draft).await.unwrap();

        let found = store
            .find_patient_by_name_and_birth_date(" ana ", "LÓPEZ", NaiveDate::from_ymd_opt(1990, 5, 17).unwrap())
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id), Some(created.id));

        let other_date = store
            .find_patient_by_name_and_birth_date("Ana", "López", NaiveDate::from_ymd_opt(1991, 5, 17).unwrap())
            .await
            .unwrap();
        assert!(other_date.is_none());
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let store = InMemoryPatientStore::new();
        store.fail_next_create(StoreError::Transient("timeout".into())).await;

        let draft = PatientDraft { first_name: "A".into(), last_name: "B".into(), ..PatientDraft::default() };
        assert!(store.create_patient(&draft).await.is_err());
        assert!(store.create_patient(&draft).await.is_ok());
        assert_eq!(store.len().await, 1);
    }
}
