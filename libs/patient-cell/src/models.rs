use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    /// Principal diagnosis code.
    pub diagnosis_code: Option<String>,
    /// Patient-level status, independent of any appointment's status.
    #[serde(rename = "estado_paciente")]
    pub patient_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub age: Option<i32>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub diagnosis_code: Option<String>,
}

impl PatientDraft {
    pub fn validate(&self) -> Result<(), PatientError> {
        if self.first_name.trim().is_empty() {
            return Err(PatientError::ValidationError("first name is required".to_string()));
        }
        if self.last_name.trim().is_empty() {
            return Err(PatientError::ValidationError("last name is required".to_string()));
        }
        if let Some(age) = self.age {
            if !(0..=150).contains(&age) {
                return Err(PatientError::ValidationError(format!("age {} is out of range", age)));
            }
        }
        Ok(())
    }

    /// Identity key used for duplicate detection, present only when a birth
    /// date was captured.
    pub fn identity(&self) -> Option<(&str, &str, NaiveDate)> {
        self.birth_date
            .map(|birth_date| (self.first_name.trim(), self.last_name.trim(), birth_date))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatientError {
    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PatientDraft {
        PatientDraft {
            first_name: "Ana".to_string(),
            last_name: "López".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..PatientDraft::default()
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut patient = draft();
        patient.last_name = "   ".to_string();
        assert!(patient.validate().is_err());
    }

    #[test]
    fn identity_requires_birth_date() {
        let mut patient = draft();
        assert!(patient.identity().is_some());
        patient.birth_date = None;
        assert!(patient.identity().is_none());
    }
}
