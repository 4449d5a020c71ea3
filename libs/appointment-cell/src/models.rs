// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;

use patient_cell::{PatientDraft, PatientError};
use shared_database::StoreError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reasons: Vec<String>,
    pub status: AppointmentStatus,
    #[serde(default = "default_first_visit", deserialize_with = "null_as_first_visit")]
    pub is_first_visit: bool,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_first_visit() -> bool {
    true
}

// Older rows may carry NULL in these columns.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_first_visit<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_else(default_first_visit))
}

/// Appointment lifecycle status. Serialized with the labels stored in the
/// `appointments.status` column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    #[serde(rename = "PROGRAMADA")]
    Scheduled,
    #[serde(rename = "CONFIRMADA")]
    Confirmed,
    #[serde(rename = "PRESENTE")]
    CheckedIn,
    #[serde(rename = "COMPLETADA")]
    Completed,
    #[serde(rename = "CANCELADA")]
    Cancelled,
    #[serde(rename = "NO_ASISTIO")]
    NoShow,
    #[serde(rename = "REAGENDADA")]
    Rescheduled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::Confirmed,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
        AppointmentStatus::Rescheduled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "PROGRAMADA",
            AppointmentStatus::Confirmed => "CONFIRMADA",
            AppointmentStatus::CheckedIn => "PRESENTE",
            AppointmentStatus::Completed => "COMPLETADA",
            AppointmentStatus::Cancelled => "CANCELADA",
            AppointmentStatus::NoShow => "NO_ASISTIO",
            AppointmentStatus::Rescheduled => "REAGENDADA",
        }
    }

    /// Whether an appointment in this status occupies its doctor's time slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown appointment status: {}", s))
    }
}

/// Lifecycle actions a caller may request on an appointment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentAction {
    Confirm,
    CheckIn,
    Complete,
    Cancel,
    NoShow,
    Reschedule,
    ViewHistory,
}

impl AppointmentAction {
    pub const ALL: [AppointmentAction; 7] = [
        AppointmentAction::Confirm,
        AppointmentAction::CheckIn,
        AppointmentAction::Complete,
        AppointmentAction::Cancel,
        AppointmentAction::NoShow,
        AppointmentAction::Reschedule,
        AppointmentAction::ViewHistory,
    ];
}

impl fmt::Display for AppointmentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentAction::Confirm => "confirm",
            AppointmentAction::CheckIn => "check_in",
            AppointmentAction::Complete => "complete",
            AppointmentAction::Cancel => "cancel",
            AppointmentAction::NoShow => "no_show",
            AppointmentAction::Reschedule => "reschedule",
            AppointmentAction::ViewHistory => "view_history",
        };
        f.write_str(name)
    }
}

// ==============================================================================
// STORE-FACING MODELS
// ==============================================================================

/// Query shape accepted by [`crate::services::store::AppointmentStore::find_appointments`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentFilter {
    pub doctor_id: Option<Uuid>,
    pub exact_timestamp: Option<DateTime<Utc>>,
    /// Inclusive lower bound on `scheduled_at`.
    pub scheduled_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `scheduled_at`.
    pub scheduled_until: Option<DateTime<Utc>>,
    pub exclude_id: Option<Uuid>,
    pub status_not_in: Vec<AppointmentStatus>,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(doctor_id) = self.doctor_id {
            if appointment.doctor_id != Some(doctor_id) {
                return false;
            }
        }
        if let Some(at) = self.exact_timestamp {
            if appointment.scheduled_at != at {
                return false;
            }
        }
        if let Some(from) = self.scheduled_from {
            if appointment.scheduled_at < from {
                return false;
            }
        }
        if let Some(until) = self.scheduled_until {
            if appointment.scheduled_at >= until {
                return false;
            }
        }
        if self.exclude_id == Some(appointment.id) {
            return false;
        }
        !self.status_not_in.contains(&appointment.status)
    }
}

/// Row written by the store when an appointment is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub reasons: Vec<String>,
    pub status: AppointmentStatus,
    pub is_first_visit: bool,
    pub notes: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDraft {
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub reasons: Vec<String>,
    pub is_first_visit: Option<bool>,
    pub notes: Option<String>,
}

impl AppointmentDraft {
    /// Trimmed, non-blank consultation reasons in their original order.
    pub fn normalized_reasons(&self) -> Vec<String> {
        self.reasons.iter()
            .map(|reason| reason.trim())
            .filter(|reason| !reason.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub patient: PatientDraft,
    pub appointment: AppointmentDraft,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmissionOutcome {
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateScheduleRequest {
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub limit: Option<usize>,
}

/// Outcome of a conflict check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ConflictCheck {
    Clear,
    Conflict { existing_appointment_id: Uuid },
}

impl ConflictCheck {
    pub fn has_conflict(&self) -> bool {
        matches!(self, ConflictCheck::Conflict { .. })
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleViolationKind {
    NotInPast,
    WeekdayDisallowed,
    OutsideBusinessHours,
    WithinExcludedWindow,
    InvalidSlotGranularity,
}

impl RuleViolationKind {
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolationKind::NotInPast => "NOT_IN_PAST",
            RuleViolationKind::WeekdayDisallowed => "WEEKDAY_DISALLOWED",
            RuleViolationKind::OutsideBusinessHours => "OUTSIDE_BUSINESS_HOURS",
            RuleViolationKind::WithinExcludedWindow => "WITHIN_EXCLUDED_WINDOW",
            RuleViolationKind::InvalidSlotGranularity => "INVALID_SLOT_GRANULARITY",
        }
    }
}

/// A proposed date-time breaks exactly one clinic scheduling rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{}: {}", .kind.code(), .reason)]
pub struct RuleViolation {
    pub kind: RuleViolationKind,
    pub reason: String,
}

impl RuleViolation {
    pub fn new(kind: RuleViolationKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Action {action} is not allowed from status {status}")]
    InvalidCurrentStatus {
        status: AppointmentStatus,
        action: AppointmentAction,
    },

    #[error("Reschedule requires a new date-time")]
    MissingRescheduleTime,

    #[error("Appointment not found")]
    NotFound,

    #[error("Rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    #[error("Appointment conflicts with existing booking {existing_appointment_id}")]
    ScheduleConflict { existing_appointment_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdmissionErrorKind {
    InvalidDraft,
    RuleViolation,
    ScheduleConflict,
    DuplicatePatient,
    PatientCreationFailed,
    AppointmentCreationFailed,
    TransientFailure,
    PersistenceFailure,
}

impl AdmissionErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionErrorKind::InvalidDraft => "INVALID_DRAFT",
            AdmissionErrorKind::RuleViolation => "RULE_VIOLATION",
            AdmissionErrorKind::ScheduleConflict => "SCHEDULE_CONFLICT",
            AdmissionErrorKind::DuplicatePatient => "DUPLICATE_PATIENT",
            AdmissionErrorKind::PatientCreationFailed => "PATIENT_CREATION_FAILED",
            AdmissionErrorKind::AppointmentCreationFailed => "APPOINTMENT_CREATION_FAILED",
            AdmissionErrorKind::TransientFailure => "TRANSIENT_FAILURE",
            AdmissionErrorKind::PersistenceFailure => "PERSISTENCE_FAILURE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Invalid admission draft: {0}")]
    InvalidDraft(String),

    #[error("Rule violation: {0}")]
    RuleViolation(#[from] RuleViolation),

    #[error("Appointment conflicts with existing booking {existing_appointment_id}")]
    ScheduleConflict { existing_appointment_id: Uuid },

    #[error("Patient already registered as {existing_patient_id}")]
    DuplicatePatient { existing_patient_id: Uuid },

    #[error("Patient creation failed: {0}")]
    PatientCreationFailed(StoreError),

    /// The appointment write failed after the patient was created. When the
    /// compensating patient delete also failed, `compensation_warning` says so.
    #[error("Appointment creation failed: {source}")]
    AppointmentCreationFailed {
        source: StoreError,
        compensation_warning: Option<String>,
    },

    #[error("Transient failure: {0}")]
    TransientFailure(String),

    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl AdmissionError {
    pub fn kind(&self) -> AdmissionErrorKind {
        match self {
            AdmissionError::InvalidDraft(_) => AdmissionErrorKind::InvalidDraft,
            AdmissionError::RuleViolation(_) => AdmissionErrorKind::RuleViolation,
            AdmissionError::ScheduleConflict { .. } => AdmissionErrorKind::ScheduleConflict,
            AdmissionError::DuplicatePatient { .. } => AdmissionErrorKind::DuplicatePatient,
            AdmissionError::PatientCreationFailed(_) => AdmissionErrorKind::PatientCreationFailed,
            AdmissionError::AppointmentCreationFailed { .. } => AdmissionErrorKind::AppointmentCreationFailed,
            AdmissionError::TransientFailure(_) => AdmissionErrorKind::TransientFailure,
            AdmissionError::PersistenceFailure(_) => AdmissionErrorKind::PersistenceFailure,
        }
    }

    /// Only network-level failures are worth retrying; validation failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdmissionError::TransientFailure(_) => true,
            AdmissionError::PatientCreationFailed(source) => source.is_transient(),
            AdmissionError::AppointmentCreationFailed { source, compensation_warning } => {
                source.is_transient() && compensation_warning.is_none()
            }
            _ => false,
        }
    }
}

impl From<StoreError> for AdmissionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(msg) => AdmissionError::TransientFailure(msg),
            other => AdmissionError::PersistenceFailure(other.to_string()),
        }
    }
}

impl From<PatientError> for AdmissionError {
    fn from(err: PatientError) -> Self {
        AdmissionError::InvalidDraft(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn rows_with_null_reasons_still_load() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "doctor_id": null,
            "scheduled_at": "2024-06-04T10:00:00Z",
            "reasons": null,
            "status": "PROGRAMADA",
            "is_first_visit": null,
            "notes": null,
            "created_at": null,
            "updated_at": null
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert!(appointment.reasons.is_empty());
        assert!(appointment.is_first_visit);

        let missing = serde_json::json!({
            "id": Uuid::new_v4(),
            "patient_id": Uuid::new_v4(),
            "scheduled_at": "2024-06-04T10:00:00Z",
            "status": "CONFIRMADA"
        });
        let appointment: Appointment = serde_json::from_value(missing).unwrap();
        assert!(appointment.reasons.is_empty());
        assert!(appointment.is_first_visit);
        assert_eq!(appointment.doctor_id, None);
    }

    #[test]
    fn status_uses_stored_labels() {
        let json = serde_json::to_string(&AppointmentStatus::NoShow).unwrap();
        assert_eq!(json, "\"NO_ASISTIO\"");

        let parsed: AppointmentStatus = serde_json::from_str("\"PRESENTE\"").unwrap();
        assert_eq!(parsed, AppointmentStatus::CheckedIn);

        assert!(serde_json::from_str::<AppointmentStatus>("\"pending\"").is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("reagendada".parse::<AppointmentStatus>(), Ok(AppointmentStatus::Rescheduled));
        assert!("unknown".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn filter_excludes_cancelled_and_self() {
        let at = Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap();
        let doctor_id = Uuid::new_v4();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Some(doctor_id),
            scheduled_at: at,
            reasons: vec!["Control".into()],
            status: AppointmentStatus::Scheduled,
            is_first_visit: true,
            notes: None,
            created_at: None,
            updated_at: None,
        };

        let filter = AppointmentFilter {
            doctor_id: Some(doctor_id),
            exact_timestamp: Some(at),
            status_not_in: vec![AppointmentStatus::Cancelled],
            ..AppointmentFilter::default()
        };
        assert!(filter.matches(&appointment));

        let cancelled = Appointment { status: AppointmentStatus::Cancelled, ..appointment.clone() };
        assert!(!filter.matches(&cancelled));

        let excluding_self = AppointmentFilter { exclude_id: Some(appointment.id), ..filter };
        assert!(!excluding_self.matches(&appointment));
    }

    #[test]
    fn reasons_are_trimmed_and_blank_ones_dropped() {
        let draft = AppointmentDraft {
            doctor_id: None,
            scheduled_at: Utc::now(),
            reasons: vec!["  Dolor ".into(), " ".into(), "Control".into()],
            is_first_visit: None,
            notes: None,
        };
        assert_eq!(draft.normalized_reasons(), vec!["Dolor".to_string(), "Control".to_string()]);
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(AdmissionError::TransientFailure("timeout".into()).is_retryable());
        assert!(!AdmissionError::ScheduleConflict { existing_appointment_id: Uuid::nil() }.is_retryable());
        assert_eq!(
            AdmissionError::from(StoreError::Transient("reset".into())).kind(),
            AdmissionErrorKind::TransientFailure
        );
        assert_eq!(
            AdmissionError::from(StoreError::Persistence("bad row".into())).kind(),
            AdmissionErrorKind::PersistenceFailure
        );
    }
}
