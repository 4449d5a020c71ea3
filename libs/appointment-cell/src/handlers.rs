// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde::Deserialize;
use serde_json::{json, Value};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use patient_cell::SupabasePatientStore;
use shared_database::StoreError;
use shared_models::error::AppError;

use crate::models::{
    AdmissionError, AdmissionRequest, AppointmentAction, AppointmentStatus, ConflictCheck,
    RescheduleAppointmentRequest, SlotQuery, TransitionError, ValidateScheduleRequest,
};
use crate::router::AppointmentState;
use crate::services::{
    allowed_actions, evaluate, AdmissionService, AppointmentLifecycleService, ConflictDetectionService,
    SupabaseAppointmentStore, TransitionContext,
};

const DEFAULT_SLOT_SUGGESTIONS: usize = 5;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: Option<Uuid>,
    pub scheduled_at: DateTime<Utc>,
    pub exclude_appointment_id: Option<Uuid>,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn store_error(e: StoreError) -> AppError {
    match e {
        StoreError::Transient(msg) => AppError::ServiceUnavailable(msg),
        StoreError::Constraint(msg) => AppError::conflict("CONSTRAINT_VIOLATION", msg, None),
        StoreError::Persistence(msg) => AppError::Database(msg),
    }
}

fn admission_error(e: AdmissionError) -> AppError {
    let code = e.kind().code();
    match e {
        AdmissionError::InvalidDraft(msg) => AppError::validation(code, msg),
        AdmissionError::RuleViolation(violation) => AppError::validation(violation.kind.code(), violation.reason),
        AdmissionError::ScheduleConflict { existing_appointment_id } => AppError::conflict(
            code,
            "Appointment slot is already booked for this doctor",
            Some(json!({ "existing_appointment_id": existing_appointment_id })),
        ),
        AdmissionError::DuplicatePatient { existing_patient_id } => AppError::conflict(
            code,
            "A patient with the same name and birth date already exists",
            Some(json!({ "existing_patient_id": existing_patient_id })),
        ),
        AdmissionError::TransientFailure(msg) => AppError::ServiceUnavailable(msg),
        AdmissionError::PatientCreationFailed(source) if source.is_transient() => {
            AppError::ServiceUnavailable(source.to_string())
        }
        AdmissionError::AppointmentCreationFailed { source, compensation_warning: Some(warning) } => {
            AppError::Database(format!("{}; {}", source, warning))
        }
        AdmissionError::AppointmentCreationFailed { source, compensation_warning: None } if source.is_transient() => {
            AppError::ServiceUnavailable(source.to_string())
        }
        other => AppError::Database(other.to_string()),
    }
}

fn transition_error(e: TransitionError) -> AppError {
    match e {
        TransitionError::InvalidCurrentStatus { status, action } => AppError::conflict(
            "INVALID_CURRENT_STATUS",
            format!("Cannot {} an appointment in status {}", action, status),
            Some(json!({ "status": status, "action": action })),
        ),
        TransitionError::MissingRescheduleTime => {
            AppError::BadRequest("new_scheduled_at is required to reschedule".to_string())
        }
        TransitionError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        TransitionError::RuleViolation(violation) => AppError::validation(violation.kind.code(), violation.reason),
        TransitionError::ScheduleConflict { existing_appointment_id } => AppError::conflict(
            "SCHEDULE_CONFLICT",
            "Appointment slot is already booked for this doctor",
            Some(json!({ "existing_appointment_id": existing_appointment_id })),
        ),
        TransitionError::Store(e) => store_error(e),
    }
}

fn appointment_store(state: &AppointmentState, token: &str) -> Arc<SupabaseAppointmentStore> {
    Arc::new(SupabaseAppointmentStore::new(Arc::clone(&state.supabase), token))
}

// ==============================================================================
// ADMISSION & SCHEDULE VALIDATION HANDLERS
// ==============================================================================

/// Create a patient and their first appointment in one step.
#[axum::debug_handler]
pub async fn admit_patient(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AdmissionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();

    let service = AdmissionService::new(
        appointment_store(&state, token),
        Arc::new(SupabasePatientStore::new(Arc::clone(&state.supabase), token)),
        state.policy.as_ref().clone(),
    );

    let outcome = service.admit(&request.patient, &request.appointment, Utc::now())
        .await
        .map_err(admission_error)?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "patient_id": outcome.patient_id,
        "appointment_id": outcome.appointment_id,
        "status": AppointmentStatus::Scheduled,
    }))))
}

#[axum::debug_handler]
pub async fn validate_schedule(
    State(state): State<AppointmentState>,
    Json(request): Json<ValidateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let body = match evaluate(request.scheduled_at, &state.policy, Utc::now()) {
        Ok(()) => json!({ "valid": true }),
        Err(violation) => json!({
            "valid": false,
            "violation": violation,
        }),
    };

    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn check_conflict(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConflictDetectionService::new(appointment_store(&state, auth.token()));

    let check = service.check_conflict(query.doctor_id, query.scheduled_at, query.exclude_appointment_id)
        .await
        .map_err(store_error)?;

    let existing_appointment_id = match check {
        ConflictCheck::Conflict { existing_appointment_id } => Some(existing_appointment_id),
        ConflictCheck::Clear => None,
    };

    Ok(Json(json!({
        "has_conflict": check.has_conflict(),
        "existing_appointment_id": existing_appointment_id,
    })))
}

#[axum::debug_handler]
pub async fn suggest_slots(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ConflictDetectionService::new(appointment_store(&state, auth.token()));
    let limit = query.limit.unwrap_or(DEFAULT_SLOT_SUGGESTIONS);

    let slots = service.suggest_slots(query.doctor_id, query.date, &state.policy, Utc::now(), limit)
        .await
        .map_err(store_error)?;

    Ok(Json(json!({
        "date": query.date,
        "doctor_id": query.doctor_id,
        "slots": slots,
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

async fn run_action(
    state: &AppointmentState,
    token: &str,
    appointment_id: Uuid,
    action: AppointmentAction,
    reschedule_to: Option<DateTime<Utc>>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentLifecycleService::new(appointment_store(state, token));

    let mut context = TransitionContext::new(&state.policy, Utc::now());
    if let Some(new_time) = reschedule_to {
        context = context.rescheduling_to(new_time);
    }

    let appointment = service.perform_action(appointment_id, action, &context)
        .await
        .map_err(transition_error)?;

    Ok(Json(json!({
        "appointment": appointment,
        "allowed_actions": allowed_actions(appointment.status),
    })))
}

/// Read-only view; always permitted regardless of status.
#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::ViewHistory, None).await
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::Confirm, None).await
}

#[axum::debug_handler]
pub async fn check_in_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::CheckIn, None).await
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::Complete, None).await
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::Cancel, None).await
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    run_action(&state, auth.token(), appointment_id, AppointmentAction::NoShow, None).await
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<AppointmentState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    run_action(
        &state,
        auth.token(),
        appointment_id,
        AppointmentAction::Reschedule,
        Some(request.new_scheduled_at),
    ).await
}
