// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::handlers;
use crate::policy::{ClinicPolicy, PolicyError};

/// Shared state for the appointment routes.
#[derive(Clone)]
pub struct AppointmentState {
    pub policy: Arc<ClinicPolicy>,
    pub supabase: Arc<SupabaseClient>,
}

impl AppointmentState {
    pub fn from_config(config: &AppConfig) -> Result<Self, PolicyError> {
        Ok(Self {
            policy: Arc::new(ClinicPolicy::from_settings(&config.clinic)?),
            supabase: Arc::new(SupabaseClient::new(config)),
        })
    }
}

pub fn appointment_routes(config: Arc<AppConfig>) -> Result<Router, PolicyError> {
    let state = AppointmentState::from_config(&config)?;

    Ok(Router::new()
        // Admission and schedule validation
        .route("/admissions", post(handlers::admit_patient))
        .route("/validate", post(handlers::validate_schedule))
        .route("/conflicts/check", get(handlers::check_conflict))
        .route("/slots", get(handlers::suggest_slots))

        // Lifecycle
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/check-in", post(handlers::check_in_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))

        .with_state(state))
}
