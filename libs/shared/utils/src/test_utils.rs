use std::sync::Arc;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde_json::json;
use uuid::Uuid;

use shared_config::{AppConfig, ClinicSettings};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub clinic: ClinicSettings,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            clinic: ClinicSettings::default(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            request_timeout_secs: 5,
            api_port: 3000,
            clinic: self.clinic.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// The next occurrence of `weekday` strictly after `now`'s date, at the given
/// UTC wall-clock time.
pub fn next_weekday_at(now: DateTime<Utc>, weekday: Weekday, hour: u32, minute: u32) -> DateTime<Utc> {
    let mut date = now.date_naive() + Duration::days(1);
    while date.weekday() != weekday {
        date += Duration::days(1);
    }
    let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, first_name: &str, last_name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "first_name": first_name,
            "last_name": last_name,
            "phone": "+52 55 1234 5678",
            "email": "paciente@example.com",
            "age": 34,
            "birth_date": "1990-01-01",
            "gender": "F",
            "diagnosis_code": "K40",
            "estado_paciente": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: Option<&str>,
        scheduled_at: DateTime<Utc>,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "reasons": ["Dolor abdominal"],
            "status": status,
            "is_first_visit": true,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert_eq!(app_config.clinic.slot_minutes, 30);
    }

    #[test]
    fn next_weekday_skips_today() {
        // 2024-06-04 is a Tuesday
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 8, 0, 0).unwrap();
        let next = next_weekday_at(now, Weekday::Tue, 10, 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap());
    }

    #[test]
    fn appointment_response_carries_status() {
        let at = Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap();
        let body = MockSupabaseResponses::appointment_response("a", "p", None, at, "PROGRAMADA");
        assert_eq!(body["status"], "PROGRAMADA");
        assert!(body["doctor_id"].is_null());
    }
}
