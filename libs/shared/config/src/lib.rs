use std::env;
use tracing::warn;

/// Raw clinic scheduling settings as read from the environment.
///
/// Parsing into a typed policy happens in the appointment cell so that a
/// malformed value is reported once, at the point the policy is built.
#[derive(Debug, Clone)]
pub struct ClinicSettings {
    pub utc_offset_minutes: i32,
    pub operating_days: String,
    pub open_time: String,
    pub close_time: String,
    pub lunch_start: Option<String>,
    pub lunch_end: Option<String>,
    pub slot_minutes: u32,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            operating_days: "mon,tue,wed,thu,fri,sat".to_string(),
            open_time: "09:00".to_string(),
            close_time: "15:00".to_string(),
            lunch_start: None,
            lunch_end: None,
            slot_minutes: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub request_timeout_secs: u64,
    pub api_port: u16,
    pub clinic: ClinicSettings,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = ClinicSettings::default();

        let clinic = ClinicSettings {
            utc_offset_minutes: parse_var("CLINIC_UTC_OFFSET_MINUTES", defaults.utc_offset_minutes),
            operating_days: env::var("CLINIC_OPERATING_DAYS")
                .unwrap_or(defaults.operating_days),
            open_time: env::var("CLINIC_OPEN_TIME").unwrap_or(defaults.open_time),
            close_time: env::var("CLINIC_CLOSE_TIME").unwrap_or(defaults.close_time),
            lunch_start: env::var("CLINIC_LUNCH_START").ok(),
            lunch_end: env::var("CLINIC_LUNCH_END").ok(),
            slot_minutes: parse_var("CLINIC_SLOT_MINUTES", defaults.slot_minutes),
        };

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            request_timeout_secs: parse_var("SUPABASE_REQUEST_TIMEOUT_SECS", 10),
            api_port: parse_var("API_PORT", 3000),
            clinic,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
