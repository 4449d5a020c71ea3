use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus};

/// Monday 2024-06-03 08:00 UTC.
pub fn monday_morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
}

/// 2024-06-`day` at `hour:minute` UTC; June 4th is a Tuesday, June 9th a Sunday.
pub fn june(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, hour, minute, 0).unwrap()
}

pub fn appointment(doctor_id: Option<Uuid>, scheduled_at: DateTime<Utc>, status: AppointmentStatus) -> Appointment {
    Appointment {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        doctor_id,
        scheduled_at,
        reasons: vec!["Control".to_string()],
        status,
        is_first_visit: true,
        notes: None,
        created_at: None,
        updated_at: None,
    }
}
