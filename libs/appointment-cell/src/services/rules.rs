// libs/appointment-cell/src/services/rules.rs
use chrono::{DateTime, Datelike, Timelike, Utc};
use tracing::debug;

use crate::models::{RuleViolation, RuleViolationKind};
use crate::policy::ClinicPolicy;

/// Checks a proposed appointment start against clinic policy.
///
/// Rules run in a fixed order and the first failure wins: not in the past,
/// operating weekday, business hours, excluded window, slot granularity.
/// Weekday and time-of-day are read in the clinic's UTC offset.
#[derive(Debug, Clone)]
pub struct BusinessRuleEvaluator {
    policy: ClinicPolicy,
}

impl BusinessRuleEvaluator {
    pub fn new(policy: ClinicPolicy) -> Self {
        Self { policy }
    }

    pub fn evaluate(&self, scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), RuleViolation> {
        evaluate(scheduled_at, &self.policy, now)
    }
}

pub fn evaluate(
    scheduled_at: DateTime<Utc>,
    policy: &ClinicPolicy,
    now: DateTime<Utc>,
) -> Result<(), RuleViolation> {
    debug!("Evaluating schedule {} against clinic policy", scheduled_at);

    if scheduled_at < now {
        return Err(RuleViolation::new(
            RuleViolationKind::NotInPast,
            format!("Appointment time {} is in the past", scheduled_at.to_rfc3339()),
        ));
    }

    let local = scheduled_at.with_timezone(&policy.utc_offset);
    let weekday = local.weekday();
    if !policy.operates_on(weekday) {
        return Err(RuleViolation::new(
            RuleViolationKind::WeekdayDisallowed,
            format!("The clinic does not attend on {:?}", weekday),
        ));
    }

    let time = local.time();
    let hours = policy.business_hours;
    if !hours.contains(time) {
        return Err(RuleViolation::new(
            RuleViolationKind::OutsideBusinessHours,
            format!(
                "Appointments must start between {} and {}",
                hours.start.format("%H:%M"),
                hours.end.format("%H:%M"),
            ),
        ));
    }

    if let Some(window) = policy.excluded_window {
        if window.contains(time) {
            return Err(RuleViolation::new(
                RuleViolationKind::WithinExcludedWindow,
                format!(
                    "No appointments between {} and {}",
                    window.start.format("%H:%M"),
                    window.end.format("%H:%M"),
                ),
            ));
        }
    }

    let slot = policy.slot_minutes.max(1);
    if time.minute() % slot != 0 || time.second() != 0 || time.nanosecond() != 0 {
        return Err(RuleViolation::new(
            RuleViolationKind::InvalidSlotGranularity,
            format!("Appointments must start on a {}-minute boundary", slot),
        ));
    }

    Ok(())
}
