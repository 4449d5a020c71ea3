// libs/appointment-cell/src/policy.rs
use chrono::{FixedOffset, NaiveTime, Offset, Timelike, Utc, Weekday};
use thiserror::Error;

use shared_config::ClinicSettings;

/// Half-open time-of-day window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time < self.end
    }
}

/// Clinic scheduling policy. Injected per call so each deployment can carry
/// its own hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClinicPolicy {
    pub utc_offset: FixedOffset,
    pub operating_days: Vec<Weekday>,
    pub business_hours: TimeWindow,
    /// Interior break (e.g. lunch) during which no appointment may start.
    pub excluded_window: Option<TimeWindow>,
    pub slot_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("Invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("Unknown weekday {0:?}")]
    UnknownWeekday(String),

    #[error("At least one operating day is required")]
    NoOperatingDays,

    #[error("Business hours must close after they open")]
    EmptyBusinessHours,

    #[error("Excluded window must end after it starts")]
    EmptyExcludedWindow,

    #[error("Excluded window needs both a start and an end")]
    IncompleteExcludedWindow,

    #[error("Slot granularity {0} must divide 60 minutes")]
    InvalidSlotMinutes(u32),

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidUtcOffset(i32),
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl Default for ClinicPolicy {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            operating_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            business_hours: TimeWindow::new(hm(9, 0), hm(15, 0)),
            excluded_window: None,
            slot_minutes: 30,
        }
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, PolicyError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| PolicyError::InvalidTime(raw.to_string()))
}

impl ClinicPolicy {
    pub fn from_settings(settings: &ClinicSettings) -> Result<Self, PolicyError> {
        let utc_offset = settings.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(PolicyError::InvalidUtcOffset(settings.utc_offset_minutes))?;

        let operating_days = settings.operating_days
            .split(',')
            .map(str::trim)
            .filter(|day| !day.is_empty())
            .map(|day| day.parse::<Weekday>().map_err(|_| PolicyError::UnknownWeekday(day.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        let business_hours = TimeWindow::new(
            parse_time(&settings.open_time)?,
            parse_time(&settings.close_time)?,
        );

        let excluded_window = match (&settings.lunch_start, &settings.lunch_end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(parse_time(start)?, parse_time(end)?)),
            (None, None) => None,
            _ => return Err(PolicyError::IncompleteExcludedWindow),
        };

        let policy = Self {
            utc_offset,
            operating_days,
            business_hours,
            excluded_window,
            slot_minutes: settings.slot_minutes,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.operating_days.is_empty() {
            return Err(PolicyError::NoOperatingDays);
        }
        if self.business_hours.end <= self.business_hours.start {
            return Err(PolicyError::EmptyBusinessHours);
        }
        if let Some(window) = self.excluded_window {
            if window.end <= window.start {
                return Err(PolicyError::EmptyExcludedWindow);
            }
        }
        if self.slot_minutes == 0 || self.slot_minutes > 60 || 60 % self.slot_minutes != 0 {
            return Err(PolicyError::InvalidSlotMinutes(self.slot_minutes));
        }
        Ok(())
    }

    pub fn operates_on(&self, weekday: Weekday) -> bool {
        self.operating_days.contains(&weekday)
    }

    /// Start times of every slot in the business window, before the excluded
    /// window is taken into account.
    pub fn slot_starts(&self) -> Vec<NaiveTime> {
        let step = self.slot_minutes.max(1);
        let open = self.business_hours.start.num_seconds_from_midnight() / 60;
        let close = self.business_hours.end.num_seconds_from_midnight() / 60;
        let first = open.div_ceil(step) * step;

        (first..close)
            .step_by(step as usize)
            .filter_map(|minutes| NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0))
            .collect()
    }
}
