use chrono::{Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScheduleError {
    #[error("duration must be at least one week")]
    InvalidDurationWeeks,

    #[error("duration of {0} weeks is longer than a class may run")]
    DurationTooLong(u32),

    #[error("unknown cadence: {0}")]
    UnknownCadence(String),
}

/// Longest course a schedule may describe, ten years of weekly sessions.
pub const MAX_DURATION_WEEKS: u32 = 520;

//
// ─── CADENCE ───────────────────────────────────────────────────────────────────
//

/// Repetition rule for session generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Weekly,
    /// Weekly candidates with every other one skipped.
    Biweekly,
    Monthly,
    /// Free-form schedule; generation walks weekly like `Weekly`.
    Custom,
}

impl Cadence {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Weekly => "weekly",
            Cadence::Biweekly => "biweekly",
            Cadence::Monthly => "monthly",
            Cadence::Custom => "custom",
        }
    }

    /// Whether a pinned weekday applies to this cadence.
    #[must_use]
    pub fn uses_weekday(self) -> bool {
        matches!(self, Cadence::Weekly | Cadence::Biweekly)
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Cadence::Weekly),
            "biweekly" => Ok(Cadence::Biweekly),
            "monthly" => Ok(Cadence::Monthly),
            "custom" => Ok(Cadence::Custom),
            other => Err(ScheduleError::UnknownCadence(other.to_owned())),
        }
    }
}

//
// ─── SCHEDULE ──────────────────────────────────────────────────────────────────
//

/// Schedule configuration embedded in a class.
///
/// `start_date` may be missing: a class can be created without a schedule and
/// have its sessions added by hand later. When `end_date` is missing it is
/// derived as `start_date + duration_weeks` weeks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSchedule {
    cadence: Cadence,
    target_weekday: Option<Weekday>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    duration_weeks: u32,
}

impl ClassSchedule {
    /// Creates a schedule without a pinned weekday or explicit end date.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidDurationWeeks` if `duration_weeks` is zero
    /// and `ScheduleError::DurationTooLong` above `MAX_DURATION_WEEKS`.
    pub fn new(
        cadence: Cadence,
        start_date: Option<NaiveDate>,
        duration_weeks: u32,
    ) -> Result<Self, ScheduleError> {
        Self::from_persisted(cadence, None, start_date, None, duration_weeks)
    }

    /// Rehydrates a schedule with every field supplied.
    ///
    /// An end date before the start date is accepted; it simply yields no
    /// sessions.
    ///
    /// # Errors
    ///
    /// Returns `ScheduleError::InvalidDurationWeeks` if `duration_weeks` is zero
    /// and `ScheduleError::DurationTooLong` above `MAX_DURATION_WEEKS`.
    pub fn from_persisted(
        cadence: Cadence,
        target_weekday: Option<Weekday>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        duration_weeks: u32,
    ) -> Result<Self, ScheduleError> {
        if duration_weeks == 0 {
            return Err(ScheduleError::InvalidDurationWeeks);
        }
        if duration_weeks > MAX_DURATION_WEEKS {
            return Err(ScheduleError::DurationTooLong(duration_weeks));
        }

        Ok(Self {
            cadence,
            target_weekday,
            start_date,
            end_date,
            duration_weeks,
        })
    }

    #[must_use]
    pub fn with_target_weekday(mut self, weekday: Weekday) -> Self {
        self.target_weekday = Some(weekday);
        self
    }

    #[must_use]
    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    #[must_use]
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    #[must_use]
    pub fn target_weekday(&self) -> Option<Weekday> {
        self.target_weekday
    }

    #[must_use]
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    #[must_use]
    pub fn duration_weeks(&self) -> u32 {
        self.duration_weeks
    }

    /// The end date as configured, without derivation.
    #[must_use]
    pub fn explicit_end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    /// The explicit end date, or `start_date + duration_weeks` weeks.
    ///
    /// Returns `None` only when there is no start date to derive from.
    #[must_use]
    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date.or_else(|| self.derived_end_date())
    }

    /// Last date on which a session may fall.
    ///
    /// An explicit end date is itself eligible. A derived end date is the first
    /// day after the course, so the bound is the day before it.
    #[must_use]
    pub fn last_eligible_date(&self) -> Option<NaiveDate> {
        match self.end_date {
            Some(end) => Some(end),
            None => self.derived_end_date().and_then(|end| end.pred_opt()),
        }
    }

    /// Pinned weekday, if it applies to this schedule's cadence.
    #[must_use]
    pub fn effective_weekday(&self) -> Option<Weekday> {
        self.target_weekday.filter(|_| self.cadence.uses_weekday())
    }

    fn derived_end_date(&self) -> Option<NaiveDate> {
        let start = self.start_date?;
        let days = u64::from(self.duration_weeks) * 7;
        Some(start.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_zero_duration() {
        let err = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 0).unwrap_err();
        assert_eq!(err, ScheduleError::InvalidDurationWeeks);
    }

    #[test]
    fn rejects_durations_beyond_the_cap() {
        let start = Some(date(2024, 1, 1));
        assert!(ClassSchedule::new(Cadence::Weekly, start, MAX_DURATION_WEEKS).is_ok());
        let err = ClassSchedule::new(Cadence::Weekly, start, 4_000_000_000).unwrap_err();
        assert_eq!(err, ScheduleError::DurationTooLong(4_000_000_000));
    }

    #[test]
    fn end_date_is_derived_from_duration() {
        let schedule = ClassSchedule::new(Cadence::Weekly, Some(date(2024, 1, 1)), 4).unwrap();
        assert_eq!(schedule.end_date(), Some(date(2024, 1, 29)));
        assert_eq!(schedule.last_eligible_date(), Some(date(2024, 1, 28)));
        assert_eq!(schedule.explicit_end_date(), None);
    }

    #[test]
    fn explicit_end_date_is_inclusive() {
        let schedule = ClassSchedule::new(Cadence::Monthly, Some(date(2024, 1, 15)), 1)
            .unwrap()
            .with_end_date(date(2024, 4, 15));
        assert_eq!(schedule.end_date(), Some(date(2024, 4, 15)));
        assert_eq!(schedule.last_eligible_date(), Some(date(2024, 4, 15)));
    }

    #[test]
    fn no_start_means_no_bounds() {
        let schedule = ClassSchedule::new(Cadence::Weekly, None, 8).unwrap();
        assert_eq!(schedule.end_date(), None);
        assert_eq!(schedule.last_eligible_date(), None);
    }

    #[test]
    fn weekday_only_applies_to_weekly_cadences() {
        let weekly = ClassSchedule::new(Cadence::Biweekly, Some(date(2024, 1, 1)), 4)
            .unwrap()
            .with_target_weekday(Weekday::Wed);
        assert_eq!(weekly.effective_weekday(), Some(Weekday::Wed));

        let monthly = ClassSchedule::new(Cadence::Monthly, Some(date(2024, 1, 1)), 4)
            .unwrap()
            .with_target_weekday(Weekday::Wed);
        assert_eq!(monthly.effective_weekday(), None);
        assert_eq!(monthly.target_weekday(), Some(Weekday::Wed));
    }

    #[test]
    fn cadence_parses_case_insensitively() {
        assert_eq!("Biweekly".parse::<Cadence>().unwrap(), Cadence::Biweekly);
        assert_eq!(Cadence::Monthly.to_string(), "monthly");
        assert!(matches!(
            "daily".parse::<Cadence>(),
            Err(ScheduleError::UnknownCadence(_))
        ));
    }
}
