//! Working hours and holiday calendar

use std::collections::BTreeMap;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::TimeInterval;

/// Daily working window in a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkingHours {
    #[serde(default = "default_day_start")]
    pub start: NaiveTime,
    #[serde(default = "default_day_end")]
    pub end: NaiveTime,
    #[serde(default = "default_working_days")]
    pub working_days: Vec<Weekday>,
    /// Offset of the local calendar from UTC, in minutes
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self {
            start: default_day_start(),
            end: default_day_end(),
            working_days: default_working_days(),
            utc_offset_minutes: 0,
        }
    }
}

impl WorkingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        let hours = Self {
            start,
            end,
            ..Self::default()
        };
        hours.validate()?;
        Ok(hours)
    }

    #[must_use]
    pub fn with_working_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.working_days = days.into_iter().collect();
        self
    }

    #[must_use]
    pub const fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| Utc.fix())
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.working_days.contains(&date.weekday())
    }

    /// The working window on `date`, or `None` on non-working days.
    pub fn window_on(&self, date: NaiveDate) -> Option<TimeInterval> {
        if !self.is_working_day(date) {
            return None;
        }
        let start = local_to_utc(self.offset(), date, self.start)?;
        let end = local_to_utc(self.offset(), date, self.end)?;
        TimeInterval::new(start, end).ok()
    }

    /// Whether `interval` fits entirely inside one working window.
    pub fn contains(&self, interval: &TimeInterval) -> bool {
        self.window_on(self.local_date(interval.start()))
            .is_some_and(|window| {
                window.start() <= interval.start() && interval.end() <= window.end()
            })
    }

    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(Error::InvalidPolicy(format!(
                "working hours start {} must be before end {}",
                self.start, self.end
            )));
        }
        if self.working_days.is_empty() {
            return Err(Error::InvalidPolicy(
                "working hours need at least one working day".to_string(),
            ));
        }
        if FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)).is_none() {
            return Err(Error::InvalidPolicy(format!(
                "utc offset of {} minutes is out of range",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }
}

/// A named non-working date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: String,
}

/// Public holidays, keyed by local date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Holiday>", into = "Vec<Holiday>")]
pub struct HolidayCalendar {
    holidays: BTreeMap<NaiveDate, String>,
}

impl From<Vec<Holiday>> for HolidayCalendar {
    fn from(holidays: Vec<Holiday>) -> Self {
        Self {
            holidays: holidays
                .into_iter()
                .map(|holiday| (holiday.date, holiday.name))
                .collect(),
        }
    }
}

impl From<HolidayCalendar> for Vec<Holiday> {
    fn from(calendar: HolidayCalendar) -> Self {
        calendar
            .holidays
            .into_iter()
            .map(|(date, name)| Holiday { date, name })
            .collect()
    }
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single holiday
    pub fn add_holiday(&mut self, date: NaiveDate, name: impl Into<String>) {
        self.holidays.insert(date, name.into());
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains_key(&date)
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }

    /// Holidays touched by `interval`, with the part of the interval falling on each.
    pub fn holidays_within(
        &self,
        interval: &TimeInterval,
        offset: FixedOffset,
    ) -> Vec<(NaiveDate, &str, TimeInterval)> {
        if self.holidays.is_empty() {
            return Vec::new();
        }

        let first = interval.start().with_timezone(&offset).date_naive();
        let last = interval.end().with_timezone(&offset).date_naive();
        let mut hits = Vec::new();
        let mut date = first;
        while date <= last {
            if let Some(name) = self.holidays.get(&date) {
                let day = date
                    .checked_add_days(Days::new(1))
                    .and_then(|next| {
                        let start = local_to_utc(offset, date, NaiveTime::default())?;
                        let end = local_to_utc(offset, next, NaiveTime::default())?;
                        TimeInterval::new(start, end).ok()
                    });
                if let Some(overlap) = day.and_then(|day| day.intersection(interval)) {
                    hits.push((date, name.as_str(), overlap));
                }
            }
            let Some(next) = date.checked_add_days(Days::new(1)) else {
                break;
            };
            date = next;
        }
        hits
    }
}

fn local_to_utc(offset: FixedOffset, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
}

fn default_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

fn default_day_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()
}

fn default_working_days() -> Vec<Weekday> {
    vec![
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn weekend_has_no_window() {
        let hours = WorkingHours::default();
        // 2025-03-01 is a Saturday
        assert!(hours.window_on(date(1)).is_none());
        let monday = hours.window_on(date(3)).unwrap();
        assert_eq!(monday.start(), utc(3, 9, 0));
        assert_eq!(monday.end(), utc(3, 17, 0));
    }

    #[test]
    fn offset_shifts_window_into_utc() {
        let hours = WorkingHours::default()
            .with_working_days([Weekday::Sun, Weekday::Mon])
            .with_utc_offset_minutes(180);
        let window = hours.window_on(date(2)).unwrap();
        assert_eq!(window.start(), utc(2, 6, 0));
        assert_eq!(window.end(), utc(2, 14, 0));
    }

    #[test]
    fn contains_requires_whole_interval_inside() {
        let hours = WorkingHours::default();
        let inside = TimeInterval::new(utc(3, 9, 0), utc(3, 10, 0)).unwrap();
        let spills = TimeInterval::new(utc(3, 16, 30), utc(3, 17, 30)).unwrap();
        assert!(hours.contains(&inside));
        assert!(!hours.contains(&spills));
    }

    #[test]
    fn rejects_inverted_hours() {
        let start = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        let end = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert!(WorkingHours::new(start, end).is_err());
    }

    #[test]
    fn holidays_within_clips_to_the_day() {
        let mut calendar = HolidayCalendar::new();
        calendar.add_holiday(date(4), "National Day");
        let interval = TimeInterval::new(utc(3, 22, 0), utc(4, 2, 0)).unwrap();
        let hits = calendar.holidays_within(&interval, Utc.fix());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].1, "National Day");
        assert_eq!(hits[0].2.start(), utc(4, 0, 0));
        assert_eq!(hits[0].2.end(), utc(4, 2, 0));
    }

    #[test]
    fn holiday_calendar_deserializes_from_list() {
        let calendar: HolidayCalendar =
            serde_json::from_str(r#"[{"date":"2025-03-04","name":"National Day"}]"#).unwrap();
        assert!(calendar.is_holiday(date(4)));
        assert!(!calendar.is_holiday(date(5)));
    }
}
