use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

use crate::error::LeaveError;

/// Inclusive calendar-day range. Construction guarantees `start <= end`,
/// so nothing downstream has to handle an inverted range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    #[serde(rename = "start_date")]
    start: NaiveDate,
    #[serde(rename = "end_date")]
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, LeaveError> {
        if start > end {
            return Err(LeaveError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// First to last day of the month containing `day`.
    pub fn month_of(day: NaiveDate) -> Self {
        let start = day.with_day(1).unwrap_or(day);
        let next_month = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(start);
        Self { start, end }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Inclusive-bounds intersection test.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(DateRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// `end - start + 1`
    pub fn calendar_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Days in the range that fall Monday to Friday.
    pub fn working_days(&self) -> i64 {
        self.days()
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as i64
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        let err = DateRange::new(date(2025, 4, 5), date(2025, 4, 1)).unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDateRange { .. }));
    }

    #[test]
    fn counts_are_inclusive() {
        let range = DateRange::new(date(2025, 4, 1), date(2025, 4, 5)).unwrap();
        assert_eq!(range.calendar_days(), 5);
        assert_eq!(DateRange::single(date(2025, 4, 1)).calendar_days(), 1);
        assert_eq!(range.days().count(), 5);
    }

    #[test]
    fn working_days_skip_weekends() {
        // Fri 4 Apr 2025 to Mon 7 Apr 2025
        let range = DateRange::new(date(2025, 4, 4), date(2025, 4, 7)).unwrap();
        assert_eq!(range.calendar_days(), 4);
        assert_eq!(range.working_days(), 2);
    }

    #[test]
    fn month_of_handles_december_and_leap_years() {
        let dec = DateRange::month_of(date(2025, 12, 17));
        assert_eq!(dec.start(), date(2025, 12, 1));
        assert_eq!(dec.end(), date(2025, 12, 31));

        let feb = DateRange::month_of(date(2024, 2, 10));
        assert_eq!(feb.end(), date(2024, 2, 29));
    }

    #[test]
    fn intersection_clips_to_shared_days() {
        let a = DateRange::new(date(2025, 4, 1), date(2025, 4, 5)).unwrap();
        let b = DateRange::new(date(2025, 4, 5), date(2025, 4, 9)).unwrap();
        assert_eq!(a.intersect(&b), Some(DateRange::single(date(2025, 4, 5))));

        let c = DateRange::new(date(2025, 4, 6), date(2025, 4, 9)).unwrap();
        assert_eq!(a.intersect(&c), None);
    }
}
