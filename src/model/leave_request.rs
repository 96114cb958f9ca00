use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::LeaveError;
use crate::leave::period::DateRange;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize, ToSchema, EnumString, AsRefStr, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }

    /// Pending and approved requests hold their dates against new applications.
    pub fn holds_dates(self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayPortion {
    #[default]
    FullDay,
    HalfDay,
}

impl DayPortion {
    pub fn from_full_day(is_full_day: bool) -> Self {
        if is_full_day {
            DayPortion::FullDay
        } else {
            DayPortion::HalfDay
        }
    }

    pub fn is_full_day(self) -> bool {
        self == DayPortion::FullDay
    }

    /// Share of a calendar day charged against the balance.
    pub fn factor(self) -> f64 {
        match self {
            DayPortion::FullDay => 1.0,
            DayPortion::HalfDay => 0.5,
        }
    }
}

/// A leave request as the engine sees it. Built once from a
/// [`LeaveRequestRow`] so the date range is already known to be valid.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub period: DateRange,
    pub portion: DayPortion,
    pub reason: String,
    pub document: Option<String>,
    pub status: LeaveStatus,
    pub requested_at: DateTime<Utc>,
    pub approver_id: Option<u64>,
    pub approver_comment: Option<String>,
    /// Days taken from the balance when the request was approved
    pub debited_days: Option<f64>,
}

impl LeaveRequest {
    pub fn start(&self) -> NaiveDate {
        self.period.start()
    }

    pub fn end(&self) -> NaiveDate {
        self.period.end()
    }

    /// Default debit: inclusive calendar days scaled by the day portion.
    pub fn debit_days(&self) -> f64 {
        self.period.calendar_days() as f64 * self.portion.factor()
    }

    /// Days counted in reports: what was debited, or what would be.
    pub fn reported_days(&self) -> f64 {
        self.debited_days.unwrap_or_else(|| self.debit_days())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaveRequestRow {
    pub id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_full_day: bool,
    pub reason: Option<String>,
    pub document: Option<String>,
    pub status: String,
    pub requested_at: DateTime<Utc>,
    pub approver_id: Option<u64>,
    pub approver_comment: Option<String>,
    pub debited_days: Option<f64>,
}

impl TryFrom<LeaveRequestRow> for LeaveRequest {
    type Error = LeaveError;

    fn try_from(row: LeaveRequestRow) -> Result<Self, Self::Error> {
        let status = LeaveStatus::from_str(&row.status).map_err(|_| LeaveError::MalformedRecord {
            field: "status",
            value: row.status.clone(),
        })?;

        Ok(LeaveRequest {
            id: row.id,
            employee_id: row.employee_id,
            leave_type_id: row.leave_type_id,
            period: DateRange::new(row.start_date, row.end_date)?,
            portion: DayPortion::from_full_day(row.is_full_day),
            reason: row.reason.unwrap_or_default(),
            document: row.document,
            status,
            requested_at: row.requested_at,
            approver_id: row.approver_id,
            approver_comment: row.approver_comment,
            debited_days: row.debited_days,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    pub fn request(
        id: u64,
        employee_id: u64,
        leave_type_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        status: LeaveStatus,
    ) -> LeaveRequest {
        LeaveRequest {
            id,
            employee_id,
            leave_type_id,
            period: DateRange::new(start, end).unwrap(),
            portion: DayPortion::FullDay,
            reason: String::new(),
            document: None,
            status,
            requested_at: DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap(),
            approver_id: None,
            approver_comment: None,
            debited_days: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{date, request};
    use super::*;

    fn row(status: &str, start: NaiveDate, end: NaiveDate) -> LeaveRequestRow {
        LeaveRequestRow {
            id: 7,
            employee_id: 1,
            leave_type_id: 2,
            start_date: start,
            end_date: end,
            is_full_day: false,
            reason: None,
            document: Some("doctor-note.pdf".into()),
            status: status.into(),
            requested_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            approver_id: None,
            approver_comment: None,
            debited_days: None,
        }
    }

    #[test]
    fn row_normalizes_into_request() {
        let req = LeaveRequest::try_from(row("pending", date(4, 1), date(4, 2))).unwrap();
        assert_eq!(req.status, LeaveStatus::Pending);
        assert_eq!(req.portion, DayPortion::HalfDay);
        assert_eq!(req.reason, "");
        assert_eq!(req.debit_days(), 1.0);
    }

    #[test]
    fn row_with_inverted_dates_is_rejected() {
        let err = LeaveRequest::try_from(row("APPROVED", date(4, 3), date(4, 1))).unwrap_err();
        assert!(matches!(err, LeaveError::InvalidDateRange { .. }));
    }

    #[test]
    fn row_with_unknown_status_is_malformed() {
        let err = LeaveRequest::try_from(row("CANCELLED", date(4, 1), date(4, 1))).unwrap_err();
        assert!(matches!(err, LeaveError::MalformedRecord { field: "status", .. }));
    }

    #[test]
    fn reported_days_prefers_the_recorded_debit() {
        let mut req = request(1, 1, 1, date(4, 1), date(4, 5), LeaveStatus::Approved);
        assert_eq!(req.reported_days(), 5.0);
        req.debited_days = Some(3.0);
        assert_eq!(req.reported_days(), 3.0);
    }

    #[test]
    fn only_pending_is_open() {
        assert!(!LeaveStatus::Pending.is_terminal());
        assert!(LeaveStatus::Approved.is_terminal());
        assert!(LeaveStatus::Rejected.is_terminal());
        assert!(!LeaveStatus::Rejected.holds_dates());
    }
}
