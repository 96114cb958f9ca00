use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::LeaveError;
use crate::leave::period::DateRange;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};

/// An existing request that blocks a proposed one.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Conflict {
    pub request_id: u64,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub end_date: NaiveDate,
    pub status: LeaveStatus,
}

impl From<&LeaveRequest> for Conflict {
    fn from(req: &LeaveRequest) -> Self {
        Conflict {
            request_id: req.id,
            start_date: req.start(),
            end_date: req.end(),
            status: req.status,
        }
    }
}

pub fn ranges_overlap(a: &DateRange, b: &DateRange) -> bool {
    a.overlaps(b)
}

/// Pending or approved requests of `employee_id` whose dates intersect
/// `proposed`. `exclude_request_id` skips the request being re-validated
/// after an edit.
pub fn find_conflicts<'a, I>(
    employee_id: u64,
    proposed: &DateRange,
    exclude_request_id: Option<u64>,
    all_requests: I,
) -> Vec<&'a LeaveRequest>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    all_requests
        .into_iter()
        .filter(|r| r.employee_id == employee_id)
        .filter(|r| exclude_request_id != Some(r.id))
        .filter(|r| r.status.holds_dates())
        .filter(|r| ranges_overlap(proposed, &r.period))
        .collect()
}

pub fn ensure_no_conflicts<'a, I>(
    employee_id: u64,
    proposed: &DateRange,
    exclude_request_id: Option<u64>,
    all_requests: I,
) -> Result<(), LeaveError>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let conflicts = find_conflicts(employee_id, proposed, exclude_request_id, all_requests);
    if conflicts.is_empty() {
        return Ok(());
    }

    Err(LeaveError::OverlappingRequest {
        conflicts: conflicts.into_iter().map(Conflict::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::fixtures::{date, request};

    fn range(a: NaiveDate, b: NaiveDate) -> DateRange {
        DateRange::new(a, b).unwrap()
    }

    #[test]
    fn overlap_is_symmetric_and_reflexive() {
        let samples = [
            range(date(4, 1), date(4, 5)),
            range(date(4, 5), date(4, 7)),
            range(date(4, 6), date(4, 10)),
            range(date(3, 28), date(4, 12)),
            DateRange::single(date(4, 5)),
        ];
        for a in &samples {
            assert!(ranges_overlap(a, a));
            for b in &samples {
                assert_eq!(ranges_overlap(a, b), ranges_overlap(b, a));
            }
        }
    }

    #[test]
    fn shared_boundary_day_conflicts() {
        let existing = vec![request(1, 10, 1, date(4, 1), date(4, 5), LeaveStatus::Approved)];
        let conflicts = find_conflicts(10, &range(date(4, 5), date(4, 7)), None, &existing);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, 1);
    }

    #[test]
    fn adjacent_ranges_do_not_conflict() {
        let existing = vec![request(1, 10, 1, date(4, 1), date(4, 5), LeaveStatus::Approved)];
        let conflicts = find_conflicts(10, &range(date(4, 6), date(4, 10)), None, &existing);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn identical_single_days_conflict() {
        let existing = vec![request(1, 10, 1, date(4, 3), date(4, 3), LeaveStatus::Pending)];
        let conflicts = find_conflicts(10, &DateRange::single(date(4, 3)), None, &existing);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn ignores_other_employees_rejected_and_excluded_requests() {
        let existing = vec![
            request(1, 10, 1, date(4, 1), date(4, 5), LeaveStatus::Rejected),
            request(2, 11, 1, date(4, 1), date(4, 5), LeaveStatus::Approved),
            request(3, 10, 1, date(4, 2), date(4, 3), LeaveStatus::Pending),
        ];
        let proposed = range(date(4, 1), date(4, 5));

        let conflicts = find_conflicts(10, &proposed, None, &existing);
        assert_eq!(conflicts.iter().map(|r| r.id).collect::<Vec<_>>(), vec![3]);

        assert!(find_conflicts(10, &proposed, Some(3), &existing).is_empty());
    }

    #[test]
    fn ensure_lists_conflicting_ranges() {
        let existing = vec![
            request(1, 10, 1, date(4, 1), date(4, 5), LeaveStatus::Approved),
            request(2, 10, 2, date(4, 7), date(4, 8), LeaveStatus::Pending),
        ];
        let err = ensure_no_conflicts(10, &range(date(4, 4), date(4, 7)), None, &existing).unwrap_err();

        match err {
            LeaveError::OverlappingRequest { conflicts } => {
                assert_eq!(conflicts.len(), 2);
                assert_eq!(conflicts[0].request_id, 1);
                assert_eq!(conflicts[0].start_date, date(4, 1));
                assert_eq!(conflicts[1].status, LeaveStatus::Pending);
            }
            other => panic!("unexpected error {other:?}"),
        }

        assert!(ensure_no_conflicts(10, &range(date(4, 9), date(4, 9)), None, &existing).is_ok());
    }
}
