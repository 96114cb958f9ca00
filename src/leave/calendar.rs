use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::leave::period::DateRange;
use crate::model::leave_request::LeaveRequest;

/// Per-day view of leave requests over a window.
pub struct CalendarIndex<'a> {
    days: BTreeMap<NaiveDate, Vec<&'a LeaveRequest>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total: usize,
    /// Request count keyed by leave type id
    pub by_leave_type: BTreeMap<u64, usize>,
}

fn ordered<'a>(mut requests: Vec<&'a LeaveRequest>) -> Vec<&'a LeaveRequest> {
    requests.sort_by_key(|r| (r.start(), r.id));
    requests
}

impl<'a> CalendarIndex<'a> {
    /// Puts every request on each day of its range that falls inside
    /// `window`. Callers usually pass approved requests only.
    pub fn build<I>(requests: I, window: DateRange) -> Self
    where
        I: IntoIterator<Item = &'a LeaveRequest>,
    {
        let mut days: BTreeMap<NaiveDate, Vec<&'a LeaveRequest>> = BTreeMap::new();

        for req in requests {
            let Some(visible) = req.period.intersect(&window) else {
                continue;
            };
            for day in visible.days() {
                days.entry(day).or_default().push(req);
            }
        }

        for bucket in days.values_mut() {
            bucket.sort_by_key(|r| (r.start(), r.id));
        }

        Self { days }
    }

    pub fn on(&self, day: NaiveDate) -> Vec<&'a LeaveRequest> {
        self.days.get(&day).cloned().unwrap_or_default()
    }

    /// Union of the buckets for `[from, to]`, each request once.
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> Vec<&'a LeaveRequest> {
        if from > to {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let found = self
            .days
            .range(from..=to)
            .flat_map(|(_, bucket)| bucket.iter().copied())
            .filter(|r| seen.insert(r.id))
            .collect();
        ordered(found)
    }

    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &[&'a LeaveRequest])> + '_ {
        self.days.iter().map(|(day, bucket)| (*day, bucket.as_slice()))
    }

    pub fn day_summaries(&self) -> Vec<DaySummary> {
        self.days
            .iter()
            .map(|(day, bucket)| {
                let mut by_leave_type = BTreeMap::new();
                for r in bucket {
                    *by_leave_type.entry(r.leave_type_id).or_insert(0) += 1;
                }
                DaySummary {
                    date: *day,
                    total: bucket.len(),
                    by_leave_type,
                }
            })
            .collect()
    }
}

/// Requests starting on or after `today`, soonest first.
pub fn upcoming<'a, I>(requests: I, today: NaiveDate, limit: usize) -> Vec<&'a LeaveRequest>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let mut found = ordered(requests.into_iter().filter(|r| r.start() >= today).collect());
    found.truncate(limit);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::LeaveStatus;
    use crate::model::leave_request::fixtures::{date, request};

    fn april() -> DateRange {
        DateRange::month_of(date(4, 1))
    }

    #[test]
    fn request_lands_on_every_day_of_its_range_and_nowhere_else() {
        let reqs = vec![
            request(1, 1, 1, date(4, 3), date(4, 6), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 10), date(4, 10), LeaveStatus::Approved),
        ];
        let index = CalendarIndex::build(&reqs, april());

        for day in april().days() {
            let ids: Vec<u64> = index.on(day).iter().map(|r| r.id).collect();
            assert_eq!(ids.contains(&1), reqs[0].period.contains(day), "day {day}");
            assert_eq!(ids.contains(&2), reqs[1].period.contains(day), "day {day}");
        }
    }

    #[test]
    fn requests_are_clipped_to_the_window() {
        let reqs = vec![request(1, 1, 1, date(3, 29), date(4, 2), LeaveStatus::Approved)];
        let index = CalendarIndex::build(&reqs, april());

        assert!(index.on(date(3, 31)).is_empty());
        assert_eq!(index.days().count(), 2);
    }

    #[test]
    fn range_query_is_deduplicated_and_ordered() {
        let reqs = vec![
            request(5, 1, 1, date(4, 2), date(4, 4), LeaveStatus::Approved),
            request(3, 2, 1, date(4, 2), date(4, 2), LeaveStatus::Approved),
            request(9, 3, 2, date(4, 1), date(4, 8), LeaveStatus::Approved),
        ];
        let index = CalendarIndex::build(&reqs, april());

        let ids: Vec<u64> = index.between(date(4, 1), date(4, 5)).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 3, 5]);

        let ids: Vec<u64> = index.on(date(4, 2)).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![9, 3, 5]);

        assert!(index.between(date(4, 5), date(4, 1)).is_empty());
    }

    #[test]
    fn summaries_count_per_leave_type() {
        let reqs = vec![
            request(1, 1, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 2), date(4, 2), LeaveStatus::Approved),
            request(3, 3, 7, date(4, 2), date(4, 3), LeaveStatus::Approved),
        ];
        let summaries = CalendarIndex::build(&reqs, april()).day_summaries();

        assert_eq!(summaries.len(), 3);
        let second = &summaries[1];
        assert_eq!(second.date, date(4, 2));
        assert_eq!(second.total, 3);
        assert_eq!(second.by_leave_type.get(&1), Some(&2));
        assert_eq!(second.by_leave_type.get(&7), Some(&1));
    }

    #[test]
    fn upcoming_skips_started_requests_and_limits() {
        let reqs = vec![
            request(1, 1, 1, date(4, 1), date(4, 9), LeaveStatus::Approved),
            request(2, 1, 1, date(4, 20), date(4, 21), LeaveStatus::Approved),
            request(3, 2, 1, date(4, 12), date(4, 12), LeaveStatus::Approved),
            request(4, 3, 1, date(4, 15), date(4, 16), LeaveStatus::Approved),
        ];
        let ids: Vec<u64> = upcoming(&reqs, date(4, 10), 2).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }
}
