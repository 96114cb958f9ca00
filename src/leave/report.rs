//! Read-only statistics over loaded collections. Joins are by id; a missing
//! employee, department or leave type shows up as [`UNKNOWN`].

use std::collections::HashMap;
use std::io;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::leave_type::{DEFAULT_COLOR, LeaveType};
use crate::model::role::Role;

pub const UNKNOWN: &str = "Unknown";

const CSV_HEADERS: [&str; 8] = [
    "Employee",
    "Department",
    "Leave Type",
    "From",
    "To",
    "Days",
    "Status",
    "Remaining Balance",
];

/// Percentage of the annual allocation already used, 0 to 100.
pub fn usage_percent(employee: &Employee, leave_type: &LeaveType) -> u8 {
    let allocation = leave_type.default_days;
    if allocation.is_nan() || allocation <= 0.0 {
        return 0;
    }
    let used = allocation - employee.balance(leave_type.id);
    (100.0 * used / allocation).round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct ReportFilter {
    /// Only requests of employees in this department
    pub department_id: Option<u64>,
    pub leave_type_id: Option<u64>,
    pub status: Option<LeaveStatus>,
}

impl ReportFilter {
    pub fn apply<'a>(&self, requests: &'a [LeaveRequest], employees: &[Employee]) -> Vec<&'a LeaveRequest> {
        let departments: HashMap<u64, Option<u64>> =
            employees.iter().map(|e| (e.id, e.department_id)).collect();

        requests
            .iter()
            .filter(|r| self.leave_type_id.is_none_or(|id| r.leave_type_id == id))
            .filter(|r| self.status.is_none_or(|s| r.status == s))
            .filter(|r| match self.department_id {
                None => true,
                Some(dept) => departments.get(&r.employee_id).copied().flatten() == Some(dept),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeTotal {
    pub employee_id: u64,
    pub name: String,
    pub days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DepartmentTotal {
    pub department_id: Option<u64>,
    pub name: String,
    pub days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct LeaveTypeTotal {
    pub leave_type_id: u64,
    pub name: String,
    pub color: String,
    pub days: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BalanceTotal {
    pub leave_type_id: u64,
    pub name: String,
    pub color: String,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Dashboard {
    pub pending_requests: usize,
    pub approved_requests: usize,
    pub rejected_requests: usize,
    pub staff_count: usize,
}

fn by_days_desc(a: f64, b: f64) -> std::cmp::Ordering {
    b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
}

/// Total requested days per employee, largest first.
pub fn by_employee<'a, I>(requests: I, employees: &[Employee], approved_only: bool) -> Vec<EmployeeTotal>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let names: HashMap<u64, &str> = employees.iter().map(|e| (e.id, e.name.as_str())).collect();
    let mut totals: HashMap<u64, f64> = HashMap::new();

    for r in requests {
        if approved_only && r.status != LeaveStatus::Approved {
            continue;
        }
        *totals.entry(r.employee_id).or_insert(0.0) += r.reported_days();
    }

    let mut rows: Vec<EmployeeTotal> = totals
        .into_iter()
        .map(|(employee_id, days)| EmployeeTotal {
            employee_id,
            name: names.get(&employee_id).copied().unwrap_or(UNKNOWN).to_string(),
            days,
        })
        .collect();
    rows.sort_by(|a, b| by_days_desc(a.days, b.days).then(a.employee_id.cmp(&b.employee_id)));
    rows
}

/// Approved days per department, joined through each request's employee.
pub fn by_department<'a, I>(requests: I, employees: &[Employee], departments: &[Department]) -> Vec<DepartmentTotal>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let employee_dept: HashMap<u64, Option<u64>> = employees.iter().map(|e| (e.id, e.department_id)).collect();
    let names: HashMap<u64, &str> = departments.iter().map(|d| (d.id, d.name.as_str())).collect();
    let mut totals: HashMap<Option<u64>, f64> = HashMap::new();

    for r in requests {
        if r.status != LeaveStatus::Approved {
            continue;
        }
        let dept = employee_dept.get(&r.employee_id).copied().flatten();
        *totals.entry(dept).or_insert(0.0) += r.reported_days();
    }

    let mut rows: Vec<DepartmentTotal> = totals
        .into_iter()
        .map(|(department_id, days)| DepartmentTotal {
            department_id,
            name: department_id
                .and_then(|id| names.get(&id).copied())
                .unwrap_or(UNKNOWN)
                .to_string(),
            days,
        })
        .collect();
    rows.sort_by(|a, b| by_days_desc(a.days, b.days).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Approved days per leave type with the type's color.
pub fn by_leave_type<'a, I>(requests: I, leave_types: &[LeaveType]) -> Vec<LeaveTypeTotal>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let types: HashMap<u64, &LeaveType> = leave_types.iter().map(|lt| (lt.id, lt)).collect();
    let mut totals: HashMap<u64, f64> = HashMap::new();

    for r in requests {
        if r.status == LeaveStatus::Approved {
            *totals.entry(r.leave_type_id).or_insert(0.0) += r.reported_days();
        }
    }

    let mut rows: Vec<LeaveTypeTotal> = totals
        .into_iter()
        .map(|(leave_type_id, days)| {
            let lt = types.get(&leave_type_id);
            LeaveTypeTotal {
                leave_type_id,
                name: lt.map_or(UNKNOWN, |lt| lt.name.as_str()).to_string(),
                color: lt.map_or(DEFAULT_COLOR, |lt| lt.color_or_default()).to_string(),
                days,
            }
        })
        .collect();
    rows.sort_by(|a, b| by_days_desc(a.days, b.days).then(a.leave_type_id.cmp(&b.leave_type_id)));
    rows
}

/// Remaining days per leave type summed over all employees.
pub fn balance_summary(employees: &[Employee], leave_types: &[LeaveType]) -> Vec<BalanceTotal> {
    leave_types
        .iter()
        .map(|lt| BalanceTotal {
            leave_type_id: lt.id,
            name: lt.name.clone(),
            color: lt.color_or_default().to_string(),
            balance: employees.iter().map(|e| e.balance(lt.id)).sum(),
        })
        .collect()
}

pub fn dashboard(requests: &[LeaveRequest], employees: &[Employee]) -> Dashboard {
    let count = |status| requests.iter().filter(|r| r.status == status).count();
    Dashboard {
        pending_requests: count(LeaveStatus::Pending),
        approved_requests: count(LeaveStatus::Approved),
        rejected_requests: count(LeaveStatus::Rejected),
        staff_count: employees.iter().filter(|e| e.role == Role::Staff).count(),
    }
}

/// One flattened export line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvRow {
    pub employee: String,
    pub department: String,
    pub leave_type: String,
    pub from: String,
    pub to: String,
    pub days: f64,
    pub status: String,
    pub remaining_balance: f64,
}

fn display_date(day: NaiveDate) -> String {
    day.format("%b %-d, %Y").to_string()
}

pub fn csv_rows<'a, I>(
    requests: I,
    employees: &[Employee],
    leave_types: &[LeaveType],
    departments: &[Department],
) -> Vec<CsvRow>
where
    I: IntoIterator<Item = &'a LeaveRequest>,
{
    let employees: HashMap<u64, &Employee> = employees.iter().map(|e| (e.id, e)).collect();
    let types: HashMap<u64, &str> = leave_types.iter().map(|lt| (lt.id, lt.name.as_str())).collect();
    let depts: HashMap<u64, &str> = departments.iter().map(|d| (d.id, d.name.as_str())).collect();

    requests
        .into_iter()
        .map(|r| {
            let employee = employees.get(&r.employee_id).copied();
            let department = employee
                .and_then(|e| e.department_id)
                .and_then(|id| depts.get(&id).copied());

            CsvRow {
                employee: employee.map_or(UNKNOWN, |e| e.name.as_str()).to_string(),
                department: department.unwrap_or(UNKNOWN).to_string(),
                leave_type: types.get(&r.leave_type_id).copied().unwrap_or(UNKNOWN).to_string(),
                from: display_date(r.start()),
                to: display_date(r.end()),
                days: r.reported_days(),
                status: r.status.to_string(),
                remaining_balance: employee.map_or(0.0, |e| e.balance(r.leave_type_id)),
            }
        })
        .collect()
}

/// Writes the header line followed by one record per row.
pub fn write_csv<W: io::Write>(rows: &[CsvRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::leave_request::fixtures::{date, request};

    fn employee(id: u64, name: &str, department_id: Option<u64>, balances: &[(u64, f64)]) -> Employee {
        Employee {
            id,
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            position: "Developer".into(),
            department_id,
            start_date: date(1, 1),
            role: Role::Staff,
            balances: balances.iter().copied().collect(),
        }
    }

    fn leave_type(id: u64, name: &str, default_days: f64) -> LeaveType {
        LeaveType {
            id,
            name: name.into(),
            description: None,
            color: (id == 1).then(|| "#4CAF50".to_string()),
            default_days,
            monthly_accrual: 0.0,
            max_carry_forward: 0.0,
            is_active: true,
        }
    }

    fn departments() -> Vec<Department> {
        vec![
            Department { id: 1, name: "Development".into(), manager_id: Some(2) },
            Department { id: 2, name: "Finance".into(), manager_id: None },
        ]
    }

    #[test]
    fn usage_percent_scenarios() {
        let pto = leave_type(1, "PTO", 20.0);
        assert_eq!(usage_percent(&employee(1, "A", None, &[(1, 10.0)]), &pto), 50);
        assert_eq!(usage_percent(&employee(1, "A", None, &[(1, 20.0)]), &pto), 0);
        assert_eq!(usage_percent(&employee(1, "A", None, &[(1, 0.0)]), &pto), 100);
        // carried-forward balance above the allocation clamps to 0
        assert_eq!(usage_percent(&employee(1, "A", None, &[(1, 24.0)]), &pto), 0);
        // no balance entry counts as fully used
        assert_eq!(usage_percent(&employee(1, "A", None, &[]), &pto), 100);
    }

    #[test]
    fn usage_percent_with_zero_allocation_is_zero() {
        let unpaid = leave_type(3, "Unpaid", 0.0);
        for balance in [0.0, 5.0, -1.0] {
            assert_eq!(usage_percent(&employee(1, "A", None, &[(3, balance)]), &unpaid), 0);
        }
    }

    #[test]
    fn usage_percent_is_monotonic_as_balance_falls() {
        let pto = leave_type(1, "PTO", 20.0);
        let mut last = 0;
        let mut balance = 26.0;
        while balance >= 0.0 {
            let pct = usage_percent(&employee(1, "A", None, &[(1, balance)]), &pto);
            assert!(pct >= last);
            assert!(pct <= 100);
            last = pct;
            balance -= 0.5;
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn employee_totals_sorted_descending() {
        let employees = vec![employee(1, "Ama", Some(1), &[]), employee(2, "Kofi", Some(2), &[])];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 1), date(4, 5), LeaveStatus::Approved),
            request(3, 1, 1, date(5, 1), date(5, 10), LeaveStatus::Pending),
            request(4, 9, 1, date(4, 1), date(4, 1), LeaveStatus::Approved),
        ];

        let approved = by_employee(&requests, &employees, true);
        assert_eq!(
            approved.iter().map(|t| (t.name.as_str(), t.days)).collect::<Vec<_>>(),
            vec![("Kofi", 5.0), ("Ama", 2.0), (UNKNOWN, 1.0)]
        );

        let all = by_employee(&requests, &employees, false);
        assert_eq!(all[0].name, "Ama");
        assert_eq!(all[0].days, 12.0);
    }

    #[test]
    fn department_totals_join_through_employee() {
        let employees = vec![
            employee(1, "Ama", Some(1), &[]),
            employee(2, "Kofi", Some(1), &[]),
            employee(3, "Efua", Some(2), &[]),
        ];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 1), date(4, 1), LeaveStatus::Approved),
            request(3, 3, 1, date(4, 1), date(4, 4), LeaveStatus::Approved),
            request(4, 3, 1, date(6, 1), date(6, 9), LeaveStatus::Rejected),
            request(5, 8, 1, date(4, 1), date(4, 1), LeaveStatus::Approved),
        ];

        let totals = by_department(&requests, &employees, &departments());
        assert_eq!(
            totals.iter().map(|t| (t.name.as_str(), t.days)).collect::<Vec<_>>(),
            vec![("Finance", 4.0), ("Development", 3.0), (UNKNOWN, 1.0)]
        );
    }

    #[test]
    fn leave_type_totals_carry_color() {
        let types = vec![leave_type(1, "PTO", 20.0), leave_type(2, "Sick", 15.0)];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 3), LeaveStatus::Approved),
            request(2, 1, 2, date(4, 7), date(4, 7), LeaveStatus::Approved),
            request(3, 1, 2, date(4, 9), date(4, 9), LeaveStatus::Pending),
        ];

        let totals = by_leave_type(&requests, &types);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].name, "PTO");
        assert_eq!(totals[0].color, "#4CAF50");
        assert_eq!(totals[0].days, 3.0);
        assert_eq!(totals[1].color, DEFAULT_COLOR);
        assert_eq!(totals[1].days, 1.0);
    }

    #[test]
    fn balance_summary_sums_across_employees() {
        let types = vec![leave_type(1, "PTO", 20.0), leave_type(2, "Sick", 15.0)];
        let employees = vec![
            employee(1, "Ama", None, &[(1, 10.0), (2, 15.0)]),
            employee(2, "Kofi", None, &[(1, 2.5)]),
        ];
        let summary = balance_summary(&employees, &types);
        assert_eq!(summary[0].balance, 12.5);
        assert_eq!(summary[1].balance, 15.0);
    }

    #[test]
    fn filter_narrows_by_department_type_and_status() {
        let employees = vec![employee(1, "Ama", Some(1), &[]), employee(2, "Kofi", Some(2), &[])];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(3, 1, 2, date(4, 1), date(4, 2), LeaveStatus::Pending),
            request(4, 7, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
        ];

        let ids = |f: &ReportFilter| f.apply(&requests, &employees).iter().map(|r| r.id).collect::<Vec<_>>();

        assert_eq!(ids(&ReportFilter::default()), vec![1, 2, 3, 4]);
        assert_eq!(
            ids(&ReportFilter { department_id: Some(1), ..Default::default() }),
            vec![1, 3]
        );
        assert_eq!(
            ids(&ReportFilter { leave_type_id: Some(1), status: Some(LeaveStatus::Approved), ..Default::default() }),
            vec![1, 2, 4]
        );
    }

    #[test]
    fn dashboard_counts() {
        let mut admin = employee(3, "Boss", None, &[]);
        admin.role = Role::Admin;
        let employees = vec![employee(1, "Ama", None, &[]), employee(2, "Kofi", None, &[]), admin];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 2), LeaveStatus::Approved),
            request(2, 2, 1, date(4, 1), date(4, 2), LeaveStatus::Pending),
            request(3, 2, 1, date(5, 1), date(5, 2), LeaveStatus::Pending),
        ];
        assert_eq!(
            dashboard(&requests, &employees),
            Dashboard { pending_requests: 2, approved_requests: 1, rejected_requests: 0, staff_count: 2 }
        );
    }

    #[test]
    fn csv_rows_join_by_id_and_degrade_to_unknown() {
        let types = vec![leave_type(1, "PTO", 20.0)];
        let employees = vec![employee(1, "Ama", Some(1), &[(1, 12.0)]), employee(2, "Kofi", Some(5), &[])];
        let requests = vec![
            request(1, 1, 1, date(4, 1), date(4, 5), LeaveStatus::Approved),
            request(2, 2, 9, date(4, 10), date(4, 10), LeaveStatus::Pending),
            request(3, 4, 1, date(4, 11), date(4, 12), LeaveStatus::Rejected),
        ];

        let rows = csv_rows(&requests, &employees, &types, &departments());

        assert_eq!(
            rows[0],
            CsvRow {
                employee: "Ama".into(),
                department: "Development".into(),
                leave_type: "PTO".into(),
                from: "Apr 1, 2025".into(),
                to: "Apr 5, 2025".into(),
                days: 5.0,
                status: "APPROVED".into(),
                remaining_balance: 12.0,
            }
        );
        assert_eq!(rows[1].department, UNKNOWN);
        assert_eq!(rows[1].leave_type, UNKNOWN);
        assert_eq!(rows[2].employee, UNKNOWN);
        assert_eq!(rows[2].remaining_balance, 0.0);
    }

    #[test]
    fn write_csv_emits_header_even_without_rows() {
        let mut out = Vec::new();
        write_csv(&[], &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Employee,Department,Leave Type,From,To,Days,Status,Remaining Balance\n"
        );

        let types = vec![leave_type(1, "PTO", 20.0)];
        let employees = vec![employee(1, "Ama", Some(1), &[(1, 12.5)])];
        let requests = vec![request(1, 1, 1, date(4, 1), date(4, 5), LeaveStatus::Approved)];
        let rows = csv_rows(&requests, &employees, &types, &departments());

        let mut out = Vec::new();
        write_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("Ama,Development,PTO,\"Apr 1, 2025\",\"Apr 5, 2025\",5.0,APPROVED,12.5")
        );
    }
}
