//! Loads engine collections from MySQL and writes engine results back.
//! Functions take a plain connection so handlers can pass either a pooled
//! connection or an open transaction.

use anyhow::Result;
use sqlx::MySqlConnection;
use tracing::warn;

use crate::leave::ledger::LedgerEntry;
use crate::leave::period::DateRange;
use crate::model::department::Department;
use crate::model::employee::{self, BalanceRow, Employee, EmployeeRow};
use crate::model::leave_request::{DayPortion, LeaveRequest, LeaveRequestRow, LeaveStatus};
use crate::model::leave_type::LeaveType;

const REQUEST_COLUMNS: &str = "id, employee_id, leave_type_id, start_date, end_date, is_full_day, reason, \
     document, status, requested_at, approver_id, approver_comment, debited_days";

const LEAVE_TYPE_COLUMNS: &str =
    "id, name, description, color, default_days, monthly_accrual, max_carry_forward, is_active";

const EMPLOYEE_COLUMNS: &str = "id, name, email, position, department_id, start_date, role";

/// Everything the reporting paths need, loaded in one go.
pub struct Snapshot {
    pub leave_types: Vec<LeaveType>,
    pub departments: Vec<Department>,
    pub employees: Vec<Employee>,
    pub requests: Vec<LeaveRequest>,
}

pub struct NewLeave<'a> {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub period: DateRange,
    pub portion: DayPortion,
    pub reason: &'a str,
    pub document: Option<&'a str>,
}

fn normalize(rows: Vec<LeaveRequestRow>) -> Result<Vec<LeaveRequest>> {
    rows.into_iter()
        .map(|row| LeaveRequest::try_from(row).map_err(anyhow::Error::from))
        .collect()
}

/// Converts rows one at a time; a row that does not convert is logged and
/// left out.
fn keep_valid<R, T, E, F>(rows: Vec<R>, what: &'static str, mut convert: F) -> Vec<T>
where
    E: std::fmt::Display,
    F: FnMut(R) -> std::result::Result<T, E>,
{
    let total = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match convert(row) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(record = what, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect();
    if kept.len() < total {
        warn!(record = what, skipped = total - kept.len(), "Malformed rows left out of snapshot");
    }
    kept
}

/// Reporting data. Malformed employee or request rows are skipped so one bad
/// record cannot take every report down.
pub async fn load_snapshot(conn: &mut MySqlConnection) -> Result<Snapshot> {
    let leave_types = load_leave_types(conn).await?;
    let departments = load_departments(conn).await?;

    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY id");
    let rows = sqlx::query_as::<_, EmployeeRow>(&sql).fetch_all(&mut *conn).await?;
    let balances = sqlx::query_as::<_, BalanceRow>("SELECT employee_id, leave_type_id, balance FROM leave_balances")
        .fetch_all(&mut *conn)
        .await?;
    let mut by_employee = employee::group_balances(&balances);
    let employees = keep_valid(rows, "employee", |row: EmployeeRow| {
        let balances = by_employee.remove(&row.id).unwrap_or_default();
        row.into_employee(balances)
    });

    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests ORDER BY start_date, id");
    let rows = sqlx::query_as::<_, LeaveRequestRow>(&sql).fetch_all(&mut *conn).await?;
    let requests = keep_valid(rows, "leave request", LeaveRequest::try_from);

    Ok(Snapshot {
        leave_types,
        departments,
        employees,
        requests,
    })
}

pub async fn load_leave_types(conn: &mut MySqlConnection) -> Result<Vec<LeaveType>> {
    let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types ORDER BY id");
    Ok(sqlx::query_as::<_, LeaveType>(&sql).fetch_all(&mut *conn).await?)
}

/// With `for_update` the row stays locked until the transaction ends.
pub async fn load_leave_type(conn: &mut MySqlConnection, id: u64, for_update: bool) -> Result<Option<LeaveType>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {LEAVE_TYPE_COLUMNS} FROM leave_types WHERE id = ?{lock}");
    Ok(sqlx::query_as::<_, LeaveType>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?)
}

pub async fn load_departments(conn: &mut MySqlConnection) -> Result<Vec<Department>> {
    Ok(
        sqlx::query_as::<_, Department>("SELECT id, name, manager_id FROM departments ORDER BY name")
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn load_employees(conn: &mut MySqlConnection) -> Result<Vec<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees ORDER BY id");
    let rows = sqlx::query_as::<_, EmployeeRow>(&sql).fetch_all(&mut *conn).await?;
    let balances = sqlx::query_as::<_, BalanceRow>("SELECT employee_id, leave_type_id, balance FROM leave_balances")
        .fetch_all(&mut *conn)
        .await?;

    Ok(employee::assemble(rows, &balances)?)
}

pub async fn load_employee(conn: &mut MySqlConnection, id: u64) -> Result<Option<Employee>> {
    let sql = format!("SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = ?");
    let Some(row) = sqlx::query_as::<_, EmployeeRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let balances = sqlx::query_as::<_, BalanceRow>(
        "SELECT employee_id, leave_type_id, balance FROM leave_balances WHERE employee_id = ?",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(employee::assemble(vec![row], &balances)?.pop())
}

/// Balance rows of the given employees only.
pub async fn load_balances_of(conn: &mut MySqlConnection, employee_ids: &[u64]) -> Result<Vec<BalanceRow>> {
    if employee_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; employee_ids.len()].join(", ");
    let sql = format!(
        "SELECT employee_id, leave_type_id, balance FROM leave_balances WHERE employee_id IN ({placeholders})"
    );
    let mut query = sqlx::query_as::<_, BalanceRow>(&sql);
    for id in employee_ids {
        query = query.bind(*id);
    }
    Ok(query.fetch_all(&mut *conn).await?)
}

pub async fn load_employee_ids(conn: &mut MySqlConnection) -> Result<Vec<u64>> {
    Ok(sqlx::query_scalar::<_, u64>("SELECT id FROM employees ORDER BY id")
        .fetch_all(&mut *conn)
        .await?)
}

pub async fn employee_exists(conn: &mut MySqlConnection, id: u64) -> Result<bool> {
    let found = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM employees WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(found > 0)
}

pub async fn load_request(conn: &mut MySqlConnection, id: u64) -> Result<Option<LeaveRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ?");
    let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(normalize(row.into_iter().collect())?.pop())
}

/// Locks the request row for a status transition.
pub async fn lock_request(conn: &mut MySqlConnection, id: u64) -> Result<Option<LeaveRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE id = ? FOR UPDATE");
    let row = sqlx::query_as::<_, LeaveRequestRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(normalize(row.into_iter().collect())?.pop())
}

/// Locks every date-holding request of one employee, so two applications
/// for the same person cannot both pass the overlap check.
pub async fn lock_open_requests(conn: &mut MySqlConnection, employee_id: u64) -> Result<Vec<LeaveRequest>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM leave_requests \
         WHERE employee_id = ? AND status IN (?, ?) FOR UPDATE"
    );
    normalize(
        sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(employee_id)
            .bind(LeaveStatus::Pending.as_ref())
            .bind(LeaveStatus::Approved.as_ref())
            .fetch_all(&mut *conn)
            .await?,
    )
}

/// Approved requests touching `window`.
pub async fn load_approved_between(conn: &mut MySqlConnection, window: &DateRange) -> Result<Vec<LeaveRequest>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM leave_requests \
         WHERE status = ? AND start_date <= ? AND end_date >= ?"
    );
    normalize(
        sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(LeaveStatus::Approved.as_ref())
            .bind(window.end())
            .bind(window.start())
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn load_approved_from(conn: &mut MySqlConnection, from: chrono::NaiveDate) -> Result<Vec<LeaveRequest>> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM leave_requests WHERE status = ? AND start_date >= ?");
    normalize(
        sqlx::query_as::<_, LeaveRequestRow>(&sql)
            .bind(LeaveStatus::Approved.as_ref())
            .bind(from)
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn insert_request(conn: &mut MySqlConnection, leave: &NewLeave<'_>) -> Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type_id, start_date, end_date, is_full_day, reason, document, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(leave.employee_id)
    .bind(leave.leave_type_id)
    .bind(leave.period.start())
    .bind(leave.period.end())
    .bind(leave.portion.is_full_day())
    .bind(leave.reason)
    .bind(leave.document)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_id())
}

/// Persists the outcome of an approve/reject on a PENDING row.
pub async fn store_decision(conn: &mut MySqlConnection, request: &LeaveRequest) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?, approver_id = ?, approver_comment = ?, debited_days = ?
        WHERE id = ?
        AND status = ?
        "#,
    )
    .bind(request.status.as_ref())
    .bind(request.approver_id)
    .bind(request.approver_comment.as_deref())
    .bind(request.debited_days)
    .bind(request.id)
    .bind(LeaveStatus::Pending.as_ref())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Balance of one account, locked. `None` when no row exists yet.
pub async fn lock_balance(conn: &mut MySqlConnection, employee_id: u64, leave_type_id: u64) -> Result<Option<f64>> {
    Ok(sqlx::query_scalar::<_, f64>(
        "SELECT balance FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? FOR UPDATE",
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .fetch_optional(&mut *conn)
    .await?)
}

pub async fn lock_all_balances(conn: &mut MySqlConnection) -> Result<Vec<BalanceRow>> {
    Ok(
        sqlx::query_as::<_, BalanceRow>("SELECT employee_id, leave_type_id, balance FROM leave_balances FOR UPDATE")
            .fetch_all(&mut *conn)
            .await?,
    )
}

pub async fn store_balance(conn: &mut MySqlConnection, employee_id: u64, leave_type_id: u64, balance: f64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO leave_balances (employee_id, leave_type_id, balance)
        VALUES (?, ?, ?)
        ON DUPLICATE KEY UPDATE balance = VALUES(balance)
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(balance)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes each entry's resulting balance and the journal line for it.
pub async fn apply_entries(conn: &mut MySqlConnection, entries: &[LedgerEntry]) -> Result<()> {
    for entry in entries {
        store_balance(conn, entry.employee_id, entry.leave_type_id, entry.balance_after).await?;

        sqlx::query(
            r#"
            INSERT INTO leave_ledger
                (employee_id, leave_type_id, kind, requested, applied, balance_after, request_id)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.employee_id)
        .bind(entry.leave_type_id)
        .bind(entry.kind.as_ref())
        .bind(entry.requested)
        .bind(entry.applied)
        .bind(entry.balance_after)
        .bind(entry.request_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub async fn notify(conn: &mut MySqlConnection, employee_id: u64, message: &str) -> Result<()> {
    sqlx::query("INSERT INTO notifications (employee_id, message) VALUES (?, ?)")
        .bind(employee_id)
        .bind(message)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, NaiveDate, Utc};

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn row(id: u64, status: &str) -> LeaveRequestRow {
        LeaveRequestRow {
            id,
            employee_id: 1,
            leave_type_id: 1,
            start_date: date(5),
            end_date: date(6),
            is_full_day: true,
            reason: None,
            document: None,
            status: status.into(),
            requested_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            approver_id: None,
            approver_comment: None,
            debited_days: None,
        }
    }

    #[test]
    fn malformed_rows_are_left_out() {
        let mut inverted = row(3, "APPROVED");
        inverted.end_date = date(1);
        let rows = vec![row(1, "APPROVED"), row(2, "ON_HOLD"), inverted, row(4, "PENDING")];

        let kept = keep_valid(rows, "leave request", LeaveRequest::try_from);
        let ids: Vec<u64> = kept.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn employees_with_unknown_roles_are_left_out() {
        let staff_row = |id: u64, role: &str| EmployeeRow {
            id,
            name: format!("employee {id}"),
            email: format!("e{id}@africahr.com"),
            position: "Analyst".into(),
            department_id: None,
            start_date: date(1),
            role: role.into(),
        };
        let balances = [BalanceRow {
            employee_id: 2,
            leave_type_id: 1,
            balance: 4.5,
        }];
        let mut by_employee = employee::group_balances(&balances);

        let rows = vec![staff_row(1, "CONTRACTOR"), staff_row(2, "STAFF")];
        let kept = keep_valid(rows, "employee", |row: EmployeeRow| {
            let balances = by_employee.remove(&row.id).unwrap_or_default();
            row.into_employee(balances)
        });
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
        assert_eq!(kept[0].balance(1), 4.5);
    }
}
