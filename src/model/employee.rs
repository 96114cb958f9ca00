use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::LeaveError;
use crate::model::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "name": "Kwame Nkrumah",
        "email": "kwame@africahr.com",
        "position": "Software Developer",
        "department_id": 1,
        "start_date": "2021-03-15",
        "role": "STAFF",
        "balances": { "1": 15.0, "2": 15.0 }
    })
)]
pub struct Employee {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub position: String,
    pub department_id: Option<u64>,
    #[schema(value_type = String, format = "date")]
    pub start_date: NaiveDate,
    pub role: Role,
    /// Remaining days keyed by leave type id
    pub balances: HashMap<u64, f64>,
}

impl Employee {
    pub fn balance(&self, leave_type_id: u64) -> f64 {
        self.balances.get(&leave_type_id).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct EmployeeRow {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub position: String,
    pub department_id: Option<u64>,
    pub start_date: NaiveDate,
    pub role: String,
}

#[derive(Debug, Clone, Copy, Deserialize, sqlx::FromRow)]
pub struct BalanceRow {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub balance: f64,
}

impl EmployeeRow {
    pub fn into_employee(self, balances: HashMap<u64, f64>) -> Result<Employee, LeaveError> {
        let role = Role::from_str(&self.role).map_err(|_| LeaveError::MalformedRecord {
            field: "role",
            value: self.role.clone(),
        })?;

        Ok(Employee {
            id: self.id,
            name: self.name,
            email: self.email,
            position: self.position,
            department_id: self.department_id,
            start_date: self.start_date,
            role,
            balances,
        })
    }
}

/// Balance rows keyed by employee, then leave type.
pub fn group_balances(balances: &[BalanceRow]) -> HashMap<u64, HashMap<u64, f64>> {
    let mut by_employee: HashMap<u64, HashMap<u64, f64>> = HashMap::new();
    for b in balances {
        by_employee
            .entry(b.employee_id)
            .or_default()
            .insert(b.leave_type_id, b.balance);
    }
    by_employee
}

/// Joins employee rows with their balance rows.
pub fn assemble(rows: Vec<EmployeeRow>, balances: &[BalanceRow]) -> Result<Vec<Employee>, LeaveError> {
    let mut by_employee = group_balances(balances);

    rows.into_iter()
        .map(|row| {
            let balances = by_employee.remove(&row.id).unwrap_or_default();
            row.into_employee(balances)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: u64, role: &str) -> EmployeeRow {
        EmployeeRow {
            id,
            name: format!("Employee {id}"),
            email: format!("e{id}@example.com"),
            position: "Developer".into(),
            department_id: Some(1),
            start_date: NaiveDate::from_ymd_opt(2021, 3, 15).unwrap(),
            role: role.into(),
        }
    }

    #[test]
    fn assemble_attaches_balances_to_their_owner() {
        let balances = [
            BalanceRow { employee_id: 1, leave_type_id: 10, balance: 15.0 },
            BalanceRow { employee_id: 1, leave_type_id: 11, balance: 2.5 },
            BalanceRow { employee_id: 2, leave_type_id: 10, balance: 7.0 },
        ];
        let employees = assemble(vec![row(1, "STAFF"), row(2, "MANAGER"), row(3, "ADMIN")], &balances).unwrap();

        assert_eq!(employees[0].balance(10), 15.0);
        assert_eq!(employees[0].balance(11), 2.5);
        assert_eq!(employees[1].balance(10), 7.0);
        assert_eq!(employees[1].role, Role::Manager);
        assert!(employees[2].balances.is_empty());
        assert_eq!(employees[2].balance(10), 0.0);
    }

    #[test]
    fn unknown_role_is_a_malformed_record() {
        let err = row(1, "INTERN").into_employee(HashMap::new()).unwrap_err();
        assert!(matches!(err, LeaveError::MalformedRecord { field: "role", .. }));
    }
}
