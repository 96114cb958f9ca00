use crate::error::LeaveError;
use crate::leave::ledger::BalanceLedger;
use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::model::role::Role;

/// Who is deciding a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Approver {
    pub employee_id: u64,
    pub role: Role,
}

impl Approver {
    pub fn new(employee_id: u64, role: Role) -> Result<Self, LeaveError> {
        if !role.is_approver() {
            return Err(LeaveError::NotAnApprover);
        }
        Ok(Self { employee_id, role })
    }
}

fn ensure_pending(request: &LeaveRequest) -> Result<(), LeaveError> {
    if request.status.is_terminal() {
        return Err(LeaveError::AlreadyDecided {
            status: request.status,
        });
    }
    Ok(())
}

fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// PENDING -> APPROVED. Debits the ledger first and only then flips the
/// status, so a failed debit leaves the request untouched.
///
/// `days_override` replaces the default debit of [`LeaveRequest::debit_days`].
/// Returns the balance left after the debit.
pub fn approve(
    request: &mut LeaveRequest,
    ledger: &mut BalanceLedger,
    approver: &Approver,
    comment: Option<String>,
    days_override: Option<f64>,
) -> Result<f64, LeaveError> {
    ensure_pending(request)?;

    let days = days_override.unwrap_or_else(|| request.debit_days());
    let balance = ledger.debit_for(request.employee_id, request.leave_type_id, days, Some(request.id))?;

    request.status = LeaveStatus::Approved;
    request.approver_id = Some(approver.employee_id);
    request.approver_comment = clean_comment(comment);
    request.debited_days = ledger.entries().last().map(|e| e.applied);

    Ok(balance)
}

/// PENDING -> REJECTED. Requires a comment; never touches balances.
pub fn reject(request: &mut LeaveRequest, approver: &Approver, comment: Option<String>) -> Result<(), LeaveError> {
    ensure_pending(request)?;
    let comment = clean_comment(comment).ok_or(LeaveError::MissingComment)?;

    request.status = LeaveStatus::Rejected;
    request.approver_id = Some(approver.employee_id);
    request.approver_comment = Some(comment);

    Ok(())
}
