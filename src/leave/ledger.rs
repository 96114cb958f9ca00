//! Balance accounting. Balances change only through [`BalanceLedger::debit`],
//! [`BalanceLedger::credit`] and [`BalanceLedger::adjust`]; every applied change is journaled so the
//! caller can persist it next to the balance itself.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::error::LeaveError;
use crate::model::leave_type::LeaveType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Debit,
    Credit,
    Accrual,
    Adjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub kind: EntryKind,
    /// Days asked for by the caller
    pub requested: f64,
    /// Days actually moved; smaller than `requested` for capped credits
    pub applied: f64,
    pub balance_after: f64,
    pub request_id: Option<u64>,
}

/// Outcome of a credit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Credit {
    pub balance: f64,
    pub applied: f64,
    /// Excess above the carry-forward cap, dropped
    pub discarded: f64,
}

#[derive(Debug, Clone, Copy)]
struct Policy {
    cap: f64,
    monthly_accrual: f64,
    is_active: bool,
}

/// Balances are kept to hundredths of a day.
fn round_days(days: f64) -> f64 {
    (days * 100.0).round() / 100.0
}

fn checked_days(days: f64) -> Result<f64, LeaveError> {
    if !days.is_finite() || days < 0.0 {
        return Err(LeaveError::InvalidDays { days });
    }
    Ok(round_days(days))
}

/// True when `days` carries nothing finer than hundredths.
fn whole_hundredths(days: f64) -> bool {
    let scaled = days * 100.0;
    (scaled - scaled.round()).abs() < 1e-6
}

#[derive(Debug, Default)]
pub struct BalanceLedger {
    policies: HashMap<u64, Policy>,
    accounts: BTreeMap<(u64, u64), f64>,
    journal: Vec<LedgerEntry>,
}

impl BalanceLedger {
    pub fn new<'a, I>(leave_types: I) -> Self
    where
        I: IntoIterator<Item = &'a LeaveType>,
    {
        let policies = leave_types
            .into_iter()
            .map(|lt| {
                (
                    lt.id,
                    Policy {
                        cap: lt.balance_cap(),
                        monthly_accrual: lt.monthly_accrual,
                        is_active: lt.is_active,
                    },
                )
            })
            .collect();

        Self {
            policies,
            ..Self::default()
        }
    }

    /// Opens a zero balance for every active leave type an employee has no
    /// account for yet. Existing accounts are left alone.
    pub fn open_missing<I>(&mut self, employee_ids: I)
    where
        I: IntoIterator<Item = u64>,
    {
        let active: Vec<u64> = self
            .policies
            .iter()
            .filter(|(_, p)| p.is_active)
            .map(|(id, _)| *id)
            .collect();
        for employee_id in employee_ids {
            for leave_type_id in &active {
                self.accounts.entry((employee_id, *leave_type_id)).or_insert(0.0);
            }
        }
    }

    /// Loads an account as stored; replaces any balance already loaded.
    pub fn open(&mut self, employee_id: u64, leave_type_id: u64, balance: f64) {
        self.accounts.insert((employee_id, leave_type_id), round_days(balance));
    }

    pub fn balance(&self, employee_id: u64, leave_type_id: u64) -> Result<f64, LeaveError> {
        self.accounts
            .get(&(employee_id, leave_type_id))
            .copied()
            .ok_or(LeaveError::unknown("leave balance", employee_id))
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.journal
    }

    pub fn take_entries(&mut self) -> Vec<LedgerEntry> {
        std::mem::take(&mut self.journal)
    }

    fn policy(&self, leave_type_id: u64) -> Result<Policy, LeaveError> {
        self.policies
            .get(&leave_type_id)
            .copied()
            .ok_or(LeaveError::unknown("leave type", leave_type_id))
    }

    pub fn debit(&mut self, employee_id: u64, leave_type_id: u64, days: f64) -> Result<f64, LeaveError> {
        self.debit_for(employee_id, leave_type_id, days, None)
    }

    /// Debit tied to the request whose approval caused it.
    pub fn debit_for(
        &mut self,
        employee_id: u64,
        leave_type_id: u64,
        days: f64,
        request_id: Option<u64>,
    ) -> Result<f64, LeaveError> {
        self.apply_debit(employee_id, leave_type_id, days, request_id, EntryKind::Debit)
    }

    fn apply_debit(
        &mut self,
        employee_id: u64,
        leave_type_id: u64,
        days: f64,
        request_id: Option<u64>,
        kind: EntryKind,
    ) -> Result<f64, LeaveError> {
        if !days.is_finite() || days < 0.0 {
            return Err(LeaveError::InvalidDays { days });
        }
        self.policy(leave_type_id)?;
        let available = self.balance(employee_id, leave_type_id)?;

        if days > available {
            return Err(LeaveError::InsufficientBalance {
                requested: days,
                available,
            });
        }
        // a debit is never rounded into something the balance can cover
        if !whole_hundredths(days) {
            return Err(LeaveError::InvalidDays { days });
        }
        let days = round_days(days);

        let balance = round_days(available - days);
        self.accounts.insert((employee_id, leave_type_id), balance);
        self.journal.push(LedgerEntry {
            employee_id,
            leave_type_id,
            kind,
            requested: days,
            applied: days,
            balance_after: balance,
            request_id,
        });

        Ok(balance)
    }

    pub fn credit(&mut self, employee_id: u64, leave_type_id: u64, days: f64) -> Result<Credit, LeaveError> {
        self.apply_credit(employee_id, leave_type_id, days, EntryKind::Credit)
    }

    /// Manual correction by an administrator. Positive `delta` behaves like a
    /// credit (capped), negative like a debit (never below zero).
    pub fn adjust(&mut self, employee_id: u64, leave_type_id: u64, delta: f64) -> Result<f64, LeaveError> {
        if !delta.is_finite() || !whole_hundredths(delta) {
            return Err(LeaveError::InvalidDays { days: delta });
        }
        if delta < 0.0 {
            self.apply_debit(employee_id, leave_type_id, -delta, None, EntryKind::Adjustment)
        } else {
            self.apply_credit(employee_id, leave_type_id, delta, EntryKind::Adjustment)
                .map(|c| c.balance)
        }
    }

    fn apply_credit(
        &mut self,
        employee_id: u64,
        leave_type_id: u64,
        days: f64,
        kind: EntryKind,
    ) -> Result<Credit, LeaveError> {
        let days = checked_days(days)?;
        let policy = self.policy(leave_type_id)?;
        let current = self.balance(employee_id, leave_type_id)?;

        // A balance already above the cap is left where it is.
        let room = (round_days(policy.cap) - current).max(0.0);
        let applied = round_days(days.min(room));
        let balance = round_days(current + applied);
        let discarded = round_days(days - applied);

        self.accounts.insert((employee_id, leave_type_id), balance);
        self.journal.push(LedgerEntry {
            employee_id,
            leave_type_id,
            kind,
            requested: days,
            applied,
            balance_after: balance,
            request_id: None,
        });

        Ok(Credit {
            balance,
            applied,
            discarded,
        })
    }

    /// Credits one month of accrual to every open account whose leave type
    /// is active and accrues. Call [`BalanceLedger::open_missing`] first to
    /// cover employees without an account for a type. Returns the entries it produced.
    pub fn accrue_monthly(&mut self) -> Vec<LedgerEntry> {
        let due: Vec<(u64, u64, f64)> = self
            .accounts
            .keys()
            .filter_map(|&(employee_id, leave_type_id)| {
                let policy = self.policies.get(&leave_type_id)?;
                let rate = policy.monthly_accrual;
                (policy.is_active && rate.is_finite() && rate > 0.0).then_some((employee_id, leave_type_id, rate))
            })
            .collect();

        let first = self.journal.len();
        for (employee_id, leave_type_id, rate) in due {
            // account and policy were both looked up above
            if let Err(e) = self.apply_credit(employee_id, leave_type_id, rate, EntryKind::Accrual) {
                tracing::warn!(error = %e, employee_id, leave_type_id, "Accrual skipped");
            }
        }
        self.journal[first..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leave_type(id: u64, default_days: f64, max_carry_forward: f64, monthly_accrual: f64) -> LeaveType {
        LeaveType {
            id,
            name: format!("type {id}"),
            description: None,
            color: None,
            default_days,
            monthly_accrual,
            max_carry_forward,
            is_active: true,
        }
    }

    fn pto() -> LeaveType {
        leave_type(1, 20.0, 5.0, 1.5)
    }

    fn ledger_with(balance: f64) -> BalanceLedger {
        let types = [pto()];
        let mut ledger = BalanceLedger::new(&types);
        ledger.open(7, 1, balance);
        ledger
    }

    #[test]
    fn debit_reduces_balance() {
        let mut ledger = ledger_with(15.0);
        assert_eq!(ledger.debit(7, 1, 5.0).unwrap(), 10.0);
        assert_eq!(ledger.balance(7, 1).unwrap(), 10.0);
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].kind, EntryKind::Debit);
    }

    #[test]
    fn debit_may_empty_the_balance() {
        let mut ledger = ledger_with(2.5);
        assert_eq!(ledger.debit(7, 1, 2.5).unwrap(), 0.0);
    }

    #[test]
    fn overdraw_is_rejected_without_mutation() {
        let mut ledger = ledger_with(3.0);
        let err = ledger.debit(7, 1, 3.5).unwrap_err();
        assert_eq!(
            err,
            LeaveError::InsufficientBalance {
                requested: 3.5,
                available: 3.0
            }
        );
        assert_eq!(ledger.balance(7, 1).unwrap(), 3.0);
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn debit_is_compared_before_any_rounding() {
        let mut ledger = ledger_with(10.0);
        assert_eq!(
            ledger.debit(7, 1, 10.004).unwrap_err(),
            LeaveError::InsufficientBalance {
                requested: 10.004,
                available: 10.0
            }
        );
        assert_eq!(ledger.balance(7, 1).unwrap(), 10.0);
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn sub_hundredth_debits_are_invalid() {
        let mut ledger = ledger_with(5.0);
        assert!(matches!(ledger.debit(7, 1, 0.004), Err(LeaveError::InvalidDays { .. })));
        assert!(matches!(ledger.debit(7, 1, 1.255), Err(LeaveError::InvalidDays { .. })));
        assert!(matches!(ledger.adjust(7, 1, -0.004), Err(LeaveError::InvalidDays { .. })));
        assert_eq!(ledger.balance(7, 1).unwrap(), 5.0);
        assert!(ledger.entries().is_empty());

        assert_eq!(ledger.debit(7, 1, 1.25).unwrap(), 3.75);
        assert_eq!(ledger.entries()[0].requested, 1.25);
    }

    #[test]
    fn debit_then_credit_restores_balance() {
        for (start, amount) in [(15.0, 5.0), (10.25, 0.5), (20.0, 20.0), (7.1, 3.3)] {
            let mut ledger = ledger_with(start);
            ledger.debit(7, 1, amount).unwrap();
            let credit = ledger.credit(7, 1, amount).unwrap();
            assert_eq!(credit.balance, start);
            assert_eq!(credit.discarded, 0.0);
        }
    }

    #[test]
    fn credit_is_capped_at_default_plus_carry_forward() {
        let mut ledger = ledger_with(23.0);
        let credit = ledger.credit(7, 1, 4.0).unwrap();
        assert_eq!(credit.balance, 25.0);
        assert_eq!(credit.applied, 2.0);
        assert_eq!(credit.discarded, 2.0);
    }

    #[test]
    fn credit_never_lowers_a_balance_above_the_cap() {
        let mut ledger = ledger_with(30.0);
        let credit = ledger.credit(7, 1, 1.0).unwrap();
        assert_eq!(credit.balance, 30.0);
        assert_eq!(credit.applied, 0.0);
    }

    #[test]
    fn unknown_references_abort_mutations() {
        let mut ledger = ledger_with(10.0);
        assert!(matches!(
            ledger.debit(8, 1, 1.0),
            Err(LeaveError::UnknownReference { entity: "leave balance", id: 8 })
        ));
        assert!(matches!(
            ledger.credit(7, 2, 1.0),
            Err(LeaveError::UnknownReference { entity: "leave type", id: 2 })
        ));
        assert_eq!(ledger.balance(7, 1).unwrap(), 10.0);
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn negative_or_nan_days_are_invalid() {
        let mut ledger = ledger_with(10.0);
        assert!(matches!(ledger.debit(7, 1, -1.0), Err(LeaveError::InvalidDays { .. })));
        assert!(matches!(ledger.credit(7, 1, f64::NAN), Err(LeaveError::InvalidDays { .. })));
        assert_eq!(ledger.balance(7, 1).unwrap(), 10.0);
    }

    #[test]
    fn monthly_accrual_credits_active_accruing_types_only() {
        let mut inactive = leave_type(2, 10.0, 0.0, 1.0);
        inactive.is_active = false;
        let no_accrual = leave_type(3, 5.0, 0.0, 0.0);
        let types = [pto(), inactive, no_accrual];

        let mut ledger = BalanceLedger::new(&types);
        ledger.open(7, 1, 10.0);
        ledger.open(8, 1, 24.5);
        ledger.open(7, 2, 1.0);
        ledger.open(7, 3, 1.0);

        let entries = ledger.accrue_monthly();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == EntryKind::Accrual && e.leave_type_id == 1));
        assert_eq!(ledger.balance(7, 1).unwrap(), 11.5);
        assert_eq!(ledger.balance(8, 1).unwrap(), 25.0);
        assert_eq!(ledger.balance(7, 2).unwrap(), 1.0);
        assert_eq!(ledger.balance(7, 3).unwrap(), 1.0);
    }

    #[test]
    fn accrual_reaches_employees_without_an_account_for_a_new_type() {
        let sick = leave_type(4, 10.0, 0.0, 1.0);
        let mut retired = leave_type(5, 10.0, 0.0, 1.0);
        retired.is_active = false;
        let types = [pto(), sick, retired];

        let mut ledger = BalanceLedger::new(&types);
        // employee 7 was hired before type 4 existed
        ledger.open(7, 1, 10.0);
        ledger.open_missing([7, 8]);

        assert_eq!(ledger.balance(7, 1).unwrap(), 10.0);
        assert_eq!(ledger.balance(7, 4).unwrap(), 0.0);
        assert_eq!(ledger.balance(8, 1).unwrap(), 0.0);
        assert!(ledger.balance(7, 5).is_err());

        let entries = ledger.accrue_monthly();
        assert_eq!(entries.len(), 4);
        assert_eq!(ledger.balance(7, 4).unwrap(), 1.0);
        assert_eq!(ledger.balance(8, 4).unwrap(), 1.0);
        assert_eq!(ledger.balance(8, 1).unwrap(), 1.5);
    }

    #[test]
    fn take_entries_drains_the_journal() {
        let mut ledger = ledger_with(10.0);
        ledger.debit_for(7, 1, 1.0, Some(99)).unwrap();
        let entries = ledger.take_entries();
        assert_eq!(entries[0].request_id, Some(99));
        assert!(ledger.entries().is_empty());
    }

    #[test]
    fn adjustments_move_both_ways_within_bounds() {
        let mut ledger = ledger_with(10.0);
        assert_eq!(ledger.adjust(7, 1, 2.5).unwrap(), 12.5);
        assert_eq!(ledger.adjust(7, 1, -4.0).unwrap(), 8.5);
        assert_eq!(ledger.adjust(7, 1, 100.0).unwrap(), 25.0);
        assert!(matches!(
            ledger.adjust(7, 1, -30.0),
            Err(LeaveError::InsufficientBalance { .. })
        ));
        assert!(ledger.entries().iter().all(|e| e.kind == EntryKind::Adjustment));
        assert_eq!(ledger.entries().len(), 3);
    }
}
