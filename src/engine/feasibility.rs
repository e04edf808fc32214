// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Affordability of a proposed budget and the 0-100 financial health score.

use crate::config::POLICY;
use crate::engine::aggregate::{BudgetScope, usage_for_scope};
use crate::engine::alerts::BudgetRemainder;
use crate::engine::ledger::active_accounts;
use crate::errors::{LedgerError, Result};
use chrono::{Datelike, Months, NaiveDate};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BudgetProposal {
    pub category_id: i64,
    pub amount: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeasibilityReport {
    pub is_feasible: bool,
    pub is_tight: bool,
    pub total_balance: Decimal,
    pub existing_commitments: Decimal,
    pub proposed_amount: Decimal,
    pub total_required: Decimal,
    pub shortage: Decimal,
    pub historical_average: Option<Decimal>,
    pub suggested_amount: Option<Decimal>,
    pub overlapping: Vec<BudgetRemainder>,
    pub warnings: Vec<String>,
}

/// Pure decision over already-derived figures.
pub fn assess(
    total_balance: Decimal,
    existing_commitments: Decimal,
    proposed_amount: Decimal,
    historical_average: Option<Decimal>,
) -> FeasibilityReport {
    let total_required = existing_commitments + proposed_amount;
    let mut warnings = Vec::new();

    let is_feasible = total_balance >= total_required;
    let shortage = if is_feasible {
        Decimal::ZERO
    } else {
        total_required - total_balance
    };
    let is_tight = is_feasible && total_balance < total_required * POLICY.tight_balance_factor;

    if !is_feasible {
        warnings.push(format!(
            "Insufficient funds: {:.2} required across overlapping budgets but only {:.2} available. Add {:.2} to cover it.",
            total_required, total_balance, shortage
        ));
    } else if is_tight {
        warnings.push(format!(
            "Balance {:.2} leaves little headroom over the {:.2} committed for this period.",
            total_balance, total_required
        ));
    }

    let mut suggested_amount = None;
    if let Some(avg) = historical_average.filter(|a| *a > Decimal::ZERO) {
        if proposed_amount < avg * POLICY.historical_floor_factor {
            let avg = avg.round_dp(2);
            warnings.push(format!(
                "Proposed amount {:.2} is well below the recent average expense of {:.2}; consider raising it.",
                proposed_amount, avg
            ));
            suggested_amount = Some(avg);
        }
    }

    FeasibilityReport {
        is_feasible,
        is_tight,
        total_balance,
        existing_commitments,
        proposed_amount,
        total_required,
        shortage,
        historical_average,
        suggested_amount,
        overlapping: Vec::new(),
        warnings,
    }
}

/// Mean Expense amount per transaction in the category over the trailing
/// history window ending at `today`.
pub fn historical_average(
    conn: &Connection,
    user_id: i64,
    category_id: i64,
    today: NaiveDate,
) -> Result<Option<Decimal>> {
    let since = today
        .checked_sub_months(Months::new(POLICY.history_months))
        .unwrap_or(NaiveDate::MIN);
    let mut stmt = conn.prepare_cached(
        "SELECT amount FROM transactions
         WHERE user_id=?1 AND category_id=?2 AND kind='Expense' AND date>=?3",
    )?;
    let mut rows = stmt.query(params![user_id, category_id, since])?;
    let mut total = Decimal::ZERO;
    let mut n: i64 = 0;
    while let Some(r) = rows.next()? {
        total += crate::db::decimal_at(r, 0)?;
        n += 1;
    }
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(total / Decimal::from(n)))
}

/// Commitments are every active budget whose period touches the proposal,
/// regardless of category.
pub fn check_feasibility(
    conn: &Connection,
    user_id: i64,
    proposal: &BudgetProposal,
    today: NaiveDate,
) -> Result<FeasibilityReport> {
    if proposal.amount <= Decimal::ZERO {
        return Err(LedgerError::validation("budget amount must be positive"));
    }
    if proposal.start >= proposal.end {
        return Err(LedgerError::InvalidRange {
            start: proposal.start,
            end: proposal.end,
        });
    }

    let total_balance: Decimal = active_accounts(conn, user_id)?
        .iter()
        .map(|a| a.balance)
        .sum();
    let touching = usage_for_scope(
        conn,
        user_id,
        BudgetScope::Touching(proposal.start, proposal.end),
    )?;
    let existing: Decimal = touching.iter().map(|(_, u)| u.remaining).sum();
    let avg = historical_average(conn, user_id, proposal.category_id, today)?;

    let mut report = assess(total_balance, existing, proposal.amount, avg);
    report.overlapping = touching
        .into_iter()
        .map(|(b, u)| BudgetRemainder {
            budget_id: b.id,
            budget_name: b.name,
            remaining_amount: u.remaining,
        })
        .collect();
    tracing::debug!(
        user_id,
        feasible = report.is_feasible,
        tight = report.is_tight,
        "feasibility assessed"
    );
    Ok(report)
}

/// Starts at 100 and deducts for thin reserves, thin budget headroom and an
/// expense run-rate close to or above income.
pub fn financial_health_score(
    total_balance: Decimal,
    total_remaining: Decimal,
    monthly_income: Decimal,
    monthly_expense: Decimal,
) -> u8 {
    let mut score: i32 = 100;

    if total_balance < monthly_expense * dec!(2) {
        score -= 30;
    } else if total_balance < monthly_expense * dec!(3) {
        score -= 15;
    }

    if total_remaining < total_balance * dec!(0.1) {
        score -= 25;
    } else if total_remaining < total_balance * dec!(0.2) {
        score -= 15;
    }

    if monthly_expense > monthly_income {
        score -= 40;
    } else if monthly_expense > monthly_income * dec!(0.9) {
        score -= 20;
    }

    score.clamp(0, 100) as u8
}

#[derive(Debug, Clone, Serialize)]
pub struct FinancialOverview {
    pub total_balance: Decimal,
    pub total_budget: Decimal,
    pub total_spent: Decimal,
    pub total_remaining: Decimal,
    pub monthly_income: Decimal,
    pub monthly_expense: Decimal,
    pub monthly_net_income: Decimal,
    pub budget_utilization_rate: Decimal,
    pub financial_health_score: u8,
}

/// Income and Expense totals for the user dated on or after `since`.
pub fn totals_since(conn: &Connection, user_id: i64, since: NaiveDate) -> Result<(Decimal, Decimal)> {
    let mut stmt = conn.prepare_cached(
        "SELECT kind, amount FROM transactions
         WHERE user_id=?1 AND date>=?2 AND kind IN ('Income','Expense')",
    )?;
    let mut rows = stmt.query(params![user_id, since])?;
    let (mut income, mut expense) = (Decimal::ZERO, Decimal::ZERO);
    while let Some(r) = rows.next()? {
        let kind: String = r.get(0)?;
        let amount = crate::db::decimal_at(r, 1)?;
        if kind == "Income" {
            income += amount;
        } else {
            expense += amount;
        }
    }
    Ok((income, expense))
}

pub fn financial_overview(
    conn: &Connection,
    user_id: i64,
    today: NaiveDate,
) -> Result<FinancialOverview> {
    let total_balance: Decimal = active_accounts(conn, user_id)?
        .iter()
        .map(|a| a.balance)
        .sum();
    let current = usage_for_scope(conn, user_id, BudgetScope::Current(today))?;
    let total_budget: Decimal = current.iter().map(|(b, _)| b.amount).sum();
    let total_spent: Decimal = current.iter().map(|(_, u)| u.spent).sum();
    let total_remaining = total_budget - total_spent;

    let month_start = today.with_day(1).unwrap_or(today);
    let (monthly_income, monthly_expense) = totals_since(conn, user_id, month_start)?;

    let budget_utilization_rate = if total_budget > Decimal::ZERO {
        (total_spent / total_budget * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    };

    Ok(FinancialOverview {
        total_balance,
        total_budget,
        total_spent,
        total_remaining,
        monthly_income,
        monthly_expense,
        monthly_net_income: monthly_income - monthly_expense,
        budget_utilization_rate,
        financial_health_score: financial_health_score(
            total_balance,
            total_remaining,
            monthly_income,
            monthly_expense,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_beyond_balance_reports_shortage() {
        let r = assess(dec!(2000000), dec!(1000000), dec!(1500000), None);
        assert!(!r.is_feasible);
        assert_eq!(r.total_required, dec!(2500000));
        assert_eq!(r.shortage, dec!(500000));
        assert_eq!(r.warnings.len(), 1);
    }

    #[test]
    fn tight_when_within_twenty_percent() {
        let r = assess(dec!(1100), dec!(500), dec!(500), None);
        assert!(r.is_feasible);
        assert!(r.is_tight);
        assert_eq!(r.shortage, Decimal::ZERO);

        let roomy = assess(dec!(1200), dec!(500), dec!(500), None);
        assert!(roomy.is_feasible);
        assert!(!roomy.is_tight);
        assert!(roomy.warnings.is_empty());
    }

    #[test]
    fn exact_balance_is_feasible_but_tight() {
        let r = assess(dec!(1000), dec!(400), dec!(600), None);
        assert!(r.is_feasible);
        assert!(r.is_tight);
    }

    #[test]
    fn low_proposal_suggests_historical_average() {
        let r = assess(dec!(10000), Decimal::ZERO, dec!(70), Some(dec!(100)));
        assert_eq!(r.suggested_amount, Some(dec!(100)));
        assert_eq!(r.warnings.len(), 1);

        let ok = assess(dec!(10000), Decimal::ZERO, dec!(80), Some(dec!(100)));
        assert_eq!(ok.suggested_amount, None);

        let no_history = assess(dec!(10000), Decimal::ZERO, dec!(1), Some(Decimal::ZERO));
        assert_eq!(no_history.suggested_amount, None);
    }

    #[test]
    fn health_score_deductions() {
        // healthy on every axis
        assert_eq!(
            financial_health_score(dec!(10000), dec!(3000), dec!(5000), dec!(2000)),
            100
        );
        // balance < 2x expense, headroom < 10%, expense > income
        assert_eq!(
            financial_health_score(dec!(1000), dec!(50), dec!(500), dec!(600)),
            5
        );
        // balance < 3x expense, headroom < 20%, expense > 90% income
        assert_eq!(
            financial_health_score(dec!(2500), dec!(400), dec!(1000), dec!(950)),
            50
        );
    }

    #[test]
    fn health_score_with_no_activity() {
        assert_eq!(
            financial_health_score(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
            100
        );
    }
}
