// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Spend against budgets, always derived from the transaction history.
//!
//! Spend includes expenses dated on the budget's end date, while period overlap
//! treats the end date as exclusive. Both rules are kept as they are.

use crate::config::POLICY;
use crate::errors::Result;
use crate::models::Budget;
use chrono::NaiveDate;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Under,
    Near,
    Over,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BudgetStatus::Under => "under",
            BudgetStatus::Near => "near",
            BudgetStatus::Over => "over",
        }
    }
}

/// Fixed buckets, independent of the budget's own alert threshold.
pub fn status_for(percentage_used: Decimal) -> BudgetStatus {
    if percentage_used <= POLICY.under_ceiling_pct {
        BudgetStatus::Under
    } else if percentage_used <= POLICY.near_ceiling_pct {
        BudgetStatus::Near
    } else {
        BudgetStatus::Over
    }
}

pub fn percentage_used(spent: Decimal, amount: Decimal) -> Decimal {
    if amount.is_zero() {
        return Decimal::ZERO;
    }
    spent / amount * Decimal::ONE_HUNDRED
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetUsage {
    pub budget_id: i64,
    pub name: String,
    pub category_id: i64,
    pub amount: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
    pub percentage_used: Decimal,
    pub alert_threshold: Decimal,
    pub status: BudgetStatus,
    pub is_alert: bool,
}

pub fn usage_from(budget: &Budget, spent: Decimal) -> BudgetUsage {
    let pct = percentage_used(spent, budget.amount);
    BudgetUsage {
        budget_id: budget.id,
        name: budget.name.clone(),
        category_id: budget.category_id,
        amount: budget.amount,
        spent,
        remaining: budget.amount - spent,
        percentage_used: pct.round_dp(2),
        alert_threshold: budget.alert_threshold,
        status: status_for(pct),
        is_alert: !budget.amount.is_zero() && pct >= budget.alert_threshold,
    }
}

/// Sum of Expense amounts for the budget's user and category dated within
/// `[start, end]`, end inclusive.
pub fn compute_spent(conn: &Connection, budget: &Budget) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached(
        "SELECT amount FROM transactions
         WHERE user_id=?1 AND category_id=?2 AND kind='Expense'
           AND date>=?3 AND date<=?4",
    )?;
    let mut rows = stmt.query(params![
        budget.user_id,
        budget.category_id,
        budget.start,
        budget.end
    ])?;
    let mut spent = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        spent += crate::db::decimal_at(r, 0)?;
    }
    Ok(spent)
}

pub fn summarize(conn: &Connection, budget: &Budget) -> Result<BudgetUsage> {
    let spent = compute_spent(conn, budget)?;
    Ok(usage_from(budget, spent))
}

#[derive(Debug, Clone, Copy)]
pub enum BudgetScope {
    Active,
    /// Active and covering the given day, both ends inclusive.
    Current(NaiveDate),
    /// Active with a period touching `[start, end]`, both ends inclusive.
    Touching(NaiveDate, NaiveDate),
}

pub fn load_budgets(conn: &Connection, user_id: i64, scope: BudgetScope) -> Result<Vec<Budget>> {
    let base = format!(
        "SELECT {} FROM budgets WHERE user_id=?1 AND is_active=1",
        Budget::COLUMNS
    );
    let (sql, lo, hi) = match scope {
        BudgetScope::Active => (format!("{} ORDER BY start_date, id", base), None, None),
        BudgetScope::Current(day) => (
            format!(
                "{} AND start_date<=?2 AND end_date>=?3 ORDER BY start_date, id",
                base
            ),
            Some(day),
            Some(day),
        ),
        BudgetScope::Touching(start, end) => (
            format!(
                "{} AND start_date<=?2 AND end_date>=?3 ORDER BY start_date, id",
                base
            ),
            Some(end),
            Some(start),
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = match (lo, hi) {
        (Some(lo), Some(hi)) => stmt
            .query_map(params![user_id, lo, hi], Budget::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        _ => stmt
            .query_map(params![user_id], Budget::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

/// Recomputed usage for every budget in scope.
pub fn usage_for_scope(
    conn: &Connection,
    user_id: i64,
    scope: BudgetScope,
) -> Result<Vec<(Budget, BudgetUsage)>> {
    let budgets = load_budgets(conn, user_id, scope)?;
    let mut out = Vec::with_capacity(budgets.len());
    for b in budgets {
        let usage = summarize(conn, &b)?;
        out.push((b, usage));
    }
    tracing::debug!(user_id, count = out.len(), "budget usage derived");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buckets_use_fixed_edges() {
        assert_eq!(status_for(dec!(0)), BudgetStatus::Under);
        assert_eq!(status_for(dec!(70)), BudgetStatus::Under);
        assert_eq!(status_for(dec!(70.01)), BudgetStatus::Near);
        assert_eq!(status_for(dec!(100)), BudgetStatus::Near);
        assert_eq!(status_for(dec!(100.01)), BudgetStatus::Over);
    }

    #[test]
    fn zero_amount_budget_reports_zero_percent() {
        assert_eq!(percentage_used(dec!(50), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(percentage_used(dec!(50), dec!(200)), dec!(25));
    }

    fn budget(amount: Decimal, threshold: Decimal) -> Budget {
        Budget {
            id: 1,
            user_id: 1,
            category_id: 1,
            name: "Food".into(),
            amount,
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            alert_threshold: threshold,
            spent_amount: Decimal::ZERO,
            is_active: true,
        }
    }

    #[test]
    fn usage_flags_threshold() {
        let b = budget(dec!(1000), dec!(80));
        let hit = usage_from(&b, dec!(850));
        assert!(hit.is_alert);
        assert_eq!(hit.percentage_used, dec!(85));
        assert_eq!(hit.status, BudgetStatus::Near);
        assert!(!usage_from(&b, dec!(750)).is_alert);
        assert_eq!(usage_from(&b, dec!(1200)).remaining, dec!(-200));
    }
}
