// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::POLICY;
use crate::engine::aggregate::{self, BudgetScope, BudgetUsage};
use crate::engine::ledger;
use crate::engine::overlap;
use crate::errors::{LedgerError, Result};
use crate::models::{Budget, Transaction, TxKind};
use crate::notify::Notice;
use crate::services::categories;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub category_id: i64,
    pub name: Option<String>,
    pub amount: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub alert_threshold: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetUpdate {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub alert_threshold: Option<Decimal>,
}

/// One row of a bulk update. `None` keeps the budget's current value.
#[derive(Debug, Clone, Default)]
pub struct BulkBudgetUpdate {
    pub budget_id: i64,
    pub amount: Option<Decimal>,
    pub alert_threshold: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// One period applied to several categories at once.
#[derive(Debug, Clone)]
pub struct BudgetTemplate {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub alert_threshold: Option<Decimal>,
    pub items: Vec<(i64, Decimal)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetPerformance {
    pub on_track: usize,
    pub near_limit: usize,
    pub over_budget: usize,
    pub budgets: Vec<BudgetUsage>,
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::validation("budget amount must be positive"));
    }
    Ok(())
}

fn check_threshold(threshold: Decimal) -> Result<()> {
    if threshold <= Decimal::ZERO || threshold > Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation(
            "alert threshold must be greater than 0 and at most 100",
        ));
    }
    Ok(())
}

pub fn get_budget(conn: &Connection, user_id: i64, budget_id: i64) -> Result<Budget> {
    let sql = format!(
        "SELECT {} FROM budgets WHERE id=?1 AND user_id=?2",
        Budget::COLUMNS
    );
    conn.query_row(&sql, params![budget_id, user_id], Budget::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("budget", budget_id))
}

fn insert_budget(tx: &rusqlite::Transaction<'_>, user_id: i64, new: &NewBudget) -> Result<Budget> {
    check_amount(new.amount)?;
    let threshold = new.alert_threshold.unwrap_or(POLICY.default_alert_threshold);
    check_threshold(threshold)?;
    let category = categories::get_category(tx, user_id, new.category_id)?;
    overlap::check_period(tx, user_id, new.category_id, new.start, new.end, None)?;

    let name = new
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or(category.name);
    tx.execute(
        "INSERT INTO budgets(user_id, category_id, name, amount, start_date, end_date, alert_threshold)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            user_id,
            new.category_id,
            name,
            new.amount.to_string(),
            new.start,
            new.end,
            threshold.to_string()
        ],
    )?;
    let mut budget = get_budget(tx, user_id, tx.last_insert_rowid())?;
    budget.spent_amount = aggregate::compute_spent(tx, &budget)?;
    write_cache(tx, &budget)?;
    Ok(budget)
}

fn write_cache(conn: &Connection, budget: &Budget) -> Result<()> {
    conn.execute(
        "UPDATE budgets SET spent_amount=?1 WHERE id=?2",
        params![budget.spent_amount.to_string(), budget.id],
    )?;
    Ok(())
}

/// Period membership is checked and written under one IMMEDIATE transaction,
/// so two concurrent creates cannot both pass the overlap check.
pub fn create_budget(conn: &mut Connection, user_id: i64, new: &NewBudget) -> Result<Budget> {
    let budget = ledger::atomically(conn, &[], |tx| insert_budget(tx, user_id, new))?;
    tracing::info!(user_id, budget_id = budget.id, category_id = budget.category_id, "budget created");
    Ok(budget)
}

pub fn update_budget(
    conn: &mut Connection,
    user_id: i64,
    budget_id: i64,
    update: &BudgetUpdate,
) -> Result<Budget> {
    let budget = ledger::atomically(conn, &[], |tx| {
        let current = get_budget(tx, user_id, budget_id)?;
        let amount = update.amount.unwrap_or(current.amount);
        let threshold = update.alert_threshold.unwrap_or(current.alert_threshold);
        let start = update.start.unwrap_or(current.start);
        let end = update.end.unwrap_or(current.end);
        check_amount(amount)?;
        check_threshold(threshold)?;
        if start >= end {
            return Err(LedgerError::InvalidRange { start, end });
        }
        if current.is_active {
            overlap::check_period(tx, user_id, current.category_id, start, end, Some(budget_id))?;
        }
        let name = match update.name.as_deref().map(str::trim) {
            Some("") => return Err(LedgerError::validation("budget name cannot be blank")),
            Some(n) => n.to_string(),
            None => current.name.clone(),
        };
        tx.execute(
            "UPDATE budgets SET name=?1, amount=?2, start_date=?3, end_date=?4, alert_threshold=?5
             WHERE id=?6",
            params![
                name,
                amount.to_string(),
                start,
                end,
                threshold.to_string(),
                budget_id
            ],
        )?;
        let mut budget = get_budget(tx, user_id, budget_id)?;
        budget.spent_amount = aggregate::compute_spent(tx, &budget)?;
        write_cache(tx, &budget)?;
        Ok(budget)
    })?;
    tracing::info!(user_id, budget_id, "budget updated");
    Ok(budget)
}

pub fn deactivate_budget(conn: &Connection, user_id: i64, budget_id: i64) -> Result<()> {
    let budget = get_budget(conn, user_id, budget_id)?;
    if !budget.is_active {
        return Err(LedgerError::validation(format!(
            "budget {} is already inactive",
            budget_id
        )));
    }
    conn.execute(
        "UPDATE budgets SET is_active=0 WHERE id=?1",
        params![budget_id],
    )?;
    tracing::info!(user_id, budget_id, "budget deactivated");
    Ok(())
}

/// Puts an inactive budget back in force. Its period is checked against the
/// budgets that became active meanwhile.
pub fn reactivate_budget(conn: &mut Connection, user_id: i64, budget_id: i64) -> Result<Budget> {
    let budget = ledger::atomically(conn, &[], |tx| {
        let current = get_budget(tx, user_id, budget_id)?;
        if current.is_active {
            return Err(LedgerError::validation(format!(
                "budget {} is already active",
                budget_id
            )));
        }
        apply_bulk_row(
            tx,
            user_id,
            &BulkBudgetUpdate {
                budget_id,
                is_active: Some(true),
                ..BulkBudgetUpdate::default()
            },
        )
    })?;
    tracing::info!(user_id, budget_id, "budget reactivated");
    Ok(budget)
}

/// Applies every row or none. Deactivations run first so a batch can swap
/// one budget for another over the same period.
pub fn update_budgets_bulk(
    conn: &mut Connection,
    user_id: i64,
    updates: &[BulkBudgetUpdate],
) -> Result<Vec<Budget>> {
    let budgets = ledger::atomically(conn, &[], |tx| {
        let (off, rest): (Vec<&BulkBudgetUpdate>, Vec<&BulkBudgetUpdate>) =
            updates.iter().partition(|u| u.is_active == Some(false));
        off.into_iter()
            .chain(rest)
            .map(|u| {
                apply_bulk_row(tx, user_id, u).map_err(|e| match e {
                    LedgerError::Validation(msg) => {
                        LedgerError::validation(format!("budget {}: {}", u.budget_id, msg))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()
    })?;
    tracing::info!(user_id, count = budgets.len(), "budgets updated in bulk");
    Ok(budgets)
}

fn apply_bulk_row(
    tx: &rusqlite::Transaction<'_>,
    user_id: i64,
    update: &BulkBudgetUpdate,
) -> Result<Budget> {
    let current = get_budget(tx, user_id, update.budget_id)?;
    let amount = update.amount.unwrap_or(current.amount);
    let threshold = update.alert_threshold.unwrap_or(current.alert_threshold);
    let active = update.is_active.unwrap_or(current.is_active);
    check_amount(amount)?;
    check_threshold(threshold)?;
    if active && !current.is_active {
        overlap::check_period(
            tx,
            user_id,
            current.category_id,
            current.start,
            current.end,
            Some(current.id),
        )?;
    }
    tx.execute(
        "UPDATE budgets SET amount=?1, alert_threshold=?2, is_active=?3 WHERE id=?4",
        params![amount.to_string(), threshold.to_string(), active, current.id],
    )?;
    let mut budget = get_budget(tx, user_id, current.id)?;
    budget.spent_amount = aggregate::compute_spent(tx, &budget)?;
    write_cache(tx, &budget)?;
    Ok(budget)
}

pub fn list_budgets(conn: &Connection, user_id: i64) -> Result<Vec<Budget>> {
    aggregate::load_budgets(conn, user_id, BudgetScope::Active)
}

pub fn current_budgets(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<Vec<Budget>> {
    aggregate::load_budgets(conn, user_id, BudgetScope::Current(today))
}

pub fn budgets_by_category(conn: &Connection, user_id: i64, category_id: i64) -> Result<Vec<Budget>> {
    categories::get_category(conn, user_id, category_id)?;
    Ok(list_budgets(conn, user_id)?
        .into_iter()
        .filter(|b| b.category_id == category_id)
        .collect())
}

/// Spend is recomputed from the history; the stored cache is ignored.
pub fn budget_summary(conn: &Connection, user_id: i64, budget_id: i64) -> Result<BudgetUsage> {
    let budget = get_budget(conn, user_id, budget_id)?;
    aggregate::summarize(conn, &budget)
}

pub fn budget_performance(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<BudgetPerformance> {
    let usages: Vec<BudgetUsage> = aggregate::usage_for_scope(conn, user_id, BudgetScope::Current(today))?
        .into_iter()
        .map(|(_, u)| u)
        .collect();
    let count = |s: aggregate::BudgetStatus| usages.iter().filter(|u| u.status == s).count();
    Ok(BudgetPerformance {
        on_track: count(aggregate::BudgetStatus::Under),
        near_limit: count(aggregate::BudgetStatus::Near),
        over_budget: count(aggregate::BudgetStatus::Over),
        budgets: usages,
    })
}

/// Creates one budget per template item; any failure creates none.
pub fn create_from_template(
    conn: &mut Connection,
    user_id: i64,
    template: &BudgetTemplate,
) -> Result<Vec<Budget>> {
    if template.items.is_empty() {
        return Err(LedgerError::validation("template has no categories"));
    }
    let created = ledger::atomically(conn, &[], |tx| {
        let mut out = Vec::with_capacity(template.items.len());
        for (category_id, amount) in &template.items {
            let new = NewBudget {
                category_id: *category_id,
                name: None,
                amount: *amount,
                start: template.start,
                end: template.end,
                alert_threshold: template.alert_threshold,
            };
            out.push(insert_budget(tx, user_id, &new)?);
        }
        Ok(out)
    })?;
    tracing::info!(user_id, count = created.len(), "budgets created from template");
    Ok(created)
}

/// Rewrites every stale `spent_amount` cache. Returns how many changed.
pub fn sync_spent_cache(conn: &mut Connection, user_id: i64) -> Result<usize> {
    let changed = ledger::atomically(conn, &[], |tx| {
        let mut changed = 0;
        for mut budget in aggregate::load_budgets(tx, user_id, BudgetScope::Active)? {
            let spent = aggregate::compute_spent(tx, &budget)?;
            if spent != budget.spent_amount {
                budget.spent_amount = spent;
                write_cache(tx, &budget)?;
                changed += 1;
            }
        }
        Ok(changed)
    })?;
    tracing::info!(user_id, changed, "budget caches synced");
    Ok(changed)
}

/// Notices for budgets whose threshold was crossed by this expense.
pub fn threshold_crossings(conn: &Connection, t: &Transaction) -> Result<Vec<Notice>> {
    let Some(category_id) = t.category_id else {
        return Ok(Vec::new());
    };
    if t.kind != TxKind::Expense {
        return Ok(Vec::new());
    }
    let mut notices = Vec::new();
    for budget in aggregate::load_budgets(conn, t.user_id, BudgetScope::Current(t.date))? {
        if budget.category_id != category_id {
            continue;
        }
        let after = aggregate::summarize(conn, &budget)?;
        let before = aggregate::usage_from(&budget, after.spent - t.amount);
        if after.is_alert && !before.is_alert {
            notices.push(Notice::BudgetThreshold {
                user_id: t.user_id,
                budget_id: budget.id,
                budget_name: budget.name.clone(),
                percentage_used: after.percentage_used,
                alert_threshold: budget.alert_threshold,
            });
        }
    }
    Ok(notices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO categories(id,user_id,name,type) VALUES (1,1,'Food','Expense'),(2,1,'Rent','Expense');",
        )
        .unwrap();
        conn
    }

    fn new(category_id: i64, amount: Decimal, start: NaiveDate, end: NaiveDate) -> NewBudget {
        NewBudget {
            category_id,
            name: None,
            amount,
            start,
            end,
            alert_threshold: None,
        }
    }

    #[test]
    fn defaults_name_and_threshold() {
        let mut conn = setup();
        let b = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        assert_eq!(b.name, "Food");
        assert_eq!(b.alert_threshold, dec!(80));
    }

    #[test]
    fn rejects_bad_amount_and_threshold() {
        let mut conn = setup();
        assert!(create_budget(&mut conn, 1, &new(1, dec!(0), d(1, 1), d(2, 1))).is_err());
        let mut b = new(1, dec!(10), d(1, 1), d(2, 1));
        b.alert_threshold = Some(dec!(101));
        assert!(create_budget(&mut conn, 1, &b).is_err());
        b.alert_threshold = Some(dec!(0));
        assert!(create_budget(&mut conn, 1, &b).is_err());
        b.alert_threshold = Some(dec!(100));
        create_budget(&mut conn, 1, &b).unwrap();
    }

    #[test]
    fn update_excludes_itself_from_overlap() {
        let mut conn = setup();
        let b = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        let widened = update_budget(
            &mut conn,
            1,
            b.id,
            &BudgetUpdate {
                end: Some(d(2, 15)),
                ..BudgetUpdate::default()
            },
        )
        .unwrap();
        assert_eq!(widened.end, d(2, 15));

        let other = create_budget(&mut conn, 1, &new(1, dec!(300), d(3, 1), d(4, 1))).unwrap();
        let err = update_budget(
            &mut conn,
            1,
            other.id,
            &BudgetUpdate {
                start: Some(d(2, 10)),
                ..BudgetUpdate::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Overlap { budget_id, .. } if budget_id == b.id));
    }

    #[test]
    fn template_is_all_or_nothing() {
        let mut conn = setup();
        create_budget(&mut conn, 1, &new(2, dec!(900), d(1, 1), d(2, 1))).unwrap();
        let template = BudgetTemplate {
            start: d(1, 1),
            end: d(2, 1),
            alert_threshold: None,
            items: vec![(1, dec!(300)), (2, dec!(900))],
        };
        assert!(create_from_template(&mut conn, 1, &template).is_err());
        assert_eq!(list_budgets(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn deactivated_budget_frees_its_period() {
        let mut conn = setup();
        let b = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        deactivate_budget(&conn, 1, b.id).unwrap();
        create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        assert!(deactivate_budget(&conn, 1, b.id).is_err());
    }

    #[test]
    fn reactivation_rechecks_the_period() {
        let mut conn = setup();
        let old = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        deactivate_budget(&conn, 1, old.id).unwrap();
        let newer = create_budget(&mut conn, 1, &new(1, dec!(350), d(1, 15), d(2, 15))).unwrap();

        let err = reactivate_budget(&mut conn, 1, old.id).unwrap_err();
        assert!(matches!(err, LedgerError::Overlap { budget_id, .. } if budget_id == newer.id));
        assert!(!get_budget(&conn, 1, old.id).unwrap().is_active);

        deactivate_budget(&conn, 1, newer.id).unwrap();
        let back = reactivate_budget(&mut conn, 1, old.id).unwrap();
        assert!(back.is_active);
        assert!(reactivate_budget(&mut conn, 1, old.id).is_err());
    }

    #[test]
    fn bulk_update_applies_every_row_or_none() {
        let mut conn = setup();
        let food = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        let rent = create_budget(&mut conn, 1, &new(2, dec!(900), d(1, 1), d(2, 1))).unwrap();

        let err = update_budgets_bulk(
            &mut conn,
            1,
            &[
                BulkBudgetUpdate { budget_id: food.id, amount: Some(dec!(400)), ..BulkBudgetUpdate::default() },
                BulkBudgetUpdate { budget_id: rent.id, alert_threshold: Some(dec!(150)), ..BulkBudgetUpdate::default() },
            ],
        )
        .unwrap_err();
        assert!(matches!(&err, LedgerError::Validation(msg) if msg.starts_with(&format!("budget {}:", rent.id))));
        assert_eq!(get_budget(&conn, 1, food.id).unwrap().amount, dec!(300));

        let done = update_budgets_bulk(
            &mut conn,
            1,
            &[
                BulkBudgetUpdate { budget_id: food.id, amount: Some(dec!(400)), ..BulkBudgetUpdate::default() },
                BulkBudgetUpdate { budget_id: rent.id, is_active: Some(false), ..BulkBudgetUpdate::default() },
            ],
        )
        .unwrap();
        assert_eq!(done.len(), 2);
        assert_eq!(get_budget(&conn, 1, food.id).unwrap().amount, dec!(400));
        assert_eq!(list_budgets(&conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn bulk_update_can_swap_budgets_over_one_period() {
        let mut conn = setup();
        let old = create_budget(&mut conn, 1, &new(1, dec!(300), d(1, 1), d(2, 1))).unwrap();
        deactivate_budget(&conn, 1, old.id).unwrap();
        let current = create_budget(&mut conn, 1, &new(1, dec!(500), d(1, 1), d(2, 1))).unwrap();

        update_budgets_bulk(
            &mut conn,
            1,
            &[
                BulkBudgetUpdate { budget_id: old.id, is_active: Some(true), ..BulkBudgetUpdate::default() },
                BulkBudgetUpdate { budget_id: current.id, is_active: Some(false), ..BulkBudgetUpdate::default() },
            ],
        )
        .unwrap();
        let active = list_budgets(&conn, 1).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, old.id);
    }
}
