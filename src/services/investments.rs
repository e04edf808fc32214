// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Holdings whose gain or loss is realized into the linked account each time
//! the holding is valued.

use crate::config::{INVESTMENT_KINDS, POLICY};
use crate::errors::{LedgerError, Result};
use crate::engine::ledger;
use crate::models::{CategoryKind, Investment, Transaction, TxKind};
use crate::services::categories;
use crate::services::transactions::{NewTransaction, record_entry};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

pub const GAIN_CATEGORY: &str = "Investment Gain";
pub const LOSS_CATEGORY: &str = "Investment Loss";

#[derive(Debug, Clone)]
pub struct NewInvestment {
    pub name: String,
    pub kind: String,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub total_invested: Decimal,
    pub current_value: Option<Decimal>,
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Valuation {
    pub investment: Investment,
    pub realized: Option<Transaction>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KindBreakdown {
    pub count: usize,
    pub total_invested: Decimal,
    pub total_current_value: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_pct: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Performer {
    pub investment_id: i64,
    pub name: String,
    pub gain_loss_pct: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InvestmentSummary {
    pub total_investments: usize,
    pub total_invested: Decimal,
    pub total_current_value: Decimal,
    pub total_gain_loss: Decimal,
    pub total_gain_loss_pct: Decimal,
    pub by_kind: BTreeMap<String, KindBreakdown>,
    pub top_performers: Vec<Performer>,
    pub worst_performers: Vec<Performer>,
}

fn pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        (part / whole * Decimal::ONE_HUNDRED).round_dp(2)
    } else {
        Decimal::ZERO
    }
}

/// The part of the current gap not yet booked to the account, or `None` when
/// it is within the realization epsilon.
pub fn unrealized_delta(investment: &Investment) -> Option<Decimal> {
    let gap = investment.gain_loss()?;
    let delta = gap - investment.realized_gain;
    (delta.abs() > POLICY.realization_epsilon).then_some(delta)
}

pub fn get_investment(conn: &Connection, user_id: i64, id: i64) -> Result<Investment> {
    let sql = format!(
        "SELECT {} FROM investments WHERE id=?1 AND user_id=?2",
        Investment::COLUMNS
    );
    conn.query_row(&sql, params![id, user_id], Investment::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("investment", id))
}

/// Books any unrealized gap as an Income or Expense entry on the linked
/// account and records it as realized.
fn realize(
    tx: &rusqlite::Transaction<'_>,
    user_id: i64,
    investment: &Investment,
    date: NaiveDate,
) -> Result<Option<Transaction>> {
    let (Some(account_id), Some(delta)) = (investment.account_id, unrealized_delta(investment))
    else {
        return Ok(None);
    };
    let (kind, category, label) = if delta > Decimal::ZERO {
        (TxKind::Income, categories::find_or_create_category(tx, user_id, GAIN_CATEGORY, CategoryKind::Income)?, "gain")
    } else {
        (TxKind::Expense, categories::find_or_create_category(tx, user_id, LOSS_CATEGORY, CategoryKind::Expense)?, "loss")
    };
    let mut entry = record_entry(
        tx,
        user_id,
        &NewTransaction {
            account_id,
            category_id: Some(category.id),
            kind,
            amount: delta.abs(),
            date,
            description: Some(format!("Investment {}: {}", label, investment.name)),
            merchant: None,
            is_recurring: false,
        },
    )?;
    tx.execute(
        "UPDATE transactions SET investment_id=?1 WHERE id=?2",
        params![investment.id, entry.id],
    )?;
    entry.investment_id = Some(investment.id);
    let realized = investment.realized_gain + delta;
    tx.execute(
        "UPDATE investments SET realized_gain=?1 WHERE id=?2",
        params![realized.to_string(), investment.id],
    )?;
    tracing::info!(user_id, investment_id = investment.id, %delta, "investment result realized");
    Ok(Some(entry))
}

/// Takes a deleted realization entry's signed amount back out of
/// `realized_gain`, so the next valuation books the gap again.
pub(crate) fn unrealize(
    tx: &rusqlite::Transaction<'_>,
    investment_id: i64,
    booked: Decimal,
) -> Result<()> {
    let realized = tx
        .query_row(
            "SELECT realized_gain FROM investments WHERE id=?1",
            params![investment_id],
            |r| crate::db::decimal_at(r, 0),
        )
        .optional()?
        .ok_or_else(|| LedgerError::not_found("investment", investment_id))?;
    tx.execute(
        "UPDATE investments SET realized_gain=?1 WHERE id=?2",
        params![(realized - booked).to_string(), investment_id],
    )?;
    tracing::info!(investment_id, %booked, "realization withdrawn");
    Ok(())
}

pub fn create_investment(
    conn: &mut Connection,
    user_id: i64,
    new: &NewInvestment,
    today: NaiveDate,
) -> Result<Valuation> {
    if new.name.trim().is_empty() {
        return Err(LedgerError::validation("investment name is required"));
    }
    let kind = INVESTMENT_KINDS
        .iter()
        .find(|k| k.eq_ignore_ascii_case(new.kind.trim()))
        .copied()
        .ok_or_else(|| {
            LedgerError::validation(format!(
                "unknown investment kind '{}', expected one of: {}",
                new.kind,
                INVESTMENT_KINDS.join(", ")
            ))
        })?;
    if new.total_invested <= Decimal::ZERO {
        return Err(LedgerError::validation("total invested must be positive"));
    }
    if let (Some(q), Some(p)) = (new.quantity, new.purchase_price) {
        if q * p != new.total_invested {
            return Err(LedgerError::validation(format!(
                "total invested {} does not equal quantity {} x purchase price {}",
                new.total_invested, q, p
            )));
        }
    }
    if new.current_value.is_some_and(|v| v < Decimal::ZERO) {
        return Err(LedgerError::validation("current value cannot be negative"));
    }

    let accounts: Vec<i64> = new.account_id.into_iter().collect();
    let valuation = ledger::atomically(conn, &accounts, |tx| {
        if let Some(account_id) = new.account_id {
            ledger::usable_account(tx, user_id, account_id)?;
        }
        tx.execute(
            "INSERT INTO investments(user_id, name, kind, symbol, quantity, purchase_price, current_price,
                                     total_invested, current_value, account_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                user_id,
                new.name.trim(),
                kind,
                new.symbol.as_deref().map(|s| s.trim().to_uppercase()),
                new.quantity.map(|d| d.to_string()),
                new.purchase_price.map(|d| d.to_string()),
                new.current_price.map(|d| d.to_string()),
                new.total_invested.to_string(),
                new.current_value.map(|d| d.to_string()),
                new.account_id
            ],
        )?;
        let id = tx.last_insert_rowid();
        let investment = get_investment(tx, user_id, id)?;
        let realized = realize(tx, user_id, &investment, today)?;
        Ok(Valuation {
            investment: get_investment(tx, user_id, id)?,
            realized,
        })
    })?;
    tracing::info!(user_id, investment_id = valuation.investment.id, "investment created");
    Ok(valuation)
}

/// Sets a new market value and realizes only what changed since the last
/// realization.
pub fn revalue_investment(
    conn: &mut Connection,
    user_id: i64,
    id: i64,
    current_value: Decimal,
    current_price: Option<Decimal>,
    today: NaiveDate,
) -> Result<Valuation> {
    if current_value < Decimal::ZERO {
        return Err(LedgerError::validation("current value cannot be negative"));
    }
    let linked = get_investment(conn, user_id, id)?.account_id;
    let accounts: Vec<i64> = linked.into_iter().collect();
    ledger::atomically(conn, &accounts, |tx| {
        let before = get_investment(tx, user_id, id)?;
        if !before.is_active {
            return Err(LedgerError::validation(format!(
                "investment {} is inactive",
                id
            )));
        }
        tx.execute(
            "UPDATE investments SET current_value=?1, current_price=COALESCE(?2, current_price) WHERE id=?3",
            params![
                current_value.to_string(),
                current_price.map(|d| d.to_string()),
                id
            ],
        )?;
        let investment = get_investment(tx, user_id, id)?;
        let realized = realize(tx, user_id, &investment, today)?;
        Ok(Valuation {
            investment: get_investment(tx, user_id, id)?,
            realized,
        })
    })
}

pub fn deactivate_investment(conn: &Connection, user_id: i64, id: i64) -> Result<()> {
    let inv = get_investment(conn, user_id, id)?;
    if !inv.is_active {
        return Err(LedgerError::validation(format!(
            "investment {} is already inactive",
            id
        )));
    }
    conn.execute(
        "UPDATE investments SET is_active=0 WHERE id=?1",
        params![id],
    )?;
    Ok(())
}

pub fn list_investments(conn: &Connection, user_id: i64) -> Result<Vec<Investment>> {
    let sql = format!(
        "SELECT {} FROM investments WHERE user_id=?1 AND is_active=1 ORDER BY id",
        Investment::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Investment::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn investment_summary(conn: &Connection, user_id: i64) -> Result<InvestmentSummary> {
    let investments = list_investments(conn, user_id)?;
    if investments.is_empty() {
        return Ok(InvestmentSummary::default());
    }
    let value = |i: &Investment| i.current_value.unwrap_or(Decimal::ZERO);

    let total_invested: Decimal = investments.iter().map(|i| i.total_invested).sum();
    let total_current_value: Decimal = investments.iter().map(value).sum();
    let total_gain_loss = total_current_value - total_invested;

    let mut by_kind: BTreeMap<String, KindBreakdown> = BTreeMap::new();
    for i in &investments {
        let entry = by_kind.entry(i.kind.clone()).or_default();
        entry.count += 1;
        entry.total_invested += i.total_invested;
        entry.total_current_value += value(i);
    }
    for entry in by_kind.values_mut() {
        entry.gain_loss = entry.total_current_value - entry.total_invested;
        entry.gain_loss_pct = pct(entry.gain_loss, entry.total_invested);
    }

    let mut ranked: Vec<Performer> = investments
        .iter()
        .filter_map(|i| {
            i.gain_loss().map(|g| Performer {
                investment_id: i.id,
                name: i.name.clone(),
                gain_loss_pct: pct(g, i.total_invested),
            })
        })
        .collect();
    ranked.sort_by(|a, b| b.gain_loss_pct.cmp(&a.gain_loss_pct));
    let top_performers: Vec<Performer> = ranked.iter().take(3).cloned().collect();
    let worst_performers: Vec<Performer> = ranked.iter().rev().take(3).cloned().collect();

    Ok(InvestmentSummary {
        total_investments: investments.len(),
        total_invested,
        total_current_value,
        total_gain_loss,
        total_gain_loss_pct: pct(total_gain_loss, total_invested),
        by_kind,
        top_performers,
        worst_performers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::transactions;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts(id,user_id,name,type,currency,initial_balance,balance) VALUES
             (1,1,'Brokerage','Investment','USD','100','100')",
            [],
        )
        .unwrap();
        conn
    }

    fn new(invested: Decimal, value: Option<Decimal>) -> NewInvestment {
        NewInvestment {
            name: "Index fund".into(),
            kind: "etf".into(),
            symbol: Some("vti".into()),
            quantity: None,
            purchase_price: None,
            current_price: None,
            total_invested: invested,
            current_value: value,
            account_id: Some(1),
        }
    }

    fn balance(conn: &Connection) -> Decimal {
        ledger::load_account(conn, 1).unwrap().unwrap().balance
    }

    #[test]
    fn gain_is_booked_once_under_gain_category() {
        let mut conn = setup();
        let v = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1200))), today()).unwrap();
        let entry = v.realized.unwrap();
        assert_eq!(entry.kind, TxKind::Income);
        assert_eq!(entry.amount, dec!(200));
        assert_eq!(balance(&conn), dec!(300));
        assert_eq!(v.investment.kind, "ETF");
        assert_eq!(v.investment.symbol.as_deref(), Some("VTI"));

        // same value again books nothing
        let again = revalue_investment(&mut conn, 1, v.investment.id, dec!(1200), None, today()).unwrap();
        assert!(again.realized.is_none());
        assert_eq!(balance(&conn), dec!(300));

        let cat = categories::find_category(&conn, 1, GAIN_CATEGORY).unwrap().unwrap();
        assert_eq!(cat.kind, CategoryKind::Income);
    }

    #[test]
    fn drop_after_gain_books_only_the_difference() {
        let mut conn = setup();
        let v = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1200))), today()).unwrap();
        let down = revalue_investment(&mut conn, 1, v.investment.id, dec!(900), None, today()).unwrap();
        let entry = down.realized.unwrap();
        assert_eq!(entry.kind, TxKind::Expense);
        assert_eq!(entry.amount, dec!(300));
        assert_eq!(down.investment.realized_gain, dec!(-100));
        assert_eq!(balance(&conn), dec!(0));
    }

    #[test]
    fn deleting_a_realized_gain_lets_the_next_valuation_book_it_again() {
        let mut conn = setup();
        let v = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1200))), today()).unwrap();
        let entry = v.realized.unwrap();
        assert_eq!(entry.investment_id, Some(v.investment.id));
        assert_eq!(balance(&conn), dec!(300));

        transactions::delete_transaction(&mut conn, 1, entry.id).unwrap();
        assert_eq!(balance(&conn), dec!(100));
        assert_eq!(get_investment(&conn, 1, v.investment.id).unwrap().realized_gain, dec!(0));

        let again = revalue_investment(&mut conn, 1, v.investment.id, dec!(1200), None, today()).unwrap();
        assert_eq!(again.realized.unwrap().amount, dec!(200));
        assert_eq!(again.investment.realized_gain, dec!(200));
        assert_eq!(balance(&conn), dec!(300));
    }

    #[test]
    fn deleting_a_realized_loss_restores_the_gain_baseline() {
        let mut conn = setup();
        let v = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1200))), today()).unwrap();
        let down = revalue_investment(&mut conn, 1, v.investment.id, dec!(1100), None, today()).unwrap();
        assert_eq!(balance(&conn), dec!(200));

        transactions::delete_transaction(&mut conn, 1, down.realized.unwrap().id).unwrap();
        assert_eq!(balance(&conn), dec!(300));
        assert_eq!(get_investment(&conn, 1, v.investment.id).unwrap().realized_gain, dec!(200));
    }

    #[test]
    fn gain_category_of_the_wrong_kind_blocks_realization() {
        let mut conn = setup();
        categories::create_category(&conn, 1, GAIN_CATEGORY, CategoryKind::Expense).unwrap();
        let err = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1200))), today()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)), "{err:?}");
        assert_eq!(balance(&conn), dec!(100));
        assert!(list_investments(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn negligible_gap_is_ignored() {
        let mut conn = setup();
        let v = create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1000.01))), today()).unwrap();
        assert!(v.realized.is_none());
        assert_eq!(balance(&conn), dec!(100));
    }

    #[test]
    fn quantity_times_price_must_match() {
        let mut conn = setup();
        let mut bad = new(dec!(1000), None);
        bad.quantity = Some(dec!(10));
        bad.purchase_price = Some(dec!(99));
        assert!(create_investment(&mut conn, 1, &bad, today()).is_err());
        bad.purchase_price = Some(dec!(100));
        create_investment(&mut conn, 1, &bad, today()).unwrap();
    }

    #[test]
    fn summary_groups_and_ranks() {
        let mut conn = setup();
        create_investment(&mut conn, 1, &new(dec!(1000), Some(dec!(1100))), today()).unwrap();
        let mut bond = new(dec!(500), Some(dec!(450)));
        bond.kind = "Bonds".into();
        create_investment(&mut conn, 1, &bond, today()).unwrap();
        let s = investment_summary(&conn, 1).unwrap();
        assert_eq!(s.total_investments, 2);
        assert_eq!(s.total_gain_loss, dec!(50));
        assert_eq!(s.by_kind["Bonds"].gain_loss_pct, dec!(-10));
        assert_eq!(s.top_performers[0].gain_loss_pct, dec!(10));
        assert_eq!(s.worst_performers[0].gain_loss_pct, dec!(-10));
    }
}
