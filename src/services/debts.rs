// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Money owed to third parties. Borrowing credits the linked account with no
//! funds precondition; payments go to the creditor outside the tracked
//! accounts and leave balances alone.

use crate::config::{DEBT_TYPES, is_debt_type};
use crate::engine::feasibility::totals_since;
use crate::engine::ledger::{self, EntrySource, LedgerEvent};
use crate::errors::{LedgerError, Result};
use crate::models::Debt;
use crate::services::loans::Payment;
use chrono::{Days, Months, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct NewDebt {
    pub name: String,
    pub debt_type: String,
    pub creditor: Option<String>,
    pub original_amount: Decimal,
    pub current_balance: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub next_payment_date: Option<NaiveDate>,
    pub account_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct DebtUpdate {
    pub name: Option<String>,
    pub debt_type: Option<String>,
    pub creditor: Option<String>,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub next_payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtSummary {
    pub total_debts: usize,
    pub total_original_amount: Decimal,
    pub total_current_balance: Decimal,
    pub total_minimum_payment: Decimal,
    pub total_interest_paid: Decimal,
    pub debt_to_income_ratio: Decimal,
    pub debts: Vec<Debt>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtDueNotice {
    pub debt_id: i64,
    pub name: String,
    pub creditor: Option<String>,
    pub next_payment_date: NaiveDate,
    pub minimum_payment: Decimal,
    pub current_balance: Decimal,
    pub overdue: bool,
    pub message: String,
}

fn check_type(debt_type: &str) -> Result<()> {
    if !is_debt_type(debt_type) {
        return Err(LedgerError::validation(format!(
            "invalid debt type '{}', expected one of: {}",
            debt_type,
            DEBT_TYPES.join(", ")
        )));
    }
    Ok(())
}

fn check_non_negative(label: &str, v: Option<Decimal>) -> Result<()> {
    match v {
        Some(v) if v < Decimal::ZERO => Err(LedgerError::validation(format!(
            "{} cannot be negative",
            label
        ))),
        _ => Ok(()),
    }
}

/// Fetches an active debt owned by the user.
pub fn get_debt(conn: &Connection, user_id: i64, debt_id: i64) -> Result<Debt> {
    let sql = format!(
        "SELECT {} FROM debts WHERE id=?1 AND user_id=?2 AND is_active=1",
        Debt::COLUMNS
    );
    conn.query_row(&sql, params![debt_id, user_id], Debt::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("debt", debt_id))
}

pub fn create_debt(conn: &mut Connection, user_id: i64, new: &NewDebt) -> Result<Debt> {
    if new.name.trim().is_empty() {
        return Err(LedgerError::validation("debt name is required"));
    }
    check_type(&new.debt_type)?;
    if new.original_amount <= Decimal::ZERO {
        return Err(LedgerError::validation("original amount must be positive"));
    }
    let current = new.current_balance.unwrap_or(new.original_amount);
    check_non_negative("current balance", Some(current))?;
    check_non_negative("interest rate", new.interest_rate)?;
    check_non_negative("minimum payment", new.minimum_payment)?;

    let accounts: Vec<i64> = new.account_id.into_iter().collect();
    let debt = ledger::atomically(conn, &accounts, |tx| {
        let proceeds = new.account_id.map(|account_id| LedgerEvent::Credit {
            account_id,
            amount: new.original_amount,
        });
        if let Some(event) = &proceeds {
            ledger::check(tx, user_id, event)?;
        }
        tx.execute(
            "INSERT INTO debts(user_id, name, debt_type, creditor, original_amount, current_balance,
                               interest_rate, minimum_payment, next_payment_date, account_id)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                user_id,
                new.name.trim(),
                new.debt_type,
                new.creditor,
                new.original_amount.to_string(),
                current.to_string(),
                new.interest_rate.map(|d| d.to_string()),
                new.minimum_payment.map(|d| d.to_string()),
                new.next_payment_date,
                new.account_id
            ],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(event) = &proceeds {
            ledger::apply(tx, user_id, event, EntrySource::Debt, Some(id))?;
        }
        get_debt(tx, user_id, id)
    })?;
    tracing::info!(user_id, debt_id = debt.id, amount = %debt.original_amount, "debt recorded");
    Ok(debt)
}

/// Metadata only; balances and the linked account cannot change here.
pub fn update_debt(conn: &Connection, user_id: i64, debt_id: i64, update: &DebtUpdate) -> Result<Debt> {
    let debt = get_debt(conn, user_id, debt_id)?;
    if let Some(t) = &update.debt_type {
        check_type(t)?;
    }
    check_non_negative("interest rate", update.interest_rate)?;
    check_non_negative("minimum payment", update.minimum_payment)?;
    let name = match update.name.as_deref().map(str::trim) {
        Some("") => return Err(LedgerError::validation("debt name cannot be blank")),
        Some(n) => n.to_string(),
        None => debt.name,
    };
    conn.execute(
        "UPDATE debts SET name=?1, debt_type=?2, creditor=?3, interest_rate=?4,
                          minimum_payment=?5, next_payment_date=?6
         WHERE id=?7",
        params![
            name,
            update.debt_type.clone().unwrap_or(debt.debt_type),
            update.creditor.clone().or(debt.creditor),
            update.interest_rate.or(debt.interest_rate).map(|d| d.to_string()),
            update.minimum_payment.or(debt.minimum_payment).map(|d| d.to_string()),
            update.next_payment_date.or(debt.next_payment_date),
            debt_id
        ],
    )?;
    get_debt(conn, user_id, debt_id)
}

pub fn deactivate_debt(conn: &Connection, user_id: i64, debt_id: i64) -> Result<()> {
    get_debt(conn, user_id, debt_id)?;
    conn.execute("UPDATE debts SET is_active=0 WHERE id=?1", params![debt_id])?;
    tracing::info!(user_id, debt_id, "debt deactivated");
    Ok(())
}

pub fn record_debt_payment(
    conn: &mut Connection,
    user_id: i64,
    debt_id: i64,
    payment: &Payment,
) -> Result<Debt> {
    let (principal, interest) = payment.split()?;
    // account-neutral, so no account locks; IMMEDIATE still serializes writers
    let debt = ledger::atomically(conn, &[], |tx| {
        let debt = get_debt(tx, user_id, debt_id)?;
        if principal > debt.current_balance {
            return Err(LedgerError::validation(format!(
                "payment of {} exceeds the current balance {}",
                principal, debt.current_balance
            )));
        }
        tx.execute(
            "INSERT INTO debt_payments(debt_id, amount, principal_part, interest_part, date)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                debt_id,
                payment.amount.to_string(),
                principal.to_string(),
                interest.to_string(),
                payment.date
            ],
        )?;
        let remaining = debt.current_balance - principal;
        tx.execute(
            "UPDATE debts SET current_balance=?1 WHERE id=?2",
            params![remaining.to_string(), debt_id],
        )?;
        get_debt(tx, user_id, debt_id)
    })?;
    tracing::info!(user_id, debt_id, amount = %payment.amount, remaining = %debt.current_balance, "debt payment recorded");
    Ok(debt)
}

pub fn list_debts(conn: &Connection, user_id: i64) -> Result<Vec<Debt>> {
    let sql = format!(
        "SELECT {} FROM debts WHERE user_id=?1 AND is_active=1 ORDER BY id",
        Debt::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Debt::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Minimum payments over last month's income, as a percentage. Zero when
/// there was no income.
pub fn debt_to_income_ratio(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<Decimal> {
    let minimums: Decimal = list_debts(conn, user_id)?
        .iter()
        .filter_map(|d| d.minimum_payment)
        .sum();
    let since = today.checked_sub_months(Months::new(1)).unwrap_or(today);
    let (income, _) = totals_since(conn, user_id, since)?;
    if income <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok((minimums / income * Decimal::ONE_HUNDRED).round_dp(2))
}

pub fn debt_summary(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<DebtSummary> {
    let debts = list_debts(conn, user_id)?;
    let mut stmt = conn.prepare_cached(
        "SELECT p.interest_part FROM debt_payments p JOIN debts d ON p.debt_id=d.id
         WHERE d.user_id=?1 AND d.is_active=1",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut total_interest_paid = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        total_interest_paid += crate::db::decimal_at(r, 0)?;
    }
    Ok(DebtSummary {
        total_debts: debts.len(),
        total_original_amount: debts.iter().map(|d| d.original_amount).sum(),
        total_current_balance: debts.iter().map(|d| d.current_balance).sum(),
        total_minimum_payment: debts.iter().filter_map(|d| d.minimum_payment).sum(),
        total_interest_paid,
        debt_to_income_ratio: debt_to_income_ratio(conn, user_id, today)?,
        debts,
    })
}

/// Active debts with a payment date on or before `today + days`. A window
/// reaching past the last representable date covers every debt.
pub fn due_notifications(
    conn: &Connection,
    user_id: i64,
    days: i64,
    today: NaiveDate,
) -> Result<Vec<DebtDueNotice>> {
    if days < 0 {
        return Err(LedgerError::validation("days must not be negative"));
    }
    let limit = today
        .checked_add_days(Days::new(days.unsigned_abs()))
        .unwrap_or(NaiveDate::MAX);
    let notices = list_debts(conn, user_id)?
        .into_iter()
        .filter_map(|d| {
            let due = d.next_payment_date.filter(|due| *due <= limit)?;
            let minimum = d.minimum_payment.unwrap_or(Decimal::ZERO);
            let overdue = due < today;
            let message = if overdue {
                format!(
                    "Overdue: your payment of {:.2} for {} was due on {}.",
                    minimum, d.name, due
                )
            } else {
                format!(
                    "Reminder: your payment of {:.2} for {} is due on {}.",
                    minimum, d.name, due
                )
            };
            Some(DebtDueNotice {
                debt_id: d.id,
                name: d.name,
                creditor: d.creditor,
                next_payment_date: due,
                minimum_payment: minimum,
                current_balance: d.current_balance,
                overdue,
                message,
            })
        })
        .collect();
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
        conn.execute(
            "INSERT INTO accounts(id,user_id,name,type,currency,initial_balance,balance) VALUES
             (1,1,'Checking','Checking','USD','0','0')",
            [],
        )
        .unwrap();
        conn
    }

    fn new(amount: Decimal) -> NewDebt {
        NewDebt {
            name: "Car".into(),
            debt_type: "Auto Loan".into(),
            creditor: Some("Bank".into()),
            original_amount: amount,
            current_balance: None,
            interest_rate: Some(dec!(4.5)),
            minimum_payment: Some(dec!(200)),
            next_payment_date: Some(d(1, 20)),
            account_id: Some(1),
        }
    }

    #[test]
    fn borrowing_credits_even_an_empty_account() {
        let mut conn = setup();
        let debt = create_debt(&mut conn, 1, &new(dec!(5000))).unwrap();
        assert_eq!(debt.current_balance, dec!(5000));
        let acct = ledger::load_account(&conn, 1).unwrap().unwrap();
        assert_eq!(acct.balance, dec!(5000));
    }

    #[test]
    fn debt_type_must_match_exactly() {
        let mut conn = setup();
        let mut bad = new(dec!(10));
        bad.debt_type = "auto loan".into();
        assert!(create_debt(&mut conn, 1, &bad).is_err());
        let mut inactive = new(dec!(10));
        conn.execute("UPDATE accounts SET is_active=0", []).unwrap();
        inactive.account_id = Some(1);
        assert!(matches!(
            create_debt(&mut conn, 1, &inactive).unwrap_err(),
            LedgerError::InvalidAccount(1)
        ));
    }

    #[test]
    fn payment_reduces_balance_but_not_account() {
        let mut conn = setup();
        let debt = create_debt(&mut conn, 1, &new(dec!(1000))).unwrap();
        let pay = Payment {
            amount: dec!(300),
            principal: None,
            interest: Some(dec!(50)),
            date: d(1, 20),
        };
        let debt = record_debt_payment(&mut conn, 1, debt.id, &pay).unwrap();
        assert_eq!(debt.current_balance, dec!(750));
        assert_eq!(
            ledger::load_account(&conn, 1).unwrap().unwrap().balance,
            dec!(1000)
        );
        let too_much = Payment {
            amount: dec!(800),
            principal: None,
            interest: None,
            date: d(1, 21),
        };
        assert!(record_debt_payment(&mut conn, 1, debt.id, &too_much).is_err());
        assert_eq!(debt_summary(&conn, 1, d(1, 21)).unwrap().total_interest_paid, dec!(50));
    }

    #[test]
    fn due_notifications_split_overdue_and_reminder() {
        let mut conn = setup();
        create_debt(&mut conn, 1, &new(dec!(10))).unwrap();
        let mut later = new(dec!(10));
        later.next_payment_date = Some(d(2, 20));
        create_debt(&mut conn, 1, &later).unwrap();

        let soon = due_notifications(&conn, 1, 7, d(1, 15)).unwrap();
        assert_eq!(soon.len(), 1);
        assert!(soon[0].message.starts_with("Reminder"));

        let late = due_notifications(&conn, 1, 0, d(1, 25)).unwrap();
        assert_eq!(late.len(), 1);
        assert!(late[0].overdue);
        assert!(late[0].message.starts_with("Overdue"));
    }

    #[test]
    fn huge_due_window_covers_every_debt() {
        let mut conn = setup();
        create_debt(&mut conn, 1, &new(dec!(10))).unwrap();
        let all = due_notifications(&conn, 1, 100_000_000, d(1, 1)).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].overdue);
        assert_eq!(due_notifications(&conn, 1, i64::MAX, d(1, 1)).unwrap().len(), 1);
        assert!(due_notifications(&conn, 1, -1, d(1, 1)).is_err());
    }

    #[test]
    fn ratio_uses_last_month_income() {
        let mut conn = setup();
        create_debt(&mut conn, 1, &new(dec!(10))).unwrap();
        assert_eq!(debt_to_income_ratio(&conn, 1, d(3, 1)).unwrap(), Decimal::ZERO);
        conn.execute(
            "INSERT INTO transactions(user_id,account_id,kind,amount,date) VALUES (1,1,'Income','1000','2025-02-15')",
            [],
        )
        .unwrap();
        assert_eq!(debt_to_income_ratio(&conn, 1, d(3, 1)).unwrap(), dec!(20));
    }
}
