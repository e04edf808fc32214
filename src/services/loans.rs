// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Money lent out to a borrower. Disbursing debits the lender's account and
//! requires the funds to be there; repayments credit it back.

use crate::config::POLICY;
use crate::engine::ledger::{self, EntrySource, LedgerEvent};
use crate::errors::{LedgerError, Result};
use crate::models::Loan;
use chrono::{Days, NaiveDate};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub const STATUS_ACTIVE: &str = "Active";
pub const STATUS_COMPLETED: &str = "Completed";

#[derive(Debug, Clone)]
pub struct NewLoan {
    pub name: String,
    pub borrower: String,
    pub principal: Decimal,
    pub interest_rate: Decimal,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub account_id: Option<i64>,
}

/// A repayment. Portions left out are derived from the total.
#[derive(Debug, Clone)]
pub struct Payment {
    pub amount: Decimal,
    pub principal: Option<Decimal>,
    pub interest: Option<Decimal>,
    pub date: NaiveDate,
}

impl Payment {
    /// Splits the payment into `(principal, interest)`.
    pub fn split(&self) -> Result<(Decimal, Decimal)> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::validation("payment amount must be positive"));
        }
        let (principal, interest) = match (self.principal, self.interest) {
            (Some(p), Some(i)) => (p, i),
            (Some(p), None) => (p, self.amount - p),
            (None, Some(i)) => (self.amount - i, i),
            (None, None) => (self.amount, Decimal::ZERO),
        };
        if principal < Decimal::ZERO || interest < Decimal::ZERO {
            return Err(LedgerError::validation(
                "principal and interest portions cannot be negative",
            ));
        }
        if principal + interest != self.amount {
            return Err(LedgerError::validation(
                "principal and interest portions must add up to the payment amount",
            ));
        }
        Ok((principal, interest))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoanSummary {
    pub total_loans: usize,
    pub active_loans: usize,
    pub total_lent: Decimal,
    pub total_received: Decimal,
    pub total_outstanding: Decimal,
    pub active_outstanding: Decimal,
    pub overdue_amount: Decimal,
    pub average_interest_rate: Decimal,
    pub interest_earned: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanAlert {
    pub loan_id: i64,
    pub name: String,
    pub borrower: String,
    pub due_date: NaiveDate,
    pub outstanding: Decimal,
    pub days_until_due: i64,
    pub overdue: bool,
}

pub fn get_loan(conn: &Connection, user_id: i64, loan_id: i64) -> Result<Loan> {
    let sql = format!("SELECT {} FROM loans WHERE id=?1 AND user_id=?2", Loan::COLUMNS);
    conn.query_row(&sql, params![loan_id, user_id], Loan::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("loan", loan_id))
}

pub fn create_loan(conn: &mut Connection, user_id: i64, new: &NewLoan) -> Result<Loan> {
    if new.name.trim().is_empty() || new.borrower.trim().is_empty() {
        return Err(LedgerError::validation("loan name and borrower are required"));
    }
    if new.principal <= Decimal::ZERO {
        return Err(LedgerError::validation("principal must be positive"));
    }
    if new.interest_rate < Decimal::ZERO {
        return Err(LedgerError::validation("interest rate cannot be negative"));
    }
    if let Some(due) = new.due_date {
        if due < new.start_date {
            return Err(LedgerError::InvalidRange {
                start: new.start_date,
                end: due,
            });
        }
    }

    let accounts: Vec<i64> = new.account_id.into_iter().collect();
    let loan = ledger::atomically(conn, &accounts, |tx| {
        let disbursal = new.account_id.map(|account_id| LedgerEvent::Debit {
            account_id,
            amount: new.principal,
            require_funds: true,
        });
        if let Some(event) = &disbursal {
            ledger::check(tx, user_id, event)?;
        }
        tx.execute(
            "INSERT INTO loans(user_id, name, borrower, principal, outstanding, interest_rate, start_date, due_date, account_id)
             VALUES (?1,?2,?3,?4,?4,?5,?6,?7,?8)",
            params![
                user_id,
                new.name.trim(),
                new.borrower.trim(),
                new.principal.to_string(),
                new.interest_rate.to_string(),
                new.start_date,
                new.due_date,
                new.account_id
            ],
        )?;
        let id = tx.last_insert_rowid();
        if let Some(event) = &disbursal {
            ledger::apply(tx, user_id, event, EntrySource::Loan, Some(id))?;
        }
        get_loan(tx, user_id, id)
    })?;
    tracing::info!(user_id, loan_id = loan.id, principal = %loan.principal, "loan disbursed");
    Ok(loan)
}

pub fn record_loan_payment(
    conn: &mut Connection,
    user_id: i64,
    loan_id: i64,
    payment: &Payment,
) -> Result<Loan> {
    let (principal, interest) = payment.split()?;
    let linked = get_loan(conn, user_id, loan_id)?.account_id;
    let accounts: Vec<i64> = linked.into_iter().collect();

    let loan = ledger::atomically(conn, &accounts, |tx| {
        let loan = get_loan(tx, user_id, loan_id)?;
        if !loan.is_active() {
            return Err(LedgerError::validation(format!(
                "loan {} is not active",
                loan_id
            )));
        }
        if principal > loan.outstanding {
            return Err(LedgerError::validation(format!(
                "principal portion {} exceeds the outstanding balance {}",
                principal, loan.outstanding
            )));
        }
        let outstanding = loan.outstanding - principal;
        let received = loan.total_received + payment.amount;
        let status = if outstanding <= Decimal::ZERO {
            STATUS_COMPLETED
        } else {
            STATUS_ACTIVE
        };

        tx.execute(
            "INSERT INTO loan_payments(loan_id, amount, principal_part, interest_part, date)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                loan_id,
                payment.amount.to_string(),
                principal.to_string(),
                interest.to_string(),
                payment.date
            ],
        )?;
        let payment_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE loans SET outstanding=?1, total_received=?2, status=?3 WHERE id=?4",
            params![outstanding.to_string(), received.to_string(), status, loan_id],
        )?;
        if let Some(account_id) = loan.account_id {
            let event = LedgerEvent::Credit {
                account_id,
                amount: payment.amount,
            };
            ledger::apply(tx, user_id, &event, EntrySource::LoanPayment, Some(payment_id))?;
        }
        get_loan(tx, user_id, loan_id)
    })?;
    tracing::info!(user_id, loan_id, amount = %payment.amount, status = %loan.status, "loan payment recorded");
    Ok(loan)
}

pub fn list_loans(conn: &Connection, user_id: i64) -> Result<Vec<Loan>> {
    let sql = format!(
        "SELECT {} FROM loans WHERE user_id=?1 ORDER BY start_date, id",
        Loan::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Loan::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn loan_summary(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<LoanSummary> {
    let loans = list_loans(conn, user_id)?;
    if loans.is_empty() {
        return Ok(LoanSummary::default());
    }

    let mut stmt = conn.prepare_cached(
        "SELECT p.interest_part FROM loan_payments p JOIN loans l ON p.loan_id=l.id
         WHERE l.user_id=?1",
    )?;
    let mut rows = stmt.query(params![user_id])?;
    let mut interest_earned = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        interest_earned += crate::db::decimal_at(r, 0)?;
    }

    let active: Vec<&Loan> = loans.iter().filter(|l| l.is_active()).collect();
    let rate_total: Decimal = loans.iter().map(|l| l.interest_rate).sum();
    Ok(LoanSummary {
        total_loans: loans.len(),
        active_loans: active.len(),
        total_lent: loans.iter().map(|l| l.principal).sum(),
        total_received: loans.iter().map(|l| l.total_received).sum(),
        total_outstanding: loans.iter().map(|l| l.outstanding).sum(),
        active_outstanding: active.iter().map(|l| l.outstanding).sum(),
        overdue_amount: active
            .iter()
            .filter(|l| l.due_date.is_some_and(|d| d < today))
            .map(|l| l.outstanding)
            .sum(),
        average_interest_rate: (rate_total / Decimal::from(loans.len())).round_dp(2),
        interest_earned,
    })
}

/// Active loans due within the warning window, or already overdue.
pub fn loan_alerts(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<Vec<LoanAlert>> {
    let horizon = today
        .checked_add_days(Days::new(POLICY.loan_due_window_days))
        .unwrap_or(NaiveDate::MAX);
    let mut alerts: Vec<LoanAlert> = list_loans(conn, user_id)?
        .into_iter()
        .filter(|l| l.is_active())
        .filter_map(|l| {
            let due = l.due_date?;
            (due <= horizon).then(|| LoanAlert {
                loan_id: l.id,
                name: l.name,
                borrower: l.borrower,
                due_date: due,
                outstanding: l.outstanding,
                days_until_due: (due - today).num_days(),
                overdue: due < today,
            })
        })
        .collect();
    alerts.sort_by_key(|a| (a.due_date, a.loan_id));
    Ok(alerts)
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
             (1,1,'Checking','Checking','USD','1000','1000')",
            [],
        )
        .unwrap();
        conn
    }

    fn new(principal: Decimal, due: Option<NaiveDate>) -> NewLoan {
        NewLoan {
            name: "Bike".into(),
            borrower: "Sam".into(),
            principal,
            interest_rate: dec!(5),
            start_date: d(1, 1),
            due_date: due,
            account_id: Some(1),
        }
    }

    fn balance(conn: &Connection) -> Decimal {
        ledger::load_account(conn, 1).unwrap().unwrap().balance
    }

    #[test]
    fn payment_split_rules() {
        let p = |amount, principal, interest| Payment {
            amount,
            principal,
            interest,
            date: d(1, 1),
        };
        assert_eq!(p(dec!(100), None, None).split().unwrap(), (dec!(100), dec!(0)));
        assert_eq!(
            p(dec!(100), None, Some(dec!(10))).split().unwrap(),
            (dec!(90), dec!(10))
        );
        assert!(p(dec!(100), Some(dec!(80)), Some(dec!(10))).split().is_err());
        assert!(p(dec!(100), Some(dec!(120)), None).split().is_err());
        assert!(p(dec!(0), None, None).split().is_err());
    }

    #[test]
    fn lending_more_than_balance_is_refused() {
        let mut conn = setup();
        let err = create_loan(&mut conn, 1, &new(dec!(1500), None)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { shortage, .. } if shortage == dec!(500)));
        assert!(list_loans(&conn, 1).unwrap().is_empty());
        assert_eq!(balance(&conn), dec!(1000));
    }

    #[test]
    fn repayment_completes_loan_and_credits_account() {
        let mut conn = setup();
        let loan = create_loan(&mut conn, 1, &new(dec!(400), None)).unwrap();
        assert_eq!(balance(&conn), dec!(600));

        let pay = Payment {
            amount: dec!(420),
            principal: Some(dec!(400)),
            interest: None,
            date: d(2, 1),
        };
        let loan = record_loan_payment(&mut conn, 1, loan.id, &pay).unwrap();
        assert_eq!(loan.status, STATUS_COMPLETED);
        assert_eq!(loan.outstanding, dec!(0));
        assert_eq!(loan.total_received, dec!(420));
        assert_eq!(balance(&conn), dec!(1020));

        assert!(record_loan_payment(&mut conn, 1, loan.id, &pay).is_err());
        let s = loan_summary(&conn, 1, d(2, 1)).unwrap();
        assert_eq!(s.interest_earned, dec!(20));
        assert_eq!(s.active_loans, 0);
    }

    #[test]
    fn overpaying_principal_is_rejected() {
        let mut conn = setup();
        let loan = create_loan(&mut conn, 1, &new(dec!(100), None)).unwrap();
        let pay = Payment {
            amount: dec!(150),
            principal: None,
            interest: None,
            date: d(2, 1),
        };
        assert!(matches!(
            record_loan_payment(&mut conn, 1, loan.id, &pay).unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[test]
    fn alerts_cover_due_soon_and_overdue() {
        let mut conn = setup();
        create_loan(&mut conn, 1, &new(dec!(10), Some(d(1, 5)))).unwrap();
        create_loan(&mut conn, 1, &new(dec!(10), Some(d(1, 17)))).unwrap();
        create_loan(&mut conn, 1, &new(dec!(10), Some(d(3, 1)))).unwrap();
        create_loan(&mut conn, 1, &new(dec!(10), None)).unwrap();
        let alerts = loan_alerts(&conn, 1, d(1, 10)).unwrap();
        assert_eq!(alerts.len(), 2);
        assert!(alerts[0].overdue);
        assert_eq!(alerts[0].days_until_due, -5);
        assert_eq!(alerts[1].days_until_due, 7);

        let s = loan_summary(&conn, 1, d(1, 10)).unwrap();
        assert_eq!(s.overdue_amount, dec!(10));
        assert_eq!(s.total_lent, dec!(40));
    }

    #[test]
    fn alerts_as_of_the_last_date_do_not_overflow() {
        let mut conn = setup();
        create_loan(&mut conn, 1, &new(dec!(10), Some(d(1, 5)))).unwrap();
        let alerts = loan_alerts(&conn, 1, NaiveDate::MAX).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].overdue);
    }
}
