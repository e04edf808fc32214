// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::models::Loan;
use crate::services::loans::{self, NewLoan, Payment};
use crate::utils::{
    arg, date_arg, decimal_arg, fmt_money, id_arg, opt_date, opt_decimal, or_dash, pretty_table,
};
use anyhow::Result;
use rusqlite::Connection;

/// Reads the shared `pay` arguments used by loans and debts.
pub fn payment_from(sub: &clap::ArgMatches) -> Result<Payment> {
    Ok(Payment {
        amount: decimal_arg(sub, "amount")?,
        principal: opt_decimal(sub, "principal")?,
        interest: opt_decimal(sub, "interest")?,
        date: date_arg(sub, "date")?,
    })
}

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let user = session.user_id;
    match m.subcommand() {
        Some(("add", sub)) => {
            let new = NewLoan {
                name: arg(sub, "name")?.to_string(),
                borrower: arg(sub, "borrower")?.to_string(),
                principal: decimal_arg(sub, "principal")?,
                interest_rate: decimal_arg(sub, "rate")?,
                start_date: date_arg(sub, "start")?,
                due_date: opt_date(sub, "due")?,
                account_id: sub.get_one::<i64>("account").copied(),
            };
            let loan = loans::create_loan(conn, user, &new)?;
            print_loans(session, std::slice::from_ref(&loan))?;
        }
        Some(("pay", sub)) => {
            let loan = loans::record_loan_payment(conn, user, id_arg(sub, "id")?, &payment_from(sub)?)?;
            print_loans(session, std::slice::from_ref(&loan))?;
        }
        Some(("list", _)) => {
            let list = loans::list_loans(conn, user)?;
            print_loans(session, &list)?;
        }
        Some(("summary", _)) => {
            let s = loans::loan_summary(conn, user, session.today)?;
            if !session.emit(&s)? {
                let rows = vec![
                    vec!["Loans".into(), format!("{} ({} active)", s.total_loans, s.active_loans)],
                    vec!["Lent".into(), fmt_money(&s.total_lent)],
                    vec!["Received".into(), fmt_money(&s.total_received)],
                    vec!["Outstanding".into(), fmt_money(&s.total_outstanding)],
                    vec!["Overdue".into(), fmt_money(&s.overdue_amount)],
                    vec!["Avg rate".into(), format!("{}%", s.average_interest_rate)],
                    vec!["Interest earned".into(), fmt_money(&s.interest_earned)],
                ];
                println!("{}", pretty_table(&["Metric", "Value"], rows));
            }
        }
        Some(("alerts", _)) => {
            let alerts = loans::loan_alerts(conn, user, session.today)?;
            if !session.emit(&alerts)? {
                let rows = alerts
                    .iter()
                    .map(|a| {
                        vec![
                            a.loan_id.to_string(),
                            a.name.clone(),
                            a.borrower.clone(),
                            a.due_date.to_string(),
                            fmt_money(&a.outstanding),
                            if a.overdue {
                                format!("overdue by {} day(s)", -a.days_until_due)
                            } else {
                                format!("due in {} day(s)", a.days_until_due)
                            },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Borrower", "Due", "Outstanding", "When"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_loans(session: &Session, list: &[Loan]) -> Result<()> {
    if session.emit(&list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|l| {
            vec![
                l.id.to_string(),
                l.name.clone(),
                l.borrower.clone(),
                fmt_money(&l.principal),
                fmt_money(&l.outstanding),
                or_dash(l.due_date),
                or_dash(l.account_id),
                l.status.clone(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Name", "Borrower", "Principal", "Outstanding", "Due", "Account", "Status"],
            rows,
        )
    );
    Ok(())
}
