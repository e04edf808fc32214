// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::commands::loans::payment_from;
use crate::models::Debt;
use crate::services::debts::{self, DebtUpdate, NewDebt};
use crate::utils::{
    arg, decimal_arg, fmt_money, id_arg, opt_date, opt_decimal, opt_string, or_dash, pretty_table,
};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let user = session.user_id;
    match m.subcommand() {
        Some(("add", sub)) => {
            let new = NewDebt {
                name: arg(sub, "name")?.to_string(),
                debt_type: arg(sub, "type")?.to_string(),
                creditor: opt_string(sub, "creditor"),
                original_amount: decimal_arg(sub, "original")?,
                current_balance: opt_decimal(sub, "balance")?,
                interest_rate: opt_decimal(sub, "rate")?,
                minimum_payment: opt_decimal(sub, "minimum")?,
                next_payment_date: opt_date(sub, "next-payment")?,
                account_id: sub.get_one::<i64>("account").copied(),
            };
            let debt = debts::create_debt(conn, user, &new)?;
            print_debts(session, std::slice::from_ref(&debt))?;
        }
        Some(("update", sub)) => {
            let update = DebtUpdate {
                name: opt_string(sub, "name"),
                debt_type: opt_string(sub, "type"),
                creditor: opt_string(sub, "creditor"),
                interest_rate: opt_decimal(sub, "rate")?,
                minimum_payment: opt_decimal(sub, "minimum")?,
                next_payment_date: opt_date(sub, "next-payment")?,
            };
            let debt = debts::update_debt(conn, user, id_arg(sub, "id")?, &update)?;
            print_debts(session, std::slice::from_ref(&debt))?;
        }
        Some(("pay", sub)) => {
            let debt = debts::record_debt_payment(conn, user, id_arg(sub, "id")?, &payment_from(sub)?)?;
            print_debts(session, std::slice::from_ref(&debt))?;
        }
        Some(("deactivate", sub)) => {
            let id = id_arg(sub, "id")?;
            debts::deactivate_debt(conn, user, id)?;
            println!("Deactivated debt #{}", id);
        }
        Some(("list", _)) => {
            let list = debts::list_debts(conn, user)?;
            print_debts(session, &list)?;
        }
        Some(("summary", _)) => {
            let s = debts::debt_summary(conn, user, session.today)?;
            if !session.emit(&s)? {
                print_debts(session, &s.debts)?;
                println!(
                    "owed {} of {} originally, minimum payments {}, interest paid {}, debt-to-income {}%",
                    fmt_money(&s.total_current_balance),
                    fmt_money(&s.total_original_amount),
                    fmt_money(&s.total_minimum_payment),
                    fmt_money(&s.total_interest_paid),
                    s.debt_to_income_ratio
                );
            }
        }
        Some(("due", sub)) => {
            let days = sub.get_one::<i64>("days").copied().unwrap_or(7);
            let notices = debts::due_notifications(conn, user, days, session.today)?;
            if !session.emit(&notices)? {
                for n in &notices {
                    println!("{}", n.message);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_debts(session: &Session, list: &[Debt]) -> Result<()> {
    if session.emit(&list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|d| {
            vec![
                d.id.to_string(),
                d.name.clone(),
                d.debt_type.clone(),
                d.creditor.clone().unwrap_or_default(),
                fmt_money(&d.original_amount),
                fmt_money(&d.current_balance),
                or_dash(d.minimum_payment.as_ref().map(fmt_money)),
                or_dash(d.next_payment_date),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Name", "Type", "Creditor", "Original", "Balance", "Minimum", "Next due"],
            rows,
        )
    );
    Ok(())
}
