// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::models::Investment;
use crate::services::investments::{self, NewInvestment, Valuation};
use crate::utils::{
    arg, decimal_arg, fmt_money, id_arg, opt_decimal, opt_string, or_dash, pretty_table,
};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let user = session.user_id;
    match m.subcommand() {
        Some(("add", sub)) => {
            let new = NewInvestment {
                name: arg(sub, "name")?.to_string(),
                kind: arg(sub, "kind")?.to_string(),
                symbol: opt_string(sub, "symbol"),
                quantity: opt_decimal(sub, "quantity")?,
                purchase_price: opt_decimal(sub, "price")?,
                current_price: opt_decimal(sub, "current-price")?,
                total_invested: decimal_arg(sub, "invested")?,
                current_value: opt_decimal(sub, "value")?,
                account_id: sub.get_one::<i64>("account").copied(),
            };
            let v = investments::create_investment(conn, user, &new, session.today)?;
            print_valuation(session, &v)?;
        }
        Some(("revalue", sub)) => {
            let v = investments::revalue_investment(
                conn,
                user,
                id_arg(sub, "id")?,
                decimal_arg(sub, "value")?,
                opt_decimal(sub, "price")?,
                session.today,
            )?;
            print_valuation(session, &v)?;
        }
        Some(("deactivate", sub)) => {
            let id = id_arg(sub, "id")?;
            investments::deactivate_investment(conn, user, id)?;
            println!("Deactivated investment #{}", id);
        }
        Some(("list", _)) => {
            let list = investments::list_investments(conn, user)?;
            print_investments(session, &list)?;
        }
        Some(("summary", _)) => {
            let s = investments::investment_summary(conn, user)?;
            if !session.emit(&s)? {
                let mut rows: Vec<Vec<String>> = s
                    .by_kind
                    .iter()
                    .map(|(kind, k)| {
                        vec![
                            kind.clone(),
                            k.count.to_string(),
                            fmt_money(&k.total_invested),
                            fmt_money(&k.total_current_value),
                            format!("{}%", k.gain_loss_pct),
                        ]
                    })
                    .collect();
                rows.push(vec![
                    "TOTAL".into(),
                    s.total_investments.to_string(),
                    fmt_money(&s.total_invested),
                    fmt_money(&s.total_current_value),
                    format!("{}%", s.total_gain_loss_pct),
                ]);
                println!(
                    "{}",
                    pretty_table(&["Kind", "Count", "Invested", "Value", "Gain/Loss"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_valuation(session: &Session, v: &Valuation) -> Result<()> {
    if session.emit(v)? {
        return Ok(());
    }
    print_investments(session, std::slice::from_ref(&v.investment))?;
    if let Some(t) = &v.realized {
        println!(
            "Booked {} {} to account #{} (tx #{})",
            t.kind,
            fmt_money(&t.amount),
            t.account_id,
            t.id
        );
    }
    Ok(())
}

fn print_investments(session: &Session, list: &[Investment]) -> Result<()> {
    if session.emit(&list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|i| {
            vec![
                i.id.to_string(),
                i.name.clone(),
                i.kind.clone(),
                i.symbol.clone().unwrap_or_default(),
                fmt_money(&i.total_invested),
                or_dash(i.current_value.as_ref().map(fmt_money)),
                or_dash(i.gain_loss().as_ref().map(fmt_money)),
                or_dash(i.account_id),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Name", "Kind", "Symbol", "Invested", "Value", "Gain/Loss", "Account"],
            rows,
        )
    );
    Ok(())
}
