// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{Session, print_caveats};
use crate::models::Account;
use crate::notify::LogNotifier;
use crate::services::accounts::{self, AccountUpdate, NewAccount};
use crate::utils::{arg, decimal_arg, fmt_money, id_arg, opt_string, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

fn account_rows(accounts: &[Account]) -> Vec<Vec<String>> {
    accounts
        .iter()
        .map(|a| {
            vec![
                a.id.to_string(),
                a.name.clone(),
                a.r#type.clone(),
                a.currency.clone(),
                fmt_money(&a.balance),
                if a.is_active { "yes" } else { "no" }.into(),
            ]
        })
        .collect()
}

const HEADERS: [&str; 6] = ["ID", "Name", "Type", "CCY", "Balance", "Active"];

fn show(session: &Session, accounts: &[Account]) -> Result<()> {
    if !session.emit(&accounts)? {
        println!("{}", pretty_table(&HEADERS, account_rows(accounts)));
    }
    Ok(())
}

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let user = session.user_id;
    match m.subcommand() {
        Some(("add", sub)) => {
            let new = NewAccount {
                name: arg(sub, "name")?.to_string(),
                r#type: arg(sub, "type")?.to_string(),
                currency: arg(sub, "currency")?.to_string(),
                initial_balance: decimal_arg(sub, "balance")?,
            };
            let outcome = accounts::create_account(conn, &LogNotifier, user, &new)?;
            print_caveats(&outcome.caveats);
            if !session.emit(&outcome)? {
                let a = &outcome.value;
                println!(
                    "Added account #{} '{}' ({}, {}) with balance {}",
                    a.id, a.name, a.r#type, a.currency, fmt_money(&a.balance)
                );
            }
        }
        Some(("list", sub)) => {
            let list = accounts::list_accounts(conn, user, sub.get_flag("all"))?;
            show(session, &list)?;
        }
        Some(("show", sub)) => {
            let a = accounts::get_account(conn, user, id_arg(sub, "id")?)?;
            show(session, std::slice::from_ref(&a))?;
        }
        Some(("update", sub)) => {
            let update = AccountUpdate {
                name: opt_string(sub, "name"),
                currency: opt_string(sub, "currency"),
            };
            let a = accounts::update_account(conn, user, id_arg(sub, "id")?, &update)?;
            show(session, std::slice::from_ref(&a))?;
        }
        Some(("deactivate", sub)) => {
            let id = id_arg(sub, "id")?;
            accounts::deactivate_account(conn, user, id)?;
            println!("Deactivated account #{}", id);
        }
        Some(("reactivate", sub)) => {
            let outcome = accounts::reactivate_account(conn, &LogNotifier, user, id_arg(sub, "id")?)?;
            print_caveats(&outcome.caveats);
            println!("Reactivated account #{} '{}'", outcome.value.id, outcome.value.name);
        }
        Some(("adjust", sub)) => {
            let id = id_arg(sub, "id")?;
            match accounts::adjust_balance(conn, user, id, decimal_arg(sub, "balance")?)? {
                Some(p) => {
                    if !session.emit(&p)? {
                        println!(
                            "Posted adjustment of {} to account #{}, balance now {}",
                            p.delta,
                            p.account_id,
                            fmt_money(&p.balance_after)
                        );
                    }
                }
                None => println!("Account #{} already has that balance", id),
            }
        }
        Some(("summary", _)) => {
            let s = accounts::account_summary(conn, user)?;
            if !session.emit(&s)? {
                let mut rows: Vec<Vec<String>> = s
                    .by_currency
                    .iter()
                    .map(|(ccy, bal)| vec![ccy.clone(), fmt_money(bal)])
                    .collect();
                rows.push(vec!["TOTAL".into(), fmt_money(&s.total_balance)]);
                println!("{}", pretty_table(&["CCY", "Balance"], rows));
                println!("{} active account(s)", s.active_accounts);
            }
        }
        Some(("types", _)) => {
            let types = accounts::account_types();
            if !session.emit(&types)? {
                for t in types {
                    println!("{}", t);
                }
            }
        }
        _ => {}
    }
    Ok(())
}
