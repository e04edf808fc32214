// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::{Session, print_caveats};
use crate::engine::ledger::TransferEvent;
use crate::models::{Transaction, TxKind};
use crate::notify::LogNotifier;
use crate::services::transactions::{self, NewTransaction, TxFilter};
use crate::utils::{
    arg, date_arg, decimal_arg, fmt_money, id_arg, opt_date, opt_string, or_dash, pretty_table,
};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, session, sub)?,
        Some(("list", sub)) => {
            let rows = transactions::list_transactions(conn, session.user_id, &filter_from(sub)?)?;
            print_rows(session, &rows)?;
        }
        Some(("search", sub)) => {
            let rows = transactions::search_transactions(
                conn,
                session.user_id,
                arg(sub, "keyword")?,
                sub.get_one::<usize>("limit").copied(),
            )?;
            print_rows(session, &rows)?;
        }
        Some(("recent", _)) => {
            let rows = transactions::recent_transactions(conn, session.user_id)?;
            print_rows(session, &rows)?;
        }
        Some(("recurring", _)) => {
            let rows = transactions::recurring_transactions(conn, session.user_id)?;
            print_rows(session, &rows)?;
        }
        Some(("summary", sub)) => {
            let s = transactions::transaction_summary(
                conn,
                session.user_id,
                date_arg(sub, "from")?,
                date_arg(sub, "to")?,
            )?;
            if !session.emit(&s)? {
                println!(
                    "{}",
                    pretty_table(
                        &["From", "To", "Income", "Expense", "Net", "Count"],
                        vec![vec![
                            s.from.to_string(),
                            s.to.to_string(),
                            fmt_money(&s.total_income),
                            fmt_money(&s.total_expense),
                            fmt_money(&s.net),
                            s.count.to_string(),
                        ]],
                    )
                );
            }
        }
        Some(("delete", sub)) => {
            let id = id_arg(sub, "id")?;
            let postings = transactions::delete_transaction(conn, session.user_id, id)?;
            if !session.emit(&postings)? {
                println!("Deleted transaction #{}", id);
                for p in postings {
                    println!(
                        "  account #{} delta {} -> {}",
                        p.account_id,
                        p.delta,
                        fmt_money(&p.balance_after)
                    );
                }
            }
        }
        Some(("recategorize", sub)) => {
            let t = transactions::recategorize(
                conn,
                session.user_id,
                id_arg(sub, "id")?,
                sub.get_one::<i64>("category").copied(),
            )?;
            print_rows(session, std::slice::from_ref(&t))?;
        }
        Some(("transfer", sub)) => {
            let event = TransferEvent {
                from: id_arg(sub, "from")?,
                to: id_arg(sub, "to")?,
                amount: decimal_arg(sub, "amount")?,
                date: date_arg(sub, "date")?,
                description: opt_string(sub, "description"),
            };
            let receipt = transactions::transfer(conn, session.user_id, &event)?;
            if !session.emit(&receipt)? {
                println!(
                    "Transferred {} from #{} to #{} (transfer #{})",
                    fmt_money(&receipt.transfer.amount),
                    receipt.transfer.from_account_id,
                    receipt.transfer.to_account_id,
                    receipt.transfer.id
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &mut Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let kind: TxKind = arg(sub, "type")?.parse().map_err(|e: String| anyhow!(e))?;
    let new = NewTransaction {
        account_id: id_arg(sub, "account")?,
        category_id: sub.get_one::<i64>("category").copied(),
        kind,
        amount: decimal_arg(sub, "amount")?,
        date: date_arg(sub, "date")?,
        description: opt_string(sub, "description"),
        merchant: opt_string(sub, "merchant"),
        is_recurring: sub.get_flag("recurring"),
    };
    let outcome = transactions::create_transaction(conn, &LogNotifier, session.user_id, &new)?;
    print_caveats(&outcome.caveats);
    if !session.emit(&outcome)? {
        let t = &outcome.value;
        println!(
            "Recorded {} {} on {} (account #{}, tx #{})",
            t.kind,
            fmt_money(&t.amount),
            t.date,
            t.account_id,
            t.id
        );
    }
    Ok(())
}

pub fn filter_from(sub: &clap::ArgMatches) -> Result<TxFilter> {
    let kind = sub
        .get_one::<String>("type")
        .map(|s| s.parse::<TxKind>().map_err(|e| anyhow!(e)))
        .transpose()?;
    Ok(TxFilter {
        account_id: sub.get_one::<i64>("account").copied(),
        category_id: sub.get_one::<i64>("category").copied(),
        kind,
        from: opt_date(sub, "from")?,
        to: opt_date(sub, "to")?,
        recurring_only: sub.get_flag("recurring"),
        limit: sub.get_one::<usize>("limit").copied(),
    })
}

fn print_rows(session: &Session, rows: &[Transaction]) -> Result<()> {
    if session.emit(&rows)? {
        return Ok(());
    }
    let data = rows
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.date.to_string(),
                t.account_id.to_string(),
                t.kind.to_string(),
                fmt_money(&t.amount),
                or_dash(t.category_id),
                t.description.clone().unwrap_or_default(),
                t.merchant.clone().unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Date", "Account", "Type", "Amount", "Category", "Description", "Merchant"],
            data,
        )
    );
    Ok(())
}
