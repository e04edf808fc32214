// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::engine::aggregate::BudgetUsage;
use crate::models::Budget;
use crate::services::budgets::{self, BudgetTemplate, BudgetUpdate, BulkBudgetUpdate, NewBudget};
use crate::utils::{
    date_arg, decimal_arg, fmt_money, id_arg, opt_date, opt_decimal, opt_string,
    parse_decimal, pretty_table,
};
use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    let user = session.user_id;
    match m.subcommand() {
        Some(("add", sub)) => {
            let new = NewBudget {
                category_id: id_arg(sub, "category")?,
                name: opt_string(sub, "name"),
                amount: decimal_arg(sub, "amount")?,
                start: date_arg(sub, "start")?,
                end: date_arg(sub, "end")?,
                alert_threshold: opt_decimal(sub, "threshold")?,
            };
            let b = budgets::create_budget(conn, user, &new)?;
            print_budgets(session, std::slice::from_ref(&b))?;
        }
        Some(("update", sub)) => {
            let update = BudgetUpdate {
                name: opt_string(sub, "name"),
                amount: opt_decimal(sub, "amount")?,
                start: opt_date(sub, "start")?,
                end: opt_date(sub, "end")?,
                alert_threshold: opt_decimal(sub, "threshold")?,
            };
            let b = budgets::update_budget(conn, user, id_arg(sub, "id")?, &update)?;
            print_budgets(session, std::slice::from_ref(&b))?;
        }
        Some(("deactivate", sub)) => {
            let id = id_arg(sub, "id")?;
            budgets::deactivate_budget(conn, user, id)?;
            println!("Deactivated budget #{}", id);
        }
        Some(("reactivate", sub)) => {
            let b = budgets::reactivate_budget(conn, user, id_arg(sub, "id")?)?;
            print_budgets(session, std::slice::from_ref(&b))?;
        }
        Some(("bulk", sub)) => {
            let rows = sub
                .get_many::<String>("row")
                .into_iter()
                .flatten()
                .map(|raw| parse_bulk_row(raw))
                .collect::<Result<Vec<_>>>()?;
            let updated = budgets::update_budgets_bulk(conn, user, &rows)?;
            print_budgets(session, &updated)?;
        }
        Some(("list", sub)) => {
            let list = match sub.get_one::<i64>("category") {
                Some(cat) => budgets::budgets_by_category(conn, user, *cat)?,
                None => budgets::list_budgets(conn, user)?,
            };
            print_budgets(session, &list)?;
        }
        Some(("current", _)) => {
            let list = budgets::current_budgets(conn, user, session.today)?;
            print_budgets(session, &list)?;
        }
        Some(("show", sub)) => {
            let usage = budgets::budget_summary(conn, user, id_arg(sub, "id")?)?;
            print_usage(session, std::slice::from_ref(&usage))?;
        }
        Some(("performance", _)) => {
            let p = budgets::budget_performance(conn, user, session.today)?;
            if !session.emit(&p)? {
                print_usage(session, &p.budgets)?;
                println!(
                    "on track: {}  near limit: {}  over budget: {}",
                    p.on_track, p.near_limit, p.over_budget
                );
            }
        }
        Some(("template", sub)) => {
            let items = sub
                .get_many::<String>("item")
                .into_iter()
                .flatten()
                .map(|raw| parse_item(raw))
                .collect::<Result<Vec<_>>>()?;
            let template = BudgetTemplate {
                start: date_arg(sub, "start")?,
                end: date_arg(sub, "end")?,
                alert_threshold: opt_decimal(sub, "threshold")?,
                items,
            };
            let created = budgets::create_from_template(conn, user, &template)?;
            print_budgets(session, &created)?;
        }
        Some(("sync", _)) => {
            let changed = budgets::sync_spent_cache(conn, user)?;
            println!("Refreshed cached spend on {} budget(s)", changed);
        }
        _ => {}
    }
    Ok(())
}

/// `CATEGORY_ID=AMOUNT`
fn parse_item(raw: &str) -> Result<(i64, rust_decimal::Decimal)> {
    let (cat, amount) = raw
        .split_once('=')
        .with_context(|| format!("Invalid item '{}', expected CATEGORY_ID=AMOUNT", raw))?;
    let cat: i64 = cat
        .trim()
        .parse()
        .with_context(|| format!("Invalid category id in '{}'", raw))?;
    Ok((cat, parse_decimal(amount)?))
}

/// `ID,AMOUNT,THRESHOLD,ACTIVE`; a blank or missing field keeps the current value.
fn parse_bulk_row(raw: &str) -> Result<BulkBudgetUpdate> {
    let mut fields = raw.split(',').map(str::trim);
    let budget_id: i64 = fields
        .next()
        .unwrap_or_default()
        .parse()
        .with_context(|| format!("Invalid budget id in '{}'", raw))?;
    let mut next = || fields.next().filter(|f| !f.is_empty());
    let amount = next().map(parse_decimal).transpose()?;
    let alert_threshold = next().map(parse_decimal).transpose()?;
    let is_active = next()
        .map(|f| match f.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => anyhow::bail!("Invalid active flag '{}' in '{}'", f, raw),
        })
        .transpose()?;
    Ok(BulkBudgetUpdate {
        budget_id,
        amount,
        alert_threshold,
        is_active,
    })
}

fn print_budgets(session: &Session, list: &[Budget]) -> Result<()> {
    if session.emit(&list)? {
        return Ok(());
    }
    let rows = list
        .iter()
        .map(|b| {
            vec![
                b.id.to_string(),
                b.name.clone(),
                b.category_id.to_string(),
                fmt_money(&b.amount),
                b.start.to_string(),
                b.end.to_string(),
                format!("{}%", b.alert_threshold),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Name", "Category", "Amount", "Start", "End", "Alert at"],
            rows,
        )
    );
    Ok(())
}

fn print_usage(session: &Session, usages: &[BudgetUsage]) -> Result<()> {
    if session.emit(&usages)? {
        return Ok(());
    }
    let rows = usages
        .iter()
        .map(|u| {
            vec![
                u.budget_id.to_string(),
                u.name.clone(),
                fmt_money(&u.amount),
                fmt_money(&u.spent),
                fmt_money(&u.remaining),
                format!("{:.1}%", u.percentage_used),
                u.status.as_str().into(),
                if u.is_alert { "!" } else { "" }.into(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["ID", "Name", "Budget", "Spent", "Remaining", "Used", "Status", "Alert"],
            rows,
        )
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_item_parses() {
        let (cat, amt) = parse_item("3= 120.50").unwrap();
        assert_eq!(cat, 3);
        assert_eq!(amt.to_string(), "120.50");
        assert!(parse_item("3:120").is_err());
    }

    #[test]
    fn bulk_row_keeps_blank_fields() {
        let row = parse_bulk_row("7, 450,,false").unwrap();
        assert_eq!(row.budget_id, 7);
        assert_eq!(row.amount.map(|d| d.to_string()), Some("450".into()));
        assert_eq!(row.alert_threshold, None);
        assert_eq!(row.is_active, Some(false));

        let only_id = parse_bulk_row("7").unwrap();
        assert!(only_id.amount.is_none() && only_id.is_active.is_none());
        assert!(parse_bulk_row("x,1").is_err());
        assert!(parse_bulk_row("7,,,maybe").is_err());
    }
}
