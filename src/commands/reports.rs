// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::engine::alerts::{self, BalanceAlert};
use crate::engine::feasibility::{self, BudgetProposal};
use crate::utils::{date_arg, decimal_arg, fmt_money, id_arg, or_dash, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("overview", _)) => overview(conn, session)?,
        Some(("alerts", _)) => alerts(conn, session)?,
        Some(("feasibility", sub)) => feasibility(conn, session, sub)?,
        _ => {}
    }
    Ok(())
}

fn overview(conn: &Connection, session: &Session) -> Result<()> {
    let o = feasibility::financial_overview(conn, session.user_id, session.today)?;
    if !session.emit(&o)? {
        let rows = vec![
            vec!["Total balance".into(), fmt_money(&o.total_balance)],
            vec!["Budgeted".into(), fmt_money(&o.total_budget)],
            vec!["Spent".into(), fmt_money(&o.total_spent)],
            vec!["Remaining".into(), fmt_money(&o.total_remaining)],
            vec!["Income this month".into(), fmt_money(&o.monthly_income)],
            vec!["Expense this month".into(), fmt_money(&o.monthly_expense)],
            vec!["Net this month".into(), fmt_money(&o.monthly_net_income)],
            vec!["Budget utilization".into(), format!("{:.1}%", o.budget_utilization_rate)],
            vec!["Health score".into(), o.financial_health_score.to_string()],
        ];
        println!("{}", pretty_table(&["Metric", "Value"], rows));
    }
    Ok(())
}

fn alerts(conn: &Connection, session: &Session) -> Result<()> {
    let report = alerts::collect_alerts(conn, session.user_id, session.today)?;
    if session.emit(&report)? {
        return Ok(());
    }
    if report.is_empty() {
        println!("No alerts");
        return Ok(());
    }
    let mut rows: Vec<Vec<String>> = report
        .budget
        .iter()
        .map(|a| {
            vec![
                "BUDGET_THRESHOLD".into(),
                format!(
                    "{} has used {:.1}% of {} (alert at {}%)",
                    a.budget_name,
                    a.percentage_spent,
                    fmt_money(&a.budget_amount),
                    a.alert_threshold
                ),
            ]
        })
        .collect();
    rows.extend(
        report
            .balance
            .iter()
            .chain(report.risk.iter())
            .map(|a: &BalanceAlert| vec![a.kind().to_string(), a.message().to_string()]),
    );
    println!("{}", pretty_table(&["Alert", "Detail"], rows));
    Ok(())
}

fn feasibility(conn: &Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let proposal = BudgetProposal {
        category_id: id_arg(sub, "category")?,
        amount: decimal_arg(sub, "amount")?,
        start: date_arg(sub, "start")?,
        end: date_arg(sub, "end")?,
    };
    let r = feasibility::check_feasibility(conn, session.user_id, &proposal, session.today)?;
    if session.emit(&r)? {
        return Ok(());
    }
    let verdict = match (r.is_feasible, r.is_tight) {
        (false, _) => "not feasible",
        (true, true) => "feasible but tight",
        (true, false) => "feasible",
    };
    let rows = vec![
        vec!["Verdict".into(), verdict.into()],
        vec!["Total balance".into(), fmt_money(&r.total_balance)],
        vec!["Existing commitments".into(), fmt_money(&r.existing_commitments)],
        vec!["Proposed".into(), fmt_money(&r.proposed_amount)],
        vec!["Shortage".into(), fmt_money(&r.shortage)],
        vec![
            "Historical average".into(),
            or_dash(r.historical_average.as_ref().map(fmt_money)),
        ],
        vec![
            "Suggested amount".into(),
            or_dash(r.suggested_amount.as_ref().map(fmt_money)),
        ],
    ];
    println!("{}", pretty_table(&["Check", "Result"], rows));
    for w in &r.warnings {
        println!("warning: {}", w);
    }
    Ok(())
}
