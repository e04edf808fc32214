// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use ledgerguard::commands::doctor;
use ledgerguard::engine::{aggregate, alerts, feasibility};
use ledgerguard::errors::LedgerError;
use ledgerguard::models::TxKind;
use ledgerguard::notify::{DeliveryError, LogNotifier, Notice, Notifier};
use ledgerguard::services::budgets::{self, NewBudget};
use ledgerguard::services::transactions::{self, NewTransaction};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, m, day).unwrap()
}

fn setup(balance: &str) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    ledgerguard::db::init_schema(&conn).unwrap();
    conn.execute(
        "INSERT INTO accounts(id,user_id,name,type,currency,initial_balance,balance)
         VALUES (1,1,'Main','Checking','USD',?1,?1)",
        [balance],
    )
    .unwrap();
    conn.execute_batch(
        "INSERT INTO categories(id,user_id,name,type) VALUES
           (1,1,'Groceries','Expense'),(2,1,'Travel','Expense'),(3,1,'Salary','Income');",
    )
    .unwrap();
    conn
}

fn june_budget(category_id: i64, amount: Decimal) -> NewBudget {
    NewBudget {
        category_id,
        name: None,
        amount,
        start: d(6, 1),
        end: d(7, 1),
        alert_threshold: Some(dec!(80)),
    }
}

fn spend(category_id: i64, amount: Decimal, date: NaiveDate) -> NewTransaction {
    NewTransaction {
        account_id: 1,
        category_id: Some(category_id),
        kind: TxKind::Expense,
        amount,
        date,
        description: None,
        merchant: None,
        is_recurring: false,
    }
}

#[derive(Default)]
struct Recording(Mutex<Vec<Notice>>);

impl Notifier for Recording {
    fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError> {
        self.0.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct Refusing;

impl Notifier for Refusing {
    fn deliver(&self, _: &Notice) -> Result<(), DeliveryError> {
        Err(DeliveryError("mail relay down".into()))
    }
}

#[test]
fn alert_fires_at_threshold_and_not_below() {
    let mut conn = setup("5000");
    let b = budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(1000))).unwrap();
    assert_eq!(b.name, "Groceries");

    transactions::create_transaction(&mut conn, &LogNotifier, 1, &spend(1, dec!(750), d(6, 5)))
        .unwrap();
    let usage = budgets::budget_summary(&conn, 1, b.id).unwrap();
    assert_eq!(usage.spent, dec!(750));
    assert!(!usage.is_alert);
    assert!(alerts::collect_alerts(&conn, 1, d(6, 20)).unwrap().budget.is_empty());

    transactions::create_transaction(&mut conn, &LogNotifier, 1, &spend(1, dec!(100), d(6, 6)))
        .unwrap();
    let usage = budgets::budget_summary(&conn, 1, b.id).unwrap();
    assert_eq!(usage.percentage_used, dec!(85));
    assert!(usage.is_alert);
    assert_eq!(usage.status, aggregate::BudgetStatus::Near);

    let report = alerts::collect_alerts(&conn, 1, d(6, 20)).unwrap();
    assert_eq!(report.budget.len(), 1);
    assert_eq!(report.budget[0].spent_amount, dec!(850));
}

#[test]
fn threshold_notice_is_sent_once_on_crossing() {
    let mut conn = setup("5000");
    budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(100))).unwrap();
    let notifier = Recording::default();

    transactions::create_transaction(&mut conn, &notifier, 1, &spend(1, dec!(50), d(6, 2)))
        .unwrap();
    transactions::create_transaction(&mut conn, &notifier, 1, &spend(1, dec!(40), d(6, 3)))
        .unwrap();
    transactions::create_transaction(&mut conn, &notifier, 1, &spend(1, dec!(5), d(6, 4)))
        .unwrap();

    let sent = notifier.0.lock().unwrap();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Notice::BudgetThreshold {
            percentage_used, ..
        } => assert_eq!(*percentage_used, dec!(90)),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn failed_notice_is_a_caveat_not_a_failure() {
    let mut conn = setup("5000");
    budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(100))).unwrap();
    let out =
        transactions::create_transaction(&mut conn, &Refusing, 1, &spend(1, dec!(90), d(6, 2)))
            .unwrap();
    assert!(out.has_caveat());
    assert!(out.caveats[0].starts_with("succeeded, but"));
    let balance: String = conn
        .query_row("SELECT balance FROM accounts WHERE id=1", [], |r| r.get(0))
        .unwrap();
    assert_eq!(balance.parse::<Decimal>().unwrap(), dec!(4910));
}

#[test]
fn proposal_beyond_balance_is_infeasible_with_shortage() {
    let mut conn = setup("2000000");
    budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(1000000))).unwrap();
    let report = feasibility::check_feasibility(
        &conn,
        1,
        &feasibility::BudgetProposal {
            category_id: 2,
            amount: dec!(1500000),
            start: d(6, 15),
            end: d(7, 15),
        },
        d(6, 10),
    )
    .unwrap();
    assert!(!report.is_feasible);
    assert_eq!(report.existing_commitments, dec!(1000000));
    assert_eq!(report.total_required, dec!(2500000));
    assert_eq!(report.shortage, dec!(500000));
    assert_eq!(report.overlapping.len(), 1);
}

#[test]
fn overlapping_period_rejected_back_to_back_accepted() {
    let mut conn = setup("1000");
    let first = budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(300))).unwrap();

    let mut clash = june_budget(1, dec!(300));
    clash.start = d(6, 30);
    clash.end = d(7, 31);
    match budgets::create_budget(&mut conn, 1, &clash).unwrap_err() {
        LedgerError::Overlap { budget_id, .. } => assert_eq!(budget_id, first.id),
        other => panic!("unexpected {other:?}"),
    }

    let mut next = june_budget(1, dec!(300));
    next.start = d(7, 1);
    next.end = d(8, 1);
    budgets::create_budget(&mut conn, 1, &next).unwrap();

    // another category is independent
    budgets::create_budget(&mut conn, 1, &june_budget(2, dec!(300))).unwrap();
    assert_eq!(budgets::list_budgets(&conn, 1).unwrap().len(), 3);
}

#[test]
fn empty_or_inverted_period_is_an_invalid_range() {
    let mut conn = setup("1000");
    let mut bad = june_budget(1, dec!(300));
    bad.end = bad.start;
    assert!(matches!(
        budgets::create_budget(&mut conn, 1, &bad).unwrap_err(),
        LedgerError::InvalidRange { .. }
    ));
}

#[test]
fn spend_counts_the_end_date_and_is_stable() {
    let mut conn = setup("1000");
    let b = budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(500))).unwrap();
    transactions::create_transaction(&mut conn, &LogNotifier, 1, &spend(1, dec!(20), d(7, 1)))
        .unwrap();
    transactions::create_transaction(&mut conn, &LogNotifier, 1, &spend(1, dec!(30), d(7, 2)))
        .unwrap();
    let b = budgets::get_budget(&conn, 1, b.id).unwrap();
    let first = aggregate::compute_spent(&conn, &b).unwrap();
    let second = aggregate::compute_spent(&conn, &b).unwrap();
    assert_eq!(first, dec!(20));
    assert_eq!(first, second);
}

#[test]
fn stale_cache_is_reported_and_synced() {
    let mut conn = setup("1000");
    let b = budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(500))).unwrap();
    transactions::create_transaction(&mut conn, &LogNotifier, 1, &spend(1, dec!(45), d(6, 9)))
        .unwrap();

    // reads never trust the cache
    assert_eq!(budgets::budget_summary(&conn, 1, b.id).unwrap().spent, dec!(45));
    let issues = doctor::diagnose(&conn, 1).unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].issue, "stale_spent_cache");

    assert_eq!(budgets::sync_spent_cache(&mut conn, 1).unwrap(), 1);
    assert_eq!(budgets::get_budget(&conn, 1, b.id).unwrap().spent_amount, dec!(45));
    assert!(doctor::diagnose(&conn, 1).unwrap().is_empty());
    assert_eq!(budgets::sync_spent_cache(&mut conn, 1).unwrap(), 0);
}

#[test]
fn template_is_all_or_nothing() {
    let mut conn = setup("1000");
    budgets::create_budget(&mut conn, 1, &june_budget(2, dec!(100))).unwrap();
    let template = budgets::BudgetTemplate {
        start: d(6, 1),
        end: d(7, 1),
        alert_threshold: None,
        items: vec![(1, dec!(200)), (2, dec!(300))],
    };
    assert!(budgets::create_from_template(&mut conn, 1, &template).is_err());
    assert_eq!(budgets::list_budgets(&conn, 1).unwrap().len(), 1);
}

#[test]
fn update_may_keep_its_own_period() {
    let mut conn = setup("1000");
    let b = budgets::create_budget(&mut conn, 1, &june_budget(1, dec!(100))).unwrap();
    let updated = budgets::update_budget(
        &mut conn,
        1,
        b.id,
        &budgets::BudgetUpdate {
            amount: Some(dec!(150)),
            end: Some(d(7, 10)),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(updated.amount, dec!(150));
    assert_eq!(updated.end, d(7, 10));
}
