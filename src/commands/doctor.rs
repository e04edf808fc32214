// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::engine::aggregate::{self, BudgetScope};
use crate::engine::ledger;
use crate::models::Account;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub issue: &'static str,
    pub detail: String,
}

pub fn diagnose(conn: &Connection, user_id: i64) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) balance must equal opening balance plus the journal
    let sql = format!(
        "SELECT {} FROM accounts WHERE user_id=?1 ORDER BY id",
        Account::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map(params![user_id], Account::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for a in accounts {
        let expected = a.initial_balance + ledger::journal_total(conn, a.id)?;
        if expected != a.balance {
            issues.push(Issue {
                issue: "balance_drift",
                detail: format!(
                    "account #{} '{}' holds {} but its journal implies {}",
                    a.id, a.name, a.balance, expected
                ),
            });
        }
    }

    // 2) every transfer owns exactly two legs
    let mut stmt = conn.prepare(
        "SELECT t.id, COUNT(x.id) FROM transfers t
         LEFT JOIN transactions x ON x.transfer_id=t.id
         WHERE t.user_id=?1
         GROUP BY t.id HAVING COUNT(x.id) != 2",
    )?;
    let mut cur = stmt.query(params![user_id])?;
    while let Some(r) = cur.next()? {
        let id: i64 = r.get(0)?;
        let legs: i64 = r.get(1)?;
        issues.push(Issue {
            issue: "transfer_legs",
            detail: format!("transfer #{} has {} leg(s)", id, legs),
        });
    }

    // 3) cached spend that no longer matches the transactions
    for b in aggregate::load_budgets(conn, user_id, BudgetScope::Active)? {
        let spent = aggregate::compute_spent(conn, &b)?;
        if spent != b.spent_amount {
            issues.push(Issue {
                issue: "stale_spent_cache",
                detail: format!(
                    "budget #{} '{}' caches {} but spent is {} (run `budget sync`)",
                    b.id, b.name, b.spent_amount, spent
                ),
            });
        }
    }
    Ok(issues)
}

pub fn handle(conn: &Connection, session: &Session) -> Result<()> {
    let issues = diagnose(conn, session.user_id)?;
    if session.emit(&issues)? {
        return Ok(());
    }
    if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.issue.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
