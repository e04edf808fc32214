// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Income, expense and transfer records. Every row written here is paired
//! with its balance delta inside the same unit of work.

use crate::engine::ledger::{self, EntrySource, LedgerEvent, Posting, TransferEvent};
use crate::errors::{LedgerError, Result};
use crate::models::{CategoryKind, Transaction, Transfer, TxKind};
use crate::notify::{Notifier, Outcome};
use crate::services::{budgets, categories, investments};
use chrono::NaiveDate;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TxKind,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub is_recurring: bool,
}

/// A bulk-import row that still refers to its account and category by name.
#[derive(Debug, Clone)]
pub struct ImportRow {
    pub date: NaiveDate,
    pub account: String,
    pub kind: TxKind,
    pub amount: Decimal,
    pub category: Option<String>,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub is_recurring: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TxFilter {
    pub account_id: Option<i64>,
    pub category_id: Option<i64>,
    pub kind: Option<TxKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub recurring_only: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer: Transfer,
    pub debit_leg: Transaction,
    pub credit_leg: Transaction,
    pub postings: Vec<Posting>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub net: Decimal,
    pub count: usize,
}

fn clean(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn get_transaction(conn: &Connection, user_id: i64, id: i64) -> Result<Transaction> {
    let sql = format!(
        "SELECT {} FROM transactions WHERE id=?1 AND user_id=?2",
        Transaction::COLUMNS
    );
    conn.query_row(&sql, params![id, user_id], Transaction::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("transaction", id))
}

pub fn get_transfer(conn: &Connection, user_id: i64, id: i64) -> Result<Transfer> {
    let sql = format!(
        "SELECT {} FROM transfers WHERE id=?1 AND user_id=?2",
        Transfer::COLUMNS
    );
    conn.query_row(&sql, params![id, user_id], Transfer::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("transfer", id))
}

fn insert_row(
    tx: &rusqlite::Transaction<'_>,
    user_id: i64,
    new: &NewTransaction,
    transfer_id: Option<i64>,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO transactions(user_id, account_id, category_id, kind, amount, date, description, merchant, transfer_id, is_recurring)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
        params![
            user_id,
            new.account_id,
            new.category_id,
            new.kind,
            new.amount.to_string(),
            new.date,
            clean(&new.description),
            clean(&new.merchant),
            transfer_id,
            new.is_recurring
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Writes one Income or Expense row and its balance delta. Runs inside an
/// open unit of work.
pub(crate) fn record_entry(
    tx: &rusqlite::Transaction<'_>,
    user_id: i64,
    new: &NewTransaction,
) -> Result<Transaction> {
    let event = LedgerEvent::for_entry(new.kind, new.account_id, new.amount)?;
    ledger::check(tx, user_id, &event)?;
    if let Some(category_id) = new.category_id {
        categories::get_category(tx, user_id, category_id)?;
    }
    let id = insert_row(tx, user_id, new, None)?;
    ledger::apply(tx, user_id, &event, EntrySource::Transaction, Some(id))?;
    get_transaction(tx, user_id, id)
}

pub fn create_transaction(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    user_id: i64,
    new: &NewTransaction,
) -> Result<Outcome<Transaction>> {
    let t = ledger::atomically(conn, &[new.account_id], |tx| {
        record_entry(tx, user_id, new)
    })?;
    tracing::info!(user_id, transaction_id = t.id, kind = %t.kind, amount = %t.amount, "transaction recorded");

    let mut outcome = Outcome::clean(t);
    match budgets::threshold_crossings(conn, &outcome.value) {
        Ok(notices) => {
            for notice in notices {
                outcome = outcome.notify(notifier, notice);
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "budget threshold check skipped");
            outcome
                .caveats
                .push("succeeded, but budget thresholds could not be checked".into());
        }
    }
    Ok(outcome)
}

/// Moves money between two of the user's accounts as one transfer record
/// and two linked legs.
pub fn transfer(conn: &mut Connection, user_id: i64, event: &TransferEvent) -> Result<TransferReceipt> {
    let receipt = ledger::atomically(conn, &[event.from, event.to], |tx| {
        let ledger_event = LedgerEvent::Transfer(event.clone());
        ledger::check(tx, user_id, &ledger_event)?;

        tx.execute(
            "INSERT INTO transfers(user_id, from_account_id, to_account_id, amount, date)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                user_id,
                event.from,
                event.to,
                event.amount.to_string(),
                event.date
            ],
        )?;
        let transfer_id = tx.last_insert_rowid();

        let leg = |account_id: i64| NewTransaction {
            account_id,
            category_id: None,
            kind: TxKind::Transfer,
            amount: event.amount,
            date: event.date,
            description: event.description.clone(),
            merchant: None,
            is_recurring: false,
        };
        let debit_id = insert_row(tx, user_id, &leg(event.from), Some(transfer_id))?;
        let credit_id = insert_row(tx, user_id, &leg(event.to), Some(transfer_id))?;
        let postings = ledger::apply(
            tx,
            user_id,
            &ledger_event,
            EntrySource::Transfer,
            Some(transfer_id),
        )?;

        Ok(TransferReceipt {
            transfer: get_transfer(tx, user_id, transfer_id)?,
            debit_leg: get_transaction(tx, user_id, debit_id)?,
            credit_leg: get_transaction(tx, user_id, credit_id)?,
            postings,
        })
    })?;
    tracing::info!(
        user_id,
        transfer_id = receipt.transfer.id,
        from = event.from,
        to = event.to,
        amount = %event.amount,
        "transfer committed"
    );
    Ok(receipt)
}

/// Deletes a record and reverses exactly the delta it applied. Deleting
/// either leg of a transfer removes the whole transfer.
pub fn delete_transaction(conn: &mut Connection, user_id: i64, id: i64) -> Result<Vec<Posting>> {
    let found = get_transaction(conn, user_id, id)?;
    let postings = match found.transfer_id {
        Some(transfer_id) => {
            let t = get_transfer(conn, user_id, transfer_id)?;
            ledger::atomically(conn, &[t.from_account_id, t.to_account_id], |tx| {
                let t = get_transfer(tx, user_id, transfer_id)?;
                let event = LedgerEvent::Transfer(TransferEvent {
                    from: t.from_account_id,
                    to: t.to_account_id,
                    amount: t.amount,
                    date: t.date,
                    description: None,
                })
                .reversed();
                let postings =
                    ledger::apply(tx, user_id, &event, EntrySource::Reversal, Some(transfer_id))?;
                tx.execute(
                    "DELETE FROM transactions WHERE transfer_id=?1",
                    params![transfer_id],
                )?;
                tx.execute("DELETE FROM transfers WHERE id=?1", params![transfer_id])?;
                Ok(postings)
            })?
        }
        None => ledger::atomically(conn, &[found.account_id], |tx| {
            let t = get_transaction(tx, user_id, id)?;
            let event = LedgerEvent::for_entry(t.kind, t.account_id, t.amount)?.reversed();
            let postings = ledger::apply(tx, user_id, &event, EntrySource::Reversal, Some(id))?;
            if let Some(investment_id) = t.investment_id {
                let booked = match t.kind {
                    TxKind::Income => t.amount,
                    _ => -t.amount,
                };
                investments::unrealize(tx, investment_id, booked)?;
            }
            tx.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
            Ok(postings)
        })?,
    };
    tracing::info!(user_id, transaction_id = id, legs = postings.len(), "transaction deleted");
    Ok(postings)
}

pub fn list_transactions(conn: &Connection, user_id: i64, filter: &TxFilter) -> Result<Vec<Transaction>> {
    let mut sql = format!(
        "SELECT {} FROM transactions WHERE user_id=?",
        Transaction::COLUMNS
    );
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(user_id)];

    if let Some(account_id) = filter.account_id {
        sql.push_str(" AND account_id=?");
        args.push(Box::new(account_id));
    }
    if let Some(category_id) = filter.category_id {
        sql.push_str(" AND category_id=?");
        args.push(Box::new(category_id));
    }
    if let Some(kind) = filter.kind {
        sql.push_str(" AND kind=?");
        args.push(Box::new(kind));
    }
    if let Some(from) = filter.from {
        sql.push_str(" AND date>=?");
        args.push(Box::new(from));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND date<=?");
        args.push(Box::new(to));
    }
    if filter.recurring_only {
        sql.push_str(" AND is_recurring=1");
    }
    sql.push_str(" ORDER BY date DESC, id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        args.push(Box::new(limit as i64));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
            Transaction::from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn recent_transactions(conn: &Connection, user_id: i64) -> Result<Vec<Transaction>> {
    list_transactions(
        conn,
        user_id,
        &TxFilter {
            limit: Some(RECENT_LIMIT),
            ..TxFilter::default()
        },
    )
}

/// Entries flagged as recurring, newest first.
pub fn recurring_transactions(conn: &Connection, user_id: i64) -> Result<Vec<Transaction>> {
    list_transactions(
        conn,
        user_id,
        &TxFilter {
            recurring_only: true,
            ..TxFilter::default()
        },
    )
}

/// Case-insensitive match on description or merchant.
pub fn search_transactions(
    conn: &Connection,
    user_id: i64,
    keyword: &str,
    limit: Option<usize>,
) -> Result<Vec<Transaction>> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(LedgerError::validation("search keyword is required"));
    }
    let sql = format!(
        "SELECT {} FROM transactions
         WHERE user_id=?1 AND (description LIKE ?2 OR merchant LIKE ?2)
         ORDER BY date DESC, id DESC LIMIT ?3",
        Transaction::COLUMNS
    );
    let pattern = format!("%{}%", keyword);
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id, pattern, limit], Transaction::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Income and expense totals for `[from, to]`, both ends inclusive.
pub fn transaction_summary(
    conn: &Connection,
    user_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<TxSummary> {
    if from > to {
        return Err(LedgerError::InvalidRange {
            start: from,
            end: to,
        });
    }
    let rows = list_transactions(
        conn,
        user_id,
        &TxFilter {
            from: Some(from),
            to: Some(to),
            ..TxFilter::default()
        },
    )?;
    let mut total_income = Decimal::ZERO;
    let mut total_expense = Decimal::ZERO;
    for t in &rows {
        match t.kind {
            TxKind::Income => total_income += t.amount,
            TxKind::Expense => total_expense += t.amount,
            TxKind::Transfer => {}
        }
    }
    Ok(TxSummary {
        from,
        to,
        total_income,
        total_expense,
        net: total_income - total_expense,
        count: rows.len(),
    })
}

/// Changes or clears the category. Balances are unaffected.
pub fn recategorize(
    conn: &Connection,
    user_id: i64,
    id: i64,
    category_id: Option<i64>,
) -> Result<Transaction> {
    let t = get_transaction(conn, user_id, id)?;
    if t.kind == TxKind::Transfer {
        return Err(LedgerError::validation("transfer legs cannot be categorized"));
    }
    if let Some(category_id) = category_id {
        categories::get_category(conn, user_id, category_id)?;
    }
    conn.execute(
        "UPDATE transactions SET category_id=?1 WHERE id=?2",
        params![category_id, id],
    )?;
    get_transaction(conn, user_id, id)
}

fn account_id_by_name(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM accounts WHERE user_id=?1 AND name=?2 AND is_active=1",
        params![user_id, name.trim()],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| LedgerError::validation(format!("account '{}' not found", name)))
}

/// Records every row or none of them. Missing categories are created on the
/// fly with the row's direction.
pub fn import_transactions(conn: &mut Connection, user_id: i64, rows: &[ImportRow]) -> Result<usize> {
    let mut ids: HashMap<String, i64> = HashMap::new();
    for row in rows {
        if !ids.contains_key(&row.account) {
            let id = account_id_by_name(conn, user_id, &row.account)?;
            ids.insert(row.account.clone(), id);
        }
    }
    let accounts: Vec<i64> = ids.values().copied().collect();

    let count = ledger::atomically(conn, &accounts, |tx| {
        for (i, row) in rows.iter().enumerate() {
            let at_row = |e: LedgerError| match e {
                LedgerError::Validation(msg) => {
                    LedgerError::validation(format!("row {}: {}", i + 1, msg))
                }
                other => other,
            };
            let category_id = match row.category.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => {
                    let kind = match row.kind {
                        TxKind::Income => CategoryKind::Income,
                        _ => CategoryKind::Expense,
                    };
                    let category = categories::find_or_create_category(tx, user_id, name, kind)
                        .map_err(at_row)?;
                    Some(category.id)
                }
                _ => None,
            };
            let new = NewTransaction {
                account_id: ids[&row.account],
                category_id,
                kind: row.kind,
                amount: row.amount,
                date: row.date,
                description: row.description.clone(),
                merchant: row.merchant.clone(),
                is_recurring: row.is_recurring,
            };
            record_entry(tx, user_id, &new).map_err(at_row)?;
        }
        Ok(rows.len())
    })?;
    tracing::info!(user_id, count, "transactions imported");
    Ok(count)
}
