// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! The only code allowed to change an account balance.
//!
//! Callers describe a money movement as a [`LedgerEvent`], open a unit of work
//! with [`atomically`] and hand the event to [`apply`]. Every balance change is
//! mirrored by a row in `ledger_entries`, so `balance == initial_balance + Σ delta`
//! holds for every account at every commit.

use crate::engine::locks::AccountLocks;
use crate::errors::{LedgerError, Result};
use crate::models::{Account, TxKind};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;
use serde::Serialize;

/// A transfer between two accounts of the same user, expanded by the ledger
/// into one debit leg and one credit leg.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferEvent {
    pub from: i64,
    pub to: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    Credit {
        account_id: i64,
        amount: Decimal,
    },
    Debit {
        account_id: i64,
        amount: Decimal,
        require_funds: bool,
    },
    Transfer(TransferEvent),
    /// Undo of an earlier event. Never blocked by funds or active checks.
    Reverse(Box<LedgerEvent>),
}

/// Why a journal row exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySource {
    Transaction,
    Transfer,
    Loan,
    LoanPayment,
    Debt,
    Investment,
    Adjustment,
    Reversal,
}

impl EntrySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntrySource::Transaction => "transaction",
            EntrySource::Transfer => "transfer",
            EntrySource::Loan => "loan",
            EntrySource::LoanPayment => "loan_payment",
            EntrySource::Debt => "debt",
            EntrySource::Investment => "investment",
            EntrySource::Adjustment => "adjustment",
            EntrySource::Reversal => "reversal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Posting {
    pub account_id: i64,
    pub delta: Decimal,
    pub balance_after: Decimal,
}

impl LedgerEvent {
    /// Balance rule for a single Income or Expense record.
    pub fn for_entry(kind: TxKind, account_id: i64, amount: Decimal) -> Result<LedgerEvent> {
        match kind {
            TxKind::Income => Ok(LedgerEvent::Credit { account_id, amount }),
            TxKind::Expense => Ok(LedgerEvent::Debit {
                account_id,
                amount,
                require_funds: false,
            }),
            TxKind::Transfer => Err(LedgerError::validation(
                "transfer legs are posted as a pair through a transfer event",
            )),
        }
    }

    pub fn reversed(self) -> LedgerEvent {
        LedgerEvent::Reverse(Box::new(self))
    }

    /// Accounts touched, in the order the legs are written.
    pub fn accounts(&self) -> Vec<i64> {
        match self {
            LedgerEvent::Credit { account_id, .. } | LedgerEvent::Debit { account_id, .. } => {
                vec![*account_id]
            }
            LedgerEvent::Transfer(t) => vec![t.from, t.to],
            LedgerEvent::Reverse(inner) => inner.accounts(),
        }
    }

    /// Signed deltas this event applies, before any validation.
    pub fn deltas(&self) -> Vec<(i64, Decimal)> {
        match self {
            LedgerEvent::Credit { account_id, amount } => vec![(*account_id, *amount)],
            LedgerEvent::Debit {
                account_id, amount, ..
            } => vec![(*account_id, -*amount)],
            LedgerEvent::Transfer(t) => vec![(t.from, -t.amount), (t.to, t.amount)],
            LedgerEvent::Reverse(inner) => inner
                .deltas()
                .into_iter()
                .rev()
                .map(|(id, d)| (id, -d))
                .collect(),
        }
    }

    fn amount(&self) -> Decimal {
        match self {
            LedgerEvent::Credit { amount, .. } | LedgerEvent::Debit { amount, .. } => *amount,
            LedgerEvent::Transfer(t) => t.amount,
            LedgerEvent::Reverse(inner) => inner.amount(),
        }
    }
}

/// Runs `f` as one unit of work: the touched accounts are locked in ascending
/// order, then an IMMEDIATE store transaction is opened. Any error drops the
/// transaction, which rolls back every write made through it.
pub fn atomically<T, F>(conn: &mut Connection, accounts: &[i64], f: F) -> Result<T>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
{
    let _held = AccountLocks::global().acquire(accounts);
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

pub fn load_account(conn: &Connection, account_id: i64) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts WHERE id=?1", Account::COLUMNS);
    Ok(conn
        .query_row(&sql, params![account_id], Account::from_row)
        .optional()?)
}

/// Resolves an account the user may move money through.
pub fn usable_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<Account> {
    match load_account(conn, account_id)? {
        Some(a) if a.user_id == user_id && a.is_active => Ok(a),
        _ => Err(LedgerError::InvalidAccount(account_id)),
    }
}

pub fn active_accounts(conn: &Connection, user_id: i64) -> Result<Vec<Account>> {
    let sql = format!(
        "SELECT {} FROM accounts WHERE user_id=?1 AND is_active=1 ORDER BY id",
        Account::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Account::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Checks an event against current state without writing anything.
pub fn check(conn: &Connection, user_id: i64, event: &LedgerEvent) -> Result<()> {
    if event.amount() <= Decimal::ZERO {
        return Err(LedgerError::validation("amount must be positive"));
    }
    match event {
        LedgerEvent::Credit { account_id, .. } => {
            usable_account(conn, user_id, *account_id)?;
        }
        LedgerEvent::Debit {
            account_id,
            amount,
            require_funds,
        } => {
            let acct = usable_account(conn, user_id, *account_id)?;
            if *require_funds && acct.balance < *amount {
                return Err(LedgerError::InsufficientFunds {
                    account_id: acct.id,
                    shortage: *amount - acct.balance,
                });
            }
        }
        LedgerEvent::Transfer(t) => {
            if t.from == t.to {
                return Err(LedgerError::validation(
                    "source and destination accounts must differ",
                ));
            }
            let from = usable_account(conn, user_id, t.from)?;
            usable_account(conn, user_id, t.to)?;
            if from.balance < t.amount {
                return Err(LedgerError::InsufficientFunds {
                    account_id: from.id,
                    shortage: t.amount - from.balance,
                });
            }
        }
        LedgerEvent::Reverse(_) => {
            for id in event.accounts() {
                match load_account(conn, id)? {
                    Some(a) if a.user_id == user_id => {}
                    _ => return Err(LedgerError::not_found("account", id)),
                }
            }
        }
    }
    Ok(())
}

/// Validates the whole event, then writes every leg. Must run inside a unit of
/// work opened by [`atomically`]; validation failure leaves nothing written.
pub fn apply(
    tx: &rusqlite::Transaction<'_>,
    user_id: i64,
    event: &LedgerEvent,
    source: EntrySource,
    source_id: Option<i64>,
) -> Result<Vec<Posting>> {
    check(tx, user_id, event)?;
    let mut postings = Vec::new();
    for (account_id, delta) in event.deltas() {
        postings.push(post(tx, account_id, delta, source, source_id)?);
    }
    tracing::debug!(user_id, source = source.as_str(), legs = postings.len(), "ledger event applied");
    Ok(postings)
}

fn post(
    tx: &rusqlite::Transaction<'_>,
    account_id: i64,
    delta: Decimal,
    source: EntrySource,
    source_id: Option<i64>,
) -> Result<Posting> {
    let current = load_account(tx, account_id)?
        .ok_or_else(|| LedgerError::not_found("account", account_id))?
        .balance;
    let balance_after = current + delta;
    tx.execute(
        "UPDATE accounts SET balance=?1 WHERE id=?2",
        params![balance_after.to_string(), account_id],
    )?;
    tx.execute(
        "INSERT INTO ledger_entries(account_id, delta, source, source_id) VALUES (?1,?2,?3,?4)",
        params![account_id, delta.to_string(), source.as_str(), source_id],
    )?;
    Ok(Posting {
        account_id,
        delta,
        balance_after,
    })
}

/// Sum of journal deltas for one account.
pub fn journal_total(conn: &Connection, account_id: i64) -> Result<Decimal> {
    let mut stmt = conn.prepare_cached("SELECT delta FROM ledger_entries WHERE account_id=?1")?;
    let mut rows = stmt.query(params![account_id])?;
    let mut total = Decimal::ZERO;
    while let Some(r) = rows.next()? {
        total += crate::db::decimal_at(r, 0)?;
    }
    Ok(total)
}
