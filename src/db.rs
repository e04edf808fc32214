// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Config;
use anyhow::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;

pub fn db_path(cfg: &Config) -> Result<PathBuf> {
    cfg.resolved_db_path()
}

pub fn open_or_init(cfg: &Config) -> Result<Connection> {
    let path = db_path(cfg)?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(cfg.busy_timeout)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Reads a TEXT-encoded decimal column.
pub fn decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.parse::<Decimal>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn opt_decimal_at(r: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let s: Option<String> = r.get(idx)?;
    s.map(|s| {
        s.parse::<Decimal>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL,
        currency TEXT NOT NULL,
        initial_balance TEXT NOT NULL DEFAULT '0',
        balance TEXT NOT NULL DEFAULT '0',
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user_id);

    CREATE TABLE IF NOT EXISTS categories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        type TEXT NOT NULL CHECK(type IN ('Income','Expense')),
        UNIQUE(user_id, name)
    );

    CREATE TABLE IF NOT EXISTS transfers(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        from_account_id INTEGER NOT NULL,
        to_account_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        FOREIGN KEY(from_account_id) REFERENCES accounts(id),
        FOREIGN KEY(to_account_id) REFERENCES accounts(id)
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        account_id INTEGER NOT NULL,
        category_id INTEGER,
        kind TEXT NOT NULL CHECK(kind IN ('Income','Expense','Transfer')),
        amount TEXT NOT NULL,
        date TEXT NOT NULL,
        description TEXT,
        merchant TEXT,
        transfer_id INTEGER,
        investment_id INTEGER,
        is_recurring INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id),
        FOREIGN KEY(category_id) REFERENCES categories(id) ON DELETE SET NULL,
        FOREIGN KEY(transfer_id) REFERENCES transfers(id),
        FOREIGN KEY(investment_id) REFERENCES investments(id)
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    CREATE INDEX IF NOT EXISTS idx_transactions_user_cat ON transactions(user_id, category_id);

    CREATE TABLE IF NOT EXISTS ledger_entries(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL,
        delta TEXT NOT NULL,
        source TEXT NOT NULL,
        source_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_ledger_entries_account ON ledger_entries(account_id);

    CREATE TABLE IF NOT EXISTS budgets(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        category_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        amount TEXT NOT NULL,
        start_date TEXT NOT NULL,
        end_date TEXT NOT NULL,
        alert_threshold TEXT NOT NULL DEFAULT '80',
        spent_amount TEXT NOT NULL DEFAULT '0', -- cache only, recomputed on read
        is_active INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY(category_id) REFERENCES categories(id)
    );
    CREATE INDEX IF NOT EXISTS idx_budgets_user_cat ON budgets(user_id, category_id);

    CREATE TABLE IF NOT EXISTS loans(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        borrower TEXT NOT NULL,
        principal TEXT NOT NULL,
        outstanding TEXT NOT NULL,
        total_received TEXT NOT NULL DEFAULT '0',
        interest_rate TEXT NOT NULL DEFAULT '0',
        start_date TEXT NOT NULL,
        due_date TEXT,
        account_id INTEGER,
        status TEXT NOT NULL DEFAULT 'Active',
        FOREIGN KEY(account_id) REFERENCES accounts(id)
    );

    CREATE TABLE IF NOT EXISTS loan_payments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        loan_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        principal_part TEXT NOT NULL,
        interest_part TEXT NOT NULL DEFAULT '0',
        date TEXT NOT NULL,
        FOREIGN KEY(loan_id) REFERENCES loans(id)
    );

    CREATE TABLE IF NOT EXISTS debts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        debt_type TEXT NOT NULL,
        creditor TEXT,
        original_amount TEXT NOT NULL,
        current_balance TEXT NOT NULL,
        interest_rate TEXT,
        minimum_payment TEXT,
        next_payment_date TEXT,
        account_id INTEGER,
        is_active INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY(account_id) REFERENCES accounts(id)
    );

    CREATE TABLE IF NOT EXISTS debt_payments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        debt_id INTEGER NOT NULL,
        amount TEXT NOT NULL,
        principal_part TEXT NOT NULL,
        interest_part TEXT NOT NULL DEFAULT '0',
        date TEXT NOT NULL,
        FOREIGN KEY(debt_id) REFERENCES debts(id)
    );

    CREATE TABLE IF NOT EXISTS investments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        symbol TEXT,
        quantity TEXT,
        purchase_price TEXT,
        current_price TEXT,
        total_invested TEXT NOT NULL,
        current_value TEXT,
        realized_gain TEXT NOT NULL DEFAULT '0',
        account_id INTEGER,
        is_active INTEGER NOT NULL DEFAULT 1,
        FOREIGN KEY(account_id) REFERENCES accounts(id)
    );
    "#,
    )?;
    Ok(())
}
