// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::ACCOUNT_TYPES;
use crate::engine::ledger::{self, EntrySource, LedgerEvent, Posting};
use crate::errors::{LedgerError, Result};
use crate::models::Account;
use crate::notify::{Notice, Notifier, Outcome};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub r#type: String,
    pub currency: String,
    pub initial_balance: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountSummary {
    pub total_balance: Decimal,
    pub active_accounts: usize,
    pub by_currency: BTreeMap<String, Decimal>,
}

fn canonical_type(input: &str) -> Result<&'static str> {
    ACCOUNT_TYPES
        .iter()
        .find(|t| t.eq_ignore_ascii_case(input.trim()))
        .copied()
        .ok_or_else(|| {
            LedgerError::validation(format!(
                "unknown account type '{}', expected one of: {}",
                input,
                ACCOUNT_TYPES.join(", ")
            ))
        })
}

fn normalize_currency(input: &str) -> Result<String> {
    let ccy = input.trim().to_uppercase();
    if ccy.len() != 3 || !ccy.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LedgerError::validation(format!(
            "currency '{}' must be a three-letter code",
            input
        )));
    }
    Ok(ccy)
}

fn ensure_unique_name(conn: &Connection, user_id: i64, name: &str, exclude: Option<i64>) -> Result<()> {
    let clash: Option<i64> = conn
        .query_row(
            "SELECT id FROM accounts WHERE user_id=?1 AND is_active=1 AND name=?2",
            params![user_id, name],
            |r| r.get(0),
        )
        .optional()?;
    match clash {
        Some(id) if Some(id) != exclude => Err(LedgerError::validation(format!(
            "an active account named '{}' already exists",
            name
        ))),
        _ => Ok(()),
    }
}

pub fn get_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<Account> {
    match ledger::load_account(conn, account_id)? {
        Some(a) if a.user_id == user_id => Ok(a),
        _ => Err(LedgerError::not_found("account", account_id)),
    }
}

pub fn create_account(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    user_id: i64,
    new: &NewAccount,
) -> Result<Outcome<Account>> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("account name is required"));
    }
    let typ = canonical_type(&new.r#type)?;
    let ccy = normalize_currency(&new.currency)?;

    let account = ledger::atomically(conn, &[], |tx| {
        ensure_unique_name(tx, user_id, name, None)?;
        tx.execute(
            "INSERT INTO accounts(user_id, name, type, currency, initial_balance, balance)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![user_id, name, typ, ccy, new.initial_balance.to_string()],
        )?;
        get_account(tx, user_id, tx.last_insert_rowid())
    })?;
    let id = account.id;

    tracing::info!(user_id, account_id = id, "account created");
    let notice = Notice::AccountActivated {
        user_id,
        account_id: id,
        account_name: account.name.clone(),
    };
    Ok(Outcome::clean(account).notify(notifier, notice))
}

pub fn list_accounts(conn: &Connection, user_id: i64, include_inactive: bool) -> Result<Vec<Account>> {
    if !include_inactive {
        return ledger::active_accounts(conn, user_id);
    }
    let sql = format!(
        "SELECT {} FROM accounts WHERE user_id=?1 ORDER BY id",
        Account::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Account::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Renames or re-labels an account. The balance is never touched here.
pub fn update_account(
    conn: &mut Connection,
    user_id: i64,
    account_id: i64,
    update: &AccountUpdate,
) -> Result<Account> {
    ledger::atomically(conn, &[account_id], |tx| {
        let current = get_account(tx, user_id, account_id)?;
        let name = match &update.name {
            Some(n) if n.trim().is_empty() => {
                return Err(LedgerError::validation("account name is required"));
            }
            Some(n) => n.trim().to_string(),
            None => current.name.clone(),
        };
        let ccy = match &update.currency {
            Some(c) => normalize_currency(c)?,
            None => current.currency.clone(),
        };
        if current.is_active {
            ensure_unique_name(tx, user_id, &name, Some(account_id))?;
        }
        tx.execute(
            "UPDATE accounts SET name=?1, currency=?2 WHERE id=?3",
            params![name, ccy, account_id],
        )?;
        get_account(tx, user_id, account_id)
    })
}

pub fn deactivate_account(conn: &Connection, user_id: i64, account_id: i64) -> Result<()> {
    let account = get_account(conn, user_id, account_id)?;
    if !account.is_active {
        return Err(LedgerError::validation(format!(
            "account {} is already inactive",
            account_id
        )));
    }
    conn.execute(
        "UPDATE accounts SET is_active=0 WHERE id=?1",
        params![account_id],
    )?;
    tracing::info!(user_id, account_id, "account deactivated");
    Ok(())
}

pub fn reactivate_account(
    conn: &mut Connection,
    notifier: &dyn Notifier,
    user_id: i64,
    account_id: i64,
) -> Result<Outcome<Account>> {
    let tx = conn.transaction()?;
    let account = get_account(&tx, user_id, account_id)?;
    if account.is_active {
        return Err(LedgerError::validation(format!(
            "account {} is already active",
            account_id
        )));
    }
    ensure_unique_name(&tx, user_id, &account.name, Some(account_id))?;
    tx.execute(
        "UPDATE accounts SET is_active=1 WHERE id=?1",
        params![account_id],
    )?;
    let account = get_account(&tx, user_id, account_id)?;
    tx.commit()?;

    tracing::info!(user_id, account_id, "account reactivated");
    let notice = Notice::AccountActivated {
        user_id,
        account_id,
        account_name: account.name.clone(),
    };
    Ok(Outcome::clean(account).notify(notifier, notice))
}

pub fn account_summary(conn: &Connection, user_id: i64) -> Result<AccountSummary> {
    let accounts = ledger::active_accounts(conn, user_id)?;
    let mut by_currency: BTreeMap<String, Decimal> = BTreeMap::new();
    for a in &accounts {
        *by_currency.entry(a.currency.clone()).or_default() += a.balance;
    }
    Ok(AccountSummary {
        total_balance: accounts.iter().map(|a| a.balance).sum(),
        active_accounts: accounts.len(),
        by_currency,
    })
}

pub fn account_types() -> Vec<&'static str> {
    ACCOUNT_TYPES.to_vec()
}

/// Moves the balance to `target` by posting the difference through the
/// ledger. Returns `None` when the balance already matches.
pub fn adjust_balance(
    conn: &mut Connection,
    user_id: i64,
    account_id: i64,
    target: Decimal,
) -> Result<Option<Posting>> {
    ledger::atomically(conn, &[account_id], |tx| {
        let account = ledger::usable_account(tx, user_id, account_id)?;
        let delta = target - account.balance;
        if delta.is_zero() {
            return Ok(None);
        }
        let event = if delta > Decimal::ZERO {
            LedgerEvent::Credit {
                account_id,
                amount: delta,
            }
        } else {
            LedgerEvent::Debit {
                account_id,
                amount: -delta,
                require_funds: false,
            }
        };
        let mut postings = ledger::apply(tx, user_id, &event, EntrySource::Adjustment, Some(account_id))?;
        tracing::info!(user_id, account_id, %delta, "balance adjusted");
        Ok(postings.pop())
    })
}
