// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::{decimal_at, opt_decimal_at};
use chrono::NaiveDate;
use rusqlite::Row;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a transaction. Every variant has a balance rule in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    Income,
    Expense,
    Transfer,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxKind::Income => "Income",
            TxKind::Expense => "Expense",
            TxKind::Transfer => "Transfer",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TxKind::Income),
            "expense" => Ok(TxKind::Expense),
            "transfer" => Ok(TxKind::Transfer),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl ToSql for TxKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TxKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryKind {
    Income,
    Expense,
}

impl CategoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryKind::Income => "Income",
            CategoryKind::Expense => "Expense",
        }
    }
}

impl FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(CategoryKind::Income),
            "expense" => Ok(CategoryKind::Expense),
            other => Err(format!("unknown category type '{}'", other)),
        }
    }
}

impl ToSql for CategoryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub r#type: String,
    pub currency: String,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub is_active: bool,
}

impl Account {
    pub const COLUMNS: &'static str =
        "id, user_id, name, type, currency, initial_balance, balance, is_active";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Account {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            r#type: r.get(3)?,
            currency: r.get(4)?,
            initial_balance: decimal_at(r, 5)?,
            balance: decimal_at(r, 6)?,
            is_active: r.get(7)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: CategoryKind,
}

impl Category {
    pub const COLUMNS: &'static str = "id, user_id, name, type";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Category {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            kind: r.get(3)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub kind: TxKind,
    pub amount: Decimal, // always positive, direction is `kind`
    pub date: NaiveDate,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub transfer_id: Option<i64>,
    /// Set on entries that realized an investment's gain or loss.
    pub investment_id: Option<i64>,
    pub is_recurring: bool,
}

impl Transaction {
    pub const COLUMNS: &'static str = "id, user_id, account_id, category_id, kind, amount, date, description, merchant, transfer_id, investment_id, is_recurring";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Transaction {
            id: r.get(0)?,
            user_id: r.get(1)?,
            account_id: r.get(2)?,
            category_id: r.get(3)?,
            kind: r.get(4)?,
            amount: decimal_at(r, 5)?,
            date: r.get(6)?,
            description: r.get(7)?,
            merchant: r.get(8)?,
            transfer_id: r.get(9)?,
            investment_id: r.get(10)?,
            is_recurring: r.get(11)?,
        })
    }
}

/// One money movement between two accounts; owns exactly two Transfer legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub user_id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
}

impl Transfer {
    pub const COLUMNS: &'static str = "id, user_id, from_account_id, to_account_id, amount, date";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Transfer {
            id: r.get(0)?,
            user_id: r.get(1)?,
            from_account_id: r.get(2)?,
            to_account_id: r.get(3)?,
            amount: decimal_at(r, 4)?,
            date: r.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub name: String,
    pub amount: Decimal,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub alert_threshold: Decimal, // percent
    pub spent_amount: Decimal,    // cache, may be stale
    pub is_active: bool,
}

impl Budget {
    pub const COLUMNS: &'static str = "id, user_id, category_id, name, amount, start_date, end_date, alert_threshold, spent_amount, is_active";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Budget {
            id: r.get(0)?,
            user_id: r.get(1)?,
            category_id: r.get(2)?,
            name: r.get(3)?,
            amount: decimal_at(r, 4)?,
            start: r.get(5)?,
            end: r.get(6)?,
            alert_threshold: decimal_at(r, 7)?,
            spent_amount: decimal_at(r, 8)?,
            is_active: r.get(9)?,
        })
    }

    /// Inclusive on both ends, matching how spend is aggregated.
    pub fn covers(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub borrower: String,
    pub principal: Decimal,
    pub outstanding: Decimal,
    pub total_received: Decimal,
    pub interest_rate: Decimal,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub account_id: Option<i64>,
    pub status: String,
}

impl Loan {
    pub const COLUMNS: &'static str = "id, user_id, name, borrower, principal, outstanding, total_received, interest_rate, start_date, due_date, account_id, status";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Loan {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            borrower: r.get(3)?,
            principal: decimal_at(r, 4)?,
            outstanding: decimal_at(r, 5)?,
            total_received: decimal_at(r, 6)?,
            interest_rate: decimal_at(r, 7)?,
            start_date: r.get(8)?,
            due_date: r.get(9)?,
            account_id: r.get(10)?,
            status: r.get(11)?,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == "Active"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debt {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub debt_type: String,
    pub creditor: Option<String>,
    pub original_amount: Decimal,
    pub current_balance: Decimal,
    pub interest_rate: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub next_payment_date: Option<NaiveDate>,
    pub account_id: Option<i64>,
    pub is_active: bool,
}

impl Debt {
    pub const COLUMNS: &'static str = "id, user_id, name, debt_type, creditor, original_amount, current_balance, interest_rate, minimum_payment, next_payment_date, account_id, is_active";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Debt {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            debt_type: r.get(3)?,
            creditor: r.get(4)?,
            original_amount: decimal_at(r, 5)?,
            current_balance: decimal_at(r, 6)?,
            interest_rate: opt_decimal_at(r, 7)?,
            minimum_payment: opt_decimal_at(r, 8)?,
            next_payment_date: r.get(9)?,
            account_id: r.get(10)?,
            is_active: r.get(11)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub kind: String,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub total_invested: Decimal,
    pub current_value: Option<Decimal>,
    pub realized_gain: Decimal,
    pub account_id: Option<i64>,
    pub is_active: bool,
}

impl Investment {
    pub const COLUMNS: &'static str = "id, user_id, name, kind, symbol, quantity, purchase_price, current_price, total_invested, current_value, realized_gain, account_id, is_active";

    pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Investment {
            id: r.get(0)?,
            user_id: r.get(1)?,
            name: r.get(2)?,
            kind: r.get(3)?,
            symbol: r.get(4)?,
            quantity: opt_decimal_at(r, 5)?,
            purchase_price: opt_decimal_at(r, 6)?,
            current_price: opt_decimal_at(r, 7)?,
            total_invested: decimal_at(r, 8)?,
            current_value: opt_decimal_at(r, 9)?,
            realized_gain: decimal_at(r, 10)?,
            account_id: r.get(11)?,
            is_active: r.get(12)?,
        })
    }

    pub fn gain_loss(&self) -> Option<Decimal> {
        self.current_value.map(|v| v - self.total_invested)
    }
}
