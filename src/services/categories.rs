// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{LedgerError, Result};
use crate::models::{Category, CategoryKind};
use rusqlite::{Connection, OptionalExtension, params};

pub fn get_category(conn: &Connection, user_id: i64, category_id: i64) -> Result<Category> {
    let sql = format!(
        "SELECT {} FROM categories WHERE id=?1 AND user_id=?2",
        Category::COLUMNS
    );
    conn.query_row(&sql, params![category_id, user_id], Category::from_row)
        .optional()?
        .ok_or_else(|| LedgerError::not_found("category", category_id))
}

pub fn find_category(conn: &Connection, user_id: i64, name: &str) -> Result<Option<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE user_id=?1 AND name=?2",
        Category::COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![user_id, name.trim()], Category::from_row)
        .optional()?)
}

pub fn create_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    kind: CategoryKind,
) -> Result<Category> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LedgerError::validation("category name is required"));
    }
    if find_category(conn, user_id, name)?.is_some() {
        return Err(LedgerError::validation(format!(
            "category '{}' already exists",
            name
        )));
    }
    conn.execute(
        "INSERT INTO categories(user_id, name, type) VALUES (?1, ?2, ?3)",
        params![user_id, name, kind],
    )?;
    get_category(conn, user_id, conn.last_insert_rowid())
}

/// Returns the user's category with this name, creating it on first use.
/// An existing category of the other kind is an error.
pub fn find_or_create_category(
    conn: &Connection,
    user_id: i64,
    name: &str,
    kind: CategoryKind,
) -> Result<Category> {
    match find_category(conn, user_id, name)? {
        Some(c) if c.kind != kind => Err(LedgerError::validation(format!(
            "category '{}' is {}, not {}",
            c.name,
            c.kind.as_str(),
            kind.as_str()
        ))),
        Some(c) => Ok(c),
        None => create_category(conn, user_id, name, kind),
    }
}

pub fn list_categories(conn: &Connection, user_id: i64) -> Result<Vec<Category>> {
    let sql = format!(
        "SELECT {} FROM categories WHERE user_id=?1 ORDER BY name",
        Category::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], Category::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
