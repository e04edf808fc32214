// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::models::TxKind;
use crate::services::transactions::{self, ImportRow};
use crate::utils::{arg, parse_date, parse_decimal};
use anyhow::{Context, Result, anyhow};
use csv::ReaderBuilder;
use rusqlite::Connection;
use std::path::Path;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => import_transactions(conn, session, sub),
        _ => Ok(()),
    }
}

fn import_transactions(conn: &mut Connection, session: &Session, sub: &clap::ArgMatches) -> Result<()> {
    let path = arg(sub, "path")?.trim();
    let rows = read_rows(Path::new(path))?;
    let count = transactions::import_transactions(conn, session.user_id, &rows)?;
    println!("Imported {} transaction(s) from {}", count, path);
    Ok(())
}

fn optional(field: Option<&str>) -> Option<String> {
    field
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn recurring_flag(field: Option<&str>) -> Result<bool> {
    match field.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("no") | Some("0") => Ok(false),
        Some("true") | Some("yes") | Some("1") => Ok(true),
        Some(other) => Err(anyhow!("recurring must be true or false, got '{}'", other)),
    }
}

/// Parses `date,account,type,amount[,category,description,merchant,recurring]`.
/// Nothing is written; a bad line fails the whole file.
pub fn read_rows(path: &Path) -> Result<Vec<ImportRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Open CSV {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let line = i + 2;
        let rec = result.with_context(|| format!("line {}", line))?;
        let date_raw = rec.get(0).context("date missing")?;
        let account = rec.get(1).context("account missing")?.trim().to_string();
        let kind_raw = rec.get(2).context("type missing")?;
        let amount_raw = rec.get(3).context("amount missing")?;

        let kind: TxKind = kind_raw
            .parse()
            .map_err(|e: String| anyhow!("line {}: {}", line, e))?;
        rows.push(ImportRow {
            date: parse_date(date_raw).with_context(|| format!("line {}", line))?,
            account,
            kind,
            amount: parse_decimal(amount_raw).with_context(|| format!("line {}", line))?,
            category: optional(rec.get(4)),
            description: optional(rec.get(5)),
            merchant: optional(rec.get(6)),
            is_recurring: recurring_flag(rec.get(7)).with_context(|| format!("line {}", line))?,
        });
    }
    Ok(rows)
}
