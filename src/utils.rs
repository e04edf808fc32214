// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ArgMatches;
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rust_decimal::Decimal;

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2}", d.round_dp(2))
}

pub fn or_dash<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

/// Required string argument. clap enforces presence, this only avoids a panic.
pub fn arg<'a>(m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("--{} is required", name))
}

pub fn id_arg(m: &ArgMatches, name: &str) -> Result<i64> {
    m.get_one::<i64>(name)
        .copied()
        .with_context(|| format!("--{} is required", name))
}

pub fn decimal_arg(m: &ArgMatches, name: &str) -> Result<Decimal> {
    parse_decimal(arg(m, name)?).with_context(|| format!("--{}", name))
}

pub fn date_arg(m: &ArgMatches, name: &str) -> Result<NaiveDate> {
    parse_date(arg(m, name)?)
}

pub fn opt_string(m: &ArgMatches, name: &str) -> Option<String> {
    m.get_one::<String>(name).cloned()
}

pub fn opt_decimal(m: &ArgMatches, name: &str) -> Result<Option<Decimal>> {
    m.get_one::<String>(name)
        .map(|s| parse_decimal(s).with_context(|| format!("--{}", name)))
        .transpose()
}

pub fn opt_date(m: &ArgMatches, name: &str) -> Result<Option<NaiveDate>> {
    m.get_one::<String>(name).map(|s| parse_date(s)).transpose()
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
