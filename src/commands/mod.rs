// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod budgets;
pub mod categories;
pub mod debts;
pub mod doctor;
pub mod importer;
pub mod investments;
pub mod loans;
pub mod reports;
pub mod transactions;

use crate::config::Config;
use crate::utils::{maybe_print_json, opt_date};
use anyhow::Result;
use chrono::NaiveDate;
use clap::ArgMatches;
use rusqlite::Connection;
use serde::Serialize;

/// Who is acting, and on which day, for one CLI invocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub today: NaiveDate,
    pub json: bool,
    pub jsonl: bool,
}

impl Session {
    pub fn from_matches(cfg: &Config, m: &ArgMatches) -> Result<Self> {
        Ok(Session {
            user_id: m.get_one::<i64>("user").copied().unwrap_or(cfg.default_user),
            today: opt_date(m, "as-of")?.unwrap_or_else(|| chrono::Local::now().date_naive()),
            json: m.get_flag("json"),
            jsonl: m.get_flag("jsonl"),
        })
    }

    /// Prints `v` as JSON when requested. Returns false when the caller should
    /// render a table instead.
    pub fn emit<T: Serialize>(&self, v: &T) -> Result<bool> {
        maybe_print_json(self.json, self.jsonl, v)
    }
}

pub(crate) fn print_caveats(caveats: &[String]) {
    for c in caveats {
        eprintln!("warning: {}", c);
    }
}

pub fn run(conn: &mut Connection, session: &Session, m: &ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("account", sub)) => accounts::handle(conn, session, sub),
        Some(("category", sub)) => categories::handle(conn, session, sub),
        Some(("tx", sub)) => transactions::handle(conn, session, sub),
        Some(("budget", sub)) => budgets::handle(conn, session, sub),
        Some(("loan", sub)) => loans::handle(conn, session, sub),
        Some(("debt", sub)) => debts::handle(conn, session, sub),
        Some(("invest", sub)) => investments::handle(conn, session, sub),
        Some(("report", sub)) => reports::handle(conn, session, sub),
        Some(("import", sub)) => importer::handle(conn, session, sub),
        Some(("doctor", _)) => doctor::handle(conn, session),
        _ => Ok(()),
    }
}
