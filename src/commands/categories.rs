// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::Session;
use crate::models::CategoryKind;
use crate::services::categories;
use crate::utils::{arg, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &mut Connection, session: &Session, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = arg(sub, "name")?;
            let kind: CategoryKind = arg(sub, "type")?.parse().map_err(|e: String| anyhow!(e))?;
            let c = categories::create_category(conn, session.user_id, name, kind)?;
            println!("Added category #{} '{}' ({})", c.id, c.name, c.kind.as_str());
        }
        Some(("list", _)) => {
            let list = categories::list_categories(conn, session.user_id)?;
            if !session.emit(&list)? {
                let rows = list
                    .iter()
                    .map(|c| vec![c.id.to_string(), c.name.clone(), c.kind.as_str().into()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name", "Type"], rows));
            }
        }
        _ => {}
    }
    Ok(())
}
