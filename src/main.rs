// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use ledgerguard::commands::{self, Session};
use ledgerguard::config::Config;
use ledgerguard::errors::LedgerError;
use ledgerguard::{cli, db, init_tracing};

fn main() -> Result<()> {
    let cfg = Config::from_env()?;
    init_tracing(&cfg.log_filter);

    let matches = cli::build_cli().get_matches();
    let mut conn = db::open_or_init(&cfg)?;
    let session = Session::from_matches(&cfg, &matches)?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path(&cfg)?.display());
            Ok(())
        }
        Some(_) => match commands::run(&mut conn, &session, &matches) {
            Err(e)
                if e.downcast_ref::<LedgerError>()
                    .is_some_and(LedgerError::is_server_fault) =>
            {
                // details were logged where the fault was raised
                eprintln!("Error: the operation could not be completed, nothing was changed");
                std::process::exit(2);
            }
            other => other,
        },
        None => {
            cli::build_cli().print_help()?;
            println!();
            Ok(())
        }
    }
}
