// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod engine;
pub mod errors;
pub mod models;
pub mod notify;
pub mod services;
pub mod utils;

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber once. `RUST_LOG` wins over `filter`.
pub fn init_tracing(filter: &str) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt};

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(filter))
            .unwrap_or_else(|_| EnvFilter::new("ledgerguard=info"));

        fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
}
