// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Process configuration and the immutable lookup tables shared by the engine.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Ledgerguard", "ledgerguard"));

pub static DEBT_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Credit Card",
        "Student Loan",
        "Mortgage",
        "Personal Loan",
        "Auto Loan",
        "Other",
    ]
});

pub static ACCOUNT_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["Checking", "Savings", "Credit Card", "Investment", "Cash", "Other"]
});

pub static INVESTMENT_KINDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Stocks",
        "Bonds",
        "Mutual Funds",
        "ETF",
        "Real Estate",
        "Crypto",
        "Other",
    ]
});

/// Fixed thresholds used by the aggregation, alert and scoring rules.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub under_ceiling_pct: Decimal,
    pub near_ceiling_pct: Decimal,
    pub default_alert_threshold: Decimal,
    pub overspend_factor: Decimal,
    pub tight_balance_factor: Decimal,
    pub historical_floor_factor: Decimal,
    pub realization_epsilon: Decimal,
    pub loan_due_window_days: u64,
    pub history_months: u32,
}

pub static POLICY: Lazy<Policy> = Lazy::new(|| Policy {
    under_ceiling_pct: dec!(70),
    near_ceiling_pct: dec!(100),
    default_alert_threshold: dec!(80),
    overspend_factor: dec!(1.5),
    tight_balance_factor: dec!(1.2),
    historical_floor_factor: dec!(0.8),
    realization_epsilon: dec!(0.01),
    loan_due_window_days: 7,
    history_months: 3,
});

pub fn is_debt_type(s: &str) -> bool {
    DEBT_TYPES.iter().any(|t| *t == s)
}

pub fn is_account_type(s: &str) -> bool {
    ACCOUNT_TYPES.iter().any(|t| t.eq_ignore_ascii_case(s))
}

pub fn is_investment_kind(s: &str) -> bool {
    INVESTMENT_KINDS.iter().any(|t| t.eq_ignore_ascii_case(s))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub default_user: i64,
    pub busy_timeout: Duration,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            default_user: 1,
            busy_timeout: Duration::from_millis(5000),
            log_filter: "ledgerguard=info".into(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults
    /// for anything that is missing or blank.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(path) = get("LEDGERGUARD_DB") {
            cfg.db_path = Some(PathBuf::from(path));
        }
        if let Some(user) = get("LEDGERGUARD_USER") {
            cfg.default_user = user
                .parse()
                .with_context(|| format!("Invalid LEDGERGUARD_USER '{}'", user))?;
        }
        if let Some(ms) = get("LEDGERGUARD_BUSY_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("Invalid LEDGERGUARD_BUSY_TIMEOUT_MS '{}'", ms))?;
            cfg.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(filter) = get("LEDGERGUARD_LOG") {
            cfg.log_filter = filter;
        }
        Ok(cfg)
    }

    pub fn resolved_db_path(&self) -> Result<PathBuf> {
        if let Some(p) = &self.db_path {
            return Ok(p.clone());
        }
        let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
            .context("Could not determine platform-specific data dir")?;
        let data_dir = proj.data_dir();
        std::fs::create_dir_all(data_dir).context("Failed to create data dir")?;
        Ok(data_dir.join("ledgerguard.sqlite"))
    }
}
