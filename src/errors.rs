// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failures surfaced by the ledger and budget engine.
///
/// Everything except [`LedgerError::Consistency`] is a caller input problem and
/// is reported verbatim. `Consistency` means the store could not commit a unit of
/// work; nothing was applied.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("account {0} is missing, inactive or not owned by this user")]
    InvalidAccount(i64),

    #[error("insufficient funds in account {account_id}: short by {shortage}")]
    InsufficientFunds { account_id: i64, shortage: Decimal },

    #[error("budget period {start}..{end} overlaps active budget {budget_id}")]
    Overlap {
        budget_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("the operation could not be completed and was rolled back")]
    Consistency(#[source] rusqlite::Error),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LedgerError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        LedgerError::NotFound { entity, id }
    }

    /// Store faults are logged server-side and shown generically.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, LedgerError::Consistency(_))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("store operation failed: {}", value);
        LedgerError::Consistency(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_store_failures_are_server_faults() {
        let err: LedgerError = rusqlite::Error::InvalidQuery.into();
        assert!(err.is_server_fault());
        assert!(!LedgerError::validation("bad").is_server_fault());
        assert!(!LedgerError::InvalidAccount(3).is_server_fault());
    }

    #[test]
    fn overlap_message_names_the_conflict() {
        let err = LedgerError::Overlap {
            budget_id: 42,
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        };
        assert!(err.to_string().contains("42"));
    }
}
