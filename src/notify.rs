// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Outbound notices. Delivery runs after the originating unit of work has
//! committed; a failed delivery never undoes it and is reported as a caveat.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    AccountActivated {
        user_id: i64,
        account_id: i64,
        account_name: String,
    },
    BudgetThreshold {
        user_id: i64,
        budget_id: i64,
        budget_name: String,
        percentage_used: Decimal,
        alert_threshold: Decimal,
    },
}

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct DeliveryError(pub String);

pub trait Notifier: Send + Sync {
    fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError>;
}

/// Writes notices to the log instead of an external channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError> {
        tracing::info!(?notice, "notice");
        Ok(())
    }
}

/// Result of an operation that committed, plus any delivery caveats.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub caveats: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Outcome {
            value,
            caveats: Vec::new(),
        }
    }

    pub fn has_caveat(&self) -> bool {
        !self.caveats.is_empty()
    }

    /// Sends `notice`, turning a failure into a caveat on this outcome.
    pub fn notify(mut self, notifier: &dyn Notifier, notice: Notice) -> Self {
        if let Err(e) = notifier.deliver(&notice) {
            tracing::warn!(error = %e, ?notice, "notice not delivered");
            self.caveats.push(format!("succeeded, but {}", e));
        }
        self
    }
}
