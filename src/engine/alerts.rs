// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-derived alerts. Nothing here is persisted; every call rebuilds the
//! alerts from current balances and recomputed budget spend.

use crate::config::POLICY;
use crate::engine::aggregate::{BudgetScope, BudgetUsage, usage_for_scope};
use crate::engine::ledger::active_accounts;
use crate::errors::Result;
use crate::models::{Account, Budget};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlert {
    pub budget_id: i64,
    pub budget_name: String,
    pub budget_amount: Decimal,
    pub spent_amount: Decimal,
    pub alert_threshold: Decimal,
    pub percentage_spent: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetRemainder {
    pub budget_id: i64,
    pub budget_name: String,
    pub remaining_amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "alert_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceAlert {
    InsufficientTotalBalance {
        message: String,
        total_balance: Decimal,
        required_amount: Decimal,
        shortage: Decimal,
        budgets: Vec<BudgetRemainder>,
    },
    InsufficientAccountBalance {
        message: String,
        account_id: i64,
        account_name: String,
        account_balance: Decimal,
        required_amount: Decimal,
        shortage: Decimal,
    },
    BudgetOverspendingRisk {
        message: String,
        budget_id: i64,
        budget_name: String,
        current_spending: Decimal,
        remaining_amount: Decimal,
        days_left: i64,
        suggested_daily_limit: Decimal,
    },
}

impl BalanceAlert {
    pub fn kind(&self) -> &'static str {
        match self {
            BalanceAlert::InsufficientTotalBalance { .. } => "INSUFFICIENT_TOTAL_BALANCE",
            BalanceAlert::InsufficientAccountBalance { .. } => "INSUFFICIENT_ACCOUNT_BALANCE",
            BalanceAlert::BudgetOverspendingRisk { .. } => "BUDGET_OVERSPENDING_RISK",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            BalanceAlert::InsufficientTotalBalance { message, .. }
            | BalanceAlert::InsufficientAccountBalance { message, .. }
            | BalanceAlert::BudgetOverspendingRisk { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AlertReport {
    pub budget: Vec<BudgetAlert>,
    pub balance: Vec<BalanceAlert>,
    pub risk: Vec<BalanceAlert>,
}

impl AlertReport {
    pub fn is_empty(&self) -> bool {
        self.budget.is_empty() && self.balance.is_empty() && self.risk.is_empty()
    }
}

/// Budgets covering `today` whose spend reached their alert threshold.
pub fn budget_threshold_alerts(
    usages: &[(Budget, BudgetUsage)],
    today: NaiveDate,
) -> Vec<BudgetAlert> {
    usages
        .iter()
        .filter(|(b, u)| b.is_active && b.covers(today) && u.is_alert)
        .map(|(b, u)| BudgetAlert {
            budget_id: b.id,
            budget_name: b.name.clone(),
            budget_amount: b.amount,
            spent_amount: u.spent,
            alert_threshold: b.alert_threshold,
            percentage_spent: u.percentage_used,
        })
        .collect()
}

/// Global shortfall plus a per-account even split of what current budgets
/// still need.
pub fn balance_alerts(accounts: &[Account], current: &[(Budget, BudgetUsage)]) -> Vec<BalanceAlert> {
    let mut alerts = Vec::new();
    let total_balance: Decimal = accounts.iter().map(|a| a.balance).sum();
    let required: Decimal = current.iter().map(|(_, u)| u.remaining).sum();

    if total_balance < required {
        let shortage = required - total_balance;
        alerts.push(BalanceAlert::InsufficientTotalBalance {
            message: format!(
                "Total balance {:.2} cannot cover the {:.2} still budgeted across active budgets (short {:.2})",
                total_balance, required, shortage
            ),
            total_balance,
            required_amount: required,
            shortage,
            budgets: current
                .iter()
                .map(|(b, u)| BudgetRemainder {
                    budget_id: b.id,
                    budget_name: b.name.clone(),
                    remaining_amount: u.remaining,
                })
                .collect(),
        });
    }

    if accounts.is_empty() {
        return alerts;
    }
    let share = required / Decimal::from(accounts.len());
    for account in accounts {
        if account.balance < share {
            let shortage = share - account.balance;
            alerts.push(BalanceAlert::InsufficientAccountBalance {
                message: format!(
                    "Account '{}' holds {:.2}, below its {:.2} share of active budgets (short {:.2})",
                    account.name, account.balance, share, shortage
                ),
                account_id: account.id,
                account_name: account.name.clone(),
                account_balance: account.balance,
                required_amount: share,
                shortage,
            });
        }
    }
    alerts
}

/// Budgets whose average daily spend so far outruns the sustainable pace for
/// the days left.
pub fn overspend_risk_alerts(
    current: &[(Budget, BudgetUsage)],
    today: NaiveDate,
) -> Vec<BalanceAlert> {
    let mut alerts = Vec::new();
    for (b, u) in current {
        let days_left = (b.end - today).num_days();
        if days_left <= 0 {
            continue;
        }
        let daily_budget = u.remaining / Decimal::from(days_left);
        let elapsed = (today - b.start).num_days().max(1);
        let average_daily = u.spent / Decimal::from(elapsed);
        if average_daily > daily_budget * POLICY.overspend_factor {
            alerts.push(BalanceAlert::BudgetOverspendingRisk {
                message: format!(
                    "Budget '{}' is on pace to overspend; keep daily spend under {:.2} for the next {} days",
                    b.name, daily_budget, days_left
                ),
                budget_id: b.id,
                budget_name: b.name.clone(),
                current_spending: u.spent,
                remaining_amount: u.remaining,
                days_left,
                suggested_daily_limit: daily_budget.round_dp(2),
            });
        }
    }
    alerts
}

pub fn collect_alerts(conn: &Connection, user_id: i64, today: NaiveDate) -> Result<AlertReport> {
    let accounts = active_accounts(conn, user_id)?;
    let current = usage_for_scope(conn, user_id, BudgetScope::Current(today))?;
    let report = AlertReport {
        budget: budget_threshold_alerts(&current, today),
        balance: balance_alerts(&accounts, &current),
        risk: overspend_risk_alerts(&current, today),
    };
    tracing::debug!(
        user_id,
        budget = report.budget.len(),
        balance = report.balance.len(),
        risk = report.risk.len(),
        "alerts derived"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::aggregate::usage_from;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, day).unwrap()
    }

    fn budget(id: i64, amount: Decimal, start: NaiveDate, end: NaiveDate) -> Budget {
        Budget {
            id,
            user_id: 1,
            category_id: id,
            name: format!("B{id}"),
            amount,
            start,
            end,
            alert_threshold: dec!(80),
            spent_amount: Decimal::ZERO,
            is_active: true,
        }
    }

    fn account(id: i64, balance: Decimal) -> Account {
        Account {
            id,
            user_id: 1,
            name: format!("A{id}"),
            r#type: "Checking".into(),
            currency: "USD".into(),
            initial_balance: balance,
            balance,
            is_active: true,
        }
    }

    #[test]
    fn threshold_alert_fires_at_85_not_75() {
        let b = budget(1, dec!(1000), d(1, 1), d(1, 31));
        let hit = vec![(b.clone(), usage_from(&b, dec!(850)))];
        let alerts = budget_threshold_alerts(&hit, d(1, 15));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].percentage_spent, dec!(85));

        let miss = vec![(b.clone(), usage_from(&b, dec!(750)))];
        assert!(budget_threshold_alerts(&miss, d(1, 15)).is_empty());
    }

    #[test]
    fn threshold_alert_needs_today_inside_period() {
        let b = budget(1, dec!(100), d(1, 1), d(1, 31));
        let usages = vec![(b.clone(), usage_from(&b, dec!(99)))];
        assert_eq!(budget_threshold_alerts(&usages, d(1, 31)).len(), 1);
        assert!(budget_threshold_alerts(&usages, d(2, 1)).is_empty());
    }

    #[test]
    fn global_and_per_account_shortfall() {
        let b1 = budget(1, dec!(600), d(1, 1), d(1, 31));
        let b2 = budget(2, dec!(400), d(1, 1), d(1, 31));
        let current = vec![
            (b1.clone(), usage_from(&b1, dec!(100))),
            (b2.clone(), usage_from(&b2, Decimal::ZERO)),
        ];
        // still needed: 500 + 400 = 900, split 450 per account
        let accounts = vec![account(1, dec!(500)), account(2, dec!(100))];
        let alerts = balance_alerts(&accounts, &current);
        assert_eq!(alerts.len(), 2);
        match &alerts[0] {
            BalanceAlert::InsufficientTotalBalance {
                shortage, budgets, ..
            } => {
                assert_eq!(*shortage, dec!(300));
                assert_eq!(budgets.len(), 2);
                assert_eq!(budgets[0].remaining_amount, dec!(500));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &alerts[1] {
            BalanceAlert::InsufficientAccountBalance {
                account_id,
                shortage,
                required_amount,
                ..
            } => {
                assert_eq!(*account_id, 2);
                assert_eq!(*required_amount, dec!(450));
                assert_eq!(*shortage, dec!(350));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_balance_alerts_when_covered() {
        let b = budget(1, dec!(100), d(1, 1), d(1, 31));
        let current = vec![(b.clone(), usage_from(&b, Decimal::ZERO))];
        assert!(balance_alerts(&[account(1, dec!(100))], &current).is_empty());
        assert!(balance_alerts(&[], &[]).is_empty());
    }

    #[test]
    fn overspend_risk_compares_pace() {
        // 10 days elapsed, 600 spent: 60/day. 400 left over 20 days: 20/day.
        let b = budget(1, dec!(1000), d(1, 1), d(1, 31));
        let fast = vec![(b.clone(), usage_from(&b, dec!(600)))];
        let alerts = overspend_risk_alerts(&fast, d(1, 11));
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            BalanceAlert::BudgetOverspendingRisk {
                days_left,
                suggested_daily_limit,
                ..
            } => {
                assert_eq!(*days_left, 20);
                assert_eq!(*suggested_daily_limit, dec!(20));
            }
            other => panic!("unexpected {other:?}"),
        }

        // 250 spent: 25/day vs 37.5/day * 1.5
        let slow = vec![(b.clone(), usage_from(&b, dec!(250)))];
        assert!(overspend_risk_alerts(&slow, d(1, 11)).is_empty());
    }

    #[test]
    fn overspend_risk_skips_last_day_and_uses_one_day_floor() {
        let b = budget(1, dec!(100), d(1, 1), d(1, 31));
        let usages = vec![(b.clone(), usage_from(&b, dec!(90)))];
        assert!(overspend_risk_alerts(&usages, d(1, 31)).is_empty());
        // first day: elapsed floors to 1, 90/day vs (10/30)*1.5
        assert_eq!(overspend_risk_alerts(&usages, d(1, 1)).len(), 1);
    }
}
