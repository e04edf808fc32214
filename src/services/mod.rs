// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Entity operations built on the engine. Each mutation that moves money goes
//! through [`crate::engine::ledger`] inside one unit of work.

pub mod accounts;
pub mod budgets;
pub mod categories;
pub mod debts;
pub mod investments;
pub mod loans;
pub mod transactions;
