// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod aggregate;
pub mod alerts;
pub mod feasibility;
pub mod ledger;
pub mod locks;
pub mod overlap;
