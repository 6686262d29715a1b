// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod strategy;

pub use strategy::{Strategy, StrategyHandle, StrategyOutcome};
