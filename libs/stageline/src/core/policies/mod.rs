// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod event_policy;
mod log_policy;

pub use event_policy::{EventPolicy, EventRule};
pub use log_policy::{LogLevel, LogPolicy};
