// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Policy-gated logging on top of `tracing`.
//!
//! Every runtime component (pipelines, routers, executors, strategies) is
//! [`Loggable`]: it has a display name and a [`LogPolicy`]. The helpers here
//! check that policy before emitting, and prefix each record with the
//! component name. Plain string sources are never filtered.

use std::borrow::Cow;
use std::fmt::Display;
use std::sync::Once;

use tracing_subscriber::EnvFilter;

use crate::core::policies::{LogLevel, LogPolicy};

/// A named component whose log output is governed by a [`LogPolicy`].
pub trait Loggable {
    fn name(&self) -> Cow<'_, str>;

    fn log_policy(&self) -> LogPolicy;
}

impl Loggable for str {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }

    fn log_policy(&self) -> LogPolicy {
        LogPolicy::default()
    }
}

#[inline]
fn allowed(source: &(impl Loggable + ?Sized), level: LogLevel) -> bool {
    source.log_policy().is_allowed(level)
}

pub fn info(source: &(impl Loggable + ?Sized), message: impl Display) {
    if allowed(source, LogLevel::INFO) {
        tracing::info!("[{}] {}", source.name(), message);
    }
}

pub fn warn(source: &(impl Loggable + ?Sized), message: impl Display) {
    if allowed(source, LogLevel::WARNING) {
        tracing::warn!("[{}] {}", source.name(), message);
    }
}

pub fn error(source: &(impl Loggable + ?Sized), message: impl Display) {
    if allowed(source, LogLevel::ERROR) {
        tracing::error!("[{}] {}", source.name(), message);
    }
}

/// System-level fatal record. Not subject to any policy.
pub fn critical(message: impl Display) {
    tracing::error!("[SYSTEM] {}", message);
}

static INIT: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive` (e.g. `"info"`). Later calls are no-ops.
pub fn init_tracing(default_directive: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directive))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .try_init();
    });
}
