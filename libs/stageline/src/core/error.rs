// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

use crate::core::pubsub::EventTopic;

#[derive(Error, Debug)]
pub enum StageError {
    /// A strategy failed while executing. Contained within one step.
    #[error("[{strategy}] {message}")]
    Strategy { strategy: String, message: String },

    /// A subscriber callback failed during dispatch.
    #[error("handler for {topic} failed: {message}")]
    Handler { topic: String, message: String },

    /// Produced by a CRITICAL-priority publish. Never delivered to
    /// subscribers; only the executor handles it.
    #[error("CRITICAL signal: {topic} from {sender}")]
    Critical { topic: String, sender: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StageError {
    pub fn strategy(strategy: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Strategy {
            strategy: strategy.into(),
            message: message.into(),
        }
    }

    pub fn critical(topic: &EventTopic, sender: Option<&str>) -> Self {
        Self::Critical {
            topic: topic.to_string(),
            sender: sender.unwrap_or("Unknown").to_string(),
        }
    }

    /// True for the fatal escalation produced by a CRITICAL publish.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical { .. })
    }

    /// Rebuilds an equivalent error. Used where one critical signal has to be
    /// reported through two channels (the publish result and the pipeline's
    /// pending-fatal slot).
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::Critical { topic, sender } => Self::Critical {
                topic: topic.clone(),
                sender: sender.clone(),
            },
            other => Self::Other(anyhow::anyhow!("{other}")),
        }
    }
}

impl From<toml::de::Error> for StageError {
    fn from(err: toml::de::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StageError>;
