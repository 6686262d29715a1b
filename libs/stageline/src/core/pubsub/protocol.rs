// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Payload contracts carried across the router → hub bridge.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Enumerated global topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemEvent {
    /// Carries [`PipelineControlPayload`] (or an [`AppLifecycle`] marker).
    PipelineControl,
    /// Carries [`SystemAlertPayload`].
    SystemAlert,
    /// Notification only; payload is implementation-defined.
    FrameProcessed,
}

impl SystemEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PipelineControl => "PIPELINE_CONTROL",
            Self::SystemAlert => "SYSTEM_ALERT",
            Self::FrameProcessed => "FRAME_PROCESSED",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PIPELINE_CONTROL" => Some(Self::PipelineControl),
            "SYSTEM_ALERT" => Some(Self::SystemAlert),
            "FRAME_PROCESSED" => Some(Self::FrameProcessed),
            _ => None,
        }
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-parseable alert codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    GenericError,
    InitFailed,
    MissingDependency,
    ResourceNotFound,
    DeviceOpenFailed,
    /// Video signal lost (black screen / stream cut).
    VideoSignalLoss,
    PerformanceDegraded,
    MemoryWarning,
    ModelLoadFailed,
    InferenceError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlertPayload {
    pub level: AlertLevel,
    pub error_code: ErrorCode,
    /// Component that raised the alert, e.g. `"MainExecutor/vision"`.
    pub source: String,
    pub message: String,
    #[serde(default)]
    pub details: BTreeMap<String, JsonValue>,
}

impl SystemAlertPayload {
    pub fn new(
        level: AlertLevel,
        error_code: ErrorCode,
        source: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            error_code,
            source: source.into(),
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn critical(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AlertLevel::Critical, ErrorCode::GenericError, source, message)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineControlCommand {
    Stop,
    Pause,
    Resume,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineControlPayload {
    pub command: PipelineControlCommand,
    /// Pipeline name, or [`PipelineControlPayload::ALL`].
    pub target_pipeline_name: String,
    pub reason: String,
    #[serde(default)]
    pub extra_data: BTreeMap<String, JsonValue>,
}

impl PipelineControlPayload {
    pub const ALL: &'static str = "ALL";

    pub fn new(command: PipelineControlCommand, target: impl Into<String>) -> Self {
        Self {
            command,
            target_pipeline_name: target.into(),
            reason: "Unknown".to_string(),
            extra_data: BTreeMap::new(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn targets(&self, pipeline_name: &str) -> bool {
        self.target_pipeline_name == Self::ALL || self.target_pipeline_name == pipeline_name
    }

    pub fn to_json(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Application start/stop markers published on `PIPELINE_CONTROL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppLifecycle {
    Start,
    Stop,
}
