// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod hub;
mod payload;
mod priority;
mod protocol;
mod router;
mod topic;

pub use hub::EventHub;
pub use payload::{EventCallback, EventPayload};
pub use priority::EventPriority;
pub use protocol::{
    AlertLevel, AppLifecycle, ErrorCode, PipelineControlCommand, PipelineControlPayload,
    SystemAlertPayload, SystemEvent,
};
pub use router::{EventRouter, RouterFactory};
pub use topic::EventTopic;
