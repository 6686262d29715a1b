// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod component;
mod frame;

pub use component::{Component, ComponentMap, ComponentTag};
pub use frame::{Frame, FrameId, SharedFrame};
