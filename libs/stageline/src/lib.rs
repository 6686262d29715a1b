// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Stageline: ordered strategy chains over component frames.
//!
//! A [`Pipeline`](core::runtime::Pipeline) walks a chain of
//! [`Strategy`](core::traits::Strategy) stages once per step, threading a
//! [`Frame`](core::frames::Frame) from stage to stage. Stages talk to each
//! other through the pipeline's [`EventRouter`](core::pubsub::EventRouter)
//! (deferred, immediate, interrupt and critical tiers) and to the rest of
//! the process through the shared [`EventHub`](core::pubsub::EventHub).
//! A [`PipelineExecutor`](core::runtime::PipelineExecutor) drives one or more
//! pipelines on a dedicated worker thread.

#![allow(clippy::type_complexity)] // Callback aliases are clear in context

pub mod core;

pub use core::{
    Application, ComponentTag, EventHub, EventPayload, EventPolicy, EventPriority, EventRouter,
    EventTopic, Frame, LogLevel, LogPolicy, Pipeline, PipelineConfig, PipelineContext,
    PipelineExecutor, PipelineFactory, PipelineLayout, PipelineMode, PipelineRef, PipelineState,
    Result, RuntimeSettings, StageError, Strategy, StrategyFactory, StrategyHandle,
    StrategyOutcome,
};
