// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end behaviour of a single pipeline: frame threading, the event
//! tiers, and critical escalation.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use stageline::core::prelude::*;
use stageline::core::pubsub::EventHub;
use stageline::core::PipelineFactory;

use common::FnStrategy;

#[derive(Debug, Clone, Copy, PartialEq)]
struct X(u32);

struct BallSeen(u32);

fn factory() -> PipelineFactory {
    PipelineFactory::new(Arc::new(EventHub::new()))
}

#[test]
fn frame_flows_through_the_chain() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let pipeline = factory()
        .create_pipeline(
            "flow",
            vec![
                FnStrategy::handle("Source", |_, _| Ok(StrategyOutcome::ok(Frame::new().with(X(1))))),
                FnStrategy::handle("Increment", |frame, _| {
                    let mut frame = frame.ok_or_else(|| StageError::strategy("Increment", "no frame"))?;
                    if let Some(x) = frame.get_mut::<X>() {
                        x.0 += 1;
                    }
                    Ok(StrategyOutcome::ok(frame))
                }),
                FnStrategy::handle("Sink", move |frame, _| {
                    if let Some(x) = frame.as_ref().and_then(|f| f.get::<X>()) {
                        sink.lock().push(*x);
                    }
                    Ok(StrategyOutcome::pass(frame))
                }),
            ],
            PipelineMode::Loop,
        )
        .unwrap();

    pipeline.start();
    assert!(pipeline.step().unwrap());
    assert!(pipeline.step().unwrap());

    assert_eq!(*seen.lock(), vec![X(2), X(2)]);
    assert_eq!(pipeline.frame_index(), 2);
}

#[test]
fn deferred_events_arrive_after_the_walk() {
    let order = Arc::new(Mutex::new(Vec::<String>::new()));

    let pipeline = factory()
        .create_pipeline(
            "events",
            vec![
                FnStrategy::handle("Detector", |_, pipeline| {
                    pipeline.publish(
                        EventTopic::of::<BallSeen>(),
                        EventPayload::new(BallSeen(7)),
                        Some("Detector"),
                        EventPriority::Deferred,
                    )?;
                    Ok(StrategyOutcome::ok(Frame::new()))
                }),
                {
                    let order = Arc::clone(&order);
                    FnStrategy::handle("Tail", move |frame, _| {
                        order.lock().push("tail".into());
                        Ok(StrategyOutcome::pass(frame))
                    })
                },
            ],
            PipelineMode::Loop,
        )
        .unwrap();

    let o = Arc::clone(&order);
    pipeline
        .router()
        .subscribe(EventTopic::of::<BallSeen>(), move |payload| {
            let ball = payload
                .downcast_ref::<BallSeen>()
                .map_or(0, |b| b.0);
            o.lock().push(format!("ball {ball}"));
            Ok(())
        });

    pipeline.start();
    pipeline.step().unwrap();
    assert_eq!(*order.lock(), vec!["tail".to_string(), "ball 7".to_string()]);
    assert_eq!(pipeline.router().pending_deferred(), 0);
}

#[test]
fn interrupt_skips_the_rest_of_the_chain() {
    let tail_runs = Arc::new(AtomicUsize::new(0));
    let handler_runs = Arc::new(AtomicUsize::new(0));

    let tail = Arc::clone(&tail_runs);
    let pipeline = factory()
        .create_pipeline(
            "guarded",
            vec![
                FnStrategy::handle("Guard", |_, pipeline| {
                    pipeline.publish(
                        "intruder",
                        EventPayload::empty(),
                        Some("Guard"),
                        EventPriority::Interrupt,
                    )?;
                    Ok(StrategyOutcome::ok(Frame::new()))
                }),
                FnStrategy::handle("Tail", move |frame, _| {
                    tail.fetch_add(1, Ordering::SeqCst);
                    Ok(StrategyOutcome::pass(frame))
                }),
            ],
            PipelineMode::Loop,
        )
        .unwrap();

    let h = Arc::clone(&handler_runs);
    pipeline.router().subscribe("intruder", move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    pipeline.start();
    assert!(pipeline.step().unwrap());
    assert!(pipeline.step().unwrap());

    assert_eq!(handler_runs.load(Ordering::SeqCst), 2);
    assert_eq!(tail_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn critical_publish_escalates_after_finalisation() {
    let flushed = Arc::new(AtomicUsize::new(0));

    let pipeline = factory()
        .create_pipeline(
            "doomed",
            vec![FnStrategy::handle("Camera", |_, pipeline| {
                pipeline.publish("frame.note", EventPayload::empty(), None, EventPriority::Deferred)?;
                pipeline.publish(
                    "camera.lost",
                    EventPayload::empty(),
                    Some("Camera"),
                    EventPriority::Critical,
                )?;
                Ok(StrategyOutcome::ok(Frame::new()))
            })],
            PipelineMode::Loop,
        )
        .unwrap();

    let f = Arc::clone(&flushed);
    pipeline.router().subscribe("frame.note", move |_| {
        f.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let critical_seen = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&critical_seen);
    pipeline.router().subscribe("camera.lost", move |_| {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    pipeline.start();
    let err = pipeline.step().unwrap_err();
    assert!(err.is_critical());
    assert_eq!(err.to_string(), "CRITICAL signal: camera.lost from Camera");
    assert_eq!(flushed.load(Ordering::SeqCst), 1);
    assert_eq!(critical_seen.load(Ordering::SeqCst), 0);
}

#[test]
fn swallowed_critical_still_escalates() {
    let pipeline = factory()
        .create_pipeline(
            "stubborn",
            vec![FnStrategy::handle("Swallower", |_, pipeline| {
                let _ = pipeline.publish("oops", EventPayload::empty(), None, EventPriority::Critical);
                Ok(StrategyOutcome::ok(Frame::new()))
            })],
            PipelineMode::Loop,
        )
        .unwrap();

    pipeline.start();
    assert!(pipeline.step().unwrap_err().is_critical());
}

#[test]
fn dropped_topics_never_reach_subscribers() {
    let hits = Arc::new(AtomicUsize::new(0));
    let pipeline = factory()
        .create_pipeline(
            "filtered",
            vec![FnStrategy::handle("Chatty", |_, pipeline| {
                pipeline.publish("noise", EventPayload::empty(), None, EventPriority::Immediate)?;
                Ok(StrategyOutcome::ok(Frame::new()))
            })],
            PipelineMode::Loop,
        )
        .unwrap();

    let h = Arc::clone(&hits);
    pipeline.router().subscribe("noise", move |_| {
        h.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    pipeline.router().set_event_policy("noise", EventPolicy::drop());

    pipeline.start();
    pipeline.step().unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn blackboard_persists_across_steps() {
    #[derive(Default)]
    struct Tally(u32);

    let pipeline = factory()
        .create_pipeline(
            "board",
            vec![FnStrategy::handle("Noop", |_, _| Ok(StrategyOutcome::ok(Frame::new())))],
            PipelineMode::Loop,
        )
        .unwrap();
    pipeline.start();
    for _ in 0..3 {
        pipeline.step().unwrap();
        pipeline.context().get_data::<Tally>().0 += 1;
    }
    assert_eq!(pipeline.context().get_data_ref::<Tally>().map(|t| t.0), Some(3));
    assert_eq!(pipeline.frame_index(), 3);
}

#[test]
fn chain_edits_during_a_step_apply_from_the_next_step() {
    let late_runs = Arc::new(AtomicUsize::new(0));
    let late = Arc::clone(&late_runs);
    let mut added = false;

    let pipeline = factory()
        .create_pipeline(
            "growing",
            vec![FnStrategy::handle("Grower", move |_, pipeline| {
                if !added {
                    added = true;
                    let late = Arc::clone(&late);
                    if let Some(owner) = pipeline.upgrade() {
                        owner.add_strategy(FnStrategy::new("Late", move |frame, _| {
                            late.fetch_add(1, Ordering::SeqCst);
                            Ok(StrategyOutcome::pass(frame))
                        }));
                    }
                }
                Ok(StrategyOutcome::ok(Frame::new()))
            })],
            PipelineMode::Loop,
        )
        .unwrap();

    pipeline.start();
    pipeline.step().unwrap();
    assert_eq!(pipeline.strategies().len(), 2);
    assert_eq!(late_runs.load(Ordering::SeqCst), 0);

    pipeline.step().unwrap();
    assert_eq!(late_runs.load(Ordering::SeqCst), 1);
}
