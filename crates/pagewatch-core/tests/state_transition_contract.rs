//! Contract Test: Availability Transitions Across Runs
//!
//! Constraints verified:
//! - Cold start never notifies
//! - A flip of the resolved status produces exactly one message, at the flip run
//! - Inconclusive readings keep the status (hysteresis)
//! - Failed or not-ready acquisitions leave the record bit-identical
//! - Records of targets no longer configured, and of disabled targets, are
//!   carried through untouched
//! - One target's failure does not affect the others

mod common;

use common::*;
use pagewatch_core::config::AcquisitionEngine;
use pagewatch_core::engine::{HoldReason, WatchEngine, WatchEvent};
use pagewatch_core::watch::{StateMap, Status, TargetId, TargetState, TransitionKind};

fn engine_with(
    targets: Vec<pagewatch_core::TargetConfig>,
    acquirer: &ScriptedAcquirer,
) -> (WatchEngine, tokio::sync::mpsc::Receiver<WatchEvent>) {
    WatchEngine::new(watch_config(targets), vec![Box::new(acquirer.clone())])
        .expect("engine construction succeeds")
}

#[tokio::test]
async fn vacancy_scenario_notifies_once_at_the_flip() {
    let target = vacancy_target("heights");
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(
        &target.url,
        [
            Step::Text("Sorry, all rooms are full"),
            Step::Text("New vacancy on floor 3"),
            Step::Text("Site maintenance"),
        ],
    );
    let id = target.id();
    let (engine, _events) = engine_with(vec![target], &acquirer);

    // Run 1: cold start
    let run1 = engine.run_once(StateMap::new()).await;
    assert!(run1.transitions.is_empty(), "cold start must be silent");
    assert_eq!(run1.states[&id].status, Status::Unavailable);

    // Run 2: flip
    let run2 = engine.run_once(run1.states).await;
    assert_eq!(run2.transitions.len(), 1);
    assert_eq!(run2.transitions[0].kind, TransitionKind::BecameAvailable);
    let messages = run2.messages();
    assert!(messages[0].contains("heights"));
    assert!(messages[0].contains("https://example.com/heights"));
    assert_eq!(run2.states[&id].status, Status::Available);

    // Run 3: inconclusive
    let run3 = engine.run_once(run2.states).await;
    assert!(run3.transitions.is_empty());
    assert_eq!(run3.states[&id].status, Status::Available);
    assert_eq!(run3.states[&id].appear.get("vacancy"), Some(false));
}

#[tokio::test]
async fn consecutive_failures_leave_state_bit_identical() {
    let target = vacancy_target("heights");
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(
        &target.url,
        [Step::Text("vacancy"), Step::Fail, Step::NotReady, Step::Fail],
    );
    let (engine, _events) = engine_with(vec![target], &acquirer);

    let baseline = engine.run_once(StateMap::new()).await.states;
    let baseline_json = serde_json::to_string(&baseline).unwrap();

    let mut states = baseline;
    for _ in 0..3 {
        let run = engine.run_once(states).await;
        assert!(run.transitions.is_empty());
        states = run.states;
        assert_eq!(serde_json::to_string(&states).unwrap(), baseline_json);
    }
}

#[tokio::test]
async fn failure_on_first_observation_creates_no_record() {
    let target = vacancy_target("heights");
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(&target.url, [Step::Fail]);
    let (engine, _events) = engine_with(vec![target], &acquirer);

    let run = engine.run_once(StateMap::new()).await;
    assert!(run.states.is_empty());
    assert_eq!(run.stats.held_failed, 1);
}

#[tokio::test]
async fn failing_target_does_not_affect_others() {
    let broken = vacancy_target("broken");
    let healthy = vacancy_target("healthy");
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(&broken.url, [Step::Fail]);
    acquirer.script(&healthy.url, [Step::Text("full"), Step::Text("vacancy")]);
    let healthy_id = healthy.id();
    let (engine, _events) = engine_with(vec![broken, healthy], &acquirer);

    let run1 = engine.run_once(StateMap::new()).await;
    let run2 = engine.run_once(run1.states).await;

    assert_eq!(run2.transitions.len(), 1);
    assert_eq!(run2.transitions[0].target_name, "healthy");
    assert_eq!(run2.states[&healthy_id].status, Status::Available);
    assert_eq!(acquirer.calls(), 4);
}

#[tokio::test]
async fn unconfigured_and_disabled_records_are_carried_through() {
    let active = vacancy_target("active");
    let disabled = vacancy_target("paused").with_enabled(false);
    let disabled_id = disabled.id();

    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(&active.url, [Step::Text("full")]);
    let (engine, _events) = engine_with(vec![active, disabled], &acquirer);

    let orphan_id = TargetId::from("0123456789abcdef");
    let orphan = TargetState {
        status: Status::Available,
        ..TargetState::default()
    };
    let paused_state = TargetState {
        status: Status::Unavailable,
        ..TargetState::default()
    };
    let mut states = StateMap::new();
    states.insert(orphan_id.clone(), orphan.clone());
    states.insert(disabled_id.clone(), paused_state.clone());

    let run = engine.run_once(states).await;

    assert_eq!(run.states[&orphan_id], orphan);
    assert_eq!(run.states[&disabled_id], paused_state);
    assert_eq!(run.states.len(), 3);
    assert_eq!(run.stats.skipped_disabled, 1);
    assert_eq!(acquirer.calls(), 1, "disabled targets are not fetched");
}

#[tokio::test]
async fn events_describe_the_run() {
    let target = vacancy_target("heights");
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    acquirer.script(&target.url, [Step::NotReady]);
    let (engine, mut events) = engine_with(vec![target], &acquirer);

    engine.run_once(StateMap::new()).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert!(matches!(received.first(), Some(WatchEvent::RunStarted { targets_count: 1 })));
    assert!(received.iter().any(|e| matches!(
        e,
        WatchEvent::TargetHeld {
            reason: HoldReason::NotReady(_),
            ..
        }
    )));
    match received.last() {
        Some(WatchEvent::RunFinished { stats }) => assert_eq!(stats.held_not_ready, 1),
        other => panic!("expected RunFinished last, got {:?}", other),
    }
}

#[tokio::test]
async fn full_event_channel_never_blocks_the_run() {
    let targets: Vec<_> = (0..20).map(|i| vacancy_target(&format!("t{}", i))).collect();
    let acquirer = ScriptedAcquirer::new(AcquisitionEngine::Static);
    for target in &targets {
        acquirer.script(&target.url, [Step::Text("vacancy")]);
    }

    let mut config = watch_config(targets);
    config.engine.event_channel_capacity = 1;
    let (engine, _events) =
        WatchEngine::new(config, vec![Box::new(acquirer.clone())]).unwrap();

    let run = engine.run_once(StateMap::new()).await;
    assert_eq!(run.stats.observed, 20);
}
