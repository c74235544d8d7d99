//! Integration tests for the mining engine.
//!
//! Exercises navigation and extraction through the public API with mock
//! ports standing in for the session, the state store and the tools.

use minefleet_core::engine::{AckStrategy, EngineHandle, MiningEngine, StepOutcome};
use minefleet_core::ports::{Command, MockCommandSink, MockStateStore};
use minefleet_core::tool::MockToolUsage;
use minefleet_core::{AgentState, Coord, Region};
use std::sync::Arc;

fn harness(start: Coord) -> (MiningEngine, MockCommandSink, MockStateStore) {
    let sink = MockCommandSink::new();
    let store = MockStateStore::new();
    let engine = MiningEngine::new(
        "digger-01",
        start,
        Box::new(sink.clone()),
        Box::new(store.clone()),
        Box::new(MockToolUsage::new()),
    );
    (engine, sink, store)
}

fn run_until_idle(engine: &mut MiningEngine, limit: usize) -> usize {
    let mut steps = 0;
    while engine.state() != AgentState::Idle && steps < limit {
        engine.step().unwrap();
        steps += 1;
    }
    steps
}

#[test]
fn test_open_grid_route_takes_manhattan_steps() {
    let start = Coord::new(0, 60, 0);
    for goal in [
        Coord::new(3, 60, 0),
        Coord::new(-2, 58, 4),
        Coord::new(1, 61, -1),
    ] {
        let (mut engine, sink, store) = harness(start);
        let hops = engine.set_target(goal);
        assert_eq!(hops as u64, start.manhattan(&goal));

        let steps = run_until_idle(&mut engine, 100);
        assert_eq!(steps, hops);
        assert_eq!(engine.position(), goal);

        let moves = sink.moves();
        assert_eq!(moves.len(), hops);
        assert_eq!(store.upserts().len(), hops + 1);
        assert_eq!(store.upserts().last(), Some(&(AgentState::Idle, goal)));
    }
}

#[test]
fn test_route_detours_around_blocked_cells() {
    let start = Coord::new(0, 60, 0);
    let goal = Coord::new(2, 60, 0);
    let wall = |c: &Coord| !(c.x == 1 && c.y == 60);
    let (engine, sink, _) = harness(start);
    let mut engine = engine.with_passability(Arc::new(wall));

    let hops = engine.set_target(goal);
    assert!(hops > 2);
    run_until_idle(&mut engine, 100);

    let mut previous = start;
    for step in sink.moves() {
        assert!(previous.is_adjacent(&step));
        assert!(wall(&step));
        previous = step;
    }
    assert_eq!(engine.position(), goal);
}

#[test]
fn test_walk_then_mine_area() {
    let (mut engine, sink, store) = harness(Coord::new(0, 60, 0));
    engine.set_target(Coord::new(0, 60, 2));
    let area = Region::new(Coord::new(0, 59, 2), Coord::new(1, 59, 2));
    assert_eq!(engine.set_mining_area(area), 2);

    let mut outcomes = Vec::new();
    for _ in 0..10 {
        outcomes.push(engine.step().unwrap());
    }

    assert_eq!(outcomes[0], StepOutcome::Moved(Coord::new(0, 60, 1)));
    assert_eq!(outcomes[1], StepOutcome::Mined(Coord::new(0, 59, 2)));
    assert_eq!(outcomes[2], StepOutcome::Mined(Coord::new(1, 59, 2)));
    assert!(outcomes[3..].iter().all(|o| *o == StepOutcome::NoOp));

    let kinds: Vec<&str> = sink
        .get_history()
        .iter()
        .map(|c| match c {
            Command::Move { .. } => "move",
            Command::StartBreak { .. } => "break",
            Command::Chat { .. } => "chat",
        })
        .collect();
    assert_eq!(kinds, vec!["move", "move", "break", "break"]);
    assert_eq!(store.mined_total(), 2);
    assert_eq!(engine.mined_blocks(), 2);
}

#[test]
fn test_new_target_while_mining_waits_for_ack() {
    let (engine, sink, _) = harness(Coord::new(0, 60, 0));
    let mut engine = engine.with_ack_strategy(AckStrategy::AwaitEvent);
    let block = Coord::new(0, 59, 0);
    engine.set_mining_area(Region::new(block, block));

    assert_eq!(engine.step().unwrap(), StepOutcome::ExtractionStarted(block));
    assert_eq!(engine.set_target(Coord::new(2, 60, 0)), 2);
    assert_eq!(engine.state(), AgentState::Mining);
    assert_eq!(engine.step().unwrap(), StepOutcome::AwaitingAck);
    assert!(sink.moves().is_empty());

    assert!(engine.acknowledge_extraction(block).unwrap());
    assert_eq!(engine.state(), AgentState::Moving);
    run_until_idle(&mut engine, 10);
    assert_eq!(engine.position(), Coord::new(2, 60, 0));
}

#[test]
fn test_override_out_of_mining_drops_pending_block() {
    let (engine, _, _) = harness(Coord::new(0, 60, 0));
    let mut engine = engine.with_ack_strategy(AckStrategy::AwaitEvent);
    let block = Coord::new(0, 59, 0);
    engine.set_mining_area(Region::new(block, block));
    engine.step().unwrap();

    engine.override_state(AgentState::Idle);
    assert_eq!(engine.pending(), None);
    assert!(!engine.acknowledge_extraction(block).unwrap());
    assert_eq!(engine.mined_blocks(), 0);
}

#[test]
fn test_handle_snapshot_tracks_progress() {
    let (engine, _, _) = harness(Coord::new(0, 60, 0));
    let handle = EngineHandle::new(engine);
    handle
        .with(|e| {
            e.set_target(Coord::new(1, 60, 0));
            e.set_mining_area(Region::new(Coord::new(1, 59, 0), Coord::new(1, 58, 0)))
        })
        .unwrap();

    let before = handle.snapshot().unwrap();
    assert_eq!(before.state, AgentState::Moving);
    assert_eq!(before.route_remaining, 1);
    assert_eq!(before.queued, 2);

    handle.step().unwrap();
    handle.step().unwrap();
    let after = handle.snapshot().unwrap();
    assert_eq!(after.position, Coord::new(1, 60, 0));
    assert_eq!(after.queued, 0);
    assert_eq!(after.mined_blocks, 2);
    assert_eq!(after.target, None);
}
