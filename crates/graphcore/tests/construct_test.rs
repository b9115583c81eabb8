// crates/graphcore/tests/construct_test.rs

use graphcore::{
    ConstructError, ConstructPhase, ConstructState, IterationNodeData, LoopNodeData, NodeType,
    Segment,
};
use serde_json::json;

#[test]
fn test_lifecycle_pending_running_exited() {
    let mut state = ConstructState::new(Some(3));
    assert_eq!(state.phase(), ConstructPhase::Pending);
    assert!(!state.is_running());

    state.begin().unwrap();
    assert_eq!(state.phase(), ConstructPhase::Running { cycle: 0 });
    assert_eq!(state.index, 0);

    assert_eq!(state.advance(true).unwrap(), ConstructPhase::Running { cycle: 1 });
    assert_eq!(state.index, 1);
    assert!(state.should_continue);

    assert_eq!(state.advance(false).unwrap(), ConstructPhase::Exited);
    assert_eq!(state.index, 2);
    assert!(!state.should_continue);
}

#[test]
fn test_advance_requires_running_phase() {
    let mut state = ConstructState::default();
    let err = state.advance(true).unwrap_err();
    assert_eq!(
        err,
        ConstructError::InvalidTransition {
            action: "advance",
            phase: "pending".to_string(),
        }
    );

    state.begin().unwrap();
    state.advance(false).unwrap();
    assert!(state.advance(true).is_err());
}

#[test]
fn test_begin_resets_a_finished_construct() {
    let mut state = ConstructState::new(Some(2));
    state.begin().unwrap();
    state.item = Some(Segment::from("first"));
    state.advance(false).unwrap();

    state.begin().unwrap();
    assert_eq!(state.index, 0);
    assert!(state.item.is_none());
    assert!(state.should_continue);
    assert!(state.begin().is_err(), "begin while running must be rejected");
}

#[test]
fn test_has_next_cycle_respects_max_cycles() {
    let mut bounded = ConstructState::new(Some(2));
    bounded.begin().unwrap();
    assert!(bounded.has_next_cycle());
    bounded.advance(true).unwrap();
    assert!(!bounded.has_next_cycle());

    let mut unbounded = ConstructState::new(None);
    unbounded.begin().unwrap();
    for _ in 0..50 {
        unbounded.advance(true).unwrap();
    }
    assert!(unbounded.has_next_cycle());
}

#[test]
fn test_exit_leaves_construct_early() {
    let mut state = ConstructState::new(None);
    state.begin().unwrap();
    state.exit();
    assert_eq!(state.phase(), ConstructPhase::Exited);
    assert!(!state.should_continue);
}

#[test]
fn test_container_data_decodes_body_graph() {
    let loop_data: LoopNodeData = serde_json::from_value(json!({
        "loop_count": 4,
        "body": {
            "nodes": [
                {"id": "ls", "type": "loop-start"},
                {"id": "le", "type": "loop-end", "data": {"conditions": []}}
            ],
            "edges": [{"source": "ls", "target": "le"}]
        }
    }))
    .unwrap();
    assert_eq!(loop_data.loop_count, 4);
    assert_eq!(loop_data.body.nodes.len(), 2);
    assert_eq!(loop_data.body.nodes[1].node_type, NodeType::LoopEnd);
    assert_eq!(loop_data.body.nodes[0].version, "latest");

    let iteration: IterationNodeData = serde_json::from_value(json!({
        "iterator_selector": "start.items",
        "output_selector": ["upper", "output"],
        "body": {"nodes": [{"id": "is", "type": "iteration-start"}]}
    }))
    .unwrap();
    assert_eq!(iteration.iterator_selector.to_string(), "start.items");
    assert!(iteration.body.edges.is_empty());
}
