// crates/graphcore/tests/order_test.rs

use chrono::{Duration, TimeZone, Utc};
use graphcore::{
    ExecutionMetadata, NodeType, OrderConfig, OrderDirection, OrderField, WorkflowNodeExecution,
    WorkflowNodeExecutionStatus,
};
use std::collections::HashMap;
use uuid::Uuid;

fn record(sequence: u64, created_offset_ms: i64) -> WorkflowNodeExecution {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    WorkflowNodeExecution {
        id: Uuid::new_v4(),
        workflow_run_id: Uuid::nil(),
        sequence,
        node_id: format!("node{}", sequence),
        node_type: NodeType::TemplateTransform,
        node_version: "1".to_string(),
        title: format!("node{}", sequence),
        predecessor_node_id: None,
        inputs: HashMap::new(),
        outputs: HashMap::new(),
        status: WorkflowNodeExecutionStatus::Succeeded,
        error: None,
        metadata: ExecutionMetadata::default(),
        created_at: base + Duration::milliseconds(created_offset_ms),
        finished_at: None,
        elapsed_ms: 0,
    }
}

fn sequences(records: &[WorkflowNodeExecution]) -> Vec<u64> {
    records.iter().map(|r| r.sequence).collect()
}

#[test]
fn test_sequence_order_both_directions() {
    let mut records = vec![record(2, 0), record(0, 0), record(1, 0)];

    OrderConfig::new(OrderField::Sequence, OrderDirection::Asc).sort(&mut records);
    assert_eq!(sequences(&records), vec![0, 1, 2]);

    OrderConfig::new(OrderField::Sequence, OrderDirection::Desc).sort(&mut records);
    assert_eq!(sequences(&records), vec![2, 1, 0]);
}

#[test]
fn test_created_at_ties_fall_back_to_sequence() {
    // Records 1..=3 share a timestamp; record 0 is the latest.
    let mut records = vec![record(3, 5), record(0, 9), record(1, 5), record(2, 5)];

    let asc = OrderConfig::new(OrderField::CreatedAt, OrderDirection::Asc);
    asc.sort(&mut records);
    assert_eq!(sequences(&records), vec![1, 2, 3, 0]);

    // Repeated calls give the same order.
    let snapshot = records.clone();
    asc.sort(&mut records);
    assert_eq!(records, snapshot);
}

#[test]
fn test_desc_is_exact_reverse_of_asc() {
    let mut asc_records = vec![
        record(4, 1),
        record(1, 1),
        record(3, 0),
        record(0, 2),
        record(2, 1),
    ];
    let mut desc_records = asc_records.clone();

    let asc = OrderConfig::new(OrderField::CreatedAt, OrderDirection::Asc);
    asc.sort(&mut asc_records);
    asc.reversed().sort(&mut desc_records);

    asc_records.reverse();
    assert_eq!(asc_records, desc_records);
}

#[test]
fn test_record_id_breaks_full_ties() {
    let first = record(7, 0);
    let mut second = record(7, 0);
    second.created_at = first.created_at;

    let config = OrderConfig::new(OrderField::CreatedAt, OrderDirection::Asc);
    let forward = config.compare(&first, &second);
    assert_ne!(forward, std::cmp::Ordering::Equal);
    assert_eq!(config.compare(&second, &first), forward.reverse());
    assert_eq!(config.reversed().compare(&first, &second), forward.reverse());
}

#[test]
fn test_default_order_and_serde() {
    let config = OrderConfig::default();
    assert_eq!(config.field, OrderField::Sequence);
    assert_eq!(config.direction, OrderDirection::Asc);

    let parsed: OrderConfig =
        serde_json::from_value(serde_json::json!({"field": "created_at", "direction": "desc"}))
            .unwrap();
    assert_eq!(parsed, OrderConfig::new(OrderField::CreatedAt, OrderDirection::Desc));

    let field_only: OrderConfig =
        serde_json::from_value(serde_json::json!({"field": "sequence"})).unwrap();
    assert_eq!(field_only.direction, OrderDirection::Asc);
}
