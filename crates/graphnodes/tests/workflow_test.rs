// crates/graphnodes/tests/workflow_test.rs

use graphcore::{
    Graph, IterationNodeData, LoopNodeData, NodeSpec, NodeType, OrderConfig, OrderDirection,
    OrderField, VariableSelector, Workflow, WorkflowNodeExecutionStatus,
};
use graphnodes::{builtin_registry, VariableMapping};
use graphruntime::{GraphRuntime, RuntimeConfig};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Initialize tracing for tests
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init();
}

fn runtime(config: RuntimeConfig) -> GraphRuntime {
    init_tracing();
    GraphRuntime::with_registry(builtin_registry().unwrap(), config)
}

fn end(outputs: Vec<VariableMapping>) -> NodeSpec {
    NodeSpec::new("end", NodeType::End).with_data(json!({ "outputs": outputs }))
}

/// start -> loop(loop_start -> step -> loop_end) -> end, continuing while
/// the loop index stays below `stop_below`.
fn counting_loop(loop_count: usize, stop_below: i64) -> Workflow {
    let mut body = Graph::new();
    body.add_node(NodeSpec::new("loop_start", NodeType::LoopStart));
    body.add_node(
        NodeSpec::new("step", NodeType::TemplateTransform).with_data(json!({
            "variables": [{"variable": "i", "value_selector": ["counter", "index"]}],
            "template": "{{#start.label#}}-{{ i }}"
        })),
    );
    body.add_node(NodeSpec::new("loop_end", NodeType::LoopEnd).with_data(json!({
        "conditions": [{
            "variable_selector": ["counter", "index"],
            "comparison_operator": "<",
            "value": stop_below
        }]
    })));
    body.connect("loop_start", "step");
    body.connect("step", "loop_end");

    let mut workflow = Workflow::new("counting loop");
    workflow.add_node(NodeSpec::new("start", NodeType::Start));
    workflow.add_node(
        NodeSpec::new("counter", NodeType::Loop)
            .with_data(serde_json::to_value(LoopNodeData { loop_count, body }).unwrap()),
    );
    workflow.add_node(end(vec![
        VariableMapping::new("last", ["step", "output"]),
        VariableMapping::new("rounds", ["counter", "loop_round"]),
    ]));
    workflow.connect("start", "counter");
    workflow.connect("counter", "end");
    workflow
}

fn label_input() -> HashMap<String, Value> {
    HashMap::from([("label".to_string(), json!("tick"))])
}

#[tokio::test]
async fn test_loop_end_condition_stops_the_loop() {
    let runtime = runtime(RuntimeConfig::default());
    let workflow = counting_loop(10, 2);

    let result = runtime.execute(&workflow, label_input()).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    // Cycles 0, 1 and 2 run; the loop end at cycle 2 sees 2 < 2 fail.
    assert_eq!(result.outputs["rounds"], json!(3));
    assert_eq!(result.outputs["last"], json!("tick-2"));

    let history = runtime.history(result.workflow_run_id, None).await.unwrap();
    let decisions: Vec<Value> = history
        .iter()
        .filter(|r| r.node_id == "loop_end")
        .map(|r| r.outputs["should_continue"].clone())
        .collect();
    assert_eq!(decisions, vec![json!(true), json!(true), json!(false)]);
    assert!(history
        .iter()
        .filter(|r| r.node_type == NodeType::LoopEnd)
        .all(|r| r.status == WorkflowNodeExecutionStatus::Succeeded));
}

#[tokio::test]
async fn test_loop_count_bounds_cycles() {
    let runtime = runtime(RuntimeConfig::default());
    let workflow = counting_loop(2, 100);

    let result = runtime.execute(&workflow, label_input()).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.outputs["rounds"], json!(2));
    assert_eq!(result.outputs["last"], json!("tick-1"));
}

#[tokio::test]
async fn test_runtime_config_caps_loop_count() {
    let runtime = runtime(RuntimeConfig {
        max_loop_cycles: 4,
        ..RuntimeConfig::default()
    });
    let workflow = counting_loop(1000, 1000);

    let result = runtime.execute(&workflow, label_input()).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.outputs["rounds"], json!(4));
}

#[tokio::test]
async fn test_loop_body_failure_fails_the_run() {
    let runtime = runtime(RuntimeConfig::default());
    let workflow = counting_loop(3, 3);

    // No `label` input: the step's marker cannot be resolved.
    let result = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("Node counter failed"), "{}", error);
    assert!(error.contains("start.label"), "{}", error);

    let history = runtime.history(result.workflow_run_id, None).await.unwrap();
    assert!(history.iter().all(|r| r.node_id != "end"));
    assert!(history.iter().all(|r| r.node_id != "loop_end"));
}

#[tokio::test]
async fn test_iteration_with_template_transform() {
    let runtime = runtime(RuntimeConfig::default());

    let mut body = Graph::new();
    body.add_node(NodeSpec::new("each_start", NodeType::IterationStart));
    body.add_node(
        NodeSpec::new("shout", NodeType::TemplateTransform).with_data(json!({
            "variables": [
                {"variable": "word", "value_selector": ["words", "item"]},
                {"variable": "n", "value_selector": ["words", "index"]}
            ],
            "template": "{{ n }}:{{ word | upper }}"
        })),
    );
    body.connect("each_start", "shout");

    let data = IterationNodeData {
        iterator_selector: VariableSelector::new(["start", "words"]),
        output_selector: VariableSelector::new(["shout", "output"]),
        body,
    };

    let mut workflow = Workflow::new("shouting");
    workflow.add_node(NodeSpec::new("start", NodeType::Start).with_data(json!({
        "variables": [{"variable": "words", "required": true}]
    })));
    workflow.add_node(
        NodeSpec::new("words", NodeType::Iteration).with_data(serde_json::to_value(data).unwrap()),
    );
    workflow.add_node(
        NodeSpec::new("answer", NodeType::Answer)
            .with_data(json!({"answer": "Result: {{#words.output#}}"})),
    );
    workflow.add_node(end(vec![
        VariableMapping::new("shouted", ["words", "output"]),
        VariableMapping::new("answer", ["answer", "answer"]),
    ]));
    workflow.connect("start", "words");
    workflow.connect("words", "answer");
    workflow.connect("answer", "end");

    let inputs = HashMap::from([("words".to_string(), json!(["hi", "there"]))]);
    let result = runtime.execute(&workflow, inputs).await.unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.outputs["shouted"], json!(["0:HI", "1:THERE"]));
    assert_eq!(result.outputs["answer"], json!(r#"Result: ["0:HI","1:THERE"]"#));
}

#[tokio::test]
async fn test_missing_required_start_input_fails_run() {
    let runtime = runtime(RuntimeConfig::default());
    let mut workflow = Workflow::new("needs input");
    workflow.add_node(NodeSpec::new("start", NodeType::Start).with_data(json!({
        "variables": [{"variable": "query", "required": true}]
    })));
    workflow.add_node(end(vec![VariableMapping::new("q", ["start", "query"])]));
    workflow.connect("start", "end");

    let result = runtime.execute(&workflow, HashMap::new()).await.unwrap();
    assert!(!result.success);
    assert!(result.error.unwrap().contains("Missing required input: query"));
    assert!(result.outputs.is_empty());
}

#[tokio::test]
async fn test_history_order_is_repeatable_and_reversible() {
    let runtime = runtime(RuntimeConfig::default());
    let workflow = counting_loop(5, 3);
    let result = runtime.execute(&workflow, label_input()).await.unwrap();
    assert!(result.success);

    for field in [OrderField::Sequence, OrderField::CreatedAt] {
        let asc = OrderConfig::new(field, OrderDirection::Asc);
        let first = runtime.history(result.workflow_run_id, Some(asc)).await.unwrap();
        let again = runtime.history(result.workflow_run_id, Some(asc)).await.unwrap();
        assert_eq!(first, again);

        let mut desc = runtime
            .history(result.workflow_run_id, Some(asc.reversed()))
            .await
            .unwrap();
        desc.reverse();
        assert_eq!(first, desc);
    }

    let by_sequence = runtime.history(result.workflow_run_id, None).await.unwrap();
    assert_eq!(by_sequence.first().map(|r| r.node_id.as_str()), Some("start"));
    assert_eq!(by_sequence.last().map(|r| r.node_id.as_str()), Some("end"));
    assert!(by_sequence.windows(2).all(|w| w[0].sequence < w[1].sequence));

    let cycles: Vec<usize> = by_sequence
        .iter()
        .filter(|r| r.node_id == "step")
        .filter_map(|r| r.metadata.cycle_index)
        .collect();
    assert_eq!(cycles, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_validate_checks_nested_bodies() {
    let runtime = runtime(RuntimeConfig::default());
    assert_eq!(runtime.validate(&counting_loop(3, 3)).unwrap(), 6);

    let mut body = Graph::new();
    body.add_node(NodeSpec::new("loop_start", NodeType::LoopStart));
    body.add_node(NodeSpec::new("stray", NodeType::IterationStart));
    let mut workflow = Workflow::new("mixed markers");
    workflow.add_node(
        NodeSpec::new("lp", NodeType::Loop)
            .with_data(serde_json::to_value(LoopNodeData { loop_count: 1, body }).unwrap()),
    );
    assert!(runtime.validate(&workflow).is_err());
}
