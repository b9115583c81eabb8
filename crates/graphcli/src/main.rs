// crates/graphcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use graphcore::{
    ExecutionEvent, LoopNodeData, NodeEvent, NodeSpec, NodeType, OrderConfig, OrderDirection,
    OrderField, Workflow, WorkflowNodeExecution,
};
use graphnodes::{LogicalOperator, VariableMapping};
use graphruntime::{GraphRuntime, RuntimeConfig};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "graph")]
#[command(about = "Graph workflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON object, seeded under the start node
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Print the run's execution records afterwards
        #[arg(long)]
        history: bool,

        /// Field to order the execution records by
        #[arg(long, value_enum, default_value_t = OrderBy::Sequence)]
        order_by: OrderBy,

        /// Newest records first
        #[arg(long)]
        desc: bool,

        /// Maximum nodes running at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Hard cap on loop cycles
        #[arg(long)]
        max_loop_cycles: Option<usize>,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderBy {
    CreatedAt,
    Sequence,
}

impl From<OrderBy> for OrderField {
    fn from(order_by: OrderBy) -> Self {
        match order_by {
            OrderBy::CreatedAt => OrderField::CreatedAt,
            OrderBy::Sequence => OrderField::Sequence,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            history,
            order_by,
            desc,
            max_parallel,
            max_loop_cycles,
        } => {
            init_logging(verbose);

            let mut config = RuntimeConfig::default();
            if let Some(max_parallel) = max_parallel {
                config.max_parallel_nodes = max_parallel;
            }
            if let Some(max_loop_cycles) = max_loop_cycles {
                config.max_loop_cycles = max_loop_cycles;
            }
            let order = history.then(|| {
                let direction = if desc {
                    OrderDirection::Desc
                } else {
                    OrderDirection::Asc
                };
                OrderConfig::new(order_by.into(), direction)
            });

            run_workflow(&file, input, config, order).await?;
        }

        Commands::Validate { file } => {
            init_logging(false);
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes()?;
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("parsing workflow {}", file.display()))?;
    Ok(workflow)
}

fn parse_inputs(input: Option<String>) -> Result<HashMap<String, Value>> {
    let Some(input_str) = input else {
        return Ok(HashMap::new());
    };
    match serde_json::from_str(&input_str)? {
        Value::Object(obj) => Ok(obj.into_iter().collect()),
        _ => bail!("Input must be a JSON object"),
    }
}

async fn run_workflow(
    file: &Path,
    input: Option<String>,
    config: RuntimeConfig,
    order: Option<OrderConfig>,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;
    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.graph.nodes.len());
    println!("   Edges: {}", workflow.graph.edges.len());
    println!();

    let inputs = parse_inputs(input)?;

    let runtime = GraphRuntime::with_registry(graphnodes::builtin_registry()?, config);

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();

    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ExecutionEvent::WorkflowStarted { .. } => {
                    println!("▶️  Workflow started");
                }
                ExecutionEvent::NodeStarted {
                    node_id,
                    node_type,
                    sequence,
                    ..
                } => {
                    println!("  ⚡ [{}] Starting node: {} ({})", sequence, node_id, node_type);
                }
                ExecutionEvent::NodeFinished {
                    node_id,
                    error: Some(error),
                    ..
                } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                ExecutionEvent::NodeFinished {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                ExecutionEvent::CycleStarted {
                    construct_id,
                    index,
                    ..
                } => {
                    println!("  🔁 {} cycle {}", construct_id, index);
                }
                ExecutionEvent::CycleCompleted {
                    construct_id,
                    index,
                    should_continue,
                    ..
                } => {
                    if !should_continue {
                        println!("  ⏹️  {} exits after cycle {}", construct_id, index);
                    }
                }
                ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
                    NodeEvent::Info { message } => {
                        println!("     ℹ️  [{}] {}", node_id, message);
                    }
                    NodeEvent::Warning { message } => {
                        println!("     ⚠️  [{}] {}", node_id, message);
                    }
                },
                ExecutionEvent::WorkflowCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Workflow completed successfully in {}ms", duration_ms);
                    } else {
                        println!("💥 Workflow failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let result = runtime.execute(&workflow, inputs).await?;

    // Wait for events to finish printing
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    event_task.abort();

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", result.workflow_run_id);
    println!("   Completed: {}/{} nodes", result.completed_nodes, result.total_nodes);
    if let Some(error) = &result.error {
        println!("   Error: {}", error);
    }

    if !result.outputs.is_empty() {
        println!();
        println!("📤 Outputs:");
        let mut outputs: Vec<_> = result.outputs.iter().collect();
        outputs.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in outputs {
            println!("   {}: {}", key, value);
        }
    }

    if let Some(order) = order {
        let records = runtime.history(result.workflow_run_id, Some(order)).await?;
        println!();
        println!("🧾 Execution History ({} records):", records.len());
        for record in &records {
            print_record(record);
        }
    }

    if !result.success {
        bail!("workflow run {} failed", result.workflow_run_id);
    }
    Ok(())
}

fn print_record(record: &WorkflowNodeExecution) {
    let placement = match (&record.metadata.construct_id, record.metadata.cycle_index) {
        (Some(construct), Some(cycle)) => format!(" in {}[{}]", construct, cycle),
        _ => String::new(),
    };
    println!(
        "   #{:<3} {} {} ({} v{}){} {:?} {}ms",
        record.sequence,
        record.created_at.format("%H:%M:%S%.3f"),
        record.node_id,
        record.node_type,
        record.node_version,
        placement,
        record.status,
        record.elapsed_ms
    );
    if let Some(error) = &record.error {
        println!("        error: {}", error);
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    let runtime = GraphRuntime::with_registry(
        graphnodes::builtin_registry()?,
        RuntimeConfig::default(),
    );
    let checked = runtime.validate(&workflow)?;

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {} ({} including construct bodies)", workflow.graph.nodes.len(), checked);
    println!("   Edges: {}", workflow.graph.edges.len());

    Ok(())
}

fn list_nodes() -> Result<()> {
    println!("📦 Available Node Types:");
    println!();

    let registry = graphnodes::builtin_registry()?;
    for (node_type, versions) in registry.list_node_types() {
        let latest = registry.latest_version(node_type).unwrap_or("-");
        match registry.get_metadata(node_type) {
            Some(metadata) => {
                println!(
                    "  • {} ({}) versions: {} latest: {}",
                    node_type,
                    metadata.category,
                    versions.join(", "),
                    latest
                );
                println!("    {}", metadata.description);
            }
            None => println!("  • {} versions: {}", node_type, versions.join(", ")),
        }
    }
    for container in [NodeType::Iteration, NodeType::Loop] {
        println!("  • {} (container, driven by the executor)", container);
    }
    Ok(())
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new("Example Loop Workflow");
    workflow.description =
        Some("Greets a name once per loop cycle until the loop count is reached".to_string());

    let start = NodeSpec::new("start", NodeType::Start)
        .with_title("Start")
        .with_data(json!({
            "variables": [{ "variable": "name", "required": true }]
        }));

    let mut body = graphcore::Graph::new();
    body.add_node(NodeSpec::new("loop_start", NodeType::LoopStart));
    body.add_node(
        NodeSpec::new("greet", NodeType::TemplateTransform).with_data(json!({
            "variables": [{ "variable": "round", "value_selector": ["greeting_loop", "index"] }],
            "template": "Hello {{#start.name#}}, round {{ round }}"
        })),
    );
    body.add_node(NodeSpec::new("loop_end", NodeType::LoopEnd).with_data(json!({
        "conditions": [{
            "variable_selector": ["greeting_loop", "index"],
            "comparison_operator": "<",
            "value": 3
        }],
        "logical_operator": LogicalOperator::And
    })));
    body.connect("loop_start", "greet");
    body.connect("greet", "loop_end");

    let loop_data = LoopNodeData {
        loop_count: 5,
        body,
    };
    let greeting_loop = NodeSpec::new("greeting_loop", NodeType::Loop)
        .with_title("Greeting Loop")
        .with_data(serde_json::to_value(&loop_data)?);

    let end = NodeSpec::new("end", NodeType::End).with_data(json!({
        "outputs": [
            VariableMapping::new("last_greeting", ["greet", "output"]),
            VariableMapping::new("rounds", ["greeting_loop", "loop_round"]),
        ]
    }));

    let start_id = workflow.add_node(start);
    let loop_id = workflow.add_node(greeting_loop);
    let end_id = workflow.add_node(end);
    workflow.connect(start_id, loop_id.clone());
    workflow.connect(loop_id, end_id);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  graph run --file {} --input '{{\"name\": \"World\"}}' --history",
        output.display()
    );

    Ok(())
}
