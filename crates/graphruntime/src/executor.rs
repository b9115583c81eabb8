use crate::registry::NodeRegistry;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use graphcore::{
    ConstructPhase, ConstructState, ErrorHandling, EventBus, ExecutionEvent, ExecutionMetadata,
    FlowError, Graph, IterationNodeData, LoopNodeData, Node, NodeContext, NodeError, NodeId,
    NodeRunResult, NodeSpec, NodeType, VariablePool, VariableSelector, Workflow, WorkflowError,
    WorkflowNodeExecution, WorkflowNodeExecutionRepository, WorkflowRunId,
};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};
use uuid::Uuid;

/// Version recorded for container nodes, which the executor drives itself.
const CONTAINER_VERSION: &str = "1";

/// Executes workflow graphs, including loop and iteration bodies, against a
/// per-run variable pool.
pub struct WorkflowExecutor {
    max_parallel: usize,
    max_loop_cycles: usize,
}

/// A graph node ready to run: either a registry-built node or a container
/// whose body the executor drives.
enum Prepared {
    Node(Arc<dyn Node>),
    Iteration(IterationNodeData),
    Loop(LoopNodeData),
}

/// Everything shared by the nodes of one run.
struct RunContext<'a> {
    run_id: WorkflowRunId,
    workflow: &'a Workflow,
    prepared: HashMap<NodeId, Prepared>,
    repository: &'a dyn WorkflowNodeExecutionRepository,
    event_bus: &'a EventBus,
    pool: Arc<VariablePool>,
    sequence: AtomicU64,
}

impl RunContext<'_> {
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }
}

/// The construct a body node is running inside.
#[derive(Clone)]
struct CycleScope {
    construct_id: NodeId,
    construct_type: NodeType,
    index: usize,
    state: Arc<RwLock<ConstructState>>,
}

impl CycleScope {
    /// Only the construct's own markers get to see its state.
    fn is_marker(&self, node_type: NodeType) -> bool {
        match self.construct_type {
            NodeType::Iteration => node_type == NodeType::IterationStart,
            NodeType::Loop => matches!(node_type, NodeType::LoopStart | NodeType::LoopEnd),
            _ => false,
        }
    }
}

/// How a graph (top level or one body cycle) finished.
struct GraphOutcome {
    completed: usize,
    failure: Option<(NodeId, String)>,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize, max_loop_cycles: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            max_loop_cycles,
        }
    }

    /// Execute a workflow and return results.
    ///
    /// A failed node yields `Ok` with `success == false`; `Err` means the
    /// run could not be carried out (bad configuration, contract violation,
    /// lost history record).
    pub async fn execute(
        &self,
        workflow: &Workflow,
        registry: &NodeRegistry,
        repository: &dyn WorkflowNodeExecutionRepository,
        event_bus: &EventBus,
        inputs: HashMap<String, Value>,
    ) -> Result<ExecutionResult, FlowError> {
        let run_id = WorkflowRunId::new_v4();
        let start_time = Instant::now();

        let mut prepared = HashMap::new();
        prepare_graph(&workflow.graph, None, registry, &mut prepared)?;

        let pool = Arc::new(
            VariablePool::new()
                .with_system_variables(HashMap::from([
                    ("workflow_run_id".to_string(), Value::String(run_id.to_string())),
                    ("workflow_id".to_string(), Value::String(workflow.id.to_string())),
                ]))
                .with_environment_variables(workflow.environment_variables.clone()),
        );
        for start in workflow.graph.nodes_of_type(NodeType::Start) {
            for (name, value) in &inputs {
                pool.add([start.id.as_str(), name.as_str()], value.clone());
            }
        }

        event_bus.emit(ExecutionEvent::WorkflowStarted {
            workflow_run_id: run_id,
            workflow_id: workflow.id,
            timestamp: Utc::now(),
        });
        tracing::info!("Starting workflow run {} of {}", run_id, workflow.name);

        let ctx = RunContext {
            run_id,
            workflow,
            prepared,
            repository,
            event_bus,
            pool,
            sequence: AtomicU64::new(0),
        };
        let result = self.run_graph(&ctx, &workflow.graph, None).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let success = matches!(&result, Ok(outcome) if outcome.failure.is_none());
        event_bus.emit(ExecutionEvent::WorkflowCompleted {
            workflow_run_id: run_id,
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        let outcome = result?;
        let error = outcome
            .failure
            .map(|(node_id, error)| format!("Node {} failed: {}", node_id, error));
        match &error {
            Some(e) => tracing::warn!("Workflow run {} failed after {}ms: {}", run_id, duration_ms, e),
            None => tracing::info!("Workflow run {} completed in {}ms", run_id, duration_ms),
        }

        let mut outputs = HashMap::new();
        for end in workflow.graph.nodes_of_type(NodeType::End) {
            for (name, segment) in ctx.pool.node_variables(&end.id) {
                outputs.insert(name, segment.into_value());
            }
        }

        Ok(ExecutionResult {
            workflow_run_id: run_id,
            success: error.is_none(),
            error,
            outputs,
            completed_nodes: outcome.completed,
            total_nodes: workflow.graph.nodes.len(),
        })
    }

    /// Check a workflow without running it: every node, nested bodies
    /// included, is built through the registry and every graph must be
    /// acyclic. Returns the number of nodes checked.
    pub fn validate(&self, workflow: &Workflow, registry: &NodeRegistry) -> Result<usize, FlowError> {
        let mut prepared = HashMap::new();
        prepare_graph(&workflow.graph, None, registry, &mut prepared)?;
        check_acyclic(&workflow.graph)?;
        for entry in prepared.values() {
            match entry {
                Prepared::Iteration(data) => check_acyclic(&data.body)?,
                Prepared::Loop(data) => check_acyclic(&data.body)?,
                Prepared::Node(_) => {}
            }
        }
        Ok(prepared.len())
    }

    /// Run one graph to completion: ready nodes run concurrently up to the
    /// parallel limit, dependents start once all their predecessors are done.
    fn run_graph<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        graph: &'a Graph,
        scope: Option<CycleScope>,
    ) -> BoxFuture<'a, Result<GraphOutcome, FlowError>> {
        Box::pin(async move {
            check_acyclic(graph)?;

            let mut started: HashSet<&str> = HashSet::new();
            let mut completed: HashSet<&str> = HashSet::new();
            let mut succeeded = 0usize;
            let mut failure: Option<(NodeId, String)> = None;
            let mut running = FuturesUnordered::new();

            loop {
                if failure.is_none() {
                    for spec in &graph.nodes {
                        if running.len() >= self.max_parallel {
                            break;
                        }
                        if started.contains(spec.id.as_str()) {
                            continue;
                        }
                        let ready = graph
                            .predecessors(&spec.id)
                            .all(|dep| completed.contains(dep.as_str()));
                        if !ready {
                            continue;
                        }
                        started.insert(spec.id.as_str());
                        let predecessor = graph
                            .predecessors(&spec.id)
                            .next()
                            .cloned()
                            .or_else(|| scope.as_ref().map(|s| s.construct_id.clone()));
                        let task = self.run_node(ctx, spec, scope.clone(), predecessor);
                        running.push(async move { (spec, task.await) });
                    }
                }

                // If nothing is running and nothing is ready, we're done
                let Some((spec, result)) = running.next().await else {
                    break;
                };
                let result = result?;

                if result.is_succeeded() {
                    completed.insert(spec.id.as_str());
                    succeeded += 1;
                    continue;
                }

                let error = result.error.unwrap_or_else(|| "unknown error".to_string());
                match ctx.workflow.settings.on_error {
                    ErrorHandling::ContinueOnError if scope.is_none() => {
                        completed.insert(spec.id.as_str());
                    }
                    _ => {
                        if failure.is_none() {
                            failure = Some((spec.id.clone(), error));
                        }
                    }
                }
            }

            Ok(GraphOutcome {
                completed: succeeded,
                failure,
            })
        })
    }

    fn run_node<'a>(
        &'a self,
        ctx: &'a RunContext<'a>,
        spec: &'a NodeSpec,
        scope: Option<CycleScope>,
        predecessor: Option<NodeId>,
    ) -> BoxFuture<'a, Result<NodeRunResult, FlowError>> {
        Box::pin(async move {
            let prepared = ctx
                .prepared
                .get(&spec.id)
                .ok_or_else(|| WorkflowError::NodeNotFound(spec.id.clone()))?;

            let sequence = ctx.next_sequence();
            let created_at = Utc::now();
            let start = Instant::now();
            ctx.event_bus.emit(ExecutionEvent::NodeStarted {
                workflow_run_id: ctx.run_id,
                node_id: spec.id.clone(),
                node_type: spec.node_type,
                sequence,
                timestamp: created_at,
            });
            tracing::debug!("Node {} ({}) started, sequence {}", spec.id, spec.node_type, sequence);

            let (result, version) = match prepared {
                Prepared::Node(node) => {
                    let mut result = self.invoke(ctx, spec, &**node, scope.as_ref()).await?;
                    // Records are final, so a node must settle before returning.
                    if !result.status.is_terminal() {
                        result = NodeRunResult::failed(format!(
                            "Node returned non-terminal status {:?}",
                            result.status
                        ))
                        .with_inputs(result.inputs);
                    }
                    (result, node.version().to_string())
                }
                Prepared::Iteration(data) => (
                    self.run_iteration(ctx, spec, data).await?,
                    CONTAINER_VERSION.to_string(),
                ),
                Prepared::Loop(data) => (
                    self.run_loop(ctx, spec, data).await?,
                    CONTAINER_VERSION.to_string(),
                ),
            };

            let duration_ms = start.elapsed().as_millis() as u64;
            if result.is_succeeded() {
                ctx.pool.add_node_outputs(&spec.id, &result.outputs);
                tracing::info!("Node {} completed in {}ms", spec.id, duration_ms);
            } else {
                tracing::error!(
                    "Node {} failed: {}",
                    spec.id,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }

            let record = WorkflowNodeExecution {
                id: Uuid::new_v4(),
                workflow_run_id: ctx.run_id,
                sequence,
                node_id: spec.id.clone(),
                node_type: spec.node_type,
                node_version: version,
                title: spec.display_title().to_string(),
                predecessor_node_id: predecessor,
                inputs: result.inputs.clone(),
                outputs: result.outputs.clone(),
                status: result.status,
                error: result.error.clone(),
                metadata: ExecutionMetadata {
                    construct_id: scope.as_ref().map(|s| s.construct_id.clone()),
                    cycle_index: scope.as_ref().map(|s| s.index),
                },
                created_at,
                finished_at: Some(Utc::now()),
                elapsed_ms: duration_ms,
            };
            ctx.repository.save(record).await?;

            ctx.event_bus.emit(ExecutionEvent::NodeFinished {
                workflow_run_id: ctx.run_id,
                node_id: spec.id.clone(),
                status: result.status,
                outputs: result.outputs.clone(),
                error: result.error.clone(),
                duration_ms,
                timestamp: Utc::now(),
            });

            Ok(result)
        })
    }

    /// Call a registry-built node, applying the workflow's node timeout.
    async fn invoke(
        &self,
        ctx: &RunContext<'_>,
        spec: &NodeSpec,
        node: &dyn Node,
        scope: Option<&CycleScope>,
    ) -> Result<NodeRunResult, NodeError> {
        let mut node_ctx = NodeContext::new(
            spec.id.clone(),
            ctx.run_id,
            ctx.pool.clone(),
            ctx.event_bus.create_emitter(ctx.run_id, spec.id.clone()),
        );
        if let Some(scope) = scope.filter(|s| s.is_marker(spec.node_type)) {
            node_ctx = node_ctx.with_construct(scope.state.clone());
        }

        match ctx.workflow.settings.node_timeout_ms {
            Some(millis) => match timeout(Duration::from_millis(millis), node.run(&node_ctx)).await {
                Ok(result) => result,
                Err(_) => Ok(NodeRunResult::failed(NodeError::Timeout { millis }.to_string())),
            },
            None => node.run(&node_ctx).await,
        }
    }

    /// Drive an iteration: one body cycle per element of the iterator array.
    async fn run_iteration(
        &self,
        ctx: &RunContext<'_>,
        spec: &NodeSpec,
        data: &IterationNodeData,
    ) -> Result<NodeRunResult, FlowError> {
        let Some(input) = ctx.pool.get(&data.iterator_selector) else {
            return Ok(NodeRunResult::failed(format!(
                "Variable {} not found",
                data.iterator_selector
            )));
        };
        let Some(items) = input.elements() else {
            return Ok(NodeRunResult::failed(format!(
                "Iterator variable {} is not an array (got {})",
                data.iterator_selector,
                input.value_type()
            )));
        };
        let inputs = HashMap::from([("iterator".to_string(), input.value().clone())]);

        let state = Arc::new(RwLock::new(ConstructState::new(Some(items.len()))));
        state.write().await.begin()?;
        let total = items.len();
        let mut collected = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            reset_body(ctx, &data.body);
            state.write().await.item = Some(item.clone());
            ctx.pool.add_segment([spec.id.as_str(), "item"], item);
            ctx.pool.add([spec.id.as_str(), "index"], Value::from(index));
            self.emit_cycle_started(ctx, &spec.id, index);

            let scope = CycleScope {
                construct_id: spec.id.clone(),
                construct_type: NodeType::Iteration,
                index,
                state: state.clone(),
            };
            let outcome = self.run_graph(ctx, &data.body, Some(scope)).await?;
            if let Some((node_id, error)) = outcome.failure {
                state.write().await.exit();
                clear_iteration_item(ctx, &spec.id);
                return Ok(NodeRunResult::failed(format!(
                    "Iteration {} cycle {} failed at node {}: {}",
                    spec.id, index, node_id, error
                ))
                .with_inputs(inputs));
            }

            collected.push(
                ctx.pool
                    .get(&data.output_selector)
                    .map(|s| s.into_value())
                    .unwrap_or(Value::Null),
            );

            let should_continue = index + 1 < total;
            state.write().await.advance(should_continue)?;
            self.emit_cycle_completed(ctx, &spec.id, index, should_continue);
        }
        clear_iteration_item(ctx, &spec.id);

        Ok(NodeRunResult::succeeded()
            .with_inputs(inputs)
            .with_output("output", Value::Array(collected)))
    }

    /// Drive a loop: re-enter the body while the loop-end marker says so,
    /// never more than `loop_count` times.
    async fn run_loop(
        &self,
        ctx: &RunContext<'_>,
        spec: &NodeSpec,
        data: &LoopNodeData,
    ) -> Result<NodeRunResult, FlowError> {
        let loop_count = data.loop_count.min(self.max_loop_cycles);
        if data.loop_count > self.max_loop_cycles {
            tracing::warn!(
                "Loop {} count {} capped at {}",
                spec.id,
                data.loop_count,
                self.max_loop_cycles
            );
        }
        let inputs = HashMap::from([("loop_count".to_string(), Value::from(loop_count))]);
        if loop_count == 0 {
            return Ok(NodeRunResult::succeeded()
                .with_inputs(inputs)
                .with_output("loop_round", 0));
        }

        let state = Arc::new(RwLock::new(ConstructState::new(Some(loop_count))));
        state.write().await.begin()?;

        loop {
            let index = state.read().await.index;
            reset_body(ctx, &data.body);
            ctx.pool.add([spec.id.as_str(), "index"], Value::from(index));
            self.emit_cycle_started(ctx, &spec.id, index);

            let scope = CycleScope {
                construct_id: spec.id.clone(),
                construct_type: NodeType::Loop,
                index,
                state: state.clone(),
            };
            let outcome = self.run_graph(ctx, &data.body, Some(scope)).await?;
            if let Some((node_id, error)) = outcome.failure {
                state.write().await.exit();
                return Ok(NodeRunResult::failed(format!(
                    "Loop {} cycle {} failed at node {}: {}",
                    spec.id, index, node_id, error
                ))
                .with_inputs(inputs));
            }

            let (phase, should_continue) = {
                let mut state = state.write().await;
                // A body without a loop-end marker continues until loop_count.
                if state.phase() == (ConstructPhase::Running { cycle: index }) {
                    let next = state.has_next_cycle();
                    state.advance(next)?;
                }
                (state.phase(), state.should_continue)
            };
            self.emit_cycle_completed(ctx, &spec.id, index, should_continue);

            if phase == ConstructPhase::Exited {
                break;
            }
        }

        let rounds = state.read().await.index;
        Ok(NodeRunResult::succeeded()
            .with_inputs(inputs)
            .with_output("loop_round", rounds))
    }

    fn emit_cycle_started(&self, ctx: &RunContext<'_>, construct_id: &str, index: usize) {
        tracing::debug!("Construct {} entering cycle {}", construct_id, index);
        ctx.event_bus.emit(ExecutionEvent::CycleStarted {
            workflow_run_id: ctx.run_id,
            construct_id: construct_id.to_string(),
            index,
            timestamp: Utc::now(),
        });
    }

    fn emit_cycle_completed(
        &self,
        ctx: &RunContext<'_>,
        construct_id: &str,
        index: usize,
        should_continue: bool,
    ) {
        tracing::debug!(
            "Construct {} finished cycle {}, continue: {}",
            construct_id,
            index,
            should_continue
        );
        ctx.event_bus.emit(ExecutionEvent::CycleCompleted {
            workflow_run_id: ctx.run_id,
            construct_id: construct_id.to_string(),
            index,
            should_continue,
            timestamp: Utc::now(),
        });
    }
}

/// Drop every value a body node wrote in an earlier cycle.
fn reset_body(ctx: &RunContext<'_>, body: &Graph) {
    for node in &body.nodes {
        ctx.pool.remove_node(&node.id);
    }
}

/// The current item and index are visible only while the iteration runs.
fn clear_iteration_item(ctx: &RunContext<'_>, construct_id: &str) {
    for name in ["item", "index"] {
        ctx.pool.remove(&VariableSelector::new([construct_id, name]));
    }
}

/// Build every node of `graph` (and of nested bodies) once, checking ids,
/// edges and marker placement on the way.
fn prepare_graph(
    graph: &Graph,
    container: Option<NodeType>,
    registry: &NodeRegistry,
    prepared: &mut HashMap<NodeId, Prepared>,
) -> Result<(), FlowError> {
    check_markers(graph, container)?;
    for edge in &graph.edges {
        for end in [&edge.source, &edge.target] {
            if graph.find_node(end).is_none() {
                return Err(WorkflowError::InvalidEdge(format!(
                    "{} -> {}: unknown node {}",
                    edge.source, edge.target, end
                ))
                .into());
            }
        }
    }

    for spec in &graph.nodes {
        if prepared.contains_key(&spec.id) {
            return Err(WorkflowError::Invalid(format!("duplicate node id '{}'", spec.id)).into());
        }
        let entry = match spec.node_type {
            NodeType::Iteration => {
                let data: IterationNodeData = spec.decode_data()?;
                prepare_graph(&data.body, Some(NodeType::Iteration), registry, prepared)?;
                Prepared::Iteration(data)
            }
            NodeType::Loop => {
                let data: LoopNodeData = spec.decode_data()?;
                prepare_graph(&data.body, Some(NodeType::Loop), registry, prepared)?;
                Prepared::Loop(data)
            }
            _ => Prepared::Node(Arc::from(registry.create_node(spec)?)),
        };
        prepared.insert(spec.id.clone(), entry);
    }
    Ok(())
}

/// Start/end markers may only appear in the body of their own construct:
/// exactly one start marker per body, at most one loop-end.
fn check_markers(graph: &Graph, container: Option<NodeType>) -> Result<(), WorkflowError> {
    let count = |t: NodeType| graph.nodes_of_type(t).count();
    let (iteration_starts, loop_starts, loop_ends) = (
        count(NodeType::IterationStart),
        count(NodeType::LoopStart),
        count(NodeType::LoopEnd),
    );
    let valid = match container {
        None => iteration_starts + loop_starts + loop_ends == 0,
        Some(NodeType::Iteration) => iteration_starts == 1 && loop_starts + loop_ends == 0,
        Some(NodeType::Loop) => loop_starts == 1 && loop_ends <= 1 && iteration_starts == 0,
        Some(_) => false,
    };
    if valid {
        Ok(())
    } else {
        let scope = container.map_or("top-level graph".to_string(), |t| format!("{} body", t));
        Err(WorkflowError::Invalid(format!(
            "misplaced loop/iteration markers in {}",
            scope
        )))
    }
}

fn check_acyclic(graph: &Graph) -> Result<(), WorkflowError> {
    let mut dag = DiGraph::<&str, ()>::new();
    let indices: HashMap<&str, _> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), dag.add_node(n.id.as_str())))
        .collect();
    for edge in &graph.edges {
        let from = indices
            .get(edge.source.as_str())
            .ok_or_else(|| WorkflowError::NodeNotFound(edge.source.clone()))?;
        let to = indices
            .get(edge.target.as_str())
            .ok_or_else(|| WorkflowError::NodeNotFound(edge.target.clone()))?;
        dag.add_edge(*from, *to, ());
    }
    if toposort(&dag, None).is_err() {
        return Err(WorkflowError::CyclicDependency);
    }
    Ok(())
}

/// Result of workflow execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub workflow_run_id: WorkflowRunId,
    pub success: bool,
    pub error: Option<String>,
    /// Values gathered by the workflow's end nodes
    pub outputs: HashMap<String, Value>,
    pub completed_nodes: usize,
    pub total_nodes: usize,
}
