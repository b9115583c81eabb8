//! Per-run variable namespace.

use crate::{Segment, VariableResolutionError, VariableSelector};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;

pub const SYSTEM_NAMESPACE: &str = "sys";
pub const ENVIRONMENT_NAMESPACE: &str = "env";

/// Mapping from [`VariableSelector`] paths to [`Segment`]s, shared by every
/// node of one workflow run.
///
/// Entries live in a sharded concurrent map, so an `add` to one path is an
/// atomic upsert that never blocks readers of unrelated paths.
#[derive(Debug, Default)]
pub struct VariablePool {
    variables: DashMap<VariableSelector, Segment>,
}

impl VariablePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `sys.*` variables.
    pub fn with_system_variables(self, variables: HashMap<String, Value>) -> Self {
        for (name, value) in variables {
            self.add([SYSTEM_NAMESPACE.to_string(), name], value);
        }
        self
    }

    /// Seed `env.*` variables.
    pub fn with_environment_variables(self, variables: HashMap<String, Value>) -> Self {
        for (name, value) in variables {
            self.add([ENVIRONMENT_NAMESPACE.to_string(), name], value);
        }
        self
    }

    /// Insert or replace a raw value, inferring its segment type.
    pub fn add(&self, path: impl Into<VariableSelector>, value: Value) {
        self.add_segment(path, Segment::infer(value));
    }

    pub fn add_segment(&self, path: impl Into<VariableSelector>, segment: Segment) {
        let path = path.into();
        if path.is_empty() {
            tracing::warn!("Ignoring write to empty variable path");
            return;
        }
        tracing::debug!("pool set {} = {}", path, segment.log_text());
        self.variables.insert(path, segment);
    }

    /// Write a node's outputs under its own namespace.
    pub fn add_node_outputs(&self, node_id: &str, outputs: &HashMap<String, Value>) {
        for (name, value) in outputs {
            self.add([node_id, name.as_str()], value.clone());
        }
    }

    /// Look a path up. A path longer than any stored key descends into the
    /// stored object or array by key or index.
    pub fn get(&self, path: &VariableSelector) -> Option<Segment> {
        if let Some(entry) = self.variables.get(path) {
            return Some(entry.value().clone());
        }
        for len in (1..path.len()).rev() {
            let prefix = path.prefix(len);
            if let Some(entry) = self.variables.get(&prefix) {
                return descend(entry.value().value(), &path.parts()[len..]).map(Segment::infer);
            }
        }
        None
    }

    /// Like [`get`](Self::get), but absence is an error naming the path.
    pub fn require(&self, path: &VariableSelector) -> Result<Segment, VariableResolutionError> {
        self.get(path).ok_or_else(|| VariableResolutionError {
            selector: path.clone(),
        })
    }

    pub fn contains(&self, path: &VariableSelector) -> bool {
        self.get(path).is_some()
    }

    pub fn remove(&self, path: &VariableSelector) -> Option<Segment> {
        self.variables.remove(path).map(|(_, segment)| segment)
    }

    /// Drop every entry under `node_id`.
    pub fn remove_node(&self, node_id: &str) {
        self.variables
            .retain(|path, _| path.namespace() != Some(node_id));
    }

    /// All values stored directly under `node_id`, keyed by the remaining path.
    pub fn node_variables(&self, node_id: &str) -> HashMap<String, Segment> {
        self.variables
            .iter()
            .filter(|entry| entry.key().namespace() == Some(node_id))
            .map(|entry| {
                let name = entry.key().parts()[1..].join(".");
                (name, entry.value().clone())
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

fn descend(value: &Value, rest: &[String]) -> Option<Value> {
    let mut current = value;
    for part in rest {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current.clone())
}
