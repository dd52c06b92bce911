//! Execution scope discovery.
//!
//! The scope only says *which* nodes take part in a run. Ordering is found
//! online by the runner through readiness checks, which handles diamonds and
//! independent branches without a precomputed topological sort.

use std::collections::HashSet;

use crate::core::error::EngineError;
use crate::core::graph::{Graph, NodeId};

/// The set of nodes a run has to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionScope {
    ids: HashSet<NodeId>,
    target: Option<NodeId>,
}

impl ExecutionScope {
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &HashSet<NodeId> {
        &self.ids
    }

    /// Scope members in graph insertion order.
    pub fn ordered(&self, graph: &Graph) -> Vec<NodeId> {
        graph
            .node_ids()
            .filter(|id| self.ids.contains(*id))
            .cloned()
            .collect()
    }
}

/// Computes the scope for a run.
///
/// Without a target every node is in scope. With a target, the scope is the
/// target plus everything reachable by walking input edges backwards.
pub fn scope(graph: &Graph, target: Option<&str>) -> Result<ExecutionScope, EngineError> {
    let Some(target) = target else {
        return Ok(ExecutionScope {
            ids: graph.node_ids().cloned().collect(),
            target: None,
        });
    };

    if !graph.contains(target) {
        return Err(EngineError::UnknownNode(target.to_string()));
    }

    let mut ids = HashSet::new();
    let mut stack = vec![target.to_string()];
    while let Some(current) = stack.pop() {
        if !ids.insert(current.clone()) {
            continue;
        }
        for source in graph.sources_of(&current) {
            if !ids.contains(source) {
                stack.push(source.to_string());
            }
        }
    }

    log::debug!("Scope for target {}: {} node(s)", target, ids.len());
    Ok(ExecutionScope {
        ids,
        target: Some(target.to_string()),
    })
}
