use thiserror::Error;

use crate::capability::CapabilityError;
use crate::core::graph::{NodeId, NodeKind};

/// Errors raised while building or editing a [`Graph`](crate::Graph).
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Node id already in use: {0}")]
    DuplicateNode(NodeId),

    #[error("Node {0} cannot be connected to itself")]
    SelfLoop(NodeId),

    #[error("Node {node_id} ({kind}) has no output port")]
    NoOutputPort { node_id: NodeId, kind: NodeKind },

    #[error("Node {node_id} ({kind}) has no input port")]
    NoInputPort { node_id: NodeId, kind: NodeKind },

    #[error("Node {node_id} is connected; cannot change it from {from} to {to}")]
    IncompatibleData {
        node_id: NodeId,
        from: NodeKind,
        to: NodeKind,
    },

    #[error("Unknown node kind '{kind}' for node {node_id}")]
    UnknownKind { node_id: NodeId, kind: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Errors that abort a workflow run.
///
/// Every variant except [`EngineError::StuckGraph`] names the node that
/// raised it.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Node {node_id} is missing input: {reason}")]
    MissingInput { node_id: NodeId, reason: String },

    #[error("Node {node_id} has an empty prompt (no agent instruction, prompt or upstream text)")]
    EmptyPrompt { node_id: NodeId },

    #[error("Node {node_id} failed: {source}")]
    Capability {
        node_id: NodeId,
        #[source]
        source: CapabilityError,
    },

    #[error("Workflow made no progress (cycle or unfulfilled inputs); pending: {}", pending.join(", "))]
    StuckGraph { pending: Vec<NodeId> },

    #[error("Unknown target node: {0}")]
    UnknownNode(NodeId),
}

impl EngineError {
    /// The offending node, if the error is tied to one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            EngineError::MissingInput { node_id, .. }
            | EngineError::EmptyPrompt { node_id }
            | EngineError::Capability { node_id, .. }
            | EngineError::UnknownNode(node_id) => Some(node_id),
            EngineError::StuckGraph { .. } => None,
        }
    }

    pub(crate) fn missing_input(node_id: &str, reason: impl Into<String>) -> Self {
        EngineError::MissingInput {
            node_id: node_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn capability(node_id: &str, source: CapabilityError) -> Self {
        EngineError::Capability {
            node_id: node_id.to_string(),
            source,
        }
    }
}
