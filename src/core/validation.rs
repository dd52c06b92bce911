//! Static checks over a graph, before anything runs.

use std::collections::{HashMap, VecDeque};

use crate::core::config::EngineConfig;
use crate::core::graph::{GeneratorMode, Graph, InputValue, NodeData, NodeId};

/// Represents an issue found during graph validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A hard error: the graph cannot run to completion.
    Error(String),
    /// A warning: some node will most likely fail, or produce nothing.
    Warning(String),
}

/// The result of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Error(msg.into()));
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning(msg.into()));
    }

    pub fn is_safe(&self) -> bool {
        !self.issues.iter().any(|i| matches!(i, ValidationIssue::Error(_)))
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| matches!(i, ValidationIssue::Warning(_)))
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::Error(msg) => Some(msg.as_str()),
            ValidationIssue::Warning(_) => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().filter_map(|issue| match issue {
            ValidationIssue::Warning(msg) => Some(msg.as_str()),
            ValidationIssue::Error(_) => None,
        })
    }

    /// Writes every issue to the log.
    pub fn log_summary(&self) {
        if self.is_safe() && !self.has_warnings() {
            log::info!("Graph validation passed.");
            return;
        }

        for issue in &self.issues {
            match issue {
                ValidationIssue::Error(msg) => log::error!("Validation error: {}", msg),
                ValidationIssue::Warning(msg) => log::warn!("Validation warning: {}", msg),
            }
        }
    }
}

impl Graph {
    /// Checks the graph for cycles and for nodes that are bound to fail.
    pub fn validate(&self) -> ValidationResult {
        self.validate_with_max_count(EngineConfig::default().max_image_count)
    }

    /// Like [`Graph::validate`], with an explicit upper bound for image counts.
    pub fn validate_with_max_count(&self, max_image_count: u32) -> ValidationResult {
        let mut result = ValidationResult::new();

        let cyclic = self.cyclic_nodes();
        if !cyclic.is_empty() {
            result.add_error(format!(
                "Cycle detected; these nodes can never become ready: {}",
                cyclic.join(", ")
            ));
        }

        for node in self.nodes() {
            let id = node.id();
            match node.data() {
                NodeData::ImageSource { media } | NodeData::VideoSource { media }
                    if media.as_deref().map_or(true, |m| m.trim().is_empty()) =>
                {
                    result.add_warning(format!("Node '{}' ({}) has no media attached.", id, node.kind()));
                }
                NodeData::Generator(config) => {
                    let has_text = !config.prompt.trim().is_empty()
                        || !config.agent_instruction.trim().is_empty()
                        || self.has_text_upstream(id);
                    if !has_text {
                        result.add_warning(format!(
                            "Generator '{}' has no prompt, no agent instruction and no text input.",
                            id
                        ));
                    }
                    if config.count == 0 || config.count > max_image_count {
                        result.add_warning(format!(
                            "Generator '{}' requests {} image(s); it will be clamped to 1..={}.",
                            id, config.count, max_image_count
                        ));
                    }
                }
                NodeData::OutputSink if self.incoming(id).is_empty() => {
                    result.add_warning(format!("Output '{}' has no input and will show no data.", id));
                }
                _ => {}
            }
        }

        result
    }

    /// Nodes left over by Kahn's algorithm, in insertion order.
    fn cyclic_nodes(&self) -> Vec<NodeId> {
        let mut in_degree: HashMap<&str, usize> =
            self.node_ids().map(|id| (id.as_str(), 0)).collect();
        for node_id in self.node_ids() {
            for _ in self.sources_of(node_id) {
                *in_degree.entry(node_id.as_str()).or_default() += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();
        while let Some(id) = queue.pop_front() {
            for consumer in self.consumers_of(id) {
                if let Some(degree) = in_degree.get_mut(consumer) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(consumer);
                    }
                }
            }
        }

        self.node_ids()
            .filter(|id| in_degree.get(id.as_str()).is_some_and(|degree| *degree > 0))
            .cloned()
            .collect()
    }

    /// Whether a text value can reach `id` through its direct inputs.
    fn has_text_upstream(&self, id: &str) -> bool {
        self.sources_of(id).into_iter().any(|source| {
            let Some(node) = self.node(source) else {
                return false;
            };
            match node.data() {
                NodeData::TextSource { text } => {
                    matches!(InputValue::from_shape(text), InputValue::Text(ref t) if !t.trim().is_empty())
                }
                NodeData::Generator(config) => config.mode == GeneratorMode::Agent,
                _ => false,
            }
        })
    }
}
