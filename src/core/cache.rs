use crate::core::graph::{Node, NodeResult};

/// Decides whether a node's stored result may stand in for a fresh run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReusePolicy {
    /// "Run all": every node is recomputed.
    Bypass,
    /// Single-node run: upstream nodes with a valid result are reused,
    /// the target itself always runs.
    ReuseUpstream { target: String },
}

impl ReusePolicy {
    pub fn for_target(target: Option<&str>) -> Self {
        match target {
            Some(target) => ReusePolicy::ReuseUpstream {
                target: target.to_string(),
            },
            None => ReusePolicy::Bypass,
        }
    }

    /// Returns the stored result of `node` if it can be reused.
    pub fn reusable(&self, node: &Node) -> Option<NodeResult> {
        match self {
            ReusePolicy::Bypass => None,
            ReusePolicy::ReuseUpstream { target } if target == node.id() => None,
            ReusePolicy::ReuseUpstream { .. } => {
                is_valid(node).then(|| node.result().clone())
            }
        }
    }
}

/// A stored result is valid when it is non-empty and of the type the node
/// declares.
pub fn is_valid(node: &Node) -> bool {
    let result = node.result();
    !result.is_empty()
        && result.result_type().is_some()
        && result.result_type() == node.data().declared_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::{GeneratorConfig, NodeData};

    fn generated(id: &str) -> Node {
        Node::new(id, GeneratorConfig::image()).with_result(NodeResult::Image(vec!["a.png".into()]))
    }

    #[test]
    fn test_bypass_never_reuses() {
        assert_eq!(ReusePolicy::Bypass.reusable(&generated("g")), None);
    }

    #[test]
    fn test_upstream_result_is_reused() {
        let policy = ReusePolicy::for_target(Some("out"));
        assert_eq!(
            policy.reusable(&generated("g")),
            Some(NodeResult::Image(vec!["a.png".into()]))
        );
    }

    #[test]
    fn test_target_is_never_reused() {
        let policy = ReusePolicy::for_target(Some("g"));
        assert_eq!(policy.reusable(&generated("g")), None);
    }

    #[test]
    fn test_mismatched_or_empty_result_is_invalid() {
        let wrong_type =
            Node::new("g", GeneratorConfig::video()).with_result(NodeResult::Image(vec!["a.png".into()]));
        assert!(!is_valid(&wrong_type));

        let empty = Node::new("t", NodeData::text("x")).with_result(NodeResult::Text("  ".into()));
        assert!(!is_valid(&empty));

        let sink = Node::new("o", NodeData::OutputSink).with_result(NodeResult::Text("shown".into()));
        assert!(!is_valid(&sink));
    }
}
