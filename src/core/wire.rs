//! JSON document form of a graph, as saved by the canvas editor.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "1", "kind": "text_source", "data": { "text": "a cat" } },
//!     { "id": "2", "kind": "generator", "data": { "mode": "image", "count": 2 } }
//!   ],
//!   "edges": [ { "from": "1", "to": "2", "slot": "input_1" } ]
//! }
//! ```
//!
//! Older editors used other kind names; those are accepted on read and
//! written back in the current form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::error::GraphError;
use crate::core::graph::{Edge, GeneratorConfig, GeneratorMode, Graph, Node, NodeData, NodeKind, NodeResult};

#[derive(Debug, Serialize, Deserialize)]
struct WireGraph {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNode {
    id: String,
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "NodeResult::is_none")]
    result: NodeResult,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct TextData {
    text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct MediaData {
    #[serde(alias = "imageBase64", alias = "videoUrl")]
    media: Option<String>,
}

/// `Value::Null` (a missing `data` field) reads as an empty object.
fn parse<T: for<'de> Deserialize<'de> + Default>(data: Value) -> Result<T, serde_json::Error> {
    match data {
        Value::Null => Ok(T::default()),
        data => serde_json::from_value(data),
    }
}

fn generator(data: Value, forced: Option<GeneratorMode>) -> Result<NodeData, serde_json::Error> {
    let mut config: GeneratorConfig = parse(data)?;
    if let Some(mode) = forced {
        config.mode = mode;
    }
    Ok(NodeData::Generator(config))
}

/// Current and legacy kind names. Legacy generator kinds also fix the mode.
fn kind_alias(kind: &str) -> Option<(NodeKind, Option<GeneratorMode>)> {
    let alias = match kind {
        "text_source" | "text_input" => (NodeKind::TextSource, None),
        "image_source" | "image_input" => (NodeKind::ImageSource, None),
        "video_source" | "video_input" => (NodeKind::VideoSource, None),
        "generator" => (NodeKind::Generator, None),
        "prompt_gen" => (NodeKind::Generator, Some(GeneratorMode::Agent)),
        "image_gen" | "base_gen" | "modifier" => (NodeKind::Generator, Some(GeneratorMode::Image)),
        "video_gen" => (NodeKind::Generator, Some(GeneratorMode::Video)),
        "output_sink" | "output_result" => (NodeKind::OutputSink, None),
        _ => return None,
    };
    Some(alias)
}

fn node_data(id: &str, kind: &str, data: Value) -> Result<NodeData, GraphError> {
    let (kind, forced) = kind_alias(kind).ok_or_else(|| GraphError::UnknownKind {
        node_id: id.to_string(),
        kind: kind.to_string(),
    })?;

    Ok(match kind {
        NodeKind::TextSource => NodeData::TextSource {
            text: parse::<TextData>(data)?.text,
        },
        NodeKind::ImageSource => NodeData::ImageSource {
            media: parse::<MediaData>(data)?.media,
        },
        NodeKind::VideoSource => NodeData::VideoSource {
            media: parse::<MediaData>(data)?.media,
        },
        NodeKind::Generator => generator(data, forced)?,
        NodeKind::OutputSink => NodeData::OutputSink,
    })
}

fn wire_data(data: &NodeData) -> Result<Value, serde_json::Error> {
    match data {
        NodeData::TextSource { text } => serde_json::to_value(TextData { text: text.clone() }),
        NodeData::ImageSource { media } | NodeData::VideoSource { media } => {
            serde_json::to_value(MediaData {
                media: media.clone(),
            })
        }
        NodeData::Generator(config) => serde_json::to_value(config),
        NodeData::OutputSink => Ok(Value::Object(Default::default())),
    }
}

impl Graph {
    /// Reads a graph document. Stored results are kept, so a saved canvas
    /// can be reopened and run incrementally.
    pub fn from_json(json: &str) -> Result<Graph, GraphError> {
        let wire: WireGraph = serde_json::from_str(json)?;
        Self::from_wire(wire)
    }

    pub fn from_value(value: Value) -> Result<Graph, GraphError> {
        let wire: WireGraph = serde_json::from_value(value)?;
        Self::from_wire(wire)
    }

    fn from_wire(wire: WireGraph) -> Result<Graph, GraphError> {
        let mut graph = Graph::new();
        for node in wire.nodes {
            let data = node_data(&node.id, &node.kind, node.data)?;
            graph.insert(Node::new(node.id, data).with_result(node.result))?;
        }
        for edge in &wire.edges {
            graph.connect_slot(&edge.from, &edge.to, &edge.slot)?;
        }
        log::debug!(
            "Loaded graph with {} node(s) and {} edge(s)",
            graph.len(),
            graph.edges().len()
        );
        Ok(graph)
    }

    pub fn to_value(&self) -> Result<Value, GraphError> {
        let nodes = self
            .nodes()
            .map(|node| -> Result<WireNode, serde_json::Error> {
                Ok(WireNode {
                    id: node.id().to_string(),
                    kind: node.kind().as_str().to_string(),
                    data: wire_data(node.data())?,
                    result: node.result().clone(),
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        Ok(serde_json::to_value(WireGraph {
            nodes,
            edges: self.edges().to_vec(),
        })?)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(&self.to_value()?)?)
    }
}

impl NodeKind {
    /// Parses a current or legacy kind name.
    pub fn parse(kind: &str) -> Option<NodeKind> {
        kind_alias(kind).map(|(kind, _)| kind)
    }
}
