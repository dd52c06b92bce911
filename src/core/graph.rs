//! In-memory graph model: nodes, typed input slots, and stored results.
//!
//! The [`Graph`] is owned by the caller. The engine borrows it mutably for a
//! single run and writes each node's [`NodeResult`] back into it.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::error::GraphError;

/// Opaque node identity, unique within a graph.
pub type NodeId = String;

/// Slot used by [`Graph::connect`] when no slot name is given.
pub const DEFAULT_SLOT: &str = "input_1";

/// The coarse kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    TextSource,
    ImageSource,
    VideoSource,
    Generator,
    OutputSink,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::TextSource => "text_source",
            NodeKind::ImageSource => "image_source",
            NodeKind::VideoSource => "video_source",
            NodeKind::Generator => "generator",
            NodeKind::OutputSink => "output_sink",
        }
    }

    /// Whether other nodes may consume this node's output.
    pub fn has_output(&self) -> bool {
        !matches!(self, NodeKind::OutputSink)
    }

    /// Whether this node accepts incoming edges.
    pub fn has_inputs(&self) -> bool {
        matches!(self, NodeKind::Generator | NodeKind::OutputSink)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a generator node produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    #[default]
    Image,
    Video,
    /// Prompt rewriting. Older editors call this output type "prompt".
    #[serde(alias = "prompt")]
    Agent,
}

/// Layout applied to an agent's rewritten prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Paragraph,
    List,
}

/// Configuration carried by a generator node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneratorConfig {
    #[serde(alias = "outputType")]
    pub mode: GeneratorMode,
    pub model_id: Option<String>,
    pub prompt: String,
    #[serde(alias = "agentPrompt")]
    pub agent_instruction: String,
    pub style: Option<String>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    /// Number of images to request. Clamped to `1..=max` at execution time.
    pub count: u32,
    pub duration_seconds: Option<u32>,
    pub output_format: OutputFormat,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Image,
            model_id: None,
            prompt: String::new(),
            agent_instruction: String::new(),
            style: None,
            aspect_ratio: None,
            resolution: None,
            count: 1,
            duration_seconds: None,
            output_format: OutputFormat::Paragraph,
        }
    }
}

impl GeneratorConfig {
    pub fn new(mode: GeneratorMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn image() -> Self {
        Self::new(GeneratorMode::Image)
    }

    pub fn video() -> Self {
        Self::new(GeneratorMode::Video)
    }

    pub fn agent() -> Self {
        Self::new(GeneratorMode::Agent)
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn agent_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.agent_instruction = instruction.into();
        self
    }

    pub fn model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(aspect_ratio.into());
        self
    }

    pub fn resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = Some(resolution.into());
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    pub fn duration_seconds(mut self, seconds: u32) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// The image count actually requested, clamped to `1..=max`.
    pub fn effective_count(&self, max: u32) -> u32 {
        self.count.clamp(1, max.max(1))
    }
}

/// Kind-specific node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    TextSource { text: String },
    ImageSource { media: Option<String> },
    VideoSource { media: Option<String> },
    Generator(GeneratorConfig),
    OutputSink,
}

impl NodeData {
    pub fn text(text: impl Into<String>) -> Self {
        NodeData::TextSource { text: text.into() }
    }

    pub fn image(media: impl Into<String>) -> Self {
        NodeData::ImageSource {
            media: Some(media.into()),
        }
    }

    pub fn video(media: impl Into<String>) -> Self {
        NodeData::VideoSource {
            media: Some(media.into()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::TextSource { .. } => NodeKind::TextSource,
            NodeData::ImageSource { .. } => NodeKind::ImageSource,
            NodeData::VideoSource { .. } => NodeKind::VideoSource,
            NodeData::Generator(_) => NodeKind::Generator,
            NodeData::OutputSink => NodeKind::OutputSink,
        }
    }

    /// The result type a successful execution of this node produces.
    ///
    /// Output sinks mirror whatever they receive, so they declare none.
    pub fn declared_result(&self) -> Option<ResultType> {
        match self {
            NodeData::TextSource { .. } => Some(ResultType::Text),
            NodeData::ImageSource { .. } => Some(ResultType::Image),
            NodeData::VideoSource { .. } => Some(ResultType::Video),
            NodeData::Generator(config) => Some(match config.mode {
                GeneratorMode::Image => ResultType::Image,
                GeneratorMode::Video => ResultType::Video,
                GeneratorMode::Agent => ResultType::Text,
            }),
            NodeData::OutputSink => None,
        }
    }
}

impl From<GeneratorConfig> for NodeData {
    fn from(config: GeneratorConfig) -> Self {
        NodeData::Generator(config)
    }
}

/// Discriminant of a non-empty [`NodeResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Image,
    Video,
    Text,
}

impl ResultType {
    /// Classifies a string by shape: data URIs and common file extensions
    /// mark media, everything else is text.
    pub fn classify(value: &str) -> ResultType {
        let trimmed = value.trim();
        if trimmed.starts_with("data:image/") {
            return ResultType::Image;
        }
        if trimmed.starts_with("data:video/") {
            return ResultType::Video;
        }
        if trimmed.contains(char::is_whitespace) {
            return ResultType::Text;
        }

        let path = trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or(trimmed)
            .to_ascii_lowercase();
        const IMAGE_EXT: [&str; 7] = [".png", ".jpg", ".jpeg", ".webp", ".gif", ".bmp", ".avif"];
        const VIDEO_EXT: [&str; 5] = [".mp4", ".webm", ".mov", ".mkv", ".m4v"];

        if IMAGE_EXT.iter().any(|ext| path.ends_with(ext)) {
            ResultType::Image
        } else if VIDEO_EXT.iter().any(|ext| path.ends_with(ext)) {
            ResultType::Video
        } else {
            ResultType::Text
        }
    }
}

/// The normalized output of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "value", rename_all = "snake_case")]
pub enum NodeResult {
    Image(Vec<String>),
    Video(Vec<String>),
    Text(String),
    /// Explicit "no data" marker.
    #[default]
    None,
}

impl NodeResult {
    pub fn result_type(&self) -> Option<ResultType> {
        match self {
            NodeResult::Image(_) => Some(ResultType::Image),
            NodeResult::Video(_) => Some(ResultType::Video),
            NodeResult::Text(_) => Some(ResultType::Text),
            NodeResult::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, NodeResult::None)
    }

    /// True when the result carries no usable payload.
    pub fn is_empty(&self) -> bool {
        match self {
            NodeResult::Image(urls) | NodeResult::Video(urls) => {
                urls.iter().all(|url| url.trim().is_empty())
            }
            NodeResult::Text(text) => text.trim().is_empty(),
            NodeResult::None => true,
        }
    }

    /// Flattens the result into the values a downstream node receives.
    ///
    /// Text that is shaped like a media reference (an image data URI, a
    /// `.png` URL) is handed downstream as media.
    pub fn values(&self) -> Vec<InputValue> {
        match self {
            NodeResult::Image(urls) => urls
                .iter()
                .filter(|url| !url.trim().is_empty())
                .map(|url| InputValue::Image(url.clone()))
                .collect(),
            NodeResult::Video(urls) => urls
                .iter()
                .filter(|url| !url.trim().is_empty())
                .map(|url| InputValue::Video(url.clone()))
                .collect(),
            NodeResult::Text(text) if text.trim().is_empty() => Vec::new(),
            NodeResult::Text(text) => vec![InputValue::from_shape(text)],
            NodeResult::None => Vec::new(),
        }
    }
}

/// A single resolved upstream value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputValue {
    Text(String),
    Image(String),
    Video(String),
}

impl InputValue {
    pub fn from_shape(value: &str) -> Self {
        match ResultType::classify(value) {
            ResultType::Image => InputValue::Image(value.trim().to_string()),
            ResultType::Video => InputValue::Video(value.trim().to_string()),
            ResultType::Text => InputValue::Text(value.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InputValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&str> {
        match self {
            InputValue::Image(url) => Some(url),
            _ => None,
        }
    }
}

/// A node together with its stored result.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    data: NodeData,
    result: NodeResult,
    reused: bool,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, data: impl Into<NodeData>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            result: NodeResult::None,
            reused: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn result(&self) -> &NodeResult {
        &self.result
    }

    /// Whether the last run served this node from its stored result.
    pub fn was_reused(&self) -> bool {
        self.reused
    }

    /// Seeds a stored result, e.g. when restoring a saved canvas.
    pub fn with_result(mut self, result: NodeResult) -> Self {
        self.result = result;
        self
    }

    pub(crate) fn set_result(&mut self, result: NodeResult) {
        self.result = result;
    }

    pub(crate) fn clear_result(&mut self) {
        self.result = NodeResult::None;
        self.reused = false;
    }

    pub(crate) fn set_reused(&mut self, reused: bool) {
        self.reused = reused;
    }
}

/// A directed connection from one node's output into a named input slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default = "default_slot")]
    pub slot: String,
}

fn default_slot() -> String {
    DEFAULT_SLOT.to_string()
}

/// Sort key of a slot name: prefix, numeric suffix, then the raw name.
fn slot_order(slot: &str) -> (&str, Option<u64>, &str) {
    let prefix = slot.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = slot[prefix.len()..].parse().ok();
    (prefix, number, slot)
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, slot: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            slot: slot.into(),
        }
    }
}

/// The node/edge collection addressed by node id.
///
/// Node iteration order is insertion order, which also fixes the execution
/// order among nodes that become ready in the same pass.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        match self.index.get(id) {
            Some(&i) => self.nodes.get_mut(i),
            None => None,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|node| &node.id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Adds a node. Ids must be unique.
    pub fn add_node(
        &mut self,
        id: impl Into<NodeId>,
        data: impl Into<NodeData>,
    ) -> Result<&mut Node, GraphError> {
        self.insert(Node::new(id, data))
    }

    /// Adds a fully built node, keeping any result it already carries.
    pub fn insert(&mut self, node: Node) -> Result<&mut Node, GraphError> {
        if self.index.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let position = self.nodes.len();
        self.index.insert(node.id.clone(), position);
        self.nodes.push(node);
        Ok(&mut self.nodes[position])
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let position = self.index.remove(id)?;
        let node = self.nodes.remove(position);
        self.edges.retain(|edge| edge.from != id && edge.to != id);
        for (i, node) in self.nodes.iter().enumerate().skip(position) {
            self.index.insert(node.id.clone(), i);
        }
        Some(node)
    }

    /// Connects `from`'s output into `to`'s default input slot.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        self.connect_slot(from, to, DEFAULT_SLOT)
    }

    /// Connects `from`'s output into the named input slot of `to`.
    pub fn connect_slot(&mut self, from: &str, to: &str, slot: &str) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop(from.to_string()));
        }
        let source = self
            .node(from)
            .ok_or_else(|| GraphError::UnknownNode(from.to_string()))?;
        let target = self
            .node(to)
            .ok_or_else(|| GraphError::UnknownNode(to.to_string()))?;

        if !source.kind().has_output() {
            return Err(GraphError::NoOutputPort {
                node_id: from.to_string(),
                kind: source.kind(),
            });
        }
        if !target.kind().has_inputs() {
            return Err(GraphError::NoInputPort {
                node_id: to.to_string(),
                kind: target.kind(),
            });
        }

        let edge = Edge::new(from, to, slot);
        if self.edges.contains(&edge) {
            log::warn!("Edge {} -> {} ({}) already exists, ignoring.", from, to, slot);
            return Ok(());
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Removes every edge from `from` into `to`. Returns whether any existed.
    pub fn disconnect(&mut self, from: &str, to: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| !(edge.from == from && edge.to == to));
        before != self.edges.len()
    }

    /// Incoming edges of `id`, grouped by slot, then in insertion order.
    ///
    /// Slots sharing a prefix are ordered by their numeric suffix, so
    /// `input_2` comes before `input_10`.
    pub fn incoming(&self, id: &str) -> Vec<&Edge> {
        let mut incoming: Vec<&Edge> = self.edges.iter().filter(|edge| edge.to == id).collect();
        // stable: keeps insertion order inside a slot
        incoming.sort_by(|a, b| slot_order(&a.slot).cmp(&slot_order(&b.slot)));
        incoming
    }

    /// Distinct source nodes feeding `id`.
    pub fn sources_of(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.incoming(id)
            .into_iter()
            .map(|edge| edge.from.as_str())
            .filter(|source| seen.insert(*source))
            .collect()
    }

    /// Distinct nodes consuming `id`'s output.
    pub fn consumers_of(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|edge| edge.from == id)
            .map(|edge| edge.to.as_str())
            .filter(|consumer| seen.insert(*consumer))
            .collect()
    }

    /// Replaces a node's configuration. The stored result no longer matches
    /// the data, so it is cleared.
    pub fn update_data(&mut self, id: &str, data: impl Into<NodeData>) -> Result<(), GraphError> {
        let data = data.into();
        let current = self
            .node(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?
            .kind();
        let next = data.kind();

        let ports_change =
            current.has_output() != next.has_output() || current.has_inputs() != next.has_inputs();
        if ports_change && self.edges.iter().any(|edge| edge.from == id || edge.to == id) {
            return Err(GraphError::IncompatibleData {
                node_id: id.to_string(),
                from: current,
                to: next,
            });
        }

        if let Some(node) = self.node_mut(id) {
            node.data = data;
            node.clear_result();
        }
        Ok(())
    }

    /// Clears the stored result of `id` and of every node downstream of it.
    ///
    /// Returns the ids that were invalidated, starting with `id`.
    pub fn invalidate(&mut self, id: &str) -> Result<Vec<NodeId>, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::UnknownNode(id.to_string()));
        }

        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for consumer in self.consumers_of(&current) {
                queue.push_back(consumer.to_string());
            }
            order.push(current);
        }

        for node_id in &order {
            if let Some(node) = self.node_mut(node_id) {
                node.clear_result();
            }
        }
        Ok(order)
    }

    /// Clears every stored result.
    pub fn clear_results(&mut self) {
        for node in &mut self.nodes {
            node.clear_result();
        }
    }
}
