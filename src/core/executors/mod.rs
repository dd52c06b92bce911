//! Node executors: one strategy per node kind.
//!
//! Each executor turns a node's configuration plus its resolved upstream
//! values into a [`NodeResult`], calling out to a
//! [`GenerationCapability`] where the kind needs one. The strategy is chosen
//! once per node by [`executor_for`].

pub mod agent;
pub mod image;
pub mod prompt;
pub mod sink;
pub mod source;
pub mod video;

use async_trait::async_trait;

use crate::capability::GenerationCapability;
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::events::{EventEmitter, RunEventKind};
use crate::core::graph::{GeneratorMode, InputValue, NodeData, NodeId, NodeResult, ResultType};

pub use agent::PromptAgentExecutor;
pub use image::ImageGeneratorExecutor;
pub use sink::OutputSinkExecutor;
pub use source::{MediaSourceExecutor, TextSourceExecutor};
pub use video::VideoGeneratorExecutor;

/// The result of one upstream node, as delivered through one edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInput {
    pub source: NodeId,
    pub slot: String,
    pub result: NodeResult,
}

impl ResolvedInput {
    pub fn new(source: impl Into<NodeId>, slot: impl Into<String>, result: NodeResult) -> Self {
        Self {
            source: source.into(),
            slot: slot.into(),
            result,
        }
    }
}

/// Every upstream value in edge order, flattened.
pub fn input_values(inputs: &[ResolvedInput]) -> Vec<InputValue> {
    inputs.iter().flat_map(|input| input.result.values()).collect()
}

/// Upstream text values in edge order.
pub fn input_texts(inputs: &[ResolvedInput]) -> Vec<String> {
    input_values(inputs)
        .into_iter()
        .filter_map(|value| match value {
            InputValue::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}

/// Upstream images, used as reference images. Video references are not
/// forwarded to the image-conditioned capabilities.
pub fn reference_images(inputs: &[ResolvedInput]) -> Vec<String> {
    let mut images = Vec::new();
    for value in input_values(inputs) {
        match value {
            InputValue::Image(url) => images.push(url),
            InputValue::Video(url) => {
                log::debug!("Skipping video reference {} for image conditioning", url)
            }
            InputValue::Text(_) => {}
        }
    }
    images
}

/// Everything an executor may use while running one node.
pub struct ExecutionContext<'a> {
    pub node_id: &'a str,
    pub capability: &'a dyn GenerationCapability,
    pub config: &'a EngineConfig,
    pub events: EventEmitter<'a>,
}

impl<'a> ExecutionContext<'a> {
    /// Best-effort partial output signal.
    pub fn progress(&self, partial: NodeResult, completed: usize, total: usize) {
        self.events.emit(RunEventKind::NodeProgress {
            node_id: self.node_id.to_string(),
            partial,
            completed,
            total,
        });
    }
}

/// Common contract of all node kinds.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError>;
}

/// Picks the strategy for a node's data.
pub fn executor_for(data: &NodeData) -> Box<dyn NodeExecutor + '_> {
    match data {
        NodeData::TextSource { text } => Box::new(TextSourceExecutor::new(text)),
        NodeData::ImageSource { media } => {
            Box::new(MediaSourceExecutor::new(media.as_deref(), ResultType::Image))
        }
        NodeData::VideoSource { media } => {
            Box::new(MediaSourceExecutor::new(media.as_deref(), ResultType::Video))
        }
        NodeData::Generator(config) => match config.mode {
            GeneratorMode::Image => Box::new(ImageGeneratorExecutor::new(config)),
            GeneratorMode::Video => Box::new(VideoGeneratorExecutor::new(config)),
            GeneratorMode::Agent => Box::new(PromptAgentExecutor::new(config)),
        },
        NodeData::OutputSink => Box::new(OutputSinkExecutor),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_reference_images_skip_text_and_video() {
        let inputs = vec![
            text_input("t", "hello"),
            image_input("i", "a.png"),
            ResolvedInput::new("v", "input_2", NodeResult::Video(vec!["clip.mp4".into()])),
            text_input("d", "data:image/png;base64,AAAA"),
        ];
        assert_eq!(
            reference_images(&inputs),
            vec!["a.png".to_string(), "data:image/png;base64,AAAA".to_string()]
        );
        assert_eq!(input_texts(&inputs), vec!["hello".to_string()]);
    }
}
