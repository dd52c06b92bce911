use async_trait::async_trait;

use crate::core::error::EngineError;
use crate::core::executors::{ExecutionContext, NodeExecutor, ResolvedInput};
use crate::core::graph::{NodeResult, ResultType};

/// Passes the node's literal text through.
pub struct TextSourceExecutor<'a> {
    text: &'a str,
}

impl<'a> TextSourceExecutor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }
}

#[async_trait]
impl NodeExecutor for TextSourceExecutor<'_> {
    async fn execute(
        &self,
        _ctx: &ExecutionContext<'_>,
        _inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError> {
        Ok(NodeResult::Text(self.text.trim().to_string()))
    }
}

/// Emits the media reference attached to an image or video source.
pub struct MediaSourceExecutor<'a> {
    media: Option<&'a str>,
    kind: ResultType,
}

impl<'a> MediaSourceExecutor<'a> {
    pub fn new(media: Option<&'a str>, kind: ResultType) -> Self {
        Self { media, kind }
    }
}

#[async_trait]
impl NodeExecutor for MediaSourceExecutor<'_> {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        _inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError> {
        let media = match self.media.map(str::trim) {
            Some(media) if !media.is_empty() => media.to_string(),
            _ => {
                let reason = match self.kind {
                    ResultType::Video => "video source requires an attached video",
                    _ => "image source requires an attached image",
                };
                return Err(EngineError::missing_input(ctx.node_id, reason));
            }
        };

        Ok(match self.kind {
            ResultType::Video => NodeResult::Video(vec![media]),
            _ => NodeResult::Image(vec![media]),
        })
    }
}
