use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::capability::{GenerationCapability, ImageRequest};
use crate::core::error::EngineError;
use crate::core::executors::prompt::combined_prompt;
use crate::core::executors::{reference_images, ExecutionContext, NodeExecutor, ResolvedInput};
use crate::core::graph::{GeneratorConfig, NodeResult};

/// Image generator: `count` sequential `GenerateImage` calls.
pub struct ImageGeneratorExecutor<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> ImageGeneratorExecutor<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    fn request(&self, ctx: &ExecutionContext<'_>, prompt: String, refs: Vec<String>) -> ImageRequest {
        ImageRequest {
            prompt,
            reference_images: refs,
            model_id: self
                .config
                .model_id
                .clone()
                .unwrap_or_else(|| ctx.config.default_image_model.clone()),
            style: self.config.style.clone(),
            aspect_ratio: self.config.aspect_ratio.clone(),
            resolution: self.config.resolution.clone(),
        }
    }
}

#[async_trait]
impl NodeExecutor for ImageGeneratorExecutor<'_> {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError> {
        let prompt = combined_prompt(self.config, inputs);
        if prompt.is_empty() {
            return Err(EngineError::EmptyPrompt {
                node_id: ctx.node_id.to_string(),
            });
        }

        let count = self.config.effective_count(ctx.config.max_image_count);
        if count != self.config.count {
            log::warn!(
                "Node {} requested {} image(s); using {}.",
                ctx.node_id,
                self.config.count,
                count
            );
        }

        let request = self.request(ctx, prompt, reference_images(inputs));
        let capability: &dyn GenerationCapability = ctx.capability;
        let request = &request;

        // One request at a time; the first failure stops the rest.
        let urls: Vec<String> = stream::iter(1..=count)
            .then(move |n| async move {
                log::debug!("Image request {}/{} ({})", n, count, request.model_id);
                capability
                    .generate_image(request.clone())
                    .await
                    .and_then(|response| response.into_url("GenerateImage"))
            })
            .try_collect()
            .await
            .map_err(|source| EngineError::capability(ctx.node_id, source))?;

        Ok(NodeResult::Image(urls))
    }
}
