use async_trait::async_trait;

use crate::capability::VideoRequest;
use crate::core::error::EngineError;
use crate::core::executors::prompt::combined_prompt;
use crate::core::executors::{reference_images, ExecutionContext, NodeExecutor, ResolvedInput};
use crate::core::graph::{GeneratorConfig, NodeResult};

/// Delimiter that starts a new scenario block in a video prompt.
pub const SCENARIO_DELIMITER: &str = "Style:";

/// Splits a video prompt into scenario blocks.
///
/// With two or more `Style:` delimiters, each delimiter starts a block and
/// text before the first one is shared context prepended to every block.
/// At most `max` blocks are kept. Otherwise the whole prompt is a single
/// scenario.
///
/// This is a content-format heuristic over free text, not a structural
/// guarantee.
pub fn split_scenarios(prompt: &str, max: usize) -> Vec<String> {
    let starts: Vec<usize> = prompt
        .match_indices(SCENARIO_DELIMITER)
        .map(|(index, _)| index)
        .collect();

    if starts.len() < 2 {
        return vec![prompt.trim().to_string()];
    }

    let preamble = prompt[..starts[0]].trim();
    let mut blocks: Vec<String> = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(prompt.len());
            prompt[start..end].trim()
        })
        .filter(|block| !block.is_empty())
        .map(|block| {
            if preamble.is_empty() {
                block.to_string()
            } else {
                format!("{}\n{}", preamble, block)
            }
        })
        .collect();

    let max = max.max(1);
    if blocks.len() > max {
        log::warn!(
            "Video prompt has {} scenarios; only the first {} are rendered.",
            blocks.len(),
            max
        );
        blocks.truncate(max);
    }
    blocks
}

/// Video generator: one sequential `GenerateVideo` call per scenario.
pub struct VideoGeneratorExecutor<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> VideoGeneratorExecutor<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeExecutor for VideoGeneratorExecutor<'_> {
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

        let scenarios = split_scenarios(&prompt, ctx.config.max_scenarios);
        let refs = reference_images(inputs);
        let model_id = self
            .config
            .model_id
            .clone()
            .unwrap_or_else(|| ctx.config.default_video_model.clone());
        let duration_seconds = self
            .config
            .duration_seconds
            .unwrap_or(ctx.config.default_video_duration_secs);

        let total = scenarios.len();
        let mut urls = Vec::with_capacity(total);
        for (i, scenario) in scenarios.into_iter().enumerate() {
            log::debug!("Video scenario {}/{} for node {}", i + 1, total, ctx.node_id);
            let request = VideoRequest {
                prompt: scenario,
                reference_images: refs.clone(),
                model_id: model_id.clone(),
                aspect_ratio: self.config.aspect_ratio.clone(),
                resolution: self.config.resolution.clone(),
                duration_seconds,
            };

            let url = ctx
                .capability
                .generate_video(request)
                .await
                .and_then(|response| response.into_url("GenerateVideo"))
                .map_err(|source| EngineError::capability(ctx.node_id, source))?;

            urls.push(url);
            ctx.progress(NodeResult::Video(urls.clone()), urls.len(), total);
        }

        Ok(NodeResult::Video(urls))
    }
}
