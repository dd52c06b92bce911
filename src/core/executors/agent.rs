use async_trait::async_trait;

use crate::capability::{MediaTypeHint, RewriteRequest};
use crate::core::error::EngineError;
use crate::core::executors::{input_texts, reference_images, ExecutionContext, NodeExecutor, ResolvedInput};
use crate::core::graph::{GeneratorConfig, NodeResult, OutputFormat};

/// Single words that mark video-production language.
const VIDEO_WORDS: [&str; 22] = [
    "video", "camera", "scene", "scenes", "dialogue", "pan", "panning", "tilt", "zoom", "dolly",
    "tracking", "footage", "shot", "shots", "cinematography", "timelapse", "motion", "animation",
    "animated", "clip", "fps", "cut",
];

/// Multi-word phrases that mark video-production language.
const VIDEO_PHRASES: [&str; 5] = [
    "slow motion",
    "camera movement",
    "cut to",
    "frame rate",
    "fade in",
];

/// Infers whether the texts describe a video rather than a still image.
pub fn media_hint<S: AsRef<str>>(texts: &[S]) -> MediaTypeHint {
    let combined = texts
        .iter()
        .map(|text| text.as_ref().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let has_word = combined
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| VIDEO_WORDS.contains(&word));
    let has_phrase = VIDEO_PHRASES.iter().any(|phrase| combined.contains(phrase));

    if has_word || has_phrase {
        MediaTypeHint::Video
    } else {
        MediaTypeHint::Image
    }
}

/// Reformats text as a "- " bullet per non-empty line.
pub fn to_bullet_list(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.starts_with("- ") {
                line.to_string()
            } else {
                format!("- {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt agent: rewrites its subject through `RewritePrompt`.
pub struct PromptAgentExecutor<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> PromptAgentExecutor<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl NodeExecutor for PromptAgentExecutor<'_> {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError> {
        let texts: Vec<String> = input_texts(inputs)
            .into_iter()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();

        // The node's own prompt is the subject; otherwise the first upstream text.
        let own = self.config.prompt.trim();
        let (subject, secondary): (String, &[String]) = if !own.is_empty() {
            (own.to_string(), texts.as_slice())
        } else {
            match texts.split_first() {
                Some((first, rest)) => (first.clone(), rest),
                None => (String::new(), &[][..]),
            }
        };

        // Reference images alone do not make a prompt.
        let instruction = self.config.agent_instruction.trim();
        if subject.is_empty() && instruction.is_empty() {
            return Err(EngineError::EmptyPrompt {
                node_id: ctx.node_id.to_string(),
            });
        }
        let refs = reference_images(inputs);

        let mut hint_texts = vec![instruction, subject.as_str()];
        hint_texts.extend(secondary.iter().map(String::as_str));
        let media_type = media_hint(&hint_texts);

        let request = RewriteRequest {
            subject,
            secondary_text: secondary.join("\n"),
            reference_images: refs,
            agent_instruction: instruction.to_string(),
            model_id: self
                .config
                .model_id
                .clone()
                .unwrap_or_else(|| ctx.config.default_prompt_model.clone()),
            aspect_ratio: self.config.aspect_ratio.clone(),
            resolution: self.config.resolution.clone(),
            media_type,
        };
        log::debug!(
            "Rewriting prompt for node {} as {} prompt",
            ctx.node_id,
            media_type.as_str()
        );

        let prompt = ctx
            .capability
            .rewrite_prompt(request)
            .await
            .and_then(|response| response.into_prompt())
            .map_err(|source| EngineError::capability(ctx.node_id, source))?;

        Ok(NodeResult::Text(match self.config.output_format {
            OutputFormat::List => to_bullet_list(&prompt),
            OutputFormat::Paragraph => prompt,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::MemoryObserver;
    use crate::core::executors::testing::{image_input, run, text_input, ScriptedCapability};
    use crate::core::graph::NodeData;

    #[test]
    fn test_media_hint_keywords() {
        assert_eq!(media_hint(&["a slow dolly shot through a forest"]), MediaTypeHint::Video);
        assert_eq!(media_hint(&["Camera pans left"]), MediaTypeHint::Video);
        assert_eq!(media_hint(&["Two characters in DIALOGUE"]), MediaTypeHint::Video);
        assert_eq!(media_hint(&["a panel of pancakes"]), MediaTypeHint::Image);
        assert_eq!(media_hint(&["studio portrait, soft light"]), MediaTypeHint::Image);
    }

    #[test]
    fn test_bullet_list_format() {
        assert_eq!(
            to_bullet_list("first\n\n- second\n  third  "),
            "- first\n- second\n- third"
        );
    }

    #[tokio::test]
    async fn test_own_prompt_is_subject_and_upstream_is_secondary() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(
            GeneratorConfig::agent()
                .prompt("a knight")
                .agent_instruction("make it epic"),
        );

        let result = run(
            &data,
            &[text_input("a", "armor"), text_input("b", "castle"), image_input("i", "ref.png")],
            &capability,
            &observer,
        )
        .await
        .unwrap();

        assert_eq!(result, NodeResult::Text("rewritten: a knight".into()));
        let requests = capability.rewrites.lock().unwrap();
        assert_eq!(requests[0].subject, "a knight");
        assert_eq!(requests[0].secondary_text, "armor\ncastle");
        assert_eq!(requests[0].agent_instruction, "make it epic");
        assert_eq!(requests[0].reference_images, vec!["ref.png".to_string()]);
        assert_eq!(requests[0].media_type, MediaTypeHint::Image);
        assert_eq!(requests[0].model_id, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn test_first_upstream_text_is_fallback_subject() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(GeneratorConfig::agent());

        run(
            &data,
            &[text_input("a", "opening scene in a bar"), text_input("b", "neon")],
            &capability,
            &observer,
        )
        .await
        .unwrap();

        let requests = capability.rewrites.lock().unwrap();
        assert_eq!(requests[0].subject, "opening scene in a bar");
        assert_eq!(requests[0].secondary_text, "neon");
        assert_eq!(requests[0].media_type, MediaTypeHint::Video);
    }

    #[tokio::test]
    async fn test_list_output_format() {
        let capability = ScriptedCapability::answering("red hair\ngreen coat");
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(
            GeneratorConfig::agent()
                .prompt("a character")
                .output_format(OutputFormat::List),
        );

        let result = run(&data, &[], &capability, &observer).await.unwrap();
        assert_eq!(result, NodeResult::Text("- red hair\n- green coat".into()));
    }

    #[tokio::test]
    async fn test_nothing_to_rewrite_is_empty_prompt() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(GeneratorConfig::agent());

        let err = run(&data, &[], &capability, &observer).await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyPrompt { .. }));
        assert!(capability.rewrites.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_images_without_text_are_empty_prompt() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(GeneratorConfig::agent());

        let err = run(&data, &[image_input("i", "ref.png")], &capability, &observer)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyPrompt { node_id } if node_id == "node"));
        assert!(capability.rewrites.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_instruction_alone_is_rewritten_with_images() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let data = NodeData::Generator(GeneratorConfig::agent().agent_instruction("describe the photo"));

        run(&data, &[image_input("i", "ref.png")], &capability, &observer)
            .await
            .unwrap();
        let requests = capability.rewrites.lock().unwrap();
        assert_eq!(requests[0].subject, "");
        assert_eq!(requests[0].agent_instruction, "describe the photo");
        assert_eq!(requests[0].reference_images, vec!["ref.png".to_string()]);
    }
}
