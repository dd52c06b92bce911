use async_trait::async_trait;

use crate::core::error::EngineError;
use crate::core::executors::{ExecutionContext, NodeExecutor, ResolvedInput};
use crate::core::graph::{NodeResult, ResultType};

/// Displays the first connected input verbatim.
pub struct OutputSinkExecutor;

#[async_trait]
impl NodeExecutor for OutputSinkExecutor {
    async fn execute(
        &self,
        ctx: &ExecutionContext<'_>,
        inputs: &[ResolvedInput],
    ) -> Result<NodeResult, EngineError> {
        let Some(first) = inputs.first() else {
            log::debug!("Output {} has no input", ctx.node_id);
            return Ok(NodeResult::None);
        };

        Ok(match &first.result {
            NodeResult::Text(text) => match ResultType::classify(text) {
                ResultType::Image => NodeResult::Image(vec![text.trim().to_string()]),
                ResultType::Video => NodeResult::Video(vec![text.trim().to_string()]),
                ResultType::Text => NodeResult::Text(text.clone()),
            },
            other => other.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::core::events::MemoryObserver;
    use crate::core::executors::testing::{image_input, run, text_input, ScriptedCapability};
    use crate::core::executors::ResolvedInput;
    use crate::core::graph::{NodeData, NodeResult};

    #[tokio::test]
    async fn test_no_input_is_no_data() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let result = run(&NodeData::OutputSink, &[], &capability, &observer)
            .await
            .unwrap();
        assert_eq!(result, NodeResult::None);
    }

    #[tokio::test]
    async fn test_first_input_is_shown_verbatim() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();
        let images = ResolvedInput::new(
            "gen",
            "input_1",
            NodeResult::Image(vec!["a.png".into(), "b.png".into()]),
        );

        let result = run(
            &NodeData::OutputSink,
            &[images, text_input("t", "ignored")],
            &capability,
            &observer,
        )
        .await
        .unwrap();
        assert_eq!(result, NodeResult::Image(vec!["a.png".into(), "b.png".into()]));
    }

    #[tokio::test]
    async fn test_text_is_classified_by_shape() {
        let capability = ScriptedCapability::new();
        let observer = MemoryObserver::new();

        let shown = run(
            &NodeData::OutputSink,
            &[text_input("t", "data:image/png;base64,AAAA")],
            &capability,
            &observer,
        )
        .await
        .unwrap();
        assert_eq!(shown, NodeResult::Image(vec!["data:image/png;base64,AAAA".into()]));

        let shown = run(
            &NodeData::OutputSink,
            &[text_input("t", "a long prompt")],
            &capability,
            &observer,
        )
        .await
        .unwrap();
        assert_eq!(shown, NodeResult::Text("a long prompt".into()));

        let shown = run(&NodeData::OutputSink, &[image_input("i", "x.png")], &capability, &observer)
            .await
            .unwrap();
        assert_eq!(shown, NodeResult::Image(vec!["x.png".into()]));
    }
}
