//! End-to-end behaviour of the engine against a recording capability.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use canvasflow::prelude::*;
use canvasflow::{ChannelObserver, MediaTypeHint};

/// Answers every call and records the requests it saw.
/// Prompts containing "FAIL" are answered with a backend error.
#[derive(Default)]
struct RecordingCapability {
    images: Mutex<Vec<ImageRequest>>,
    videos: Mutex<Vec<VideoRequest>>,
    rewrites: Mutex<Vec<RewriteRequest>>,
}

impl RecordingCapability {
    fn image_calls(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    fn video_calls(&self) -> usize {
        self.videos.lock().unwrap().len()
    }

    fn rewrite_calls(&self) -> usize {
        self.rewrites.lock().unwrap().len()
    }

    fn total_calls(&self) -> usize {
        self.image_calls() + self.video_calls() + self.rewrite_calls()
    }
}

#[async_trait]
impl GenerationCapability for RecordingCapability {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaResponse, CapabilityError> {
        let fail = request.prompt.contains("FAIL");
        let mut images = self.images.lock().unwrap();
        images.push(request);
        if fail {
            return Ok(MediaResponse {
                url: None,
                error: Some("quota exceeded".into()),
            });
        }
        Ok(MediaResponse::url(format!("https://cdn.test/image-{}.png", images.len())))
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<MediaResponse, CapabilityError> {
        let mut videos = self.videos.lock().unwrap();
        videos.push(request);
        Ok(MediaResponse::url(format!("https://cdn.test/video-{}.mp4", videos.len())))
    }

    async fn rewrite_prompt(
        &self,
        request: RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        let prompt = format!("{} (rewritten)", request.subject);
        self.rewrites.lock().unwrap().push(request);
        Ok(PromptResponse::prompt(prompt))
    }
}

fn engine() -> (Engine, Arc<RecordingCapability>, Arc<MemoryObserver>) {
    let capability = Arc::new(RecordingCapability::default());
    let observer = Arc::new(MemoryObserver::new());
    let engine = Engine::from_arc(capability.clone()).with_observer(observer.clone());
    (engine, capability, observer)
}

/// A workflow touching every node kind, inserted out of dependency order:
///
/// ```text
/// text ──► agent ──► image ──► out_image
///   │                  ▲
///   └──────────────────┤ (slot input_1)
/// ref ─────────────────┘ (slot input_2)
/// clip, scenes ──► video ──► out_video
/// ```
fn workflow() -> Graph {
    let mut graph = Graph::new();
    graph.add_node("out_image", NodeData::OutputSink).unwrap();
    graph.add_node("image", GeneratorConfig::image().count(2)).unwrap();
    graph
        .add_node("agent", GeneratorConfig::agent().agent_instruction("cinematic portrait"))
        .unwrap();
    graph.add_node("text", NodeData::text("a red fox")).unwrap();
    graph.add_node("ref", NodeData::image("data:image/png;base64,AAAA")).unwrap();
    graph.add_node("video", GeneratorConfig::video()).unwrap();
    graph.add_node("scenes", NodeData::text("Style: anime\nStyle: claymation")).unwrap();
    graph.add_node("clip", NodeData::video("https://cdn.test/source.mp4")).unwrap();
    graph.add_node("out_video", NodeData::OutputSink).unwrap();

    graph.connect("text", "agent").unwrap();
    graph.connect("agent", "image").unwrap();
    graph.connect("text", "image").unwrap();
    graph.connect_slot("ref", "image", "input_2").unwrap();
    graph.connect("image", "out_image").unwrap();
    graph.connect("scenes", "video").unwrap();
    graph.connect_slot("clip", "video", "input_2").unwrap();
    graph.connect("video", "out_video").unwrap();
    graph
}

fn position(order: &[String]) -> HashMap<&str, usize> {
    order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect()
}

#[tokio::test]
async fn test_acyclic_run_all_completes_every_node_in_edge_order() {
    let (engine, _, _) = engine();
    let mut graph = workflow();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success(), "{:?}", report.error);
    let mut completed = report.completed.clone();
    completed.sort();
    let mut all: Vec<String> = graph.node_ids().cloned().collect();
    all.sort();
    assert_eq!(completed, all);

    let at = position(&report.completed);
    for edge in graph.edges() {
        assert!(
            at[edge.from.as_str()] < at[edge.to.as_str()],
            "{} ran after {}",
            edge.from,
            edge.to
        );
    }
}

#[tokio::test]
async fn test_cycle_fails_with_stuck_graph() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("a", GeneratorConfig::agent().prompt("left")).unwrap();
    graph.add_node("b", GeneratorConfig::agent().prompt("right")).unwrap();
    graph.add_node("t", NodeData::text("unrelated")).unwrap();
    graph.connect("a", "b").unwrap();
    graph.connect("b", "a").unwrap();

    let report = engine.run_all(&mut graph).await;

    match &report.error {
        Some(EngineError::StuckGraph { pending }) => {
            assert_eq!(pending, &vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected a stuck graph, got {:?}", other),
    }
    assert!(!report.completed.contains(&"a".to_string()));
    assert!(!report.completed.contains(&"b".to_string()));
    assert_eq!(report.completed, vec!["t"]);
    assert_eq!(capability.rewrite_calls(), 0);
    assert!(!graph.validate().is_safe());
}

#[tokio::test]
async fn test_run_node_reuses_valid_upstream_without_executing_it() {
    let (engine, capability, observer) = engine();
    let mut graph = workflow();
    engine.run_all(&mut graph).await;
    let images_before = capability.image_calls();
    let rewrites_before = capability.rewrite_calls();
    let stored = graph.node("image").unwrap().result().clone();

    let report = engine.run_node(&mut graph, "out_image").await;

    assert!(report.is_success());
    assert_eq!(report.completed, vec!["out_image"]);
    for id in ["text", "agent", "ref", "image"] {
        assert!(report.reused.contains(&id.to_string()), "{} not reused", id);
        assert!(graph.node(id).unwrap().was_reused());
    }
    assert_eq!(capability.image_calls(), images_before);
    assert_eq!(capability.rewrite_calls(), rewrites_before);
    assert_eq!(graph.node("out_image").unwrap().result(), &stored);

    // the video branch is outside the target's scope
    assert!(!report.reused.contains(&"video".to_string()));
    let reused_events = observer
        .kinds()
        .into_iter()
        .filter(|kind| matches!(kind, RunEventKind::NodeReused { .. }))
        .count();
    assert_eq!(reused_events, 4);
}

#[tokio::test]
async fn test_run_node_reexecutes_upstream_after_invalidate() {
    let (engine, capability, _) = engine();
    let mut graph = workflow();
    engine.run_all(&mut graph).await;
    let rewrites_before = capability.rewrite_calls();

    graph
        .update_data("agent", GeneratorConfig::agent().agent_instruction("watercolor"))
        .unwrap();
    graph.invalidate("agent").unwrap();
    let report = engine.run_node(&mut graph, "out_image").await;

    assert!(report.is_success());
    assert_eq!(report.reused, vec!["text", "ref"]);
    assert_eq!(report.completed, vec!["agent", "image", "out_image"]);
    assert_eq!(capability.rewrite_calls(), rewrites_before + 1);
}

#[tokio::test]
async fn test_run_all_never_reuses() {
    let (engine, capability, _) = engine();
    let mut graph = workflow();
    engine.run_all(&mut graph).await;
    let calls = capability.total_calls();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success());
    assert!(report.reused.is_empty());
    assert_eq!(report.completed.len(), graph.len());
    assert_eq!(capability.total_calls(), calls * 2);
    assert!(graph.nodes().all(|node| !node.was_reused()));
}

#[tokio::test]
async fn test_video_scenarios_issue_one_call_each() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("t", NodeData::text("Style: A\nStyle: B")).unwrap();
    graph.add_node("v", GeneratorConfig::video().count(5)).unwrap();
    graph.connect("t", "v").unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success());
    assert_eq!(capability.video_calls(), 2);
    match graph.node("v").unwrap().result() {
        NodeResult::Video(urls) => assert_eq!(urls.len(), 2),
        other => panic!("expected videos, got {:?}", other),
    }
}

#[tokio::test]
async fn test_image_count_issues_count_calls() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("t", NodeData::text("cat")).unwrap();
    graph.add_node("g", GeneratorConfig::image().count(3)).unwrap();
    graph.connect("t", "g").unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success());
    assert_eq!(capability.image_calls(), 3);
    assert!(capability
        .images
        .lock()
        .unwrap()
        .iter()
        .all(|request| request.prompt.contains("cat")));
    match graph.node("g").unwrap().result() {
        NodeResult::Image(urls) => assert_eq!(urls.len(), 3),
        other => panic!("expected images, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unconnected_output_shows_no_data() {
    let (engine, _, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("out", NodeData::OutputSink).unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success());
    assert_eq!(report.completed, vec!["out"]);
    assert_eq!(graph.node("out").unwrap().result(), &NodeResult::None);
}

#[tokio::test]
async fn test_empty_prompt_fails_before_any_call() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("ref", NodeData::image("https://cdn.test/ref.png")).unwrap();
    graph.add_node("g", GeneratorConfig::image()).unwrap();
    graph.connect_slot("ref", "g", "input_2").unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(matches!(report.error, Some(EngineError::EmptyPrompt { ref node_id }) if node_id == "g"));
    assert_eq!(report.failed_node(), Some("g"));
    assert_eq!(capability.total_calls(), 0);
}

#[tokio::test]
async fn test_agent_with_only_reference_images_is_empty_prompt() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("ref", NodeData::image("https://cdn.test/ref.png")).unwrap();
    graph.add_node("a", GeneratorConfig::agent()).unwrap();
    graph.connect_slot("ref", "a", "input_2").unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(matches!(report.error, Some(EngineError::EmptyPrompt { ref node_id }) if node_id == "a"));
    assert_eq!(report.completed, vec!["ref"]);
    assert_eq!(capability.total_calls(), 0);
    assert!(graph.node("a").unwrap().result().is_none());
}

#[tokio::test]
async fn test_failure_keeps_completed_results_and_stops() {
    let (engine, capability, observer) = engine();
    let mut graph = Graph::new();
    graph.add_node("t", NodeData::text("please FAIL")).unwrap();
    graph.add_node("g", GeneratorConfig::image().count(3)).unwrap();
    graph.add_node("out", NodeData::OutputSink).unwrap();
    graph.connect("t", "g").unwrap();
    graph.connect("g", "out").unwrap();

    let report = engine.run_all(&mut graph).await;

    match &report.error {
        Some(EngineError::Capability { node_id, source }) => {
            assert_eq!(node_id, "g");
            assert!(source.to_string().contains("quota exceeded"));
        }
        other => panic!("expected a capability error, got {:?}", other),
    }
    assert_eq!(report.completed, vec!["t"]);
    assert_eq!(capability.image_calls(), 1);
    assert_eq!(graph.node("t").unwrap().result(), &NodeResult::Text("please FAIL".into()));
    assert!(graph.node("g").unwrap().result().is_none());
    assert!(graph.node("out").unwrap().result().is_none());
    assert!(matches!(
        observer.kinds().last(),
        Some(RunEventKind::RunFinished { error: Some(_), .. })
    ));
}

#[tokio::test]
async fn test_agent_hint_and_list_format() {
    let (engine, capability, _) = engine();
    let mut graph = Graph::new();
    graph.add_node("t", NodeData::text("a slow dolly shot over a lake")).unwrap();
    graph
        .add_node(
            "a",
            GeneratorConfig::agent().output_format(OutputFormat::List),
        )
        .unwrap();
    graph.connect("t", "a").unwrap();

    let report = engine.run_all(&mut graph).await;

    assert!(report.is_success());
    let requests = capability.rewrites.lock().unwrap();
    assert_eq!(requests[0].subject, "a slow dolly shot over a lake");
    assert_eq!(requests[0].media_type, MediaTypeHint::Video);
    assert_eq!(
        graph.node("a").unwrap().result(),
        &NodeResult::Text("- a slow dolly shot over a lake (rewritten)".into())
    );
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let capability = RecordingCapability::default();
    let (observer, mut receiver) = ChannelObserver::new();
    let engine = Engine::new(capability).with_observer(Arc::new(observer));
    let mut graph = Graph::new();
    graph.add_node("t", NodeData::text("Style: A\nStyle: B")).unwrap();
    graph.add_node("v", GeneratorConfig::video()).unwrap();
    graph.connect("t", "v").unwrap();

    let report = engine.run_all(&mut graph).await;
    drop(engine);

    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        assert_eq!(event.run_id, report.run_id);
        events.push(event.kind);
    }

    let names: Vec<&str> = events
        .iter()
        .map(|kind| match kind {
            RunEventKind::RunStarted { .. } => "run_started",
            RunEventKind::NodeStarted { .. } => "started",
            RunEventKind::NodeReused { .. } => "reused",
            RunEventKind::NodeProgress { .. } => "progress",
            RunEventKind::NodeCompleted { .. } => "completed",
            RunEventKind::NodeFailed { .. } => "failed",
            RunEventKind::RunFinished { .. } => "run_finished",
        })
        .collect();
    assert_eq!(
        names,
        vec![
            "run_started",
            "started",
            "completed",
            "started",
            "progress",
            "progress",
            "completed",
            "run_finished"
        ]
    );
}
