//! A complete example: build a canvas, run it, then re-run a single node.
//!
//! This example demonstrates:
//! - Building a graph with sources, a prompt agent, generators and outputs
//! - Running the whole graph and reading results back from it
//! - Re-running one node, reusing upstream results
//! - Watching run events through an observer
//!
//! The capability here is a stand-in that invents URLs. Swap in
//! `canvasflow::Client` (feature `http`) to talk to real services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use canvasflow::prelude::*;

// ============================================================================
// Step 1: A stand-in generation service
// ============================================================================

#[derive(Default)]
struct Studio {
    calls: AtomicUsize,
}

impl Studio {
    fn next(&self) -> usize {
        self.calls.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl GenerationCapability for Studio {
    async fn generate_image(&self, request: ImageRequest) -> Result<MediaResponse, CapabilityError> {
        println!("  [studio] image with {} reference(s)", request.reference_images.len());
        Ok(MediaResponse::url(format!("https://studio.local/image-{}.png", self.next())))
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<MediaResponse, CapabilityError> {
        println!("  [studio] video, {}s: {}", request.duration_seconds, request.prompt.replace('\n', " | "));
        Ok(MediaResponse::url(format!("https://studio.local/video-{}.mp4", self.next())))
    }

    async fn rewrite_prompt(
        &self,
        request: RewriteRequest,
    ) -> Result<PromptResponse, CapabilityError> {
        println!("  [studio] rewrite ({} prompt)", request.media_type.as_str());
        self.next();
        Ok(PromptResponse::prompt(format!(
            "/imagine prompt: {}, golden hour, 85mm",
            request.subject
        )))
    }
}

// ============================================================================
// Step 2: The canvas
// ============================================================================

fn build_canvas() -> Result<Graph, GraphError> {
    let mut graph = Graph::new();
    graph.add_node("idea", NodeData::text("a lighthouse keeper and her cat"))?;
    graph.add_node("ref", NodeData::image("data:image/png;base64,iVBORw0KGgo="))?;
    graph.add_node(
        "agent",
        GeneratorConfig::agent().agent_instruction("Write a rich photographic prompt."),
    )?;
    graph.add_node(
        "stills",
        GeneratorConfig::image().count(2).aspect_ratio("3:4").resolution("2K"),
    )?;
    graph.add_node(
        "trailer",
        GeneratorConfig::video().prompt("Stormy night.\nStyle: noir\nStyle: watercolor"),
    )?;
    graph.add_node("gallery", NodeData::OutputSink)?;
    graph.add_node("screen", NodeData::OutputSink)?;

    graph.connect("idea", "agent")?;
    graph.connect("agent", "stills")?;
    graph.connect_slot("ref", "stills", "input_2")?;
    graph.connect("stills", "gallery")?;
    graph.connect("idea", "trailer")?;
    graph.connect("trailer", "screen")?;
    Ok(graph)
}

// ============================================================================
// Step 3: Run it
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), GraphError> {
    println!("=== Canvasflow Basic Workflow ===\n");

    let mut graph = build_canvas()?;
    graph.validate().log_summary();

    let observer = Arc::new(MemoryObserver::new());
    let engine = Engine::new(Studio::default()).with_observer(observer.clone());

    println!("--- Run all ---");
    let report = engine.run_all(&mut graph).await;
    if let Some(err) = &report.error {
        println!("Run failed: {}", err);
    }
    println!("Executed: {:?}", report.completed);
    println!("Gallery:  {:?}", graph.node("gallery").map(|node| node.result()));
    println!("Screen:   {:?}\n", graph.node("screen").map(|node| node.result()));

    println!("--- Re-run the gallery only ---");
    graph.update_data("stills", GeneratorConfig::image().count(1))?;
    let report = engine.run_node(&mut graph, "gallery").await;
    println!("Executed: {:?}", report.completed);
    println!("Reused:   {:?}", report.reused);
    println!("Gallery:  {:?}\n", graph.node("gallery").map(|node| node.result()));

    println!("--- Events ---");
    for event in observer.get_events() {
        println!("{} {:?}", event.timestamp.format("%H:%M:%S%.3f"), event.kind);
    }

    println!("\nSaved canvas:\n{}", graph.to_json()?);
    Ok(())
}
