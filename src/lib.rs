//! # Canvasflow
//!
//! An execution engine for node-graph generation workflows: text, image and
//! video sources feed generator nodes that call out to image, video and
//! prompt-rewriting services, and output nodes display what arrives.
//!
//! ## Features
//!
//! - **Explicit graph model**: the caller owns the [`Graph`]; runs borrow it
//!   and write each node's result back in place
//! - **Incremental runs**: re-running one node reuses valid upstream results
//! - **Pluggable services**: the engine only sees a [`GenerationCapability`]
//! - **Run events**: every transition is reported to a [`RunObserver`]
//! - **Optional HTTP clients**: backend and Gemini providers (feature `http`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canvasflow::prelude::*;
//!
//! # async fn demo(capability: impl GenerationCapability + 'static) -> Result<(), GraphError> {
//! let mut graph = Graph::new();
//! graph.add_node("text", NodeData::text("a red fox in the snow"))?;
//! graph.add_node("gen", GeneratorConfig::image().count(2))?;
//! graph.add_node("out", NodeData::OutputSink)?;
//! graph.connect("text", "gen")?;
//! graph.connect("gen", "out")?;
//!
//! let engine = Engine::new(capability);
//! let report = engine.run_all(&mut graph).await;
//! assert!(report.is_success());
//!
//! // Later: only "out" and what it needs, reusing stored results.
//! let report = engine.run_node(&mut graph, "out").await;
//! println!("reused {:?}", report.reused);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`capability`]: request/response contracts of the external services
//! - [`executors`]: one strategy per node kind
//! - [`client`]: HTTP providers (feature `http`)
//! - [`prelude`]: commonly used types (import with `use canvasflow::prelude::*`)

// ============================================================================
// Core Module
// ============================================================================

mod core;

pub mod capability;

// ============================================================================
// Public Re-exports - Granular Imports
// ============================================================================

// Graph model
pub use core::graph::{
    Edge, GeneratorConfig, GeneratorMode, Graph, InputValue, Node, NodeData, NodeId, NodeKind,
    NodeResult, OutputFormat, ResultType, DEFAULT_SLOT,
};
pub use core::validation::{ValidationIssue, ValidationResult};

// Engine
pub use core::cache::{is_valid, ReusePolicy};
pub use core::config::EngineConfig;
pub use core::error::{EngineError, GraphError};
pub use core::resolver::{scope, ExecutionScope};
pub use core::runner::{Engine, RunReport};

// Events
pub use core::events::{
    ChannelObserver, EventEmitter, MemoryObserver, NoopObserver, RunEvent, RunEventKind,
    RunObserver,
};

/// Node executors, for callers that drive single nodes themselves.
pub mod executors {
    pub use crate::core::executors::agent::{media_hint, to_bullet_list};
    pub use crate::core::executors::prompt::combined_prompt;
    pub use crate::core::executors::video::{split_scenarios, SCENARIO_DELIMITER};
    pub use crate::core::executors::{
        executor_for, input_texts, input_values, reference_images, ExecutionContext,
        ImageGeneratorExecutor, MediaSourceExecutor, NodeExecutor, OutputSinkExecutor,
        PromptAgentExecutor, ResolvedInput, TextSourceExecutor, VideoGeneratorExecutor,
    };
}

// Capability contracts
pub use capability::{
    CapabilityError, GenerationCapability, ImageRequest, MediaResponse, MediaTypeHint,
    PromptResponse, RewriteRequest, VideoRequest,
};

// ============================================================================
// Prelude Modules - Convenient Bulk Imports
// ============================================================================

/// The main prelude: everything needed to build and run a workflow.
///
/// # Example
/// ```rust
/// use canvasflow::prelude::*;
/// ```
pub mod prelude {
    pub use super::{
        // Capability
        CapabilityError,
        // Engine
        Engine,
        EngineConfig,
        EngineError,
        GenerationCapability,
        GeneratorConfig,
        GeneratorMode,
        // Graph
        Graph,
        GraphError,
        ImageRequest,
        MediaResponse,
        MemoryObserver,
        NodeData,
        NodeResult,
        OutputFormat,
        PromptResponse,
        RewriteRequest,
        RunEvent,
        RunEventKind,
        // Events
        RunObserver,
        RunReport,
        VideoRequest,
    };
}

// ============================================================================
// HTTP Feature
// ============================================================================

#[cfg(feature = "http")]
pub mod client;

#[cfg(feature = "http")]
pub use client::{BackendConfig, Client, GeminiConfig};

// ============================================================================
// Re-export commonly used external types for convenience
// ============================================================================

pub use serde_json::Value as JsonValue;

// ============================================================================
// Library Metadata
// ============================================================================

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of this crate.
pub const NAME: &str = env!("CARGO_PKG_NAME");
