//! The pipeline runner: drives resolver, cache and executors over a graph.
//!
//! A run is a sequence of passes over the pending part of its scope. A node
//! is ready once every source feeding it has resolved in this run, either by
//! executing or by reusing a stored result. Passes repeat until the scope is
//! exhausted, the target is done, a node fails, or a pass makes no progress.

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::capability::GenerationCapability;
use crate::core::cache::ReusePolicy;
use crate::core::config::EngineConfig;
use crate::core::error::EngineError;
use crate::core::events::{EventEmitter, NoopObserver, RunEventKind, RunObserver};
use crate::core::executors::{executor_for, ExecutionContext, ResolvedInput};
use crate::core::graph::{Graph, NodeId, NodeResult};
use crate::core::resolver;

/// Outcome of a single run.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Nodes executed in this run, in execution order.
    pub completed: Vec<NodeId>,
    /// Nodes whose stored result stood in for an execution.
    pub reused: Vec<NodeId>,
    pub error: Option<EngineError>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            completed: Vec::new(),
            reused: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The node that aborted the run, if any.
    pub fn failed_node(&self) -> Option<&str> {
        self.error.as_ref().and_then(EngineError::node_id)
    }
}

/// Executes workflow graphs against a generation capability.
#[derive(Clone)]
pub struct Engine {
    capability: Arc<dyn GenerationCapability>,
    observer: Arc<dyn RunObserver>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(capability: impl GenerationCapability + 'static) -> Self {
        Self::from_arc(Arc::new(capability))
    }

    pub fn from_arc(capability: Arc<dyn GenerationCapability>) -> Self {
        Self {
            capability,
            observer: Arc::new(NoopObserver),
            config: EngineConfig::default(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recomputes every node of the graph. Stored results are never reused.
    pub async fn run_all(&self, graph: &mut Graph) -> RunReport {
        self.run(graph, None).await
    }

    /// Brings `target` up to date, reusing valid upstream results.
    pub async fn run_node(&self, graph: &mut Graph, target: &str) -> RunReport {
        self.run(graph, Some(target)).await
    }

    async fn run(&self, graph: &mut Graph, target: Option<&str>) -> RunReport {
        let run_id = Uuid::new_v4();
        let events = EventEmitter::new(run_id, self.observer.as_ref());
        let mut report = RunReport::new(run_id);

        match target {
            Some(target) => log::info!("Run {} started for node {}", run_id, target),
            None => log::info!("Run {} started for the whole graph", run_id),
        }

        let scope = match resolver::scope(graph, target) {
            Ok(scope) => scope,
            Err(err) => {
                log::error!("Run {} aborted: {}", run_id, err);
                report.error = Some(err);
                self.finish(&events, &report);
                return report;
            }
        };

        let pending = scope.ordered(graph);
        events.emit(RunEventKind::RunStarted {
            scope: pending.clone(),
            target: scope.target().map(str::to_string),
        });

        for id in &pending {
            if let Some(node) = graph.node_mut(id) {
                node.set_reused(false);
            }
        }

        let policy = ReusePolicy::for_target(scope.target());
        if let Err(err) = self.drive(graph, pending, &policy, &events, &mut report).await {
            report.error = Some(err);
        }

        self.finish(&events, &report);
        report
    }

    async fn drive(
        &self,
        graph: &mut Graph,
        mut pending: Vec<NodeId>,
        policy: &ReusePolicy,
        events: &EventEmitter<'_>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let target = match policy {
            ReusePolicy::ReuseUpstream { target } => Some(target.as_str()),
            ReusePolicy::Bypass => None,
        };
        let mut resolved: HashSet<NodeId> = HashSet::new();
        let mut passes = 0;

        while !pending.is_empty() {
            if passes >= self.config.max_passes {
                log::error!("Giving up after {} passes", passes);
                return Err(EngineError::StuckGraph { pending });
            }
            passes += 1;

            let mut progressed = false;
            let mut still_pending = Vec::with_capacity(pending.len());

            for id in pending {
                let ready = graph
                    .sources_of(&id)
                    .iter()
                    .all(|source| resolved.contains(*source));
                if !ready {
                    still_pending.push(id);
                    continue;
                }

                self.resolve(graph, &id, policy, events, report).await?;
                progressed = true;
                let reached_target = target == Some(id.as_str());
                resolved.insert(id);

                if reached_target {
                    log::debug!("Target reached after {} pass(es)", passes);
                    return Ok(());
                }
            }

            pending = still_pending;
            if !progressed {
                log::error!("No node became ready; {} pending", pending.len());
                return Err(EngineError::StuckGraph { pending });
            }
        }

        Ok(())
    }

    /// Reuses or executes one ready node, writing its result into the graph.
    async fn resolve(
        &self,
        graph: &mut Graph,
        id: &str,
        policy: &ReusePolicy,
        events: &EventEmitter<'_>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let node = graph
            .node_mut(id)
            .ok_or_else(|| EngineError::UnknownNode(id.to_string()))?;

        if let Some(result) = policy.reusable(node) {
            log::debug!("Reusing stored result of {}", id);
            node.set_reused(true);
            events.emit(RunEventKind::NodeReused {
                node_id: id.to_string(),
                result,
            });
            report.reused.push(id.to_string());
            return Ok(());
        }

        events.emit(RunEventKind::NodeStarted {
            node_id: id.to_string(),
        });
        node.clear_result();
        let data = node.data().clone();

        let inputs: Vec<ResolvedInput> = graph
            .incoming(id)
            .into_iter()
            .map(|edge| {
                let result = graph
                    .node(&edge.from)
                    .map(|source| source.result().clone())
                    .unwrap_or(NodeResult::None);
                ResolvedInput::new(edge.from.clone(), edge.slot.clone(), result)
            })
            .collect();

        let ctx = ExecutionContext {
            node_id: id,
            capability: self.capability.as_ref(),
            config: &self.config,
            events: *events,
        };

        log::debug!("Executing {} ({}) with {} input(s)", id, data.kind(), inputs.len());
        match executor_for(&data).execute(&ctx, &inputs).await {
            Ok(result) => {
                if let Some(node) = graph.node_mut(id) {
                    node.set_result(result.clone());
                }
                events.emit(RunEventKind::NodeCompleted {
                    node_id: id.to_string(),
                    result,
                });
                report.completed.push(id.to_string());
                Ok(())
            }
            Err(err) => {
                log::error!("Node {} failed: {}", id, err);
                events.emit(RunEventKind::NodeFailed {
                    node_id: id.to_string(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    fn finish(&self, events: &EventEmitter<'_>, report: &RunReport) {
        match &report.error {
            Some(err) => log::info!("Run {} failed: {}", report.run_id, err),
            None => log::info!(
                "Run {} finished: {} executed, {} reused",
                report.run_id,
                report.completed.len(),
                report.reused.len()
            ),
        }
        events.emit(RunEventKind::RunFinished {
            completed: report.completed.clone(),
            reused: report.reused.clone(),
            error: report.error.as_ref().map(ToString::to_string),
        });
        events.flush();
    }
}
