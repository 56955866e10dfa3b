//! Resolving a dependency graph into metric values.

use super::graph::DependencyGraph;
use super::node::{MetricConfiguration, MetricId};
use super::registry::{MetricRegistry, MetricRequest};
use crate::core::{Batch, MetricValue};
use crate::engine::ExecutionEngine;
use crate::error::{ExpectError, Result};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, instrument};

/// Computed metric values keyed by node identity.
///
/// Owned by one validation run. Only successfully computed values are stored,
/// so a failed node is attempted again when a later expectation needs it.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMetrics {
    values: HashMap<MetricId, MetricValue>,
}

impl ResolvedMetrics {
    /// A value by identity.
    pub fn get(&self, id: &MetricId) -> Option<&MetricValue> {
        self.values.get(id)
    }

    /// A value by request.
    pub fn get_metric(&self, metric: &MetricConfiguration) -> Option<&MetricValue> {
        self.values.get(&metric.id())
    }

    /// Whether a node has been resolved.
    pub fn contains(&self, id: &MetricId) -> bool {
        self.values.contains_key(id)
    }

    /// Number of resolved nodes.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing has been resolved.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All resolved values.
    pub fn iter(&self) -> impl Iterator<Item = (&MetricId, &MetricValue)> {
        self.values.iter()
    }
}

/// Counts from one [`GraphResolver::resolve`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    /// Nodes whose provider ran
    pub computed: usize,
    /// Nodes already resolved earlier in the run
    pub cached: usize,
}

/// Walks graphs in dependency order and invokes each node's provider once.
///
/// One resolver serves one validation run against one batch; the values it
/// holds are reused by every graph it resolves.
#[derive(Debug)]
pub struct GraphResolver<'r> {
    registry: &'r MetricRegistry,
    resolved: ResolvedMetrics,
}

impl<'r> GraphResolver<'r> {
    /// Creates a resolver with an empty cache.
    pub fn new(registry: &'r MetricRegistry) -> Self {
        Self {
            registry,
            resolved: ResolvedMetrics::default(),
        }
    }

    /// Values resolved so far.
    pub fn resolved(&self) -> &ResolvedMetrics {
        &self.resolved
    }

    /// Consumes the resolver, returning its values.
    pub fn into_resolved(self) -> ResolvedMetrics {
        self.resolved
    }

    /// Resolves every node of the graph not already resolved.
    ///
    /// Provider failures are wrapped as `MetricResolution` with the metric name
    /// and the expectation that requested the node; the first failure stops
    /// the walk.
    #[instrument(skip(self, graph, engine, batch), fields(
        batch.id = %batch.id(),
        backend = %engine.backend(),
        graph.nodes = graph.len()
    ))]
    pub async fn resolve(
        &mut self,
        graph: &DependencyGraph,
        engine: &dyn ExecutionEngine,
        batch: &Batch,
    ) -> Result<ResolutionStats> {
        let backend = engine.backend();
        let mut stats = ResolutionStats::default();

        for node in graph.topological_order() {
            if self.resolved.contains(node.id()) {
                stats.cached += 1;
                debug!(metric.name = node.metric().name(), metric.id = %node.id().digest(), "Metric already resolved");
                continue;
            }

            let provider = self.registry.lookup(node.metric().name(), &backend)?;

            let mut dependencies = HashMap::with_capacity(node.dependencies().len());
            for (name, &index) in node.dependencies() {
                let value = graph
                    .node(index)
                    .and_then(|dep| self.resolved.get(dep.id()))
                    .ok_or_else(|| {
                        ExpectError::Internal(format!(
                            "dependency '{name}' of '{}' was not resolved first",
                            node.metric().name()
                        ))
                    })?;
                dependencies.insert(name.clone(), value);
            }

            let start = Instant::now();
            let request = MetricRequest {
                engine,
                batch,
                metric: node.metric(),
                dependencies,
            };
            let value = match provider.compute(request).await {
                Ok(value) => value,
                Err(e) => {
                    error!(
                        metric.name = node.metric().name(),
                        metric.id = %node.id().digest(),
                        expectation_type = node.origin(),
                        error = %e,
                        "Metric computation failed"
                    );
                    return Err(ExpectError::metric_resolution(
                        node.metric().name(),
                        node.origin(),
                        e,
                    ));
                }
            };

            debug!(
                metric.name = node.metric().name(),
                metric.id = %node.id().digest(),
                metric.value = %value,
                duration_ms = start.elapsed().as_millis() as u64,
                "Resolved metric"
            );
            self.resolved.values.insert(node.id().clone(), value);
            stats.computed += 1;
        }

        info!(
            metrics.computed = stats.computed,
            metrics.cached = stats.cached,
            "Resolved dependency graph"
        );
        Ok(stats)
    }
}
