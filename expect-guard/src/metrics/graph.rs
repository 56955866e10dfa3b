//! Metric dependency graphs.
//!
//! Nodes live in an arena addressed by index and are deduplicated by
//! [`MetricId`]. Transitive dependencies are expanded with an explicit
//! worklist (a depth-first stack), which also detects cycles: a dependency
//! whose identity is still on the stack closes a cycle.

use super::node::{MetricConfiguration, MetricId};
use super::registry::MetricRegistry;
use crate::error::{ExpectError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument};

/// One metric computation in a graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    id: MetricId,
    metric: MetricConfiguration,
    dependencies: BTreeMap<String, usize>,
    origin: String,
}

impl GraphNode {
    /// Node identity.
    pub fn id(&self) -> &MetricId {
        &self.id
    }

    /// The metric request.
    pub fn metric(&self) -> &MetricConfiguration {
        &self.metric
    }

    /// Dependency name to node index.
    pub fn dependencies(&self) -> &BTreeMap<String, usize> {
        &self.dependencies
    }

    /// Expectation type that first requested this node.
    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// A closed set of metric nodes in dependency order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
    index: HashMap<MetricId, usize>,
}

impl DependencyGraph {
    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// A node by index.
    pub fn node(&self, index: usize) -> Option<&GraphNode> {
        self.nodes.get(index)
    }

    /// A node by identity.
    pub fn get(&self, id: &MetricId) -> Option<&GraphNode> {
        self.index.get(id).and_then(|&i| self.nodes.get(i))
    }

    /// Whether a node with this identity exists.
    pub fn contains(&self, id: &MetricId) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes such that every node comes after all of its dependencies.
    ///
    /// Nodes are appended to the arena only once their dependencies are, so
    /// arena order is already a topological order.
    pub fn topological_order(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Count of nodes per metric name.
    pub fn metric_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for node in &self.nodes {
            *counts.entry(node.metric.name()).or_insert(0) += 1;
        }
        counts
    }
}

struct Frame {
    metric: MetricConfiguration,
    id: MetricId,
    slot: Option<String>,
    pending: Vec<(String, MetricConfiguration)>,
    next: usize,
    resolved: BTreeMap<String, usize>,
}

/// Builds a [`DependencyGraph`] from metric requests.
///
/// Requests from several expectations may be added to one builder; identical
/// requests collapse to one node.
#[derive(Debug)]
pub struct GraphBuilder<'r> {
    registry: &'r MetricRegistry,
    graph: DependencyGraph,
}

impl<'r> GraphBuilder<'r> {
    /// Creates a builder that reads metric definitions from the registry.
    pub fn new(registry: &'r MetricRegistry) -> Self {
        Self {
            registry,
            graph: DependencyGraph::default(),
        }
    }

    /// Adds a set of named requests on behalf of an expectation and returns
    /// the identity each name resolved to.
    #[instrument(skip(self, metrics), fields(expectation_type = origin, requested = metrics.len()))]
    pub fn add_all(
        &mut self,
        origin: &str,
        metrics: &BTreeMap<String, MetricConfiguration>,
    ) -> Result<BTreeMap<String, MetricId>> {
        let before = self.graph.len();
        let mut ids = BTreeMap::new();
        for (name, metric) in metrics {
            let index = self.add(origin, metric)?;
            ids.insert(name.clone(), self.graph.nodes[index].id.clone());
        }
        debug!(
            nodes.added = self.graph.len() - before,
            nodes.total = self.graph.len(),
            "Expanded metric dependencies"
        );
        Ok(ids)
    }

    /// Adds one request and its transitive dependencies; returns its node index.
    pub fn add(&mut self, origin: &str, metric: &MetricConfiguration) -> Result<usize> {
        let id = metric.id();
        if let Some(&index) = self.graph.index.get(&id) {
            return Ok(index);
        }

        let mut on_stack: HashSet<MetricId> = HashSet::new();
        let mut stack = vec![self.frame(metric.clone(), id, None)?];
        on_stack.insert(stack[0].id.clone());

        loop {
            let Some(top) = stack.last_mut() else {
                return Err(ExpectError::Internal("empty dependency stack".into()));
            };

            if top.next < top.pending.len() {
                let (name, dependency) = top.pending[top.next].clone();
                top.next += 1;
                let dependency_id = dependency.id();

                if let Some(&index) = self.graph.index.get(&dependency_id) {
                    top.resolved.insert(name, index);
                    continue;
                }

                if on_stack.contains(&dependency_id) {
                    let start = stack
                        .iter()
                        .position(|frame| frame.id == dependency_id)
                        .unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|frame| frame.metric.name().to_string())
                        .collect();
                    path.push(dependency.name().to_string());
                    return Err(ExpectError::CyclicMetricDependency { path });
                }

                on_stack.insert(dependency_id.clone());
                let frame = self.frame(dependency, dependency_id, Some(name))?;
                stack.push(frame);
                continue;
            }

            let Some(frame) = stack.pop() else {
                return Err(ExpectError::Internal("empty dependency stack".into()));
            };
            on_stack.remove(&frame.id);

            let index = self.graph.nodes.len();
            self.graph.index.insert(frame.id.clone(), index);
            self.graph.nodes.push(GraphNode {
                id: frame.id,
                metric: frame.metric,
                dependencies: frame.resolved,
                origin: origin.to_string(),
            });

            match (stack.last_mut(), frame.slot) {
                (Some(parent), Some(slot)) => {
                    parent.resolved.insert(slot, index);
                }
                _ => return Ok(index),
            }
        }
    }

    fn frame(
        &self,
        metric: MetricConfiguration,
        id: MetricId,
        slot: Option<String>,
    ) -> Result<Frame> {
        let pending = self
            .registry
            .definition(metric.name())?
            .dependencies_for(&metric);
        Ok(Frame {
            metric,
            id,
            slot,
            pending,
            next: 0,
            resolved: BTreeMap::new(),
        })
    }

    /// The graph built so far.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Finishes building.
    pub fn build(self) -> DependencyGraph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricDefinition;
    use serde_json::{json, Map, Value};

    fn column(name: &str) -> Map<String, Value> {
        json!({ "column": name }).as_object().cloned().unwrap()
    }

    fn request(metric: &str, col: &str) -> MetricConfiguration {
        MetricConfiguration::new(metric, column(col), Map::new())
    }

    fn registry() -> MetricRegistry {
        let mut registry = MetricRegistry::new();
        registry
            .define(MetricDefinition::new("lengths").with_domain_keys(&["column"]))
            .unwrap();
        registry
            .define(
                MetricDefinition::new("between")
                    .with_domain_keys(&["column"])
                    .with_dependencies(|m| vec![("lengths".into(), m.derive("lengths"))]),
            )
            .unwrap();
        registry
            .define(
                MetricDefinition::new("between.unexpected_count")
                    .with_domain_keys(&["column"])
                    .with_dependencies(|m| vec![("condition".into(), m.derive("between"))]),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_transitive_closure_in_dependency_order() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        let root = builder
            .add("expect_x", &request("between.unexpected_count", "name"))
            .unwrap();
        let graph = builder.build();

        assert_eq!(graph.len(), 3);
        let names: Vec<_> = graph.topological_order().map(|n| n.metric().name()).collect();
        assert_eq!(names, vec!["lengths", "between", "between.unexpected_count"]);
        assert_eq!(root, 2);
        assert_eq!(graph.node(2).unwrap().dependencies()["condition"], 1);
    }

    #[test]
    fn test_identical_requests_collapse() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        let first: BTreeMap<String, MetricConfiguration> = [(
            "unexpected_count".to_string(),
            request("between.unexpected_count", "name"),
        )]
        .into();
        let second: BTreeMap<String, MetricConfiguration> =
            [("lengths".to_string(), request("lengths", "name"))].into();

        let a = builder.add_all("expect_a", &first).unwrap();
        let b = builder.add_all("expect_b", &second).unwrap();
        let graph = builder.build();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.metric_counts()["lengths"], 1);
        assert_eq!(graph.get(&b["lengths"]).unwrap().origin(), "expect_a");
        assert!(graph.contains(&a["unexpected_count"]));
    }

    #[test]
    fn test_distinct_domains_stay_distinct() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        builder.add("e", &request("between", "a")).unwrap();
        builder.add("e", &request("between", "b")).unwrap();
        assert_eq!(builder.graph().len(), 4);
    }

    #[test]
    fn test_cycle_detected() {
        let mut registry = MetricRegistry::new();
        registry
            .define(
                MetricDefinition::new("a")
                    .with_dependencies(|m| vec![("b".into(), m.derive("b"))]),
            )
            .unwrap();
        registry
            .define(
                MetricDefinition::new("b")
                    .with_dependencies(|m| vec![("c".into(), m.derive("c"))]),
            )
            .unwrap();
        registry
            .define(
                MetricDefinition::new("c")
                    .with_dependencies(|m| vec![("a".into(), m.derive("a"))]),
            )
            .unwrap();

        let mut builder = GraphBuilder::new(&registry);
        let err = builder
            .add("e", &MetricConfiguration::new("a", Map::new(), Map::new()))
            .unwrap_err();
        match err {
            ExpectError::CyclicMetricDependency { path } => {
                assert_eq!(path, vec!["a", "b", "c", "a"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert!(builder.graph().is_empty());
    }

    #[test]
    fn test_unknown_metric() {
        let registry = MetricRegistry::new();
        let mut builder = GraphBuilder::new(&registry);
        assert!(matches!(
            builder.add("e", &request("nope", "a")),
            Err(ExpectError::MetricNotFound { .. })
        ));
    }
}
