//! The metric dependency graph.
//!
//! A metric request ([`MetricConfiguration`]) names a metric plus the domain
//! and value kwargs it is computed with. Its identity ([`MetricId`]) is derived
//! from that content, so identical requests from different expectations are
//! the same node.
//!
//! ## Architecture
//!
//! ```text
//! MetricRegistry ── definitions (kwargs, dependencies)
//!       │          └ providers keyed by (metric, Backend)
//!       ▼
//! GraphBuilder ──── transitive closure, dedup, cycle detection
//!       │
//!       ▼
//! DependencyGraph ─ arena of nodes in dependency order
//!       │
//!       ▼
//! GraphResolver ─── one provider call per node, memoized per run
//!       │
//!       ▼
//! ResolvedMetrics
//! ```
//!
//! ## Example
//!
//! ```rust
//! use expect_guard::core::{Batch, MetricValue};
//! use expect_guard::engine::InMemoryExecutionEngine;
//! use expect_guard::metrics::{builtin, GraphBuilder, GraphResolver, MetricConfiguration, MetricRegistry};
//! use arrow::array::Int64Array;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use serde_json::Map;
//! use std::sync::Arc;
//!
//! # async fn example() -> expect_guard::error::Result<()> {
//! let mut registry = MetricRegistry::new();
//! builtin::register_all(&mut registry)?;
//!
//! let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
//! let records = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
//! let batch = Batch::from_records("ids", records);
//!
//! let row_count = MetricConfiguration::new("table.row_count", Map::new(), Map::new());
//! let mut builder = GraphBuilder::new(&registry);
//! builder.add("example", &row_count)?;
//!
//! let mut resolver = GraphResolver::new(&registry);
//! resolver
//!     .resolve(&builder.build(), &InMemoryExecutionEngine::new(), &batch)
//!     .await?;
//! assert_eq!(resolver.resolved().get_metric(&row_count), Some(&MetricValue::Long(3)));
//! # Ok(())
//! # }
//! ```

pub mod builtin;
pub mod column_map;
mod graph;
mod node;
mod registry;
mod resolver;

pub use graph::{DependencyGraph, GraphBuilder, GraphNode};
pub use node::{MetricConfiguration, MetricId};
pub use registry::{DependencyFn, MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
pub use resolver::{GraphResolver, ResolutionStats, ResolvedMetrics};
