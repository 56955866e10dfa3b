//! Metric graph construction, deduplication and resolution through the
//! public API.

use arrow::array::{Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use expect_guard::config::RuntimeConfiguration;
use expect_guard::core::{
    Batch, ExpectationConfiguration, MetricValue, ResultFormat, VerbosityTier,
};
use expect_guard::engine::{
    Backend, ExecutionEngine, InMemoryExecutionEngine, SqlExecutionEngine,
};
use expect_guard::error::Result;
use expect_guard::expectations::{ColumnMapExpectation, Registry};
use expect_guard::metrics::column_map::{register_condition, NullHandling};
use expect_guard::metrics::{
    GraphBuilder, GraphResolver, MetricConfiguration, MetricDefinition, MetricProvider,
    MetricRequest,
};
use expect_guard::validator::Validator;
use serde_json::{json, Map};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const COUNTED: &str = "column_values.counted";

fn batch() -> Batch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
    ]));
    let records = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("ada"), None, Some("grace")])),
        ],
    )
    .unwrap();
    Batch::from_records("people", records)
}

#[derive(Debug)]
struct CountingMask(Arc<AtomicUsize>);

#[async_trait]
impl MetricProvider for CountingMask {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        self.0.fetch_add(1, Ordering::SeqCst);
        let rows = request.records()?;
        Ok(MetricValue::Mask(vec![Some(true); rows.records.num_rows()]))
    }
}

#[derive(Debug)]
struct CountingExpression(Arc<AtomicUsize>);

#[async_trait]
impl MetricProvider for CountingExpression {
    async fn compute(&self, _request: MetricRequest<'_>) -> Result<MetricValue> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(MetricValue::Expression("TRUE".to_string()))
    }
}

fn counting_validator(calls: &Arc<AtomicUsize>) -> Validator {
    let mut registry = Registry::with_builtins().unwrap();
    register_condition(
        registry.metrics_mut(),
        MetricDefinition::new(COUNTED).with_domain_keys(&["column", "row_condition"]),
        NullHandling::Exclude,
        CountingMask(Arc::clone(calls)),
        CountingExpression(Arc::clone(calls)),
    )
    .unwrap();
    for expectation_type in ["expect_counted", "expect_counted_again"] {
        registry
            .expectations_mut()
            .register(ColumnMapExpectation::new(expectation_type, COUNTED))
            .unwrap();
    }
    Validator::new(Arc::new(registry))
}

fn counted(expectation_type: &str, column: &str) -> ExpectationConfiguration {
    ExpectationConfiguration::new(expectation_type).with_kwarg("column", json!(column))
}

#[tokio::test]
async fn test_shared_condition_is_computed_once_per_run() {
    let engines: Vec<Box<dyn ExecutionEngine>> = vec![
        Box::new(InMemoryExecutionEngine::new()),
        Box::new(SqlExecutionEngine::new()),
    ];

    for engine in engines {
        let calls = Arc::new(AtomicUsize::new(0));
        let validator = counting_validator(&calls);
        let configurations = [
            counted("expect_counted", "name"),
            counted("expect_counted_again", "name")
                .with_kwarg("result_format", json!("COMPLETE")),
            counted("expect_counted", "name").with_kwarg("mostly", json!(0.5)),
        ];

        let results = validator
            .graph_validate(&configurations, engine.as_ref(), &batch(), &RuntimeConfiguration::new())
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1, "{}", engine.backend());
        assert!(results.iter().all(|r| r.success == Some(true)));
        assert_eq!(results[0].result.as_ref().unwrap().missing_count(), Some(1));
    }
}

#[tokio::test]
async fn test_distinct_domains_are_computed_separately() {
    let calls = Arc::new(AtomicUsize::new(0));
    let validator = counting_validator(&calls);
    let configurations = [
        counted("expect_counted", "name"),
        counted("expect_counted", "id"),
        counted("expect_counted", "name").with_kwarg("row_condition", json!("id > 1")),
    ];

    validator
        .graph_validate(
            &configurations,
            &InMemoryExecutionEngine::new(),
            &batch(),
            &RuntimeConfiguration::new(),
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_runs_do_not_share_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let validator = counting_validator(&calls);
    let configurations = [counted("expect_counted", "name")];

    for _ in 0..2 {
        validator
            .graph_validate(
                &configurations,
                &InMemoryExecutionEngine::new(),
                &batch(),
                &RuntimeConfiguration::new(),
            )
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_combined_graph_is_topologically_ordered() {
    let validator = Validator::builtin().unwrap();
    let configurations = [
        ExpectationConfiguration::new("expect_column_values_to_match_regex")
            .with_kwarg("column", json!("name"))
            .with_kwarg("regex", json!("a")),
        ExpectationConfiguration::new("expect_column_value_z_scores_to_be_less_than")
            .with_kwarg("column", json!("id"))
            .with_kwarg("threshold", json!(2)),
        ExpectationConfiguration::new("expect_column_value_lengths_to_be_between")
            .with_kwarg("column", json!("name"))
            .with_kwarg("min_value", json!(1)),
    ];
    let runtime = RuntimeConfiguration::new()
        .with_result_format(ResultFormat::new(VerbosityTier::Complete));

    let graph = validator
        .build_graph(&configurations, &Backend::InMemory, &runtime)
        .unwrap();

    let mut seen = HashSet::new();
    for node in graph.topological_order() {
        for &dependency in node.dependencies().values() {
            let dependency = graph.node(dependency).unwrap();
            assert!(seen.contains(dependency.id()), "{} before its dependency", node.id());
        }
        assert!(seen.insert(node.id().clone()), "{} appears twice", node.id());
    }

    let counts = graph.metric_counts();
    assert_eq!(counts.get("table.row_count"), Some(&1));
    assert_eq!(counts.get("column.mean"), Some(&1));
    assert_eq!(counts.get("column.standard_deviation"), Some(&1));
    // `name` null counts are shared; `id` gets its own.
    assert_eq!(counts.get("column_values.nonnull.unexpected_count"), Some(&2));
}

#[tokio::test]
async fn test_resolver_reuses_values_across_graphs() {
    let registry = Registry::builtin().unwrap();
    let engine = InMemoryExecutionEngine::new();
    let batch = batch();
    let mut domain = Map::new();
    domain.insert("column".to_string(), json!("name"));
    let null_count = MetricConfiguration::new(
        "column_values.nonnull.unexpected_count",
        domain,
        Map::new(),
    );

    let mut resolver = GraphResolver::new(registry.metrics());

    let mut builder = GraphBuilder::new(registry.metrics());
    builder.add("first", &null_count).unwrap();
    let stats = resolver.resolve(&builder.build(), &engine, &batch).await.unwrap();
    assert_eq!(stats.computed, 2);
    assert_eq!(stats.cached, 0);

    let mut builder = GraphBuilder::new(registry.metrics());
    builder.add("second", &null_count).unwrap();
    let stats = resolver.resolve(&builder.build(), &engine, &batch).await.unwrap();
    assert_eq!(stats.computed, 0);
    assert_eq!(stats.cached, 2);

    assert_eq!(
        resolver.resolved().get_metric(&null_count),
        Some(&MetricValue::Long(1))
    );
}

#[test]
fn test_unsupported_metric_is_reported_at_build_time() {
    let registry = Registry::builtin().unwrap();
    let mut builder = GraphBuilder::new(registry.metrics());
    let err = builder
        .add(
            "expect_custom",
            &MetricConfiguration::new("column.no_such_metric", Map::new(), Map::new()),
        )
        .unwrap_err();
    assert_eq!(err.kind(), "MetricNotFoundError");
}

#[tokio::test]
async fn test_unexpected_rows_follow_batch_order() {
    let registry = Registry::builtin().unwrap();
    let batch = batch();
    let mut domain = Map::new();
    domain.insert("column".to_string(), json!("name"));
    let mut value_kwargs = Map::new();
    value_kwargs.insert("regex".to_string(), json!("^z"));
    let rows = MetricConfiguration::new(
        "column_values.match_regex.unexpected_rows",
        domain,
        value_kwargs,
    );

    let mut resolved = Vec::new();
    for engine in [
        &InMemoryExecutionEngine::new() as &dyn ExecutionEngine,
        &SqlExecutionEngine::new(),
    ] {
        engine.prepare(&batch).await.unwrap();
        let mut builder = GraphBuilder::new(registry.metrics());
        builder.add("rows", &rows).unwrap();
        let mut resolver = GraphResolver::new(registry.metrics());
        resolver.resolve(&builder.build(), engine, &batch).await.unwrap();
        resolved.push(resolver.resolved().get_metric(&rows).cloned().unwrap());
    }

    let MetricValue::Rows(memory) = &resolved[0] else {
        panic!("expected rows, got {:?}", resolved[0]);
    };
    let ids: Vec<_> = memory.iter().map(|row| row["id"].clone()).collect();
    assert_eq!(ids, vec![json!(1), json!(3)]);
    assert_eq!(resolved[0], resolved[1]);
}
