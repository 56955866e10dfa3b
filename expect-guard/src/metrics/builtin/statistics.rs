//! Column statistics and z-scores.

use super::{column_rows, sql_double, COLUMN_DOMAIN_KEYS};
use crate::core::MetricValue;
use crate::engine::arrow_values::numeric_at;
use crate::engine::Backend;
use crate::error::{ExpectError, Result};
use crate::metrics::column_map::{register_condition, NullHandling};
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::security::SqlSecurity;
use async_trait::async_trait;

/// Mean of the non-null values.
pub const MEAN: &str = "column.mean";
/// Sample standard deviation of the non-null values.
pub const STANDARD_DEVIATION: &str = "column.standard_deviation";
/// Per-row z-score.
pub const Z_SCORE: &str = "column_values.z_score";
/// Condition: z-score under `threshold`.
pub const Z_SCORE_UNDER_THRESHOLD: &str = "column_values.z_score.under_threshold";

/// Registers the statistics metrics.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    registry.define(MetricDefinition::new(MEAN).with_domain_keys(COLUMN_DOMAIN_KEYS))?;
    registry.register(MEAN, Backend::InMemory, MemoryAggregate(Aggregate::Mean))?;
    registry.register(MEAN, Backend::Sql, SqlAggregate(Aggregate::Mean))?;

    registry.define(MetricDefinition::new(STANDARD_DEVIATION).with_domain_keys(COLUMN_DOMAIN_KEYS))?;
    registry.register(
        STANDARD_DEVIATION,
        Backend::InMemory,
        MemoryAggregate(Aggregate::StandardDeviation),
    )?;
    registry.register(
        STANDARD_DEVIATION,
        Backend::Sql,
        SqlAggregate(Aggregate::StandardDeviation),
    )?;

    registry.define(
        MetricDefinition::new(Z_SCORE)
            .with_domain_keys(COLUMN_DOMAIN_KEYS)
            .with_dependencies(|m| {
                vec![
                    (MEAN.to_string(), m.derive_domain_only(MEAN)),
                    (
                        STANDARD_DEVIATION.to_string(),
                        m.derive_domain_only(STANDARD_DEVIATION),
                    ),
                ]
            }),
    )?;
    registry.register(Z_SCORE, Backend::InMemory, MemoryZScore)?;
    registry.register(Z_SCORE, Backend::Sql, SqlZScore)?;

    register_condition(
        registry,
        MetricDefinition::new(Z_SCORE_UNDER_THRESHOLD)
            .with_domain_keys(COLUMN_DOMAIN_KEYS)
            .with_value_keys(&["threshold", "double_sided"])
            .with_dependencies(|m| vec![(Z_SCORE.to_string(), m.derive_domain_only(Z_SCORE))]),
        NullHandling::Exclude,
        MemoryUnderThreshold,
        SqlUnderThreshold,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Aggregate {
    Mean,
    StandardDeviation,
}

impl Aggregate {
    fn compute(&self, values: &[f64]) -> Option<f64> {
        let n = values.len() as f64;
        match self {
            Aggregate::Mean if values.is_empty() => None,
            Aggregate::Mean => Some(values.iter().sum::<f64>() / n),
            Aggregate::StandardDeviation if values.len() < 2 => None,
            Aggregate::StandardDeviation => {
                let mean = values.iter().sum::<f64>() / n;
                let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                Some((sum_sq / (n - 1.0)).sqrt())
            }
        }
    }

    fn sql(&self) -> &'static str {
        match self {
            Aggregate::Mean => "AVG",
            Aggregate::StandardDeviation => "STDDEV",
        }
    }
}

#[derive(Debug)]
struct MemoryAggregate(Aggregate);

#[async_trait]
impl MetricProvider for MemoryAggregate {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (rows, array) = column_rows(&request)?;
        let mut values = Vec::with_capacity(rows.records.num_rows());
        for i in 0..rows.records.num_rows() {
            if let Some(v) = numeric_at(array.as_ref(), i)? {
                values.push(v);
            }
        }
        Ok(MetricValue::from(self.0.compute(&values)))
    }
}

#[derive(Debug)]
struct SqlAggregate(Aggregate);

#[async_trait]
impl MetricProvider for SqlAggregate {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let engine = request.sql()?;
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        let query = engine.domain_query(request.batch, &domain).await?;
        let sql = format!(
            "SELECT {}(CAST({column} AS DOUBLE)) {}",
            self.0.sql(),
            query.from_where(None)
        );
        Ok(MetricValue::from(engine.query_f64(&sql).await?))
    }
}

/// Mean and standard deviation from resolved dependencies; unknown values are NaN.
fn moments(request: &MetricRequest<'_>) -> Result<(f64, f64)> {
    let read = |name: &str| -> Result<f64> {
        match request.dependency(name)? {
            MetricValue::Null => Ok(f64::NAN),
            value => value
                .as_f64()
                .ok_or_else(|| ExpectError::type_mismatch("number", value.type_name())),
        }
    };
    Ok((read(MEAN)?, read(STANDARD_DEVIATION)?))
}

#[derive(Debug)]
struct MemoryZScore;

#[async_trait]
impl MetricProvider for MemoryZScore {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (mean, std) = moments(&request)?;
        let (rows, array) = column_rows(&request)?;
        let series = (0..rows.records.num_rows())
            .map(|i| Ok(numeric_at(array.as_ref(), i)?.map(|v| (v - mean) / std)))
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricValue::Series(series))
    }
}

#[derive(Debug)]
struct SqlZScore;

#[async_trait]
impl MetricProvider for SqlZScore {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let (mean, std) = moments(&request)?;
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        Ok(MetricValue::Expression(format!(
            "((CAST({column} AS DOUBLE) - {}) / {})",
            sql_double(mean),
            sql_double(std)
        )))
    }
}

struct Threshold {
    threshold: f64,
    double_sided: bool,
}

impl Threshold {
    fn from_request(request: &MetricRequest<'_>) -> Result<Self> {
        let threshold = request.f64_kwarg("threshold")?.ok_or_else(|| {
            ExpectError::Internal(format!(
                "metric '{}' requires value kwarg 'threshold'",
                request.metric.name()
            ))
        })?;
        Ok(Self {
            threshold,
            double_sided: request.bool_kwarg("double_sided", true)?,
        })
    }
}

#[derive(Debug)]
struct MemoryUnderThreshold;

#[async_trait]
impl MetricProvider for MemoryUnderThreshold {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let Threshold {
            threshold,
            double_sided,
        } = Threshold::from_request(&request)?;
        let z_scores = request.dependency(Z_SCORE)?.expect_series()?;
        Ok(MetricValue::Mask(
            z_scores
                .iter()
                .map(|z| {
                    z.map(|z| {
                        if double_sided {
                            z.abs() < threshold
                        } else {
                            z < threshold
                        }
                    })
                })
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct SqlUnderThreshold;

#[async_trait]
impl MetricProvider for SqlUnderThreshold {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let Threshold {
            threshold,
            double_sided,
        } = Threshold::from_request(&request)?;
        let z_score = request.dependency(Z_SCORE)?.expect_expression()?;
        let lhs = if double_sided {
            format!("ABS({z_score})")
        } else {
            z_score.to_string()
        };
        Ok(MetricValue::Expression(format!(
            "{lhs} < {}",
            sql_double(threshold)
        )))
    }
}
