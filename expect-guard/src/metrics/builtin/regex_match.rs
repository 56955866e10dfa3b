//! `column_values.match_regex`: the value contains a match of `regex`.

use super::{column_rows, COLUMN_DOMAIN_KEYS};
use crate::core::MetricValue;
use crate::engine::arrow_values::string_at;
use crate::error::{ExpectError, Result};
use crate::metrics::column_map::{register_condition, NullHandling};
use crate::metrics::{MetricDefinition, MetricProvider, MetricRegistry, MetricRequest};
use crate::security::SqlSecurity;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Condition metric name.
pub const MATCH_REGEX: &str = "column_values.match_regex";

/// Registers `column_values.match_regex` and its derived metrics.
pub fn register(registry: &mut MetricRegistry) -> Result<()> {
    register_condition(
        registry,
        MetricDefinition::new(MATCH_REGEX)
            .with_domain_keys(COLUMN_DOMAIN_KEYS)
            .with_value_keys(&["regex"]),
        NullHandling::Exclude,
        MemoryMatchRegex::default(),
        SqlMatchRegex,
    )
}

/// The pattern cache is cleared once it holds this many entries.
const MAX_CACHED_PATTERNS: usize = 256;

#[derive(Debug, Default)]
struct MemoryMatchRegex {
    compiled: Mutex<HashMap<String, Regex>>,
}

impl MemoryMatchRegex {
    fn compile(&self, pattern: &str) -> Result<Regex> {
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = compiled.get(pattern) {
            return Ok(regex.clone());
        }
        let regex = Regex::new(pattern)
            .map_err(|e| ExpectError::Internal(format!("invalid regex '{pattern}': {e}")))?;
        if compiled.len() >= MAX_CACHED_PATTERNS {
            compiled.clear();
        }
        compiled.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }
}

#[async_trait]
impl MetricProvider for MemoryMatchRegex {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let regex = self.compile(request.str_kwarg("regex")?)?;
        let (rows, array) = column_rows(&request)?;
        Ok(MetricValue::Mask(
            (0..rows.records.num_rows())
                .map(|i| string_at(array.as_ref(), i).map(|s| regex.is_match(&s)))
                .collect(),
        ))
    }
}

#[derive(Debug)]
struct SqlMatchRegex;

#[async_trait]
impl MetricProvider for SqlMatchRegex {
    async fn compute(&self, request: MetricRequest<'_>) -> Result<MetricValue> {
        let pattern = SqlSecurity::validate_regex_pattern(request.str_kwarg("regex")?)?;
        let domain = request.domain()?;
        let column = SqlSecurity::escape_identifier(domain.require_column()?)?;
        Ok(MetricValue::Expression(format!(
            "CAST({column} AS VARCHAR) ~ '{pattern}'"
        )))
    }
}
