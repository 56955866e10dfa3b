//! Metric requests and their content-addressed identity.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// A request for one metric: name, the data it applies to, and how to compute it.
///
/// Two configurations with equal [`MetricId`] are interchangeable within a
/// run. Null kwargs are dropped on construction so that "unset" and "absent"
/// share an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfiguration {
    metric_name: String,
    #[serde(default)]
    metric_domain_kwargs: Map<String, Value>,
    #[serde(default)]
    metric_value_kwargs: Map<String, Value>,
}

impl MetricConfiguration {
    /// Creates a metric request.
    pub fn new(
        metric_name: impl Into<String>,
        domain_kwargs: Map<String, Value>,
        value_kwargs: Map<String, Value>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs: without_nulls(domain_kwargs),
            metric_value_kwargs: without_nulls(value_kwargs),
        }
    }

    /// Same domain and value kwargs, different metric.
    pub fn derive(&self, metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs: self.metric_domain_kwargs.clone(),
            metric_value_kwargs: self.metric_value_kwargs.clone(),
        }
    }

    /// Same domain kwargs, no value kwargs.
    pub fn derive_domain_only(&self, metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs: self.metric_domain_kwargs.clone(),
            metric_value_kwargs: Map::new(),
        }
    }

    /// The metric name.
    pub fn name(&self) -> &str {
        &self.metric_name
    }

    /// Kwargs selecting the data.
    pub fn domain_kwargs(&self) -> &Map<String, Value> {
        &self.metric_domain_kwargs
    }

    /// Kwargs parameterizing the computation.
    pub fn value_kwargs(&self) -> &Map<String, Value> {
        &self.metric_value_kwargs
    }

    /// A value kwarg.
    pub fn value_kwarg(&self, key: &str) -> Option<&Value> {
        self.metric_value_kwargs.get(key)
    }

    /// The content-addressed identity.
    pub fn id(&self) -> MetricId {
        MetricId {
            name: self.metric_name.clone(),
            domain: canonical(&self.metric_domain_kwargs),
            value: canonical(&self.metric_value_kwargs),
        }
    }
}

fn without_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter().filter(|(_, v)| !v.is_null()).collect()
}

fn canonical(map: &Map<String, Value>) -> String {
    sorted(&Value::Object(map.clone())).to_string()
}

// Key order must not depend on whether serde_json preserves insertion order.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Identity of a metric request: `(name, domain kwargs, value kwargs)` with
/// kwargs serialized in key order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricId {
    name: String,
    domain: String,
    value: String,
}

impl MetricId {
    /// The metric name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Short stable digest, handy as a log field.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0]);
        hasher.update(self.domain.as_bytes());
        hasher.update([0]);
        hasher.update(self.value.as_bytes());
        hex::encode(&hasher.finalize()[..8])
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}, {})", self.name, self.domain, self.value)
    }
}
