//! Verbosity tiers and the `result_format` kwarg.

use crate::error::{ExpectError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Default cap applied to partial unexpected lists.
pub const DEFAULT_PARTIAL_UNEXPECTED_COUNT: usize = 20;

/// How much detail a validation result carries.
///
/// Tiers are totally ordered: each one includes everything the previous one
/// does, so `tier >= VerbosityTier::Summary` reads as "at least SUMMARY".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerbosityTier {
    /// Only the success flag.
    BooleanOnly,
    /// Counts, percentages and a truncated unexpected list.
    Basic,
    /// Adds the truncated index list and the most common unexpected values.
    Summary,
    /// Adds the full unexpected value and index lists.
    Complete,
}

impl VerbosityTier {
    /// All tiers from least to most verbose.
    pub const ALL: [VerbosityTier; 4] = [
        VerbosityTier::BooleanOnly,
        VerbosityTier::Basic,
        VerbosityTier::Summary,
        VerbosityTier::Complete,
    ];

    /// The canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VerbosityTier::BooleanOnly => "BOOLEAN_ONLY",
            VerbosityTier::Basic => "BASIC",
            VerbosityTier::Summary => "SUMMARY",
            VerbosityTier::Complete => "COMPLETE",
        }
    }
}

impl fmt::Display for VerbosityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerbosityTier {
    type Err = ExpectError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "BOOLEAN_ONLY" => Ok(VerbosityTier::BooleanOnly),
            "BASIC" => Ok(VerbosityTier::Basic),
            "SUMMARY" => Ok(VerbosityTier::Summary),
            "COMPLETE" => Ok(VerbosityTier::Complete),
            other => Err(ExpectError::UnknownResultFormat(other.to_string())),
        }
    }
}

/// A parsed `result_format`: the tier plus the partial-list cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultFormat {
    /// Verbosity tier
    #[serde(rename = "result_format")]
    pub tier: VerbosityTier,
    /// Cap for `partial_unexpected_*` fields
    #[serde(default = "default_partial_unexpected_count")]
    pub partial_unexpected_count: usize,
}

fn default_partial_unexpected_count() -> usize {
    DEFAULT_PARTIAL_UNEXPECTED_COUNT
}

impl Default for ResultFormat {
    fn default() -> Self {
        Self::new(VerbosityTier::Basic)
    }
}

impl ResultFormat {
    /// Creates a format for the tier with the default cap.
    pub fn new(tier: VerbosityTier) -> Self {
        Self {
            tier,
            partial_unexpected_count: DEFAULT_PARTIAL_UNEXPECTED_COUNT,
        }
    }

    /// Sets the partial unexpected list cap.
    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }

    /// Parses the `result_format` kwarg, which is either a tier name or an
    /// object `{"result_format": "...", "partial_unexpected_count": n}`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use expect_guard::core::{ResultFormat, VerbosityTier};
    /// use serde_json::json;
    ///
    /// let format = ResultFormat::parse(&json!("SUMMARY")).unwrap();
    /// assert_eq!(format.tier, VerbosityTier::Summary);
    ///
    /// let format = ResultFormat::parse(&json!({
    ///     "result_format": "COMPLETE",
    ///     "partial_unexpected_count": 5
    /// }))
    /// .unwrap();
    /// assert_eq!(format.partial_unexpected_count, 5);
    ///
    /// assert!(ResultFormat::parse(&json!("WEIRD")).is_err());
    /// ```
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::String(name) => Ok(Self::new(name.parse()?)),
            Value::Object(map) => {
                let tier = match map.get("result_format") {
                    Some(Value::String(name)) => name.parse()?,
                    Some(other) => return Err(ExpectError::UnknownResultFormat(other.to_string())),
                    None => VerbosityTier::Basic,
                };
                let partial_unexpected_count = match map.get("partial_unexpected_count") {
                    None | Some(Value::Null) => DEFAULT_PARTIAL_UNEXPECTED_COUNT,
                    Some(count) => count.as_u64().map(|c| c as usize).ok_or_else(|| {
                        ExpectError::UnknownResultFormat(format!(
                            "partial_unexpected_count must be a non-negative integer, got {count}"
                        ))
                    })?,
                };
                Ok(Self {
                    tier,
                    partial_unexpected_count,
                })
            }
            other => Err(ExpectError::UnknownResultFormat(other.to_string())),
        }
    }

    /// The JSON object form of this format.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "result_format": self.tier.as_str(),
            "partial_unexpected_count": self.partial_unexpected_count,
        })
    }
}
