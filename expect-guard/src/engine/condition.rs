//! The `simple` row-condition language.
//!
//! A condition is one or more comparisons joined by `and`:
//!
//! ```text
//! age >= 18 and country == 'NL' and active == true
//! ```
//!
//! The left side is a column name (optionally double-quoted), the right side a
//! literal: a single- or double-quoted string, `true`/`false`, or a number
//! (`nan` and `inf` included). Numbers compare in IEEE total order, so NaN
//! sorts above every other number. Rows whose column value is null never
//! satisfy a comparison.

use super::arrow_values::value_at;
use super::sql::sql_double;
use crate::error::{ExpectError, Result};
use crate::security::SqlSecurity;
use arrow::array::BooleanArray;
use arrow::record_batch::RecordBatch;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl ComparisonOp {
    // Two-character operators first so `>=` is not read as `>`.
    const TOKENS: [(&'static str, ComparisonOp); 6] = [
        ("==", ComparisonOp::Eq),
        ("!=", ComparisonOp::NotEq),
        (">=", ComparisonOp::GtEq),
        ("<=", ComparisonOp::LtEq),
        (">", ComparisonOp::Gt),
        ("<", ComparisonOp::Lt),
    ];

    fn sql(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "<>",
            ComparisonOp::Gt => ">",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::LtEq => "<=",
        }
    }

    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::GtEq => ordering != Ordering::Less,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::LtEq => ordering != Ordering::Greater,
        }
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl Literal {
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(inner) = unquote(text, '\'').or_else(|| unquote(text, '"')) {
            return Ok(Literal::String(inner.to_string()));
        }
        match text.to_ascii_lowercase().as_str() {
            "true" => return Ok(Literal::Boolean(true)),
            "false" => return Ok(Literal::Boolean(false)),
            _ => {}
        }
        text.parse::<f64>()
            .map(Literal::Number)
            .map_err(|_| invalid(format!("cannot parse literal '{text}'")))
    }

    fn to_sql(&self) -> Result<String> {
        match self {
            Literal::String(s) => SqlSecurity::quote_literal(s),
            Literal::Number(n) if n.is_finite() => Ok(n.to_string()),
            Literal::Number(n) => Ok(sql_double(*n)),
            Literal::Boolean(b) => Ok(b.to_string()),
        }
    }

    /// Orders a cell value against this literal; `None` for null cells.
    fn compare(&self, cell: &Value) -> Result<Option<Ordering>> {
        match (cell, self) {
            (Value::Null, _) => Ok(None),
            (Value::Number(n), Literal::Number(lit)) => Ok(n.as_f64().map(|v| v.total_cmp(lit))),
            // Non-finite float cells render as strings.
            (Value::String(s), Literal::Number(lit)) if non_finite(s).is_some() => {
                Ok(non_finite(s).map(|v| v.total_cmp(lit)))
            }
            (Value::String(s), Literal::String(lit)) => Ok(Some(s.as_str().cmp(lit.as_str()))),
            (Value::Bool(b), Literal::Boolean(lit)) => Ok(Some(b.cmp(lit))),
            (cell, lit) => Err(ExpectError::type_mismatch(
                format!("value comparable with {lit:?}"),
                cell.to_string(),
            )),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{s}'"),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// One `column op literal` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: String,
    pub op: ComparisonOp,
    pub literal: Literal,
}

/// A conjunction of comparisons.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCondition {
    comparisons: Vec<Comparison>,
}

impl RowCondition {
    /// Parses a condition string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use expect_guard::engine::RowCondition;
    ///
    /// let condition = RowCondition::parse("age >= 18 and country == 'NL'").unwrap();
    /// assert_eq!(condition.comparisons().len(), 2);
    /// assert_eq!(
    ///     condition.to_sql().unwrap(),
    ///     "\"age\" >= 18 AND \"country\" = 'NL'"
    /// );
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let comparisons = split_conjunction(text)
            .into_iter()
            .map(parse_comparison)
            .collect::<Result<Vec<_>>>()?;
        if comparisons.is_empty() {
            return Err(invalid("empty row condition".to_string()));
        }
        Ok(Self { comparisons })
    }

    /// The parsed clauses.
    pub fn comparisons(&self) -> &[Comparison] {
        &self.comparisons
    }

    /// Renders the condition as a SQL predicate.
    pub fn to_sql(&self) -> Result<String> {
        let clauses = self
            .comparisons
            .iter()
            .map(|c| {
                Ok(format!(
                    "{} {} {}",
                    SqlSecurity::escape_identifier(&c.column)?,
                    c.op.sql(),
                    c.literal.to_sql()?
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(clauses.join(" AND "))
    }

    /// Evaluates the condition over every row of a record batch.
    pub fn evaluate(&self, records: &RecordBatch) -> Result<BooleanArray> {
        let mut keep = vec![true; records.num_rows()];
        for comparison in &self.comparisons {
            let array = records.column_by_name(&comparison.column).ok_or_else(|| {
                ExpectError::ColumnNotFound {
                    column: comparison.column.clone(),
                }
            })?;
            for (row, slot) in keep.iter_mut().enumerate() {
                if !*slot {
                    continue;
                }
                let cell = value_at(array.as_ref(), row);
                *slot = comparison
                    .literal
                    .compare(&cell)?
                    .is_some_and(|ordering| comparison.op.holds(ordering));
            }
        }
        Ok(BooleanArray::from(keep))
    }
}

impl fmt::Display for RowCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.comparisons.iter().enumerate() {
            if i > 0 {
                f.write_str(" and ")?;
            }
            let op = ComparisonOp::TOKENS
                .iter()
                .find(|(_, op)| *op == c.op)
                .map_or("?", |(token, _)| *token);
            write!(f, "{} {op} {}", c.column, c.literal)?;
        }
        Ok(())
    }
}

fn non_finite(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| !v.is_finite())
}

fn invalid(message: String) -> ExpectError {
    ExpectError::NotSupported(format!("row_condition: {message}"))
}

fn unquote(text: &str, quote: char) -> Option<&str> {
    if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
        Some(&text[1..text.len() - 1])
    } else {
        None
    }
}

/// Splits on `and` keywords that sit outside quotes.
fn split_conjunction(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None => {
                let boundary_before = i == 0 || bytes[i - 1].is_ascii_whitespace();
                let boundary_after = bytes.get(i + 3).is_some_and(u8::is_ascii_whitespace);
                if boundary_before
                    && boundary_after
                    && bytes[i..].len() >= 3
                    && bytes[i..i + 3].eq_ignore_ascii_case(b"and")
                {
                    parts.push(text[start..i].trim());
                    i += 3;
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    parts.push(text[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn parse_comparison(clause: &str) -> Result<Comparison> {
    let bytes = clause.as_bytes();
    let mut quote: Option<u8> = None;

    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) if b == q => {
                quote = None;
                continue;
            }
            Some(_) => continue,
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                continue;
            }
            None => {}
        }

        for (token, op) in ComparisonOp::TOKENS {
            if bytes[i..].starts_with(token.as_bytes()) {
                let left = clause[..i].trim();
                let column = unquote(left, '"').unwrap_or(left);
                if column.is_empty() {
                    return Err(invalid(format!("missing column in '{clause}'")));
                }
                return Ok(Comparison {
                    column: column.to_string(),
                    op,
                    literal: Literal::parse(&clause[i + token.len()..])?,
                });
            }
        }
    }

    Err(invalid(format!("no comparison operator in '{clause}'")))
}
