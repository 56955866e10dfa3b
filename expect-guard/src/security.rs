//! Input screening for the SQL backend.
//!
//! Column names, table names, literals and regex patterns taken from
//! expectation kwargs end up inside generated SQL. Everything spliced into a
//! query goes through [`SqlSecurity`] first.

use crate::error::{ExpectError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_IDENTIFIER_LENGTH: usize = 128;
const MAX_PATTERN_LENGTH: usize = 1000;
const MAX_EXPRESSION_LENGTH: usize = 5000;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier (table or column name).
    ///
    /// Identifiers are always double-quoted, so column names with spaces or
    /// mixed case survive; embedded double quotes are doubled.
    ///
    /// # Examples
    /// ```rust
    /// use expect_guard::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("customer_id").unwrap(), "\"customer_id\"");
    /// assert_eq!(SqlSecurity::escape_identifier("Order Date").unwrap(), "\"Order Date\"");
    /// assert!(SqlSecurity::escape_identifier("").is_err());
    /// assert!(SqlSecurity::escape_identifier(&"very_long_name_".repeat(100)).is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        let escaped = identifier.replace('"', "\"\"");
        Ok(format!("\"{escaped}\""))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(ExpectError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ExpectError::SecurityError(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            )));
        }

        if identifier.chars().any(char::is_control) {
            return Err(ExpectError::SecurityError(
                "SQL identifier cannot contain control characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validates a table name, which may be schema-qualified (`schema.table`).
    /// Each part is quoted separately.
    pub fn escape_table_name(table: &str) -> Result<String> {
        static TABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
                .expect("Hard-coded regex pattern should be valid")
        });

        if !TABLE_REGEX.is_match(table) || table.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ExpectError::SecurityError(format!(
                "Invalid table name: '{table}'. Table names must start with a letter or underscore and contain only letters, numbers, underscores, and dots"
            )));
        }

        let parts = table
            .split('.')
            .map(Self::escape_identifier)
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join("."))
    }

    /// Renders a string as a single-quoted SQL literal.
    pub fn quote_literal(value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(ExpectError::SecurityError(
                "SQL literal cannot contain null bytes".to_string(),
            ));
        }
        Ok(format!("'{}'", value.replace('\'', "''")))
    }

    /// Validates a regex pattern and returns it escaped for a SQL string literal.
    pub fn validate_regex_pattern(pattern: &str) -> Result<String> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(ExpectError::SecurityError(format!(
                "Regex pattern too long (max {MAX_PATTERN_LENGTH} characters)"
            )));
        }

        if pattern.contains('\0') {
            return Err(ExpectError::SecurityError(
                "Regex pattern cannot contain null bytes".to_string(),
            ));
        }

        Regex::new(pattern)
            .map_err(|e| ExpectError::SecurityError(format!("Invalid regex pattern: {e}")))?;

        for dangerous in ["(.*)*", "(.*)+", "(a+)+", "(a*)*"] {
            if pattern.contains(dangerous) {
                return Err(ExpectError::SecurityError(
                    "Regex pattern might cause catastrophic backtracking".to_string(),
                ));
            }
        }

        Ok(pattern.replace('\'', "''"))
    }

    /// Screens a raw SQL boolean predicate (a `sql` row condition).
    ///
    /// Only single predicates are allowed: no statement separators, comments,
    /// subqueries or data-modifying keywords.
    pub fn validate_sql_expression(expression: &str) -> Result<()> {
        if expression.len() > MAX_EXPRESSION_LENGTH {
            return Err(ExpectError::SecurityError(format!(
                "SQL expression too long (max {MAX_EXPRESSION_LENGTH} characters)"
            )));
        }

        if expression.contains('\0') {
            return Err(ExpectError::SecurityError(
                "SQL expression cannot contain null bytes".to_string(),
            ));
        }

        for token in [";", "--", "/*", "*/"] {
            if expression.contains(token) {
                return Err(ExpectError::SecurityError(format!(
                    "SQL expression contains forbidden token: '{token}'"
                )));
            }
        }

        static KEYWORD_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(
                r"(?i)\b(select|drop|create|alter|truncate|insert|update|delete|exec|execute|declare|grant|revoke|copy|attach|information_schema)\b",
            )
            .expect("Hard-coded regex pattern should be valid")
        });

        if let Some(found) = KEYWORD_REGEX.find(expression) {
            return Err(ExpectError::SecurityError(format!(
                "SQL expression contains forbidden keyword: '{}'",
                found.as_str().to_lowercase()
            )));
        }

        static TAUTOLOGY_REGEX: Lazy<Regex> = Lazy::new(|| {
            #[allow(clippy::expect_used)]
            Regex::new(r"(?i)'\s*(or|and)\s+'").expect("Hard-coded regex pattern should be valid")
        });

        if TAUTOLOGY_REGEX.is_match(expression) {
            return Err(ExpectError::SecurityError(
                "SQL expression contains a quote-break pattern".to_string(),
            ));
        }

        Ok(())
    }
}
