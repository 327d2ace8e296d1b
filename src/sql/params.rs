//! Named query parameters
//!
//! Compiled SQL refers to values as `:name` placeholders. `Parameters`
//! holds the bound values in insertion order and `SqlStatement` pairs
//! them with the SQL text. PostgreSQL drivers want positional `$n`
//! placeholders, which `SqlStatement::to_positional` produces.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{FilterError, Result};

/// A value bound to a query parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    /// Bound as a whole to `IN (:name)`; expanded to one slot per element
    List(Vec<ParamValue>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Integer(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Integer(v.into())
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Decimal> for ParamValue {
    fn from(v: Decimal) -> Self {
        ParamValue::Decimal(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Boolean(v)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(v: NaiveDate) -> Self {
        ParamValue::Date(v)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(v: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Name to value mapping for a statement, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parameters {
    entries: Vec<(String, ParamValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value, replacing any earlier value with the same name
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Copy of these parameters without the given names
    pub fn without(&self, names: &[&str]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(n, _)| !names.contains(&n.as_str()))
                .cloned()
                .collect(),
        }
    }
}

/// SQL text with `:name` placeholders and the values bound to them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Parameters,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, params: Parameters) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Rewrite `:name` placeholders to PostgreSQL `$n` placeholders
    ///
    /// Returns the rewritten SQL and the values in positional order. List
    /// values take one slot per element (`IN ($1, $2)`), an empty list
    /// renders as `NULL`. `::` casts and quoted text are left alone.
    ///
    /// # Example
    /// ```
    /// use runtara_filter::sql::{Parameters, ParamValue, SqlStatement};
    ///
    /// let mut params = Parameters::new();
    /// params.insert("p1", vec![1i64, 3]);
    /// params.insert("limit", 20i64);
    /// let stmt = SqlStatement::new("SELECT id FROM t WHERE id IN (:p1) LIMIT :limit", params);
    ///
    /// let (sql, values) = stmt.to_positional().unwrap();
    /// assert_eq!(sql, "SELECT id FROM t WHERE id IN ($1, $2) LIMIT $3");
    /// assert_eq!(values, vec![ParamValue::Integer(1), ParamValue::Integer(3), ParamValue::Integer(20)]);
    /// ```
    pub fn to_positional(&self) -> Result<(String, Vec<ParamValue>)> {
        let chars: Vec<char> = self.sql.chars().collect();
        let mut sql = String::with_capacity(self.sql.len());
        let mut values = Vec::new();
        let mut quote: Option<char> = None;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if let Some(q) = quote {
                sql.push(c);
                if c == q {
                    quote = None;
                }
                i += 1;
                continue;
            }

            match c {
                '\'' | '"' => {
                    quote = Some(c);
                    sql.push(c);
                    i += 1;
                }
                ':' if chars.get(i + 1) == Some(&':') => {
                    sql.push_str("::");
                    i += 2;
                }
                ':' if chars
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_') =>
                {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len()
                        && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                    {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    let value = self
                        .params
                        .get(&name)
                        .ok_or_else(|| FilterError::MissingParameter(name.clone()))?;
                    push_placeholders(&mut sql, &mut values, value);
                    i = end;
                }
                _ => {
                    sql.push(c);
                    i += 1;
                }
            }
        }

        Ok((sql, values))
    }
}

fn push_placeholders(sql: &mut String, values: &mut Vec<ParamValue>, value: &ParamValue) {
    match value {
        ParamValue::List(items) if items.is_empty() => sql.push_str("NULL"),
        ParamValue::List(items) => {
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    sql.push_str(", ");
                }
                push_placeholders(sql, values, item);
            }
        }
        other => {
            values.push(other.clone());
            sql.push('$');
            sql.push_str(&values.len().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(entries: &[(&str, ParamValue)]) -> Parameters {
        let mut p = Parameters::new();
        for (name, value) in entries {
            p.insert(*name, value.clone());
        }
        p
    }

    // =========================================================================
    // Parameters Tests
    // =========================================================================

    #[test]
    fn test_insert_keeps_order_and_replaces() {
        let mut p = Parameters::new();
        p.insert("p1", "a");
        p.insert("p2", 2i64);
        p.insert("p1", "b");

        let names: Vec<&str> = p.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["p1", "p2"]);
        assert_eq!(p.get("p1"), Some(&ParamValue::Text("b".into())));
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_without() {
        let p = params(&[
            ("p1", ParamValue::Integer(1)),
            ("limit", ParamValue::Integer(20)),
            ("offset", ParamValue::Integer(0)),
        ]);
        let count = p.without(&["limit", "offset"]);
        assert_eq!(count.len(), 1);
        assert!(count.contains("p1"));
        assert!(!count.contains("limit"));
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ParamValue::from(None::<i64>), ParamValue::Null);
        assert_eq!(
            ParamValue::from(vec![1i64, 3]),
            ParamValue::List(vec![ParamValue::Integer(1), ParamValue::Integer(3)])
        );
    }

    // =========================================================================
    // to_positional Tests
    // =========================================================================

    #[test]
    fn test_positional_scalars() {
        let stmt = SqlStatement::new(
            "SELECT * FROM users u WHERE u.first_name = :p1 AND u.last_name = :p2",
            params(&[("p1", "Doe".into()), ("p2", "Smith".into())]),
        );
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users u WHERE u.first_name = $1 AND u.last_name = $2"
        );
        assert_eq!(values, vec![ParamValue::from("Doe"), ParamValue::from("Smith")]);
    }

    #[test]
    fn test_positional_skips_casts_and_literals() {
        let stmt = SqlStatement::new(
            "SELECT CONCAT(u.first_name, ' ', u.last_name), '10:30', u.id::text FROM users u WHERE u.id = :p1",
            params(&[("p1", ParamValue::Integer(7))]),
        );
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(
            sql,
            "SELECT CONCAT(u.first_name, ' ', u.last_name), '10:30', u.id::text FROM users u WHERE u.id = $1"
        );
        assert_eq!(values, vec![ParamValue::Integer(7)]);
    }

    #[test]
    fn test_positional_reused_name_binds_twice() {
        let stmt = SqlStatement::new(
            "SELECT 1 WHERE a = :p1 OR b = :p1",
            params(&[("p1", ParamValue::Integer(1))]),
        );
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(sql, "SELECT 1 WHERE a = $1 OR b = $2");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_positional_empty_list() {
        let stmt = SqlStatement::new(
            "SELECT 1 WHERE id IN (:ids)",
            params(&[("ids", ParamValue::List(vec![]))]),
        );
        let (sql, values) = stmt.to_positional().unwrap();
        assert_eq!(sql, "SELECT 1 WHERE id IN (NULL)");
        assert!(values.is_empty());
    }

    #[test]
    fn test_positional_missing_parameter() {
        let stmt = SqlStatement::new("SELECT 1 WHERE id = :p9", Parameters::new());
        let err = stmt.to_positional().unwrap_err();
        assert!(matches!(err, FilterError::MissingParameter(ref n) if n == "p9"));
    }
}
