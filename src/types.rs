//! Core type definitions for filter requests
//!
//! Includes the operator vocabulary, parsed filter/sort criteria and the
//! field types used by entity descriptors.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Operators
// ============================================================================

/// How many values an operator takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorArity {
    /// Null checks: `field:null`
    None,
    /// Scalar operators: `field:eq:value`
    Single,
    /// Membership operators: `field:in:(a,b)`
    List,
}

/// Filter operator vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    #[serde(rename = "sw")]
    StartsWith,
    #[serde(rename = "ew")]
    EndsWith,
    Contains,
    In,
    #[serde(rename = "nin")]
    NotIn,
    #[serde(rename = "null")]
    IsNull,
    #[serde(rename = "notnull")]
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 13] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Contains,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];

    /// Look up an operator by its code, ignoring case
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|op| op.code().eq_ignore_ascii_case(code))
    }

    /// Code used in filter text
    pub fn code(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::StartsWith => "sw",
            FilterOperator::EndsWith => "ew",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "nin",
            FilterOperator::IsNull => "null",
            FilterOperator::IsNotNull => "notnull",
        }
    }

    /// SQL operator text
    pub fn sql(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "<>",
            FilterOperator::Gt => ">",
            FilterOperator::Gte => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Lte => "<=",
            FilterOperator::StartsWith | FilterOperator::EndsWith | FilterOperator::Contains => {
                "LIKE"
            }
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn arity(&self) -> OperatorArity {
        match self {
            FilterOperator::IsNull | FilterOperator::IsNotNull => OperatorArity::None,
            FilterOperator::In | FilterOperator::NotIn => OperatorArity::List,
            _ => OperatorArity::Single,
        }
    }

    /// `sw`, `ew` and `contains`
    pub fn is_pattern(&self) -> bool {
        matches!(
            self,
            FilterOperator::StartsWith | FilterOperator::EndsWith | FilterOperator::Contains
        )
    }

    /// `gt`, `gte`, `lt` and `lte`
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte
        )
    }

    pub fn is_list(&self) -> bool {
        self.arity() == OperatorArity::List
    }

    pub fn is_null_check(&self) -> bool {
        self.arity() == OperatorArity::None
    }

    /// Apply the wildcard transform of pattern operators to a bound value
    ///
    /// Other operators return the value unchanged.
    pub fn transform(&self, value: &str) -> String {
        match self {
            FilterOperator::StartsWith => format!("{}%", value),
            FilterOperator::EndsWith => format!("%{}", value),
            FilterOperator::Contains => format!("%{}%", value),
            _ => value.to_string(),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ============================================================================
// Filter criteria
// ============================================================================

/// Value carried by a filter criterion, shaped by the operator's arity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    None,
    Single(String),
    List(Vec<String>),
}

impl FilterValue {
    fn arity(&self) -> OperatorArity {
        match self {
            FilterValue::None => OperatorArity::None,
            FilterValue::Single(_) => OperatorArity::Single,
            FilterValue::List(_) => OperatorArity::List,
        }
    }

    /// Every raw value, list elements included
    pub fn values(&self) -> Vec<&str> {
        match self {
            FilterValue::None => Vec::new(),
            FilterValue::Single(v) => vec![v.as_str()],
            FilterValue::List(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// A single parsed filter condition: `field:operator[:value]`
///
/// The value shape always matches the operator arity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterCriterion {
    field: String,
    operator: FilterOperator,
    value: FilterValue,
}

impl FilterCriterion {
    /// Create a criterion, rejecting a value shape that does not fit the operator
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: FilterValue,
    ) -> Result<Self, String> {
        if value.arity() != operator.arity() {
            return Err(format!(
                "Operator '{}' expects {} but got {}",
                operator,
                describe_arity(operator.arity()),
                describe_arity(value.arity())
            ));
        }
        Ok(Self {
            field: field.into(),
            operator,
            value,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

fn describe_arity(arity: OperatorArity) -> &'static str {
    match arity {
        OperatorArity::None => "no value",
        OperatorArity::Single => "a single value",
        OperatorArity::List => "a list of values",
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            FilterValue::None => write!(f, "{}:{}", self.field, self.operator),
            FilterValue::Single(v) => write!(f, "{}:{}:{}", self.field, self.operator, v),
            FilterValue::List(vs) => {
                write!(f, "{}:{}:({})", self.field, self.operator, vs.join(","))
            }
        }
    }
}

// ============================================================================
// Sort criteria
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc` / `desc` ignoring case
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        })
    }
}

/// A single parsed sort instruction: `field[:direction]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortDirection::Desc)
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.direction)
    }
}

// ============================================================================
// Field types
// ============================================================================

/// Declared type of an entity field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    /// Text (maps to TEXT / VARCHAR)
    String,
    /// Whole numbers (maps to INTEGER / BIGINT)
    Integer,
    /// Exact decimals (maps to NUMERIC)
    Decimal,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// Point in time, RFC 3339
    Timestamp,
    Boolean,
    /// Many-valued field, usually backed by a junction table
    Collection { element: Box<FieldType> },
}

impl FieldType {
    /// Create a Collection type over the given element type
    pub fn collection(element: FieldType) -> Self {
        FieldType::Collection {
            element: Box::new(element),
        }
    }

    /// Type that individual filter values are checked and coerced against
    pub fn element_type(&self) -> &FieldType {
        match self {
            FieldType::Collection { element } => element.element_type(),
            other => other,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Timestamp)
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, FieldType::Boolean)
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, FieldType::Collection { .. })
    }

    /// Short lowercase name used in messages
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::Timestamp => "timestamp",
            FieldType::Boolean => "boolean",
            FieldType::Collection { .. } => "collection",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Raw value parsing
// ============================================================================

/// Parse a finite number the way filter values are checked against
/// numeric fields
pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

/// Parse an RFC 3339 timestamp; a zone-less `YYYY-MM-DDTHH:MM:SS` or a
/// bare date is taken as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
