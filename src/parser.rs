//! Expression parser for filter and sort text
//!
//! Filter text is a comma-separated list of `field:operator[:value]`
//! segments, where list operators take a parenthesized value such as
//! `status:in:(OPEN,CLOSED)`. Sort text is a comma-separated list of
//! `field[:direction]`.
//!
//! Parsing never stops at the first bad segment: every problem is
//! collected and reported together.

use crate::error::{FilterError, Result};
use crate::types::{
    FilterCriterion, FilterOperator, FilterValue, OperatorArity, SortCriterion, SortDirection,
};

pub const FILTER_PARSE_FAILED: &str = "Filter parsing failed";
pub const SORT_PARSE_FAILED: &str = "Sort parsing failed";

/// Parse filter text into criteria
///
/// Blank input yields an empty list.
///
/// # Example
/// ```
/// use runtara_filter::parser::parse_filters;
///
/// let filters = parse_filters("status:in:(OPEN,CLOSED),amount:gte:100").unwrap();
/// assert_eq!(filters.len(), 2);
/// assert_eq!(filters[0].to_string(), "status:in:(OPEN,CLOSED)");
/// ```
pub fn parse_filters(text: &str) -> Result<Vec<FilterCriterion>> {
    let (criteria, errors) = collect_filters(text);
    if errors.is_empty() {
        Ok(criteria)
    } else {
        Err(FilterError::parse(FILTER_PARSE_FAILED, errors))
    }
}

/// Parse sort text into sort criteria
///
/// # Example
/// ```
/// use runtara_filter::parser::parse_sorts;
/// use runtara_filter::SortDirection;
///
/// let sorts = parse_sorts("lastName:desc,firstName").unwrap();
/// assert_eq!(sorts[0].direction, SortDirection::Desc);
/// assert_eq!(sorts[1].direction, SortDirection::Asc);
/// ```
pub fn parse_sorts(text: &str) -> Result<Vec<SortCriterion>> {
    let (sorts, errors) = collect_sorts(text);
    if errors.is_empty() {
        Ok(sorts)
    } else {
        Err(FilterError::parse(SORT_PARSE_FAILED, errors))
    }
}

/// Parse every filter segment, returning the good criteria alongside one
/// message per malformed segment
pub(crate) fn collect_filters(text: &str) -> (Vec<FilterCriterion>, Vec<String>) {
    let mut criteria = Vec::new();
    let mut errors = Vec::new();

    for segment in split_segments(text) {
        match parse_filter_segment(segment) {
            Ok(criterion) => criteria.push(criterion),
            Err(reason) => errors.push(format!("Invalid filter '{}': {}", segment, reason)),
        }
    }

    (criteria, errors)
}

pub(crate) fn collect_sorts(text: &str) -> (Vec<SortCriterion>, Vec<String>) {
    let mut sorts = Vec::new();
    let mut errors = Vec::new();

    for segment in text.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match parse_sort_segment(segment) {
            Ok(sort) => sorts.push(sort),
            Err(reason) => errors.push(format!("Invalid sort '{}': {}", segment, reason)),
        }
    }

    (sorts, errors)
}

/// Split on commas that are not inside a parenthesized list
///
/// A comma stays in its segment only when the next parenthesis after it
/// is a closing one, so an unbalanced `(` in a value never swallows the
/// segments that follow. Blank segments are dropped and the rest are
/// trimmed.
fn split_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;

    for (i, ch) in text.char_indices() {
        if ch == ',' && !inside_list(&text[i + 1..]) {
            segments.push(&text[start..i]);
            start = i + 1;
        }
    }
    segments.push(&text[start..]);

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn inside_list(rest: &str) -> bool {
    rest.chars()
        .find(|c| matches!(c, '(' | ')'))
        .is_some_and(|c| c == ')')
}

fn parse_filter_segment(segment: &str) -> std::result::Result<FilterCriterion, String> {
    let mut parts = segment.splitn(3, ':');
    let field = parts.next().unwrap_or_default().trim();
    let Some(code) = parts.next() else {
        return Err("Expected format 'field:operator' or 'field:operator:value'".to_string());
    };
    let raw_value = parts.next();

    if field.is_empty() {
        return Err("Field name cannot be empty".to_string());
    }

    let operator = FilterOperator::from_code(code)
        .ok_or_else(|| format!("Unknown operator '{}'", code.trim()))?;

    let value = match operator.arity() {
        OperatorArity::None => {
            if raw_value.is_some() {
                return Err(format!("Operator '{}' does not accept a value", operator));
            }
            FilterValue::None
        }
        OperatorArity::Single => match raw_value.map(str::trim) {
            Some(v) if !v.is_empty() => FilterValue::Single(v.to_string()),
            _ => return Err(format!("Operator '{}' requires a value", operator)),
        },
        OperatorArity::List => FilterValue::List(parse_list(operator, raw_value)?),
    };

    FilterCriterion::new(field, operator, value)
}

fn parse_list(
    operator: FilterOperator,
    raw_value: Option<&str>,
) -> std::result::Result<Vec<String>, String> {
    let raw = raw_value.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(format!("Operator '{}' requires a value", operator));
    }

    let inner = raw
        .strip_prefix('(')
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(|| {
            format!(
                "Operator '{}' requires a parenthesized list, e.g. (a,b)",
                operator
            )
        })?;

    if inner.trim().is_empty() {
        return Err("List value cannot be empty".to_string());
    }

    let values: Vec<String> = inner.split(',').map(|v| v.trim().to_string()).collect();
    if values.iter().any(String::is_empty) {
        return Err("List value contains an empty element".to_string());
    }

    Ok(values)
}

fn parse_sort_segment(segment: &str) -> std::result::Result<SortCriterion, String> {
    let mut parts = segment.splitn(2, ':');
    let field = parts.next().unwrap_or_default().trim();
    if field.is_empty() {
        return Err("Field name cannot be empty".to_string());
    }

    let direction = match parts.next().map(str::trim) {
        None | Some("") => SortDirection::default(),
        Some(code) => SortDirection::from_code(code).ok_or_else(|| {
            format!("Unknown sort direction '{}' (expected asc or desc)", code)
        })?,
    };

    Ok(SortCriterion::new(field, direction))
}
