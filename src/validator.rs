//! Validation of parsed criteria against an entity descriptor
//!
//! Every criterion and sort is checked and every violation is reported;
//! nothing short-circuits on the first problem.

use std::collections::BTreeSet;

use crate::catalog::EntityDescriptor;
use crate::error::{FilterError, Result};
use crate::types::{
    FieldType, FilterCriterion, FilterOperator, SortCriterion, parse_date, parse_number,
    parse_timestamp,
};

pub const VALIDATION_FAILED: &str = "Filter validation failed";

/// Validate filters and sorts, failing with every violation found
///
/// # Example
/// ```
/// use runtara_filter::{EntityDescriptor, FieldDescriptor, FieldType};
/// use runtara_filter::parser::parse_filters;
/// use runtara_filter::validator::validate;
///
/// let users = EntityDescriptor::builder("User")
///     .field(FieldDescriptor::new("age", FieldType::Integer))
///     .build()
///     .unwrap();
///
/// let filters = parse_filters("age:gt:abc,nickname:eq:x").unwrap();
/// let err = validate(&filters, &[], &users).unwrap_err();
/// assert_eq!(err.errors().len(), 2);
/// ```
pub fn validate(
    filters: &[FilterCriterion],
    sorts: &[SortCriterion],
    descriptor: &EntityDescriptor,
) -> Result<()> {
    let errors = collect_violations(filters, sorts, descriptor);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FilterError::validation(VALIDATION_FAILED, errors))
    }
}

pub(crate) fn collect_violations(
    filters: &[FilterCriterion],
    sorts: &[SortCriterion],
    descriptor: &EntityDescriptor,
) -> Vec<String> {
    let mut errors = Vec::new();
    for criterion in filters {
        check_filter(criterion, descriptor, &mut errors);
    }
    for sort in sorts {
        check_sort(sort, descriptor, &mut errors);
    }
    errors
}

fn check_filter(
    criterion: &FilterCriterion,
    descriptor: &EntityDescriptor,
    errors: &mut Vec<String>,
) {
    let name = criterion.field();
    let Some(field) = descriptor.field(name) else {
        errors.push(format!(
            "Unknown filter field '{}'. Valid: {}",
            name,
            format_set(descriptor.filterable_fields())
        ));
        return;
    };

    if !field.filterable {
        errors.push(format!("Field '{}' is not filterable", name));
        return;
    }

    let op = criterion.operator();
    let field_type = &field.field_type;
    let value_type = field_type.element_type();

    if field.is_junction()
        && !matches!(
            op,
            FilterOperator::Eq | FilterOperator::Ne | FilterOperator::In | FilterOperator::NotIn
        )
    {
        errors.push(format!(
            "Operator '{}' is not supported on relation field '{}'",
            op, name
        ));
    }

    if op.is_pattern() && !field_type.is_string() {
        errors.push(format!(
            "Operator '{}' only works with string fields, but '{}' is {}",
            op, name, field_type
        ));
    }

    if op.is_comparison() && !(field_type.is_numeric() || field_type.is_temporal()) {
        errors.push(format!(
            "Operator '{}' is not supported for {} field '{}'",
            op, field_type, name
        ));
    }

    if op.is_list() && value_type.is_boolean() {
        errors.push(format!(
            "Operator '{}' is not supported for boolean field '{}'",
            op, name
        ));
    }

    for raw in criterion.value().values() {
        if let Some(message) = check_value(name, value_type, raw) {
            errors.push(message);
        }
    }
}

fn check_value(name: &str, value_type: &FieldType, raw: &str) -> Option<String> {
    if value_type.is_numeric() && parse_number(raw).is_none() {
        return Some(format!(
            "Field '{}' expects numeric value, got '{}'",
            name, raw
        ));
    }

    let temporal_ok = match value_type {
        FieldType::Date => parse_date(raw).is_some(),
        FieldType::Timestamp => parse_timestamp(raw).is_some(),
        _ => true,
    };
    if !temporal_ok {
        return Some(format!("Field '{}' expects date value, got '{}'", name, raw));
    }

    None
}

fn check_sort(sort: &SortCriterion, descriptor: &EntityDescriptor, errors: &mut Vec<String>) {
    match descriptor.field(&sort.field) {
        None => errors.push(format!(
            "Unknown sort field '{}'. Valid: {}",
            sort.field,
            format_set(descriptor.sortable_fields())
        )),
        Some(field) if !field.sortable => {
            errors.push(format!("Field '{}' is not sortable", sort.field))
        }
        Some(_) => {}
    }
}

fn format_set(names: BTreeSet<&str>) -> String {
    format!("[{}]", names.into_iter().collect::<Vec<_>>().join(", "))
}
