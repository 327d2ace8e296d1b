//! Query compilation: filter criteria to parameterized SQL
//!
//! Builds WHERE and ORDER BY clauses from validated criteria, resolving
//! logical field names through the entity descriptor. Values only ever
//! reach the database through the parameter map; the SQL text contains
//! column expressions, operator keywords and `:name` placeholders.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::{EntityDescriptor, FieldDescriptor, Junction};
use crate::error::{FilterError, Result};
use crate::request::FilterRequest;
use crate::sql::params::{ParamValue, Parameters, SqlStatement};
use crate::sql::sanitize::quote_identifier;
use crate::types::{
    FieldType, FilterCriterion, FilterOperator, FilterValue, SortCriterion, parse_date,
    parse_number, parse_timestamp,
};
use crate::validator::VALIDATION_FAILED;

pub const LIMIT_PARAM: &str = "limit";
pub const OFFSET_PARAM: &str = "offset";

/// `SELECT <anything> FROM ` at the start of a query, shortest match
static SELECT_LIST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*SELECT\s+.+?\s+FROM\s").ok());

/// `SELECT DISTINCT` counts distinct rows, which `COUNT(*)` would not
static SELECT_DISTINCT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?is)^\s*SELECT\s+DISTINCT\b").ok());

/// Result of compiling a request against a base query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    /// Filtered, ordered and paginated query
    pub sql: String,
    /// Row count of the filtered query, without ordering or pagination
    pub count_sql: String,
    /// Every parameter of `sql`; `count_sql` uses all but limit/offset
    pub params: Parameters,
}

impl CompiledQuery {
    pub fn statement(&self) -> SqlStatement {
        SqlStatement::new(self.sql.clone(), self.params.clone())
    }

    pub fn count_statement(&self) -> SqlStatement {
        SqlStatement::new(
            self.count_sql.clone(),
            self.params.without(&[LIMIT_PARAM, OFFSET_PARAM]),
        )
    }
}

/// Compile a processed request against `base_select`
///
/// `base_select` is a `SELECT ... FROM ...` without a WHERE clause.
///
/// # Example
/// ```
/// use runtara_filter::{EntityDescriptor, FieldDescriptor, FieldType, FilterRequest};
/// use runtara_filter::parser::{parse_filters, parse_sorts};
/// use runtara_filter::sql::compile;
///
/// let users = EntityDescriptor::builder("User")
///     .field(FieldDescriptor::new("lastName", FieldType::String).column("u.last_name"))
///     .build()
///     .unwrap();
/// let request = FilterRequest::default().with_criteria(
///     parse_filters("lastName:sw:Sm").unwrap(),
///     parse_sorts("lastName:desc").unwrap(),
/// );
///
/// let query = compile("SELECT u.* FROM users u", &request, &users).unwrap();
/// assert_eq!(
///     query.sql,
///     "SELECT u.* FROM users u WHERE u.last_name LIKE :p1 ORDER BY u.last_name DESC LIMIT :limit OFFSET :offset"
/// );
/// assert_eq!(query.count_sql, "SELECT COUNT(*) FROM users u WHERE u.last_name LIKE :p1");
/// ```
pub fn compile(
    base_select: &str,
    request: &FilterRequest,
    descriptor: &EntityDescriptor,
) -> Result<CompiledQuery> {
    let mut params = Parameters::new();
    let mut counter = 0;

    let mut sql = base_select.trim().to_string();
    let where_clause =
        build_where_clause(request.filters(), descriptor, &mut params, &mut counter)?;
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clause);
    }

    let count_sql = count_sql(&sql);

    let order_by = build_order_by_clause(request.sorts(), descriptor)?;
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by);
    }

    sql.push_str(&pagination_clause());
    params.insert(LIMIT_PARAM, request.limit);
    params.insert(OFFSET_PARAM, request.offset);

    tracing::debug!(
        entity = descriptor.identity(),
        filters = request.filters().len(),
        sorts = request.sorts().len(),
        params = params.len(),
        "Compiled filter query"
    );

    Ok(CompiledQuery {
        sql,
        count_sql,
        params,
    })
}

/// ` LIMIT :limit OFFSET :offset`
pub fn pagination_clause() -> String {
    format!(" LIMIT :{} OFFSET :{}", LIMIT_PARAM, OFFSET_PARAM)
}

/// Build the AND-joined WHERE condition for `filters`
///
/// Parameters are named `p1`, `p2`, ... continuing from `counter`, which
/// is left at the last number used. Returns an empty string when there
/// are no filters.
pub fn build_where_clause(
    filters: &[FilterCriterion],
    descriptor: &EntityDescriptor,
    params: &mut Parameters,
    counter: &mut usize,
) -> Result<String> {
    let clauses = filters
        .iter()
        .map(|criterion| build_condition(criterion, descriptor, params, counter))
        .collect::<Result<Vec<_>>>()?;
    Ok(clauses.join(" AND "))
}

/// Build the SQL condition for one criterion
pub fn build_condition(
    criterion: &FilterCriterion,
    descriptor: &EntityDescriptor,
    params: &mut Parameters,
    counter: &mut usize,
) -> Result<String> {
    let field = resolve_field(descriptor, criterion.field())?;
    let op = criterion.operator();

    if let Some(junction) = &field.junction {
        return junction_condition(criterion, field, junction, descriptor, params, counter);
    }

    let column = &field.column;
    match criterion.value() {
        FilterValue::None => Ok(format!("{} {}", column, op.sql())),
        FilterValue::Single(raw) => {
            let name = next_param(counter);
            let value = if op.is_pattern() {
                ParamValue::Text(op.transform(raw))
            } else {
                coerce_value(&field.field_type, raw)
            };
            params.insert(name.as_str(), value);
            Ok(format!("{} {} :{}", column, op.sql(), name))
        }
        FilterValue::List(raws) => {
            let name = next_param(counter);
            params.insert(name.as_str(), coerce_list(&field.field_type, raws));
            Ok(format!("{} {} (:{})", column, op.sql(), name))
        }
    }
}

/// Membership test against a junction table keyed by the root identity
///
/// `roleIds:in:(1,3)` becomes
/// `u.user_id IN (SELECT "user_roles"."user_id" FROM "user_roles" WHERE "user_roles"."role_id" IN (:p1))`.
fn junction_condition(
    criterion: &FilterCriterion,
    field: &FieldDescriptor,
    junction: &Junction,
    descriptor: &EntityDescriptor,
    params: &mut Parameters,
    counter: &mut usize,
) -> Result<String> {
    let id_column = descriptor.id_column().ok_or_else(|| {
        FilterError::invalid_descriptor(format!(
            "Entity '{}' has junction field '{}' but no id column",
            descriptor.identity(),
            field.name
        ))
    })?;

    let op = criterion.operator();
    let (membership, list) = match op {
        FilterOperator::Eq => ("IN", false),
        FilterOperator::Ne => ("NOT IN", false),
        FilterOperator::In => ("IN", true),
        FilterOperator::NotIn => ("NOT IN", true),
        _ => {
            return Err(FilterError::validation(
                VALIDATION_FAILED,
                vec![format!(
                    "Operator '{}' is not supported on relation field '{}'",
                    op, field.name
                )],
            ));
        }
    };

    let name = next_param(counter);
    let related_test = match criterion.value() {
        FilterValue::Single(raw) if !list => {
            params.insert(name.as_str(), coerce_value(&field.field_type, raw));
            format!("= :{}", name)
        }
        FilterValue::List(raws) if list => {
            params.insert(name.as_str(), coerce_list(&field.field_type, raws));
            format!("IN (:{})", name)
        }
        _ => {
            return Err(FilterError::validation(
                VALIDATION_FAILED,
                vec![format!(
                    "Operator '{}' has no usable value for relation field '{}'",
                    op, field.name
                )],
            ));
        }
    };

    let table = quote_identifier(&junction.table);
    Ok(format!(
        "{} {} (SELECT {}.{} FROM {} WHERE {}.{} {})",
        id_column,
        membership,
        table,
        quote_identifier(&junction.owner_column),
        table,
        table,
        quote_identifier(&junction.related_column),
        related_test
    ))
}

/// Build the ORDER BY list (without the keyword) for `sorts`
///
/// Returns an empty string when there are no sorts.
pub fn build_order_by_clause(
    sorts: &[SortCriterion],
    descriptor: &EntityDescriptor,
) -> Result<String> {
    let parts = sorts
        .iter()
        .map(|sort| {
            let field = resolve_sort_field(descriptor, &sort.field)?;
            Ok(format!("{} {}", field.column, sort.direction.sql()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

/// Column expressions of `sorts`, in order
pub fn sort_columns<'a>(
    sorts: &[SortCriterion],
    descriptor: &'a EntityDescriptor,
) -> Result<Vec<&'a str>> {
    sorts
        .iter()
        .map(|sort| resolve_sort_field(descriptor, &sort.field).map(|f| f.column.as_str()))
        .collect()
}

/// Rewrite the select list of `sql` to `COUNT(*)`
///
/// Queries that do not start with `SELECT ... FROM`, or that select
/// `DISTINCT` rows, are wrapped in a counting subquery instead.
pub fn count_sql(sql: &str) -> String {
    let distinct = SELECT_DISTINCT.as_ref().is_none_or(|re| re.is_match(sql));
    let rewritten = SELECT_LIST
        .as_ref()
        .filter(|re| !distinct && re.is_match(sql))
        .map(|re| re.replace(sql, "SELECT COUNT(*) FROM ").into_owned());

    rewritten.unwrap_or_else(|| format!("SELECT COUNT(*) FROM ({}) AS filtered", sql.trim()))
}

/// Convert a raw filter value to the field's type, keeping the raw text
/// when it does not parse
pub fn coerce_value(field_type: &FieldType, raw: &str) -> ParamValue {
    let trimmed = raw.trim();
    let coerced = match field_type.element_type() {
        FieldType::Integer => trimmed
            .parse::<i64>()
            .ok()
            .map(ParamValue::Integer)
            .or_else(|| parse_number(trimmed).map(ParamValue::Float)),
        FieldType::Decimal => Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .ok()
            .map(ParamValue::Decimal),
        FieldType::Boolean => parse_bool(trimmed).map(ParamValue::Boolean),
        FieldType::Date => parse_date(trimmed).map(ParamValue::Date),
        FieldType::Timestamp => parse_timestamp(trimmed).map(ParamValue::Timestamp),
        FieldType::String | FieldType::Collection { .. } => None,
    };
    coerced.unwrap_or_else(|| ParamValue::Text(raw.to_string()))
}

fn coerce_list(field_type: &FieldType, raws: &[String]) -> ParamValue {
    ParamValue::List(raws.iter().map(|raw| coerce_value(field_type, raw)).collect())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn next_param(counter: &mut usize) -> String {
    *counter += 1;
    format!("p{}", counter)
}

fn resolve_field<'a>(descriptor: &'a EntityDescriptor, name: &str) -> Result<&'a FieldDescriptor> {
    descriptor.field(name).ok_or_else(|| {
        FilterError::validation(
            VALIDATION_FAILED,
            vec![format!("Unknown filter field '{}'", name)],
        )
    })
}

fn resolve_sort_field<'a>(
    descriptor: &'a EntityDescriptor,
    name: &str,
) -> Result<&'a FieldDescriptor> {
    descriptor.field(name).ok_or_else(|| {
        FilterError::validation(
            VALIDATION_FAILED,
            vec![format!("Unknown sort field '{}'", name)],
        )
    })
}
