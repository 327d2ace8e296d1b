//! SQL generation for filter requests
//!
//! Provides query compilation, named parameters and identifier utilities.

pub mod compiler;
pub mod params;
pub mod sanitize;

pub use compiler::{
    CompiledQuery, build_condition, build_order_by_clause, build_where_clause, coerce_value,
    compile, count_sql, pagination_clause, sort_columns,
};
pub use params::{ParamValue, Parameters, SqlStatement};
pub use sanitize::{quote_identifier, to_snake_case, validate_identifier};
