//! # runtara-filter
//!
//! Filter, sort and paginate PostgreSQL queries from compact text expressions.
//!
//! Callers send filters such as `status:eq:OPEN,amount:gte:100,roleIds:in:(1,3)`
//! and sorts such as `amount:desc,name`. This crate parses them, checks them
//! against a declared entity schema, and compiles them into parameterized SQL.
//! Entities spread over one-to-many joins are paginated by root and folded
//! back into nested objects.
//!
//! ## Features
//!
//! - **Expression Parsing**: Parenthesis-aware filter syntax with batched error reporting
//! - **Schema Catalog**: Explicit field-to-column tables per entity, built once and shared
//! - **Validation**: Operator/type compatibility, filterable/sortable checks, value checks
//! - **Query Compilation**: WHERE/ORDER BY/LIMIT with every value bound as a named parameter
//! - **Junction Filters**: Many-to-many membership via subqueries on the junction table
//! - **Join Aggregation**: Two-phase pagination over flattened joins with nested folding
//! - **SQL Injection Prevention**: User text only reaches SQL as validated field names
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use runtara_filter::{
//!     EntityDescriptor, FieldDescriptor, FieldType, FilterConfig, FilterService, PgExecutor,
//!     SchemaCatalog,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(SchemaCatalog::new());
//!     catalog.register(
//!         EntityDescriptor::builder("User")
//!             .field(FieldDescriptor::new("userId", FieldType::Integer).column("u.user_id"))
//!             .field(FieldDescriptor::new("username", FieldType::String).column("u.username"))
//!             .build()?,
//!     )?;
//!
//!     let service = FilterService::new(catalog, FilterConfig::default());
//!     let request = service.parse_and_validate(
//!         "User",
//!         service.request(Some(10), None, Some("username:sw:ad"), Some("userId:desc")),
//!     )?;
//!     let query = service.compile("User", "SELECT u.user_id, u.username FROM users u", &request)?;
//!
//!     let executor = PgExecutor::connect("postgres://localhost/mydb").await?;
//!     let page = executor.fetch_page::<(i32, String)>(&query, &request).await?;
//!     println!("{} of {} users", page.number_of_elements(), page.total_elements);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! Pagination bounds come from `FilterConfig`:
//!
//! ```rust
//! use runtara_filter::FilterConfig;
//!
//! let config = FilterConfig::builder()
//!     .default_limit(20) // Used when the limit is missing or not positive
//!     .max_limit(100)    // Larger limits are reduced to this
//!     .build();
//! assert_eq!(config.clamp_limit(Some(500)), 100);
//! ```

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod parser;
pub mod request;
pub mod service;
pub mod sql;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use aggregate::{Assemble, FlatRow, JoinAggregator, JoinPlan, JoinedView, RowSource, fold_rows};
pub use catalog::{
    Describe, EntityDescriptor, EntityDescriptorBuilder, FieldDescriptor, Junction, SchemaCatalog,
};
pub use config::{FilterConfig, FilterConfigBuilder};
pub use error::{FilterError, Result};
pub use executor::PgExecutor;
pub use request::{FilterRequest, Page};
pub use service::FilterService;
pub use types::{
    FieldType, FilterCriterion, FilterOperator, FilterValue, OperatorArity, SortCriterion,
    SortDirection,
};

// Re-export SQL utilities for advanced users
pub use sql::{CompiledQuery, ParamValue, Parameters, SqlStatement, compile};
