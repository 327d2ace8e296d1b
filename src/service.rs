//! FilterService - entry point wiring the catalog, parser, validator and compiler
//!
//! Hosts construct one service at startup and share it across requests.
//! Every request goes through the same steps:
//! 1. `request` clamps pagination and attaches the raw filter/sort text
//! 2. `parse_and_validate` turns the raw text into checked criteria
//! 3. `compile` (single table) or `find_page` (joined view) produces results

use std::sync::Arc;

use crate::aggregate::{Assemble, JoinAggregator, RowSource};
use crate::catalog::{Describe, EntityDescriptor, SchemaCatalog};
use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::parser::{FILTER_PARSE_FAILED, SORT_PARSE_FAILED, collect_filters, collect_sorts};
use crate::request::{FilterRequest, Page};
use crate::sql::compiler::{CompiledQuery, compile};
use crate::validator::{VALIDATION_FAILED, collect_violations};

/// Filter pipeline over a shared schema catalog
#[derive(Debug, Clone)]
pub struct FilterService {
    catalog: Arc<SchemaCatalog>,
    config: FilterConfig,
}

impl FilterService {
    pub fn new(catalog: Arc<SchemaCatalog>, config: FilterConfig) -> Self {
        Self { catalog, config }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Build a raw request with pagination clamped to the configured bounds
    pub fn request(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
        filter: Option<&str>,
        sort: Option<&str>,
    ) -> FilterRequest {
        let mut request = FilterRequest::new(&self.config, limit, offset);
        if let Some(filter) = filter {
            request = request.with_filter(filter);
        }
        if let Some(sort) = sort {
            request = request.with_sort(sort);
        }
        request
    }

    /// Parse and validate the raw text of `request` against `entity`
    ///
    /// All problems are reported together. When any criterion fails
    /// validation the error is a validation error listing the parse
    /// problems first; otherwise parse problems alone give a parse error.
    pub fn parse_and_validate(
        &self,
        entity: &str,
        request: FilterRequest,
    ) -> Result<FilterRequest> {
        let descriptor = self.catalog.describe(entity)?;
        process(&descriptor, request)
    }

    /// Like [`parse_and_validate`](Self::parse_and_validate), describing `E` on first use
    pub fn parse_and_validate_entity<E: Describe>(
        &self,
        request: FilterRequest,
    ) -> Result<FilterRequest> {
        let descriptor = self.catalog.describe_entity::<E>()?;
        process(&descriptor, request)
    }

    /// Compile a processed request against a single-table base query
    pub fn compile(
        &self,
        entity: &str,
        base_select: &str,
        request: &FilterRequest,
    ) -> Result<CompiledQuery> {
        let descriptor = self.catalog.describe(entity)?;
        compile(base_select, request, &descriptor)
    }

    /// Look up one page of roots of a joined entity
    pub async fn find_page<S, A>(
        &self,
        source: &S,
        aggregator: &JoinAggregator,
        entity: &str,
        request: &FilterRequest,
        assembler: &A,
    ) -> Result<Page<A::Root>>
    where
        S: RowSource<A::Row>,
        A: Assemble,
    {
        let descriptor = self.catalog.describe(entity)?;
        aggregator
            .find_page(source, &descriptor, request, assembler)
            .await
    }
}

fn process(descriptor: &EntityDescriptor, request: FilterRequest) -> Result<FilterRequest> {
    let (filters, filter_errors) = collect_filters(request.filter.as_deref().unwrap_or_default());
    let (sorts, sort_errors) = collect_sorts(request.sort.as_deref().unwrap_or_default());
    let violations = collect_violations(&filters, &sorts, descriptor);

    let parse_failed = !filter_errors.is_empty() || !sort_errors.is_empty();
    if !parse_failed && violations.is_empty() {
        return Ok(request.with_criteria(filters, sorts));
    }

    let message = if !violations.is_empty() {
        VALIDATION_FAILED
    } else if !filter_errors.is_empty() {
        FILTER_PARSE_FAILED
    } else {
        SORT_PARSE_FAILED
    };

    let mut errors = filter_errors;
    errors.extend(sort_errors);
    let validation = !violations.is_empty();
    errors.extend(violations);

    tracing::debug!(
        entity = descriptor.identity(),
        errors = errors.len(),
        "Rejected filter request"
    );

    if validation {
        Err(FilterError::validation(message, errors))
    } else {
        Err(FilterError::parse(message, errors))
    }
}
