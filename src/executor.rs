//! PostgreSQL execution of compiled statements
//!
//! Statements carry `:name` placeholders; they are rewritten to `$n`
//! positional form and every value is bound through sqlx, never spliced
//! into the SQL text.

use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Decode, FromRow, PgPool, Postgres, Row, Type};

use crate::aggregate::{FlatRow, RowSource};
use crate::error::{FilterError, Result};
use crate::request::{FilterRequest, Page};
use crate::sql::compiler::CompiledQuery;
use crate::sql::params::{ParamValue, SqlStatement};

/// Runs filter statements against a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect to the database at `database_url`
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| FilterError::Connection(format!("Database connection failed: {}", e)))?;
        Ok(Self { pool })
    }

    /// Share an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, statement: &SqlStatement) -> Result<Vec<PgRow>> {
        let (sql, values) = statement.to_positional()?;
        let query = values.into_iter().fold(sqlx::query(&sql), bind_value);
        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Run a statement whose first column is a single count
    pub async fn fetch_count(&self, statement: &SqlStatement) -> Result<i64> {
        let rows = self.fetch_rows(statement).await?;
        match rows.first() {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Ok(0),
        }
    }

    /// Run a statement and decode the first column of every row
    pub async fn fetch_column<K>(&self, statement: &SqlStatement) -> Result<Vec<K>>
    where
        K: for<'r> Decode<'r, Postgres> + Type<Postgres> + Send + Unpin,
    {
        let rows = self.fetch_rows(statement).await?;
        rows.iter()
            .map(|row| row.try_get::<K, _>(0).map_err(FilterError::from))
            .collect()
    }

    /// Run a statement and map every row with `FromRow`
    pub async fn fetch_all<R>(&self, statement: &SqlStatement) -> Result<Vec<R>>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let rows = self.fetch_rows(statement).await?;
        rows.iter()
            .map(|row| R::from_row(row).map_err(FilterError::from))
            .collect()
    }

    /// Run a compiled single-table query: total count, then one page
    pub async fn fetch_page<R>(
        &self,
        query: &CompiledQuery,
        request: &FilterRequest,
    ) -> Result<Page<R>>
    where
        R: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let total = self
            .fetch_count(&query.count_statement())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Count query failed"))?;
        if total == 0 {
            return Ok(Page::empty(0, request));
        }

        let content = self
            .fetch_all(&query.statement())
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Select query failed"))?;

        tracing::debug!(total, rows = content.len(), "Fetched filtered page");
        Ok(Page::new(content, total, request))
    }
}

impl<R> RowSource<R> for PgExecutor
where
    R: FlatRow + for<'r> FromRow<'r, PgRow> + Send + Unpin,
    R::Key: for<'r> Decode<'r, Postgres> + Type<Postgres> + Unpin,
{
    async fn count(&self, statement: &SqlStatement) -> Result<i64> {
        self.fetch_count(statement).await
    }

    async fn root_ids(&self, statement: &SqlStatement) -> Result<Vec<R::Key>> {
        self.fetch_column(statement).await
    }

    async fn rows(&self, statement: &SqlStatement) -> Result<Vec<R>> {
        self.fetch_all(statement).await
    }
}

/// Bind one positional value
///
/// Lists are expected to be expanded by [`SqlStatement::to_positional`];
/// any that remain bind element by element.
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: ParamValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        ParamValue::Null => query.bind(None::<String>),
        ParamValue::Text(v) => query.bind(v),
        ParamValue::Integer(v) => query.bind(v),
        ParamValue::Float(v) => query.bind(v),
        ParamValue::Decimal(v) => query.bind(v),
        ParamValue::Boolean(v) => query.bind(v),
        ParamValue::Date(v) => query.bind(v),
        ParamValue::Timestamp(v) => query.bind(v),
        ParamValue::List(items) => items.into_iter().fold(query, bind_value),
    }
}
