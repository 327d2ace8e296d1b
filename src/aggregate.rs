//! Join aggregation: paginate on root entities over a flattened join
//!
//! A flattened view joins a root table to its one-to-many children (and
//! their children), producing one row per leaf combination. Filtering and
//! sorting run against that row stream, but pages are counted in distinct
//! roots and results are folded back into nested objects:
//!
//! 1. count distinct root ids matching the filters
//! 2. fetch one page of root ids, grouped by root id (plus sort columns)
//! 3. fetch every flattened row of those roots
//! 4. fold the rows into roots with de-duplicated children

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;

use tracing::instrument;

use crate::catalog::EntityDescriptor;
use crate::error::Result;
use crate::request::{FilterRequest, Page};
use crate::sql::compiler::{
    LIMIT_PARAM, OFFSET_PARAM, build_order_by_clause, build_where_clause, pagination_clause,
    sort_columns,
};
use crate::sql::params::{ParamValue, Parameters, SqlStatement};

/// Name of the id-list parameter of the rows query
pub const IDS_PARAM: &str = "ids";

/// One row of a flattened join
///
/// `child_id` is `None` when a left join found no child; `grandchild_id`
/// is `None` when the child has no grandchild in this row or the view
/// only has two levels.
pub trait FlatRow {
    type Key: Clone + Eq + Hash + Into<ParamValue> + Send + Sync;

    fn root_id(&self) -> Self::Key;

    fn child_id(&self) -> Option<Self::Key> {
        None
    }

    fn grandchild_id(&self) -> Option<Self::Key> {
        None
    }
}

/// Builds nested objects from the rows that first introduced them
///
/// Each level is constructed once, after all of its children are known.
/// Two-level views use `()` for `Grandchild`.
pub trait Assemble {
    type Row: FlatRow;
    type Root;
    type Child;
    type Grandchild;

    fn grandchild(&self, row: &Self::Row) -> Self::Grandchild;

    fn child(&self, row: &Self::Row, grandchildren: Vec<Self::Grandchild>) -> Self::Child;

    fn root(&self, row: &Self::Row, children: Vec<Self::Child>) -> Self::Root;
}

struct ChildSlot<K> {
    row: usize,
    grandchildren: Vec<usize>,
    seen: HashSet<K>,
}

struct RootSlot<K> {
    row: usize,
    children: Vec<ChildSlot<K>>,
    child_index: HashMap<K, usize>,
}

/// Fold flattened rows into roots, in first-seen order
///
/// Children are de-duplicated by id within their root and grandchildren
/// by id within their child, each keeping first-seen order.
pub fn fold_rows<A: Assemble>(rows: &[A::Row], assembler: &A) -> Vec<A::Root> {
    let mut roots: Vec<RootSlot<<A::Row as FlatRow>::Key>> = Vec::new();
    let mut root_index: HashMap<<A::Row as FlatRow>::Key, usize> = HashMap::new();

    for (i, row) in rows.iter().enumerate() {
        let root_pos = *root_index.entry(row.root_id()).or_insert_with(|| {
            roots.push(RootSlot {
                row: i,
                children: Vec::new(),
                child_index: HashMap::new(),
            });
            roots.len() - 1
        });

        let Some(child_id) = row.child_id() else {
            continue;
        };

        let root = &mut roots[root_pos];
        let child_pos = match root.child_index.get(&child_id) {
            Some(&pos) => pos,
            None => {
                root.children.push(ChildSlot {
                    row: i,
                    grandchildren: Vec::new(),
                    seen: HashSet::new(),
                });
                root.child_index.insert(child_id, root.children.len() - 1);
                root.children.len() - 1
            }
        };

        if let Some(grandchild_id) = row.grandchild_id() {
            let child = &mut root.children[child_pos];
            if child.seen.insert(grandchild_id) {
                child.grandchildren.push(i);
            }
        }
    }

    roots
        .into_iter()
        .map(|root| {
            let children = root
                .children
                .into_iter()
                .map(|child| {
                    let grandchildren = child
                        .grandchildren
                        .iter()
                        .map(|&g| assembler.grandchild(&rows[g]))
                        .collect();
                    assembler.child(&rows[child.row], grandchildren)
                })
                .collect();
            assembler.root(&rows[root.row], children)
        })
        .collect()
}

/// A flattened, left-joined query: `SELECT <select_list> FROM <from>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedView {
    /// Columns of the flattened row
    pub select_list: String,
    /// `FROM` target including every join, e.g.
    /// `deals d LEFT JOIN programs p ON d.deal_id = p.deal_id`
    pub from: String,
    /// Root identity expression, e.g. `d.deal_id`
    pub root_id: String,
}

impl JoinedView {
    pub fn new(
        select_list: impl Into<String>,
        from: impl Into<String>,
        root_id: impl Into<String>,
    ) -> Self {
        Self {
            select_list: select_list.into(),
            from: from.into(),
            root_id: root_id.into(),
        }
    }

    /// The flattened query without any filter
    pub fn base_select(&self) -> String {
        format!("SELECT {} FROM {}", self.select_list, self.from)
    }
}

/// The statements of one join-aggregated lookup
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    /// `COUNT(DISTINCT root)` of the filtered view
    pub count: SqlStatement,
    /// One page of root ids, grouped and ordered
    pub root_ids: SqlStatement,
    root_id: String,
    select_from: String,
    order_by: String,
}

impl JoinPlan {
    /// Build the count and root-id statements for `request`
    ///
    /// Without explicit sorts, pages are ordered by root id. With sorts,
    /// the root id is appended as a tie-breaker unless already sorted on.
    pub fn new(
        view: &JoinedView,
        descriptor: &EntityDescriptor,
        request: &FilterRequest,
    ) -> Result<Self> {
        let mut params = Parameters::new();
        let mut counter = 0;
        let where_clause =
            build_where_clause(request.filters(), descriptor, &mut params, &mut counter)?;
        let where_sql = if where_clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", where_clause)
        };

        let sort_cols = sort_columns(request.sorts(), descriptor)?;
        let mut group_by = vec![view.root_id.as_str()];
        for &col in &sort_cols {
            if !group_by.contains(&col) {
                group_by.push(col);
            }
        }

        let mut order_by = build_order_by_clause(request.sorts(), descriptor)?;
        if !sort_cols.contains(&view.root_id.as_str()) {
            if !order_by.is_empty() {
                order_by.push_str(", ");
            }
            order_by.push_str(&format!("{} ASC", view.root_id));
        }

        let count = SqlStatement::new(
            format!(
                "SELECT COUNT(DISTINCT {}) FROM {}{}",
                view.root_id, view.from, where_sql
            ),
            params.clone(),
        );

        let mut id_params = params;
        id_params.insert(LIMIT_PARAM, request.limit);
        id_params.insert(OFFSET_PARAM, request.offset);
        let root_ids = SqlStatement::new(
            format!(
                "SELECT {} FROM {}{} GROUP BY {} ORDER BY {}{}",
                view.root_id,
                view.from,
                where_sql,
                group_by.join(", "),
                order_by,
                pagination_clause()
            ),
            id_params,
        );

        Ok(Self {
            count,
            root_ids,
            root_id: view.root_id.clone(),
            select_from: view.base_select(),
            order_by,
        })
    }

    /// Flattened rows of the given roots, in the requested order
    pub fn rows<K: Into<ParamValue>>(&self, ids: Vec<K>) -> SqlStatement {
        let mut params = Parameters::new();
        params.insert(IDS_PARAM, ids);
        SqlStatement::new(
            format!(
                "{} WHERE {} IN (:{}) ORDER BY {}",
                self.select_from, self.root_id, IDS_PARAM, self.order_by
            ),
            params,
        )
    }
}

/// Executes the statements of a join plan
///
/// Implemented for PostgreSQL by [`crate::executor::PgExecutor`].
pub trait RowSource<R: FlatRow>: Sync {
    /// Run a single-value count query
    fn count(&self, statement: &SqlStatement) -> impl Future<Output = Result<i64>> + Send;

    /// Run a query whose first column is the root id
    fn root_ids(
        &self,
        statement: &SqlStatement,
    ) -> impl Future<Output = Result<Vec<R::Key>>> + Send;

    /// Run a query returning flattened rows
    fn rows(&self, statement: &SqlStatement) -> impl Future<Output = Result<Vec<R>>> + Send;
}

/// Paginates root entities of one flattened view
#[derive(Debug, Clone)]
pub struct JoinAggregator {
    view: JoinedView,
}

impl JoinAggregator {
    pub fn new(view: JoinedView) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &JoinedView {
        &self.view
    }

    pub fn plan(&self, descriptor: &EntityDescriptor, request: &FilterRequest) -> Result<JoinPlan> {
        JoinPlan::new(&self.view, descriptor, request)
    }

    /// Look up one page of roots
    ///
    /// Any failing statement fails the whole lookup; nothing is retried
    /// and no partial page is returned.
    #[instrument(
        skip_all,
        fields(entity = descriptor.identity(), limit = request.limit, offset = request.offset)
    )]
    pub async fn find_page<S, A>(
        &self,
        source: &S,
        descriptor: &EntityDescriptor,
        request: &FilterRequest,
        assembler: &A,
    ) -> Result<Page<A::Root>>
    where
        S: RowSource<A::Row>,
        A: Assemble,
    {
        let plan = self.plan(descriptor, request)?;

        let total = source
            .count(&plan.count)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Root count query failed"))?;
        if total == 0 {
            tracing::debug!("No roots match");
            return Ok(Page::empty(0, request));
        }

        let ids = source
            .root_ids(&plan.root_ids)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Root id query failed"))?;
        let ids = dedup_in_order(ids);
        if ids.is_empty() {
            tracing::debug!(total, "Page is past the last root");
            return Ok(Page::empty(total, request));
        }

        let page_size = ids.len();
        let rows = source
            .rows(&plan.rows(ids))
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Flattened row query failed"))?;

        let roots = fold_rows(&rows, assembler);
        tracing::debug!(total, page_size, rows = rows.len(), "Aggregated join page");

        Ok(Page::new(roots, total, request))
    }
}

fn dedup_in_order<K: Clone + Eq + Hash>(ids: Vec<K>) -> Vec<K> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
