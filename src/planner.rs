//! Index-aware join planning.
//!
//! Given the tables required by a statement and its AND-decomposed
//! predicate, the planner extracts join edges (column-to-column equalities
//! where the probed side has an index) and orders the tables so that as
//! many nested loops as possible are driven by index probes instead of
//! full scans.
//!
//! The chosen order is the longest simple path through the edge graph,
//! found by exhaustive DFS. Worst case is O(k!) over k tables, which is
//! fine at this scale; [`MAX_JOIN_TABLES`] caps k. Identical inputs yield
//! identical orders: start vertices are tried in position order and only a
//! strictly deeper path replaces the current best, so ties go to the
//! lowest table position, first-found path.

use std::fmt;

use tracing::debug;

use crate::expr::Expr;
use crate::table::Table;

/// Hard cap on the number of tables one statement may join.
pub const MAX_JOIN_TABLES: usize = 16;

/// Planner errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A join clause referenced a table outside the statement's scope.
    TableNotFound(String),
    /// A join clause referenced a column that does not resolve.
    ColumnNotFound(String),
    /// Statement joins more than [`MAX_JOIN_TABLES`] tables.
    TooManyTables(usize),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::TableNotFound(name) => write!(f, "table `{name}` not found"),
            PlanError::ColumnNotFound(name) => write!(f, "column `{name}` not found"),
            PlanError::TooManyTables(n) => {
                write!(f, "too many tables in join: {n} (max {MAX_JOIN_TABLES})")
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// One indexed step of the plan: with the outer table's row cached, probe
/// the index on the inner table's column by lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStep {
    /// Position of the indexed (inner) table.
    pub inner: usize,
    /// Probed column of the inner table.
    pub inner_col: usize,
    /// Position of the outer table supplying the key.
    pub outer: usize,
    /// Column of the outer table whose cached value is the probe key.
    pub outer_col: usize,
}

/// A join plan over the statement's table list.
///
/// `order` lists table positions innermost-first: execution nests loops
/// from `order[len-1]` (outermost) down to `order[0]`. For `i < depth`,
/// `probes[i]` drives `order[i]` by an index probe keyed off `order[i+1]`;
/// the remaining positions are full scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPlan {
    /// Table positions, innermost-first.
    pub order: Vec<usize>,
    /// Index probe for `order[i]`, present for `i < depth`.
    pub probes: Vec<Option<ProbeStep>>,
    /// Number of index-driven steps.
    pub depth: usize,
}

impl JoinPlan {
    /// Iteration order outermost-first, as table positions.
    pub fn iteration_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().rev().copied()
    }
}

/// An edge in the join graph: "walking the outer table provides a key
/// that indexes the inner table", annotated with the probe columns.
#[derive(Debug, Clone, Copy)]
struct EdgeInfo {
    inner_col: usize,
    outer_col: usize,
}

/// Builds a join plan for `tables` from the AND-decomposed `clauses`.
///
/// Clauses that are not column-to-column equalities, or whose columns lack
/// any index, contribute no edge (they are still evaluated by the final
/// predicate check during iteration). A clause that names a table outside
/// the scope or a column that does not resolve is an error.
pub fn build_plan(tables: &[&Table], clauses: &[&Expr]) -> Result<JoinPlan, PlanError> {
    let n = tables.len();
    if n > MAX_JOIN_TABLES {
        return Err(PlanError::TooManyTables(n));
    }
    if n == 0 {
        return Ok(JoinPlan {
            order: Vec::new(),
            probes: Vec::new(),
            depth: 0,
        });
    }

    // Extract join edges. edges[a][b] means: table `a` has an index fed by
    // a key cached while iterating table `b`.
    let mut edges: Vec<Vec<Option<EdgeInfo>>> = vec![vec![None; n]; n];
    for clause in clauses {
        let Some(((lt, lc), (rt, rc))) = clause.as_column_equality() else {
            continue;
        };
        let (tid1, cid1) = resolve(tables, lt, lc)?;
        let (tid2, cid2) = resolve(tables, rt, rc)?;
        if tid1 == tid2 {
            continue;
        }

        let idx1 = tables[tid1].get_index(cid1).is_some();
        let idx2 = tables[tid2].get_index(cid2).is_some();
        if idx2 {
            edges[tid2][tid1] = Some(EdgeInfo {
                inner_col: cid2,
                outer_col: cid1,
            });
        }
        if idx1 {
            edges[tid1][tid2] = Some(EdgeInfo {
                inner_col: cid1,
                outer_col: cid2,
            });
        }
    }

    // Find the deepest reachable depth over all start vertices; lowest
    // start wins ties because only a strictly deeper result replaces it.
    let mut max_depth = 0;
    let mut start = 0;
    for i in 0..n {
        let mut mark = vec![false; n];
        let mut path = vec![0; n];
        let mut reached = 0;
        find_longest_path(i, 0, &mut mark, &mut path, &edges, usize::MAX, &mut reached);
        if reached > max_depth {
            max_depth = reached;
            start = i;
        }
    }

    // Re-run constrained to exactly max_depth to recover the sequence.
    let mut mark = vec![false; n];
    let mut path = vec![0; n];
    let mut reached = 0;
    let found = find_longest_path(
        start,
        0,
        &mut mark,
        &mut path,
        &edges,
        max_depth,
        &mut reached,
    );
    debug_assert!(found);

    // Tables off the path are appended to the tail in position order; they
    // become outermost full scans.
    let mut on_path = vec![false; n];
    for &t in &path[..=max_depth] {
        on_path[t] = true;
    }
    let mut cursor = max_depth;
    for (i, seen) in on_path.iter().enumerate() {
        if !seen {
            cursor += 1;
            path[cursor] = i;
        }
    }

    // Record which column each indexed step probes.
    let mut probes = vec![None; n];
    for i in 0..max_depth {
        let edge = edges[path[i]][path[i + 1]]
            .expect("path step must follow an edge");
        probes[i] = Some(ProbeStep {
            inner: path[i],
            inner_col: edge.inner_col,
            outer: path[i + 1],
            outer_col: edge.outer_col,
        });
    }

    let plan = JoinPlan {
        order: path,
        probes,
        depth: max_depth,
    };
    debug!(
        order = ?plan.iteration_order().map(|t| tables[t].name()).collect::<Vec<_>>(),
        depth = plan.depth,
        "join plan"
    );
    Ok(plan)
}

/// Bounded DFS for the longest simple path.
///
/// Tracks the maximum depth reached in `max_depth`; returns true when a
/// path of exactly `expected_len` edges has been laid down in `path`.
fn find_longest_path(
    now: usize,
    depth: usize,
    mark: &mut [bool],
    path: &mut [usize],
    edges: &[Vec<Option<EdgeInfo>>],
    expected_len: usize,
    max_depth: &mut usize,
) -> bool {
    mark[now] = true;
    path[depth] = now;
    if depth > *max_depth {
        *max_depth = depth;
    }
    if depth == expected_len {
        return true;
    }
    for next in 0..edges.len() {
        if edges[now][next].is_none() || mark[next] {
            continue;
        }
        if find_longest_path(next, depth + 1, mark, path, edges, expected_len, max_depth) {
            return true;
        }
    }
    mark[now] = false;
    false
}

/// Resolves a possibly-elided table name and column against the scope.
fn resolve(
    tables: &[&Table],
    table: Option<&str>,
    column: &str,
) -> Result<(usize, usize), PlanError> {
    match table {
        Some(name) => {
            let tid = tables
                .iter()
                .position(|t| t.name() == name)
                .ok_or_else(|| PlanError::TableNotFound(name.to_string()))?;
            let cid = tables[tid]
                .lookup_column(column)
                .ok_or_else(|| PlanError::ColumnNotFound(format!("{name}.{column}")))?;
            Ok((tid, cid))
        }
        None => {
            let mut found = None;
            for (tid, t) in tables.iter().enumerate() {
                if let Some(cid) = t.lookup_column(column) {
                    if found.is_some() {
                        return Err(PlanError::ColumnNotFound(column.to_string()));
                    }
                    found = Some((tid, cid));
                }
            }
            found.ok_or_else(|| PlanError::ColumnNotFound(column.to_string()))
        }
    }
}
