//! Row iteration strategies.
//!
//! Three strategies produce row tuples for a statement, chosen by table
//! count and index availability:
//!
//! - **Single-table scan** ([`scan_table`]): full sequential scan in
//!   insertion order with a predicate filter.
//! - **Two-table index join** ([`iterate`] with two tables): when the
//!   predicate carries a column-to-column equality with an index on one
//!   side, the non-indexed table drives an outer scan and the indexed
//!   table is probed by lower bound, breaking at the first non-equal key.
//! - **N-table planned iteration**: nested loops ordered by the join
//!   planner so each inner loop is fed by an index probe where possible;
//!   the complete predicate is evaluated at the innermost level.
//!
//! Every visited row is decoded into its table's row cache before the
//! predicate or the visitor run; visitors read column values from the
//! caches and return [`Flow`] to continue or stop. Iteration is
//! synchronous and deterministic.

use std::io::Write;

use tracing::debug;

use crate::expr::{EvalScope, Expr};
use crate::index::IndexKey;
use crate::planner::{self, JoinPlan};
use crate::session::EngineError;
use crate::table::{Rid, Table};

/// Visitor verdict: keep iterating or stop at the next row boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep iterating.
    Continue,
    /// Terminate iteration promptly.
    Stop,
}

/// Row visitor: receives the tables of the current strategy and the rid of
/// each table's current row (parallel slices).
pub type Visitor<'a> = dyn FnMut(&[&Table], &[Rid]) -> Result<Flow, EngineError> + 'a;

/// Visits every row of one table in insertion order, filtered by the
/// predicate.
///
/// Each row is decoded into the row cache before the predicate runs; the
/// visitor is invoked only when the predicate evaluates true (a missing
/// predicate matches every row). Evaluator failure aborts the iteration
/// and surfaces the error.
pub fn scan_table(
    table: &Table,
    cond: Option<&Expr>,
    visit: &mut dyn FnMut(&Table, Rid) -> Result<Flow, EngineError>,
) -> Result<Flow, EngineError> {
    let scope_tables = [table];
    let scope = EvalScope::new(&scope_tables);
    for rid in table.live_rids() {
        if !table.cache_record(rid)? {
            continue;
        }
        if let Some(cond) = cond {
            if !scope.eval(cond)?.to_bool() {
                continue;
            }
        }
        if let Flow::Stop = visit(table, rid)? {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}

/// Iterates the row tuples of one or more tables under a predicate,
/// choosing a strategy by cardinality and available indexes.
///
/// Join-strategy diagnostics are reported on `info` after iteration
/// completes. For the two-table index join the visitor sees the tables in
/// (outer, inner) order; the N-table strategy preserves statement order.
pub fn iterate(
    tables: &[&Table],
    cond: Option<&Expr>,
    info: &mut dyn Write,
    visit: &mut Visitor<'_>,
) -> Result<Flow, EngineError> {
    match tables.len() {
        0 => Ok(Flow::Continue),
        1 => scan_table(tables[0], cond, &mut |table, rid| {
            visit(&[table], &[rid])
        }),
        2 => {
            if let Some(flow) = join_two_tables(tables[0], tables[1], cond, info, visit)? {
                writeln!(info, "[Info] Join two tables using index.")?;
                Ok(flow)
            } else {
                let flow = iterate_many_tables(tables, cond, info, visit)?;
                writeln!(info, "[Info] Join two tables by enumerating.")?;
                Ok(flow)
            }
        }
        _ => {
            let flow = iterate_many_tables(tables, cond, info, visit)?;
            writeln!(info, "[Info] Join many tables by enumerating.")?;
            Ok(flow)
        }
    }
}

/// Attempts the two-table index join.
///
/// Applies when the AND-decomposed predicate carries a column-to-column
/// equality between the two tables with an index on at least one side.
/// Returns `Ok(None)` when the strategy does not apply and the caller
/// should fall back to the planner.
fn join_two_tables(
    t1: &Table,
    t2: &Table,
    cond: Option<&Expr>,
    info: &mut dyn Write,
    visit: &mut Visitor<'_>,
) -> Result<Option<Flow>, EngineError> {
    let Some(cond) = cond else {
        return Ok(None);
    };
    let pair = [t1, t2];

    // Find a cross-table equality conjunct.
    let mut join: Option<((usize, usize), (usize, usize))> = None;
    for clause in cond.conjuncts() {
        let Some(((lt, lc), (rt, rc))) = clause.as_column_equality() else {
            continue;
        };
        let (Ok(left), Ok(right)) = (resolve_in(&pair, lt, lc), resolve_in(&pair, rt, rc)) else {
            continue;
        };
        if left.0 != right.0 {
            join = Some((left, right));
            break;
        }
    }
    let Some(((lt_pos, lc), (rt_pos, rc))) = join else {
        return Ok(None);
    };

    // Orient: the indexed side becomes the inner table. The right operand
    // wins when both sides are indexed.
    let left_indexed = pair[lt_pos].get_index(lc).is_some();
    let right_indexed = pair[rt_pos].get_index(rc).is_some();
    let ((outer, outer_col), (inner, inner_col)) = if right_indexed {
        ((pair[lt_pos], lc), (pair[rt_pos], rc))
    } else if left_indexed {
        ((pair[rt_pos], rc), (pair[lt_pos], lc))
    } else {
        writeln!(
            info,
            "[Info] No index for {}.{} and {}.{}",
            pair[lt_pos].name(),
            column_name(pair[lt_pos], lc),
            pair[rt_pos].name(),
            column_name(pair[rt_pos], rc),
        )?;
        return Ok(None);
    };

    debug!(
        outer = outer.name(),
        inner = inner.name(),
        "two-table index join"
    );

    let ordered = [outer, inner];
    let scope = EvalScope::new(&ordered);
    let index = inner
        .get_index(inner_col)
        .expect("inner side carries an index");
    let inner_ty = inner.column_type(inner_col);

    for outer_rid in outer.live_rids() {
        if !outer.cache_record(outer_rid)? {
            continue;
        }
        // A NULL or uncoercible join key can match nothing.
        let key_val = outer.cached_column(outer_col);
        let Ok(coerced) = key_val.coerce_to(inner_ty) else {
            continue;
        };
        let Some(probe) = IndexKey::from_value(&coerced) else {
            continue;
        };

        for (key, inner_rid) in index.lower_bound(&probe) {
            // The index yields keys in non-decreasing order; the first
            // non-equal key ends this probe.
            if *key != probe {
                break;
            }
            inner.cache_record(inner_rid)?;
            // The full predicate filters each pair but must not break the
            // equal-key run.
            if scope.eval(cond)?.to_bool() {
                if let Flow::Stop = visit(&ordered, &[outer_rid, inner_rid])? {
                    return Ok(Some(Flow::Stop));
                }
            }
        }
    }
    Ok(Some(Flow::Continue))
}

/// N-table iteration driven by the join planner.
fn iterate_many_tables(
    tables: &[&Table],
    cond: Option<&Expr>,
    info: &mut dyn Write,
    visit: &mut Visitor<'_>,
) -> Result<Flow, EngineError> {
    let clauses = cond.map(|c| c.conjuncts()).unwrap_or_default();
    let plan = planner::build_plan(tables, &clauses)?;

    let scope = EvalScope::new(tables);
    let mut rids = vec![0 as Rid; tables.len()];
    let flow = iterate_level(
        tables,
        &plan,
        cond,
        &scope,
        tables.len(),
        &mut rids,
        visit,
    )?;

    report_plan(tables, &plan, info)?;
    Ok(flow)
}

/// Runs one nesting level of the planned iteration.
///
/// `remaining` counts the loops still to position; the level handled here
/// is `plan.order[remaining - 1]`, so the outermost call positions
/// `order[len-1]` and the innermost body runs at `remaining == 0`, where
/// the complete predicate gates the visitor.
fn iterate_level(
    tables: &[&Table],
    plan: &JoinPlan,
    cond: Option<&Expr>,
    scope: &EvalScope<'_>,
    remaining: usize,
    rids: &mut [Rid],
    visit: &mut Visitor<'_>,
) -> Result<Flow, EngineError> {
    if remaining == 0 {
        if let Some(cond) = cond {
            if !scope.eval(cond)?.to_bool() {
                return Ok(Flow::Continue);
            }
        }
        return visit(tables, rids);
    }

    let level = remaining - 1;
    let tpos = plan.order[level];
    let table = tables[tpos];

    match plan.probes[level] {
        None => {
            // No incoming index: full scan in insertion order.
            for rid in table.live_rids() {
                if !table.cache_record(rid)? {
                    continue;
                }
                rids[tpos] = rid;
                if let Flow::Stop =
                    iterate_level(tables, plan, cond, scope, level, rids, visit)?
                {
                    return Ok(Flow::Stop);
                }
            }
        }
        Some(step) => {
            // Probe the index with the value cached at the outer level.
            let key_val = tables[step.outer].cached_column(step.outer_col);
            let Ok(coerced) = key_val.coerce_to(table.column_type(step.inner_col)) else {
                return Ok(Flow::Continue);
            };
            let Some(probe) = IndexKey::from_value(&coerced) else {
                return Ok(Flow::Continue);
            };
            let index = table
                .get_index(step.inner_col)
                .expect("planned probe requires an index");
            for (key, rid) in index.lower_bound(&probe) {
                // Monotone break: the join predicate is false for every
                // later key.
                if *key != probe {
                    break;
                }
                table.cache_record(rid)?;
                rids[tpos] = rid;
                if let Flow::Stop =
                    iterate_level(tables, plan, cond, scope, level, rids, visit)?
                {
                    return Ok(Flow::Stop);
                }
            }
        }
    }
    Ok(Flow::Continue)
}

/// Reports the planned iteration order and index use on the info stream.
fn report_plan(
    tables: &[&Table],
    plan: &JoinPlan,
    info: &mut dyn Write,
) -> Result<(), EngineError> {
    let order: Vec<&str> = plan
        .iteration_order()
        .map(|tpos| tables[tpos].name())
        .collect();
    writeln!(info, "[Info] Iteration order: {}", order.join(", "))?;

    let probes: Vec<String> = (0..plan.depth)
        .rev()
        .map(|i| {
            let step = plan.probes[i].expect("probe present below depth");
            format!(
                "{}.{}",
                tables[step.inner].name(),
                column_name(tables[step.inner], step.inner_col)
            )
        })
        .collect();
    writeln!(info, "[Info] Index use: {}", probes.join(", "))?;
    Ok(())
}

/// Resolves a column reference against exactly the given pair of tables.
fn resolve_in(
    tables: &[&Table; 2],
    table: Option<&str>,
    column: &str,
) -> Result<(usize, usize), ()> {
    match table {
        Some(name) => {
            let pos = tables.iter().position(|t| t.name() == name).ok_or(())?;
            let cid = tables[pos].lookup_column(column).ok_or(())?;
            Ok((pos, cid))
        }
        None => {
            let mut found = Err(());
            for (pos, t) in tables.iter().enumerate() {
                if let Some(cid) = t.lookup_column(column) {
                    if found.is_ok() {
                        return Err(());
                    }
                    found = Ok((pos, cid));
                }
            }
            found
        }
    }
}

/// Column name for diagnostics (`__rowid__` for the hidden column).
fn column_name(table: &Table, col_id: usize) -> &str {
    table
        .schema()
        .columns
        .get(col_id)
        .map(|c| c.name.as_str())
        .unwrap_or(crate::table::ROWID_COLUMN)
}

/// Clears every table's row cache; used by sessions at the statement
/// boundary on all exit paths.
pub fn clear_row_caches(tables: &[&Table]) {
    for table in tables {
        table.clear_cache();
    }
}
