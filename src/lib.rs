//! quarrydb: a small relational database engine.
//!
//! The crate implements the query execution core of a relational DBMS:
//! multi-table iteration, index-aware join planning, streaming
//! aggregation, and expression evaluation over a row-oriented, paged
//! storage layer with per-column ordered indexes.
//!
//! Execution is single-threaded and cooperative: iteration is synchronous,
//! driven by caller-provided visitors that continue or stop, and within
//! one statement the row sequence is fully determined by the planner.
//!
//! # Layering
//!
//! ```text
//! session   - statement dispatch, result/info/error streams
//! executor  - scan, two-table index join, N-table planned iteration
//! planner   - join graph, longest index-connected path
//! expr      - expression trees and evaluation over row caches
//! catalog   - database container, catalog file
//! table     - records, schemas, row cache, per-column indexes
//! index     - ordered (key, rid) sets with lower-bound scans
//! storage   - 8KB page I/O (memory / file)
//! datum     - types, values, coercion
//! sql       - parsed statement trees (parsing is out of scope)
//! ```

pub mod catalog;
pub mod datum;
pub mod executor;
pub mod expr;
pub mod index;
pub mod planner;
pub mod session;
pub mod sql;
pub mod storage;
pub mod table;
