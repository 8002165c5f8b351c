//! Tables: fixed-schema record storage with per-column indexes.
//!
//! A [`Table`] owns one storage backend holding a header page (schema and
//! rowid counter) followed by data pages of fixed-width record slots. Each
//! inserted record is assigned a monotonically increasing 32-bit rowid,
//! exposed as a hidden trailing `__rowid__` column; rowids are never
//! reused. Indexed columns each own a [`ColumnIndex`](crate::index::ColumnIndex)
//! mapping column value to rid.
//!
//! The table also hosts the per-row column cache that feeds expression
//! evaluation: on entering a row, every column is decoded into the cache;
//! the cache is cleared at the statement boundary.

mod core;
mod schema;

pub use self::core::{Rid, Table, TableError};
pub use schema::{ColumnDef, MAX_COLUMNS, MAX_NAME_LEN, ROWID_COLUMN, TableSchema};
