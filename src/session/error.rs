//! Engine-level errors surfaced at the statement boundary.

use std::fmt;

use crate::catalog::CatalogError;
use crate::datum::TypeError;
use crate::expr::EvalError;
use crate::planner::PlanError;
use crate::storage::StorageError;
use crate::table::TableError;

/// Statement-level failure.
///
/// Expression failures abort the current row and, for SELECT, the whole
/// statement; catalog and schema failures abort before iteration. The
/// session renders one `[Error]` line per failure on its error sink.
#[derive(Debug)]
pub enum EngineError {
    /// Catalog failure (database not open, name missing or colliding).
    Catalog(CatalogError),
    /// Join planning failure.
    Plan(PlanError),
    /// Expression evaluation failure.
    Eval(EvalError),
    /// Table/schema failure.
    Table(TableError),
    /// Storage failure.
    Storage(StorageError),
    /// Aggregate over a non-numeric expression.
    AggregateType,
    /// Aggregate SELECT with more than one projected expression.
    AggregateArity,
    /// Output sink failure.
    Io(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Catalog(e) => write!(f, "{e}"),
            EngineError::Plan(e) => write!(f, "{e}"),
            EngineError::Eval(e) => write!(f, "{e}"),
            EngineError::Table(e) => write!(f, "{e}"),
            EngineError::Storage(e) => write!(f, "{e}"),
            EngineError::AggregateType => {
                write!(f, "aggregate only support for INT and FLOAT type")
            }
            EngineError::AggregateArity => {
                write!(f, "aggregate select supports exactly one expression")
            }
            EngineError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CatalogError> for EngineError {
    fn from(e: CatalogError) -> Self {
        EngineError::Catalog(e)
    }
}

impl From<PlanError> for EngineError {
    fn from(e: PlanError) -> Self {
        EngineError::Plan(e)
    }
}

impl From<EvalError> for EngineError {
    fn from(e: EvalError) -> Self {
        EngineError::Eval(e)
    }
}

impl From<TableError> for EngineError {
    fn from(e: TableError) -> Self {
        EngineError::Table(e)
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        EngineError::Storage(e)
    }
}

impl From<TypeError> for EngineError {
    fn from(e: TypeError) -> Self {
        EngineError::Table(TableError::Type(e))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}
