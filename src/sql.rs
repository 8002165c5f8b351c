//! Parsed statement trees.
//!
//! The engine consumes statement trees produced by a front-end parser;
//! lexing and parsing SQL text are out of scope for this crate. Each
//! statement names the tables it touches and carries the expression trees
//! the evaluator reduces per row.

use crate::expr::Expr;
use crate::table::TableSchema;

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// SELECT statement.
    Select(SelectStmt),
    /// INSERT statement.
    Insert(InsertStmt),
    /// UPDATE statement.
    Update(UpdateStmt),
    /// DELETE statement.
    Delete(DeleteStmt),
    /// CREATE DATABASE.
    CreateDatabase(String),
    /// DROP DATABASE.
    DropDatabase(String),
    /// USE DATABASE (switch the session to a database).
    UseDatabase(String),
    /// SHOW DATABASE (catalog summary on the info stream).
    ShowDatabase(String),
    /// CREATE TABLE.
    CreateTable(TableSchema),
    /// DROP TABLE.
    DropTable(String),
    /// SHOW TABLE (schema summary on the info stream).
    ShowTable(String),
    /// CREATE INDEX.
    CreateIndex(IndexTarget),
    /// DROP INDEX.
    DropIndex(IndexTarget),
}

/// SELECT statement.
///
/// An empty projection is `SELECT *`: every column of every required
/// table, in table order.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    /// Tables named in the FROM clause, in written order.
    pub tables: Vec<String>,
    /// Projected expressions; empty means `*`.
    pub projection: Vec<Expr>,
    /// WHERE clause.
    pub filter: Option<Expr>,
}

/// INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStmt {
    /// Target table.
    pub table: String,
    /// Explicit column list; `None` means all user columns in order.
    pub columns: Option<Vec<String>>,
    /// Value tuples, each a list of expressions.
    pub rows: Vec<Vec<Expr>>,
}

/// UPDATE statement: a single target column and value expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStmt {
    /// Target table.
    pub table: String,
    /// Column being assigned.
    pub column: String,
    /// Value expression, evaluated per matched row.
    pub value: Expr,
    /// WHERE clause.
    pub filter: Option<Expr>,
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStmt {
    /// Target table.
    pub table: String,
    /// WHERE clause.
    pub filter: Option<Expr>,
}

/// Table/column pair addressed by CREATE INDEX and DROP INDEX.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexTarget {
    /// Table name.
    pub table: String,
    /// Column name.
    pub column: String,
}

impl SelectStmt {
    /// `SELECT <projection> FROM <tables> [WHERE <filter>]`.
    pub fn new(tables: Vec<String>, projection: Vec<Expr>, filter: Option<Expr>) -> Self {
        Self {
            tables,
            projection,
            filter,
        }
    }
}
