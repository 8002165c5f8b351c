//! Shared helpers for engine integration tests.
//!
//! Not every test binary uses every helper.
#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use quarrydb::datum::Value;
use quarrydb::expr::{AggregateFunc, BinaryOperator, Expr};
use quarrydb::session::Session;
use quarrydb::sql::{InsertStmt, SelectStmt, Statement};
use tempfile::TempDir;

/// A cloneable in-memory sink capturing one of the session's streams.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Drops captured output (e.g. between statements).
    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A session wired to captured streams, with its database directory kept
/// alive for the test's duration.
pub struct TestSession {
    pub session: Session,
    pub out: SharedBuf,
    pub info: SharedBuf,
    pub errors: SharedBuf,
    _dir: TempDir,
}

impl TestSession {
    /// Opens a session on a fresh temp directory with database `test`
    /// created and in use.
    pub fn open() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::with_root(dir.path());
        let out = SharedBuf::new();
        let info = SharedBuf::new();
        let errors = SharedBuf::new();
        session.set_output(Box::new(out.clone()));
        session.set_info(Box::new(info.clone()));
        session.set_errors(Box::new(errors.clone()));
        session.create_database("test").unwrap();
        session.use_database("test").unwrap();
        Self {
            session,
            out,
            info,
            errors,
            _dir: dir,
        }
    }

    /// Executes a statement, panicking on failure.
    pub fn run(&mut self, stmt: &Statement) {
        self.session.execute(stmt).unwrap();
    }

    /// Clears all captured streams.
    pub fn reset_streams(&self) {
        self.out.clear();
        self.info.clear();
        self.errors.clear();
    }
}

// --- expression shorthand ---

pub fn col(name: &str) -> Expr {
    Expr::column(name)
}

pub fn qcol(table: &str, column: &str) -> Expr {
    Expr::qualified(table, column)
}

pub fn int(n: i32) -> Expr {
    Expr::Literal(Value::Int(n))
}

pub fn string(s: &str) -> Expr {
    Expr::Literal(Value::Str(s.to_string()))
}

pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
    Expr::binary(left, op, right)
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOperator::Eq, right)
}

pub fn and(left: Expr, right: Expr) -> Expr {
    binary(left, BinaryOperator::And, right)
}

pub fn aggregate(func: AggregateFunc, operand: Option<Expr>) -> Expr {
    Expr::Aggregate {
        func,
        operand: operand.map(Box::new),
    }
}

// --- statement shorthand ---

pub fn select(tables: &[&str], projection: Vec<Expr>, filter: Option<Expr>) -> Statement {
    Statement::Select(SelectStmt::new(
        tables.iter().map(|s| s.to_string()).collect(),
        projection,
        filter,
    ))
}

pub fn insert_ints(table: &str, rows: &[&[i32]]) -> Statement {
    Statement::Insert(InsertStmt {
        table: table.to_string(),
        columns: None,
        rows: rows
            .iter()
            .map(|row| row.iter().map(|&n| int(n)).collect())
            .collect(),
    })
}
