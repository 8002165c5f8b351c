//! The session: statement dispatch against the open database.

use std::io::Write;
use std::path::PathBuf;

use crate::catalog::{CatalogError, Database, catalog_path};
use crate::datum::Value;
use crate::executor::{self, Flow};
use crate::expr::{AggregateFunc, EvalScope, Expr};
use crate::sql::{
    DeleteStmt, IndexTarget, InsertStmt, SelectStmt, Statement, UpdateStmt,
};
use crate::table::{Rid, Table, TableError, TableSchema};

use super::error::EngineError;

/// A session: one open database, three output sinks, statement dispatch.
///
/// Diagnostics go to the info sink (`[Info]` lines) and the error sink
/// (`[Error]` lines); the result stream carries projection output and is
/// independently redirectable. Defaults are stdout for results and info,
/// stderr for errors.
///
/// Dropping a session closes the open database, flushing its catalog.
pub struct Session {
    db: Option<Database>,
    root: PathBuf,
    output: Box<dyn Write>,
    info: Box<dyn Write>,
    errors: Box<dyn Write>,
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(db) = self.db.take() {
            let _ = db.close();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session storing databases in the current directory.
    pub fn new() -> Self {
        Self::with_root(".")
    }

    /// Creates a session storing databases under the given directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            db: None,
            root: root.into(),
            output: Box::new(std::io::stdout()),
            info: Box::new(std::io::stdout()),
            errors: Box::new(std::io::stderr()),
        }
    }

    /// Redirects the result stream.
    pub fn set_output(&mut self, output: Box<dyn Write>) {
        self.output = output;
    }

    /// Redirects the info stream.
    pub fn set_info(&mut self, info: Box<dyn Write>) {
        self.info = info;
    }

    /// Redirects the error stream.
    pub fn set_errors(&mut self, errors: Box<dyn Write>) {
        self.errors = errors;
    }

    /// Name of the currently open database, if any.
    pub fn current_database(&self) -> Option<&str> {
        self.db.as_ref().map(|db| db.name())
    }

    /// Executes one parsed statement.
    ///
    /// On failure, one `[Error]` line is written to the error sink and the
    /// error is returned. Row caches are cleared at this boundary on every
    /// exit path.
    pub fn execute(&mut self, stmt: &Statement) -> Result<(), EngineError> {
        let result = self.dispatch(stmt);
        if let Some(db) = &self.db {
            db.clear_row_caches();
        }
        if let Err(e) = &result {
            let _ = writeln!(self.errors, "[Error] {e}.");
            let _ = self.errors.flush();
        }
        result
    }

    fn dispatch(&mut self, stmt: &Statement) -> Result<(), EngineError> {
        match stmt {
            Statement::Select(s) => self.select(s),
            Statement::Insert(s) => self.insert(s),
            Statement::Update(s) => self.update(s),
            Statement::Delete(s) => self.delete(s),
            Statement::CreateDatabase(name) => self.create_database(name),
            Statement::DropDatabase(name) => self.drop_database(name),
            Statement::UseDatabase(name) => self.use_database(name),
            Statement::ShowDatabase(name) => self.show_database(name),
            Statement::CreateTable(schema) => self.create_table(schema.clone()),
            Statement::DropTable(name) => self.drop_table(name),
            Statement::ShowTable(name) => self.show_table(name),
            Statement::CreateIndex(target) => self.create_index(target),
            Statement::DropIndex(target) => self.drop_index(target),
        }
    }

    // --- database lifecycle ---

    /// Creates an empty database and flushes its catalog file.
    pub fn create_database(&mut self, name: &str) -> Result<(), EngineError> {
        if catalog_path(&self.root, name).exists() {
            return Err(CatalogError::DatabaseExists(name.to_string()).into());
        }
        Database::create(name, &self.root)?.close()?;
        Ok(())
    }

    /// Closes the current database (if this is it) and drops the named
    /// database.
    pub fn drop_database(&mut self, name: &str) -> Result<(), EngineError> {
        if self.current_database() == Some(name) {
            if let Some(db) = self.db.take() {
                db.close()?;
            }
        }
        Database::open(name, &self.root)?.drop_database()?;
        Ok(())
    }

    /// Switches the session to the named database, closing the current
    /// one first.
    pub fn use_database(&mut self, name: &str) -> Result<(), EngineError> {
        if let Some(db) = self.db.take() {
            db.close()?;
        }
        self.db = Some(Database::open(name, &self.root)?);
        Ok(())
    }

    /// Closes the current database, flushing its catalog.
    pub fn close_database(&mut self) -> Result<(), EngineError> {
        if let Some(db) = self.db.take() {
            db.close()?;
        }
        Ok(())
    }

    /// Prints a catalog summary of the named database on the info stream.
    pub fn show_database(&mut self, name: &str) -> Result<(), EngineError> {
        // Report the live state when this is the open database; otherwise
        // read the catalog without adopting it.
        let summarize = |db: &Database, info: &mut dyn Write| -> Result<(), EngineError> {
            writeln!(
                info,
                "[Info] Database `{}`, {} table(s).",
                db.name(),
                db.tables().len()
            )?;
            for table in db.tables() {
                writeln!(info, "[Info]   {}", table.name())?;
            }
            Ok(())
        };
        match &self.db {
            Some(db) if db.name() == name => summarize(db, &mut self.info),
            _ => {
                let db = Database::open(name, &self.root)?;
                summarize(&db, &mut self.info)
            }
        }
    }

    // --- DDL ---

    /// Creates a table in the current database.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<(), EngineError> {
        let db = self.db.as_mut().ok_or(CatalogError::NotOpen)?;
        db.create_table(schema)?;
        Ok(())
    }

    /// Drops a table from the current database.
    pub fn drop_table(&mut self, name: &str) -> Result<(), EngineError> {
        let db = self.db.as_mut().ok_or(CatalogError::NotOpen)?;
        db.drop_table(name)?;
        Ok(())
    }

    /// Prints a schema summary of the named table on the info stream.
    pub fn show_table(&mut self, name: &str) -> Result<(), EngineError> {
        let db = self.db.as_ref().ok_or(CatalogError::NotOpen)?;
        let table = db
            .get_table(name)
            .ok_or_else(|| CatalogError::TableNotFound(name.to_string()))?;
        writeln!(
            self.info,
            "[Info] Table `{}` ({} columns, {} records)",
            table.name(),
            table.user_column_count(),
            table.record_count()
        )?;
        for col in &table.schema().columns {
            let mut line = format!("[Info]   {} {}", col.name, col.ty);
            if col.primary_key {
                line.push_str(" PRIMARY KEY");
            } else {
                if !col.nullable {
                    line.push_str(" NOT NULL");
                }
                if col.indexed {
                    line.push_str(" INDEXED");
                }
            }
            if let Some(default) = &col.default {
                line.push_str(&format!(" DEFAULT {default}"));
            }
            writeln!(self.info, "{line}")?;
        }
        Ok(())
    }

    /// Builds an index over a column by scanning all records.
    pub fn create_index(&mut self, target: &IndexTarget) -> Result<(), EngineError> {
        let db = self.db.as_mut().ok_or(CatalogError::NotOpen)?;
        let table = db
            .get_table_mut(&target.table)
            .ok_or_else(|| CatalogError::TableNotFound(target.table.clone()))?;
        table.create_index(&target.column)?;
        Ok(())
    }

    /// Detaches the index on a column, if any.
    pub fn drop_index(&mut self, target: &IndexTarget) -> Result<(), EngineError> {
        let db = self.db.as_mut().ok_or(CatalogError::NotOpen)?;
        let table = db
            .get_table_mut(&target.table)
            .ok_or_else(|| CatalogError::TableNotFound(target.table.clone()))?;
        table.drop_index(&target.column)?;
        Ok(())
    }

    // --- queries ---

    /// Executes a SELECT: emits the header, drives iteration, and writes
    /// one CSV line per matched row (or a single aggregate value line).
    pub fn select(&mut self, stmt: &SelectStmt) -> Result<(), EngineError> {
        let Session {
            db, output, info, ..
        } = self;
        let db = db.as_ref().ok_or(CatalogError::NotOpen)?;

        let mut tables: Vec<&Table> = Vec::with_capacity(stmt.tables.len());
        for name in &stmt.tables {
            tables.push(
                db.get_table(name)
                    .ok_or_else(|| CatalogError::TableNotFound(name.clone()))?,
            );
        }

        // Header: projection names, or every `table.column` for `*`.
        let header: Vec<String> = if stmt.projection.is_empty() {
            tables
                .iter()
                .flat_map(|t| {
                    t.schema()
                        .columns
                        .iter()
                        .map(|c| format!("{}.{}", t.name(), c.name))
                })
                .collect()
        } else {
            stmt.projection.iter().map(Expr::to_string).collect()
        };
        writeln!(output, "{}", header.join(","))?;

        if stmt.projection.iter().any(Expr::is_aggregate) {
            return select_aggregate(&tables, stmt, output, info);
        }

        let mut counter = 0u64;
        executor::iterate(
            &tables,
            stmt.filter.as_ref(),
            info,
            &mut |tbls, _rids| {
                let scope = EvalScope::new(tbls);
                let mut line = String::new();
                for (i, expr) in stmt.projection.iter().enumerate() {
                    if i > 0 {
                        line.push(',');
                    }
                    line.push_str(&scope.eval(expr)?.to_string());
                }
                if stmt.projection.is_empty() {
                    // `*`: every column of every table, in statement order.
                    let mut first = true;
                    for t in &tables {
                        for cid in 0..t.user_column_count() {
                            if !first {
                                line.push(',');
                            }
                            first = false;
                            line.push_str(&t.cached_column(cid).to_string());
                        }
                    }
                }
                writeln!(output, "{line}")?;
                counter += 1;
                Ok(Flow::Continue)
            },
        )?;

        writeln!(info, "[Info] {counter} row(s) selected.")?;
        writeln!(output)?;
        output.flush()?;
        Ok(())
    }

    // --- DML ---

    /// Executes an INSERT: evaluates each value tuple against the target
    /// columns, failing bad tuples individually and continuing.
    pub fn insert(&mut self, stmt: &InsertStmt) -> Result<(), EngineError> {
        let Session {
            db, info, errors, ..
        } = self;
        let db = db.as_mut().ok_or(CatalogError::NotOpen)?;
        let table = db
            .get_table_mut(&stmt.table)
            .ok_or_else(|| CatalogError::TableNotFound(stmt.table.clone()))?;

        // Target columns default to all user columns (never `__rowid__`).
        let cols: Vec<usize> = match &stmt.columns {
            None => (0..table.user_column_count()).collect(),
            Some(names) => names
                .iter()
                .map(|name| {
                    table
                        .lookup_column(name)
                        .filter(|&cid| cid < table.user_column_count())
                        .ok_or_else(|| {
                            EngineError::Table(TableError::ColumnNotFound(name.clone()))
                        })
                })
                .collect::<Result<_, _>>()?,
        };

        let scope = EvalScope::new(&[]);
        let mut succ = 0u64;
        let mut fail = 0u64;
        for row in &stmt.rows {
            if row.len() != cols.len() {
                writeln!(errors, "[Error] column size not equal.")?;
                fail += 1;
                continue;
            }

            // Scratch record: defaults for unspecified columns.
            let mut values: Vec<Value> = table
                .schema()
                .columns
                .iter()
                .map(|c| c.default.clone().unwrap_or(Value::Null))
                .collect();

            let mut ok = true;
            for (expr, &cid) in row.iter().zip(&cols) {
                match scope.eval(expr) {
                    Ok(v) => {
                        if !table.schema().columns[cid].ty.accepts(&v) {
                            writeln!(errors, "[Error] incompatible type.")?;
                            ok = false;
                            break;
                        }
                        values[cid] = v;
                    }
                    Err(e) => {
                        writeln!(errors, "[Error] {e}.")?;
                        ok = false;
                        break;
                    }
                }
            }

            if ok {
                match table.insert_record(&values) {
                    Ok(_) => {
                        succ += 1;
                        continue;
                    }
                    Err(e) => writeln!(errors, "[Error] {e}.")?,
                }
            }
            fail += 1;
        }

        writeln!(info, "[Info] {succ} row(s) inserted, {fail} row(s) failed.")?;
        Ok(())
    }

    /// Executes an UPDATE in two phases: evaluate and collect under the
    /// scan, then overwrite. A row whose value expression fails or is
    /// incompatible counts as a failure and the statement continues.
    pub fn update(&mut self, stmt: &UpdateStmt) -> Result<(), EngineError> {
        let Session { db, info, .. } = self;
        let db = db.as_mut().ok_or(CatalogError::NotOpen)?;

        let mut fail = 0u64;
        let mut updates: Vec<(Rid, Value)> = Vec::new();
        let col_id = {
            let table = db
                .get_table(&stmt.table)
                .ok_or_else(|| CatalogError::TableNotFound(stmt.table.clone()))?;
            let col_id = table
                .lookup_column(&stmt.column)
                .filter(|&cid| cid < table.user_column_count())
                .ok_or_else(|| {
                    EngineError::Table(TableError::ColumnNotFound(stmt.column.clone()))
                })?;
            let col_ty = table.column_type(col_id);

            executor::scan_table(table, stmt.filter.as_ref(), &mut |t, rid| {
                let scope_tables = [t];
                let scope = EvalScope::new(&scope_tables);
                match scope.eval(&stmt.value) {
                    Ok(v) if col_ty.accepts(&v) => updates.push((rid, v)),
                    Ok(_) | Err(_) => fail += 1,
                }
                Ok(Flow::Continue)
            })?;
            col_id
        };

        let table = db
            .get_table_mut(&stmt.table)
            .expect("table resolved in phase one");
        let mut succ = 0u64;
        for (rid, value) in updates {
            match table.modify_record(rid, col_id, &value) {
                Ok(true) => succ += 1,
                Ok(false) => fail += 1,
                Err(e) => return Err(e.into()),
            }
        }

        writeln!(info, "[Info] {succ} row(s) updated, {fail} row(s) failed.")?;
        Ok(())
    }

    /// Executes a DELETE in two phases: collect matching rids under the
    /// scan, then remove them. Deletion during iteration is undefined, so
    /// nothing is removed until the scan completes.
    pub fn delete(&mut self, stmt: &DeleteStmt) -> Result<(), EngineError> {
        let Session { db, info, .. } = self;
        let db = db.as_mut().ok_or(CatalogError::NotOpen)?;

        let mut rids: Vec<Rid> = Vec::new();
        {
            let table = db
                .get_table(&stmt.table)
                .ok_or_else(|| CatalogError::TableNotFound(stmt.table.clone()))?;
            executor::scan_table(table, stmt.filter.as_ref(), &mut |_t, rid| {
                rids.push(rid);
                Ok(Flow::Continue)
            })?;
        }

        let table = db
            .get_table_mut(&stmt.table)
            .expect("table resolved in phase one");
        let mut counter = 0u64;
        for rid in rids {
            if table.remove_record(rid)? {
                counter += 1;
            }
        }

        writeln!(info, "[Info] {counter} row(s) deleted.")?;
        Ok(())
    }

    /// Existence probe used by foreign-key checks: does any live row of
    /// the table hold this value in the named column?
    pub fn value_exists(
        &mut self,
        table: &str,
        column: &str,
        value: &Value,
    ) -> Result<bool, EngineError> {
        let db = self.db.as_ref().ok_or(CatalogError::NotOpen)?;
        let table = db
            .get_table(table)
            .ok_or_else(|| CatalogError::TableNotFound(table.to_string()))?;
        Ok(table.value_exists(column, value)?)
    }
}

/// Aggregate SELECT: exactly one aggregate expression streamed into an
/// accumulator over the iteration.
///
/// `COUNT` counts matched rows regardless of the inner expression. The
/// other functions require a numeric inner type: integer values feed both
/// the integer and float accumulators, a float value switches the result
/// to float, NULL values update nothing (but still count toward `COUNT`
/// and the `AVG` divisor). An empty set yields `0` for `COUNT` and `NULL`
/// otherwise.
fn select_aggregate(
    tables: &[&Table],
    stmt: &SelectStmt,
    output: &mut Box<dyn Write>,
    info: &mut Box<dyn Write>,
) -> Result<(), EngineError> {
    if stmt.projection.len() != 1 {
        return Err(EngineError::AggregateArity);
    }
    let Expr::Aggregate { func, operand } = &stmt.projection[0] else {
        return Err(EngineError::AggregateArity);
    };
    let func = *func;

    let mut acc_i: i64 = match func {
        AggregateFunc::Min => i64::MAX,
        AggregateFunc::Max => i64::MIN,
        _ => 0,
    };
    let mut acc_f: f64 = match func {
        AggregateFunc::Min => f64::INFINITY,
        AggregateFunc::Max => f64::NEG_INFINITY,
        _ => 0.0,
    };
    let mut is_float = false;
    let mut numeric_seen = false;
    let mut counter = 0u64;

    executor::iterate(tables, stmt.filter.as_ref(), info, &mut |tbls, _rids| {
        counter += 1;
        if func == AggregateFunc::Count {
            return Ok(Flow::Continue);
        }
        let Some(operand) = operand.as_deref() else {
            return Err(EngineError::AggregateArity);
        };
        let scope = EvalScope::new(tbls);
        let (int_val, float_val) = match scope.eval(operand)? {
            Value::Null => return Ok(Flow::Continue),
            Value::Int(n) => (Some(n as i64), n as f64),
            Value::Float(x) => {
                is_float = true;
                (None, x as f64)
            }
            _ => return Err(EngineError::AggregateType),
        };
        numeric_seen = true;
        match func {
            AggregateFunc::Sum | AggregateFunc::Avg => {
                if let Some(n) = int_val {
                    acc_i += n;
                }
                acc_f += float_val;
            }
            AggregateFunc::Min => {
                if let Some(n) = int_val {
                    acc_i = acc_i.min(n);
                }
                acc_f = acc_f.min(float_val);
            }
            AggregateFunc::Max => {
                if let Some(n) = int_val {
                    acc_i = acc_i.max(n);
                }
                acc_f = acc_f.max(float_val);
            }
            AggregateFunc::Count => unreachable!(),
        }
        Ok(Flow::Continue)
    })?;

    match func {
        AggregateFunc::Count => writeln!(output, "{counter}")?,
        AggregateFunc::Avg => {
            if counter == 0 {
                writeln!(output, "NULL")?;
            } else {
                writeln!(output, "{:.6}", acc_f / counter as f64)?;
            }
        }
        AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => {
            if !numeric_seen {
                writeln!(output, "NULL")?;
            } else if is_float {
                writeln!(output, "{acc_f:.6}")?;
            } else {
                writeln!(output, "{acc_i}")?;
            }
        }
    }

    writeln!(info, "[Info] {counter} row(s) selected.")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}
