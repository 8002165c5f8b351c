//! Database catalog: the named container of tables.
//!
//! A [`Database`] holds up to [`MAX_TABLES`] tables with unique names. The
//! on-disk catalog is one `<db>.database` file with a fixed-size header
//! (database name, table count, table names); each table's data lives in
//! its own `<table>.table` page file next to the catalog. The catalog file
//! is written atomically on close.
//!
//! In memory the table list is a growable sequence; the fixed-size layout
//! exists only on disk. Databases can also be created fully in memory
//! (no files), which is the default for tests.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::storage::{FileStorage, MemoryStorage, StorageError};
use crate::table::{MAX_NAME_LEN, Table, TableError, TableSchema};

/// Maximum number of tables per database (on-disk catalog capacity).
pub const MAX_TABLES: usize = 32;

/// Size of the catalog file: name field, table count, name table.
const CATALOG_SIZE: usize = MAX_NAME_LEN + 4 + MAX_TABLES * MAX_NAME_LEN;

/// Catalog-level errors.
#[derive(Debug)]
pub enum CatalogError {
    /// No database is open.
    NotOpen,
    /// Named database has no catalog file.
    DatabaseNotFound(String),
    /// A database with this name already exists.
    DatabaseExists(String),
    /// Named table does not exist.
    TableNotFound(String),
    /// A table with this name already exists.
    TableExists(String),
    /// The catalog is full.
    TooManyTables,
    /// Invalid database or table name.
    InvalidName(String),
    /// Table-level failure.
    Table(TableError),
    /// Storage failure.
    Storage(StorageError),
    /// Catalog file I/O failure.
    Io(std::io::Error),
    /// Malformed catalog file.
    Corrupted(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::NotOpen => write!(f, "database is not opened"),
            CatalogError::DatabaseNotFound(name) => {
                write!(f, "database `{name}` doesn't exists")
            }
            CatalogError::DatabaseExists(name) => {
                write!(f, "database `{name}` already exists")
            }
            CatalogError::TableNotFound(name) => write!(f, "table `{name}` doesn't exists"),
            CatalogError::TableExists(name) => write!(f, "table `{name}` already exists"),
            CatalogError::TooManyTables => {
                write!(f, "too many tables (max {MAX_TABLES})")
            }
            CatalogError::InvalidName(name) => write!(f, "invalid name `{name}`"),
            CatalogError::Table(e) => write!(f, "{e}"),
            CatalogError::Storage(e) => write!(f, "{e}"),
            CatalogError::Io(e) => write!(f, "I/O error: {e}"),
            CatalogError::Corrupted(msg) => write!(f, "corrupted catalog: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<TableError> for CatalogError {
    fn from(e: TableError) -> Self {
        CatalogError::Table(e)
    }
}

impl From<StorageError> for CatalogError {
    fn from(e: StorageError) -> Self {
        CatalogError::Storage(e)
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        CatalogError::Io(e)
    }
}

/// Where a database keeps its pages.
enum Backing {
    /// No files; everything lives in memory. Used by tests.
    Memory,
    /// Catalog and table files under the given directory.
    Disk(PathBuf),
}

/// An open database: a named, ordered collection of tables.
pub struct Database {
    name: String,
    backing: Backing,
    tables: Vec<Table>,
}

impl Database {
    /// Creates an empty database backed entirely by memory.
    pub fn create_in_memory(name: impl Into<String>) -> Result<Self, CatalogError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            backing: Backing::Memory,
            tables: Vec::new(),
        })
    }

    /// Creates an empty database whose catalog and tables live under
    /// `dir`. The catalog file is not written until [`close`](Self::close).
    pub fn create(name: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            backing: Backing::Disk(dir.into()),
            tables: Vec::new(),
        })
    }

    /// Opens a database from its catalog file, opening every listed table.
    pub fn open(name: impl Into<String>, dir: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let name = name.into();
        let dir = dir.into();
        let bytes = match fs::read(catalog_path(&dir, &name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::DatabaseNotFound(name));
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.len() != CATALOG_SIZE {
            return Err(CatalogError::Corrupted(format!(
                "catalog file has {} bytes, expected {CATALOG_SIZE}",
                bytes.len()
            )));
        }

        let mut buf = &bytes[..];
        let stored_name = get_fixed_name(&mut buf)?;
        if stored_name != name {
            return Err(CatalogError::Corrupted(format!(
                "catalog names database `{stored_name}`"
            )));
        }
        let table_count = buf.get_u32_le() as usize;
        if table_count > MAX_TABLES {
            return Err(CatalogError::Corrupted(format!(
                "table count {table_count} out of range"
            )));
        }

        let mut tables = Vec::with_capacity(table_count);
        for _ in 0..table_count {
            let table_name = get_fixed_name(&mut buf)?;
            let storage = FileStorage::open(table_path(&dir, &table_name))?;
            tables.push(Table::open(Box::new(storage))?);
        }

        debug!(db = %name, tables = tables.len(), "opened database");
        Ok(Self {
            name,
            backing: Backing::Disk(dir),
            tables,
        })
    }

    /// Closes the database: closes every table and flushes the catalog
    /// file atomically (write to a temp file, then rename).
    pub fn close(mut self) -> Result<(), CatalogError> {
        for table in &mut self.tables {
            table.close()?;
        }

        if let Backing::Disk(dir) = &self.backing {
            let mut buf = Vec::with_capacity(CATALOG_SIZE);
            put_fixed_name(&mut buf, &self.name);
            buf.put_u32_le(self.tables.len() as u32);
            for table in &self.tables {
                put_fixed_name(&mut buf, table.name());
            }
            buf.put_bytes(0, CATALOG_SIZE - buf.len());

            let path = catalog_path(dir, &self.name);
            let tmp = path.with_extension("database.tmp");
            fs::write(&tmp, &buf)?;
            fs::rename(&tmp, &path)?;
        }
        debug!(db = %self.name, "closed database");
        Ok(())
    }

    /// Database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All tables in creation order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Looks up a table by name.
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Looks up a table by name, mutably.
    pub fn get_table_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    /// Creates a table from a schema. Table names are unique within the
    /// database.
    pub fn create_table(&mut self, schema: TableSchema) -> Result<(), CatalogError> {
        validate_name(&schema.name)?;
        if self.get_table(&schema.name).is_some() {
            return Err(CatalogError::TableExists(schema.name));
        }
        if self.tables.len() >= MAX_TABLES {
            return Err(CatalogError::TooManyTables);
        }

        let table = match &self.backing {
            Backing::Memory => Table::create(schema, Box::new(MemoryStorage::new()))?,
            Backing::Disk(dir) => {
                let storage = FileStorage::open(table_path(dir, &schema.name))?;
                Table::create(schema, Box::new(storage))?
            }
        };
        self.tables.push(table);
        Ok(())
    }

    /// Drops a table from the catalog.
    pub fn drop_table(&mut self, name: &str) -> Result<(), CatalogError> {
        if !self.tables.iter().any(|t| t.name() == name) {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        // TODO: decide whether DROP TABLE unlinks the `<table>.table` file
        // or tombstones the catalog entry, then remove the entry here.
        Ok(())
    }

    /// Removes this database's on-disk state.
    pub fn drop_database(self) -> Result<(), CatalogError> {
        // TODO: decide whether DROP DATABASE unlinks the catalog and table
        // files or tombstones the catalog, then implement the file side.
        Ok(())
    }

    /// Clears every table's per-row column cache. Bound to each
    /// data-manipulating statement via the session's statement boundary.
    pub fn clear_row_caches(&self) {
        for table in &self.tables {
            table.clear_cache();
        }
    }
}

/// Path of the catalog file for a database name.
pub fn catalog_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.database"))
}

/// Path of a table's page file.
fn table_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.table"))
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    if name.is_empty()
        || name.len() > MAX_NAME_LEN
        || name.contains(['/', '\\', '\0'])
    {
        return Err(CatalogError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Writes a zero-padded `MAX_NAME_LEN` name field.
fn put_fixed_name(buf: &mut Vec<u8>, name: &str) {
    debug_assert!(name.len() <= MAX_NAME_LEN);
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, MAX_NAME_LEN - name.len());
}

/// Reads a zero-padded `MAX_NAME_LEN` name field.
fn get_fixed_name(buf: &mut &[u8]) -> Result<String, CatalogError> {
    let mut field = [0u8; MAX_NAME_LEN];
    buf.copy_to_slice(&mut field);
    let end = field.iter().position(|&b| b == 0).unwrap_or(MAX_NAME_LEN);
    String::from_utf8(field[..end].to_vec())
        .map_err(|e| CatalogError::Corrupted(format!("invalid name in catalog: {e}")))
}
