//! Table storage: record slots, indexes, and the per-row column cache.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::datum::{Type, TypeError, Value};
use crate::index::{ColumnIndex, IndexError, IndexKey};
use crate::storage::{PageId, Storage, StorageError, zeroed_page};

use super::schema::{PAGE_SLOT_HEADER, ROWID_COLUMN, TableSchema};

/// Row identifier: the rowid value of the hidden trailing column.
///
/// Unique within a table for its lifetime and never reused; storage maps it
/// to a `(page, slot)` position internally.
pub type Rid = u32;

/// Table-level errors.
#[derive(Debug)]
pub enum TableError {
    /// Named column does not exist.
    ColumnNotFound(String),
    /// NULL written to a non-nullable column.
    NullViolation {
        /// Column name.
        column: String,
    },
    /// Value tuple arity differs from the column list.
    ValueCount {
        /// Expected number of values.
        expected: usize,
        /// Provided number of values.
        found: usize,
    },
    /// An index on the named column already exists.
    IndexExists(String),
    /// Value incompatible with the column type.
    Type(TypeError),
    /// Index constraint failure.
    Index(IndexError),
    /// Underlying storage failure.
    Storage(StorageError),
    /// Malformed table file.
    Corrupted(String),
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::ColumnNotFound(name) => write!(f, "column `{name}` not exists"),
            TableError::NullViolation { column } => {
                write!(f, "column `{column}` cannot be NULL")
            }
            TableError::ValueCount { expected, found } => {
                write!(f, "column size not equal: expected {expected}, got {found}")
            }
            TableError::IndexExists(column) => {
                write!(f, "index on column `{column}` already exists")
            }
            TableError::Type(e) => write!(f, "{e}"),
            TableError::Index(e) => write!(f, "{e}"),
            TableError::Storage(e) => write!(f, "{e}"),
            TableError::Corrupted(msg) => write!(f, "corrupted table file: {msg}"),
        }
    }
}

impl std::error::Error for TableError {}

impl From<TypeError> for TableError {
    fn from(e: TypeError) -> Self {
        TableError::Type(e)
    }
}

impl From<IndexError> for TableError {
    fn from(e: IndexError) -> Self {
        TableError::Index(e)
    }
}

impl From<StorageError> for TableError {
    fn from(e: StorageError) -> Self {
        TableError::Storage(e)
    }
}

/// A table: schema, record pages, per-column indexes, and the row cache.
pub struct Table {
    schema: TableSchema,
    storage: Box<dyn Storage>,
    /// rowid -> slot position, in insertion (rowid) order.
    directory: BTreeMap<Rid, (PageId, u16)>,
    /// Cleared record slots available for reuse.
    free_slots: BTreeSet<(PageId, u16)>,
    /// Per user column; `None` when the column has no index.
    indexes: Vec<Option<ColumnIndex>>,
    next_rowid: Rid,
    /// Most recently decoded row (user columns plus rowid), fed to
    /// expression evaluation. Cleared at the statement boundary.
    row_cache: RwLock<Vec<Option<Value>>>,
}

impl Table {
    /// Creates a new table on an empty storage backend, writing the header
    /// page.
    pub fn create(schema: TableSchema, storage: Box<dyn Storage>) -> Result<Self, TableError> {
        schema.validate().map_err(TableError::Corrupted)?;
        let indexes = schema
            .columns
            .iter()
            .map(|col| {
                (col.indexed || col.primary_key).then(|| ColumnIndex::new(col.primary_key))
            })
            .collect();
        let cache_len = schema.user_column_count() + 1;
        let table = Self {
            schema,
            storage,
            directory: BTreeMap::new(),
            free_slots: BTreeSet::new(),
            indexes,
            next_rowid: 1,
            row_cache: RwLock::new(vec![None; cache_len]),
        };
        if table.storage.page_count() == 0 {
            table.storage.allocate_page()?;
        }
        table.flush_header()?;
        debug!(table = %table.schema.name, "created table");
        Ok(table)
    }

    /// Opens an existing table: decodes the header page, rebuilds the
    /// rowid directory, free-slot list, and indexes by scanning all data
    /// pages.
    pub fn open(storage: Box<dyn Storage>) -> Result<Self, TableError> {
        if storage.page_count() == 0 {
            return Err(TableError::Corrupted("missing header page".to_string()));
        }
        let mut page = zeroed_page();
        storage.read_page(PageId::new(0), &mut page[..])?;
        let (schema, next_rowid) = TableSchema::decode_header(&page[..])
            .map_err(TableError::Corrupted)?;

        let indexes = schema
            .columns
            .iter()
            .map(|col| {
                (col.indexed || col.primary_key).then(|| ColumnIndex::new(col.primary_key))
            })
            .collect();
        let cache_len = schema.user_column_count() + 1;
        let mut table = Self {
            schema,
            storage,
            directory: BTreeMap::new(),
            free_slots: BTreeSet::new(),
            indexes,
            next_rowid,
            row_cache: RwLock::new(vec![None; cache_len]),
        };

        let slots = table.schema.slots_per_page();
        let record_size = table.schema.record_size();
        for page_num in 1..table.storage.page_count() {
            let page_id = PageId::new(page_num);
            table.storage.read_page(page_id, &mut page[..])?;
            for slot in 0..slots as u16 {
                if !slot_used(&page[..], slot) {
                    table.free_slots.insert((page_id, slot));
                    continue;
                }
                let offset = PAGE_SLOT_HEADER + slot as usize * record_size;
                let record = &page[offset..offset + record_size];
                let rid = u32::from_le_bytes(record[..4].try_into().unwrap());
                if table.directory.insert(rid, (page_id, slot)).is_some() {
                    return Err(TableError::Corrupted(format!("duplicate rowid {rid}")));
                }
                table.index_record(rid, record)?;
            }
        }
        debug!(
            table = %table.schema.name,
            records = table.directory.len(),
            "opened table"
        );
        Ok(table)
    }

    /// Flushes the header page and syncs the backend.
    pub fn close(&mut self) -> Result<(), TableError> {
        self.flush_header()?;
        self.storage.sync_all()?;
        debug!(table = %self.schema.name, "closed table");
        Ok(())
    }

    fn flush_header(&self) -> Result<(), TableError> {
        let mut page = zeroed_page();
        self.schema.encode_header(self.next_rowid, &mut page[..]);
        self.storage.write_page(PageId::new(0), &page[..])?;
        Ok(())
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// The schema (user columns only).
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Number of columns including the hidden trailing `__rowid__`.
    pub fn column_count(&self) -> usize {
        self.schema.user_column_count() + 1
    }

    /// Number of user columns.
    pub fn user_column_count(&self) -> usize {
        self.schema.user_column_count()
    }

    /// Number of live records.
    pub fn record_count(&self) -> usize {
        self.directory.len()
    }

    /// Resolves a column name to its id. `__rowid__` resolves to the
    /// trailing position.
    pub fn lookup_column(&self, name: &str) -> Option<usize> {
        if name == ROWID_COLUMN {
            return Some(self.schema.user_column_count());
        }
        self.schema.columns.iter().position(|c| c.name == name)
    }

    /// Storage type of a column (`__rowid__` reads as INT).
    pub fn column_type(&self, col_id: usize) -> Type {
        if col_id == self.schema.user_column_count() {
            Type::Int
        } else {
            self.schema.columns[col_id].ty
        }
    }

    /// The index on a column, if one exists.
    pub fn get_index(&self, col_id: usize) -> Option<&ColumnIndex> {
        self.indexes.get(col_id)?.as_ref()
    }

    /// Live rowids in insertion order.
    pub fn live_rids(&self) -> Vec<Rid> {
        self.directory.keys().copied().collect()
    }

    /// Inserts a record from user-column values, updating every index.
    ///
    /// Values are coerced to the column types; NULL checks and unique-key
    /// checks run before any mutation so a failed tuple leaves the table
    /// unchanged.
    pub fn insert_record(&mut self, values: &[Value]) -> Result<Rid, TableError> {
        let ncols = self.schema.user_column_count();
        if values.len() != ncols {
            return Err(TableError::ValueCount {
                expected: ncols,
                found: values.len(),
            });
        }

        let mut coerced = Vec::with_capacity(ncols);
        for (col, value) in self.schema.columns.iter().zip(values) {
            let v = value.coerce_to(col.ty)?;
            if v.is_null() && !col.nullable {
                return Err(TableError::NullViolation {
                    column: col.name.clone(),
                });
            }
            coerced.push(v);
        }

        // Unique checks before mutation.
        for (col_id, value) in coerced.iter().enumerate() {
            if let Some(index) = &self.indexes[col_id] {
                if index.is_unique() {
                    if let Some(key) = IndexKey::from_value(value) {
                        if index.contains_key(&key) {
                            return Err(IndexError::UniqueViolation {
                                key: key.display(),
                            }
                            .into());
                        }
                    }
                }
            }
        }

        let rid = self.next_rowid;
        self.next_rowid += 1;

        let record = self.encode_record(rid, &coerced);
        let (page_id, slot) = self.place_record(&record)?;
        self.directory.insert(rid, (page_id, slot));
        for (col_id, value) in coerced.iter().enumerate() {
            if let Some(index) = &mut self.indexes[col_id] {
                if let Some(key) = IndexKey::from_value(value) {
                    index.insert(key, rid)?;
                }
            }
        }
        Ok(rid)
    }

    /// Removes a record by rid, updating every index. Returns false if the
    /// rid is not live.
    pub fn remove_record(&mut self, rid: Rid) -> Result<bool, TableError> {
        let Some((page_id, slot)) = self.directory.get(&rid).copied() else {
            return Ok(false);
        };
        let values = self.decode_slot(page_id, slot)?;

        let mut page = zeroed_page();
        self.storage.read_page(page_id, &mut page[..])?;
        set_slot_used(&mut page[..], slot, false);
        self.storage.write_page(page_id, &page[..])?;

        self.directory.remove(&rid);
        self.free_slots.insert((page_id, slot));
        for (col_id, value) in values.iter().enumerate() {
            if let Some(index) = &mut self.indexes[col_id] {
                if let Some(key) = IndexKey::from_value(value) {
                    index.remove(&key, rid);
                }
            }
        }
        Ok(true)
    }

    /// Overwrites one column of a live record, keeping its index
    /// consistent.
    ///
    /// Returns `Ok(false)` when the write is rejected by a constraint
    /// (missing rid, NULL into a non-nullable column, or a unique-key
    /// clash); hard storage failures are errors.
    pub fn modify_record(
        &mut self,
        rid: Rid,
        col_id: usize,
        value: &Value,
    ) -> Result<bool, TableError> {
        let ncols = self.schema.user_column_count();
        if col_id >= ncols {
            return Err(TableError::ColumnNotFound(format!("#{col_id}")));
        }
        let Some((page_id, slot)) = self.directory.get(&rid).copied() else {
            return Ok(false);
        };
        let col = &self.schema.columns[col_id];
        let new_value = value.coerce_to(col.ty)?;
        if new_value.is_null() && !col.nullable {
            return Ok(false);
        }

        let old_value = self.decode_slot(page_id, slot)?[col_id].clone();
        let old_key = IndexKey::from_value(&old_value);
        let new_key = IndexKey::from_value(&new_value);

        // Unique-key clash with another record rejects the write.
        if let Some(index) = &self.indexes[col_id] {
            if index.is_unique()
                && new_key.as_ref().is_some_and(|k| index.contains_key(k))
                && new_key != old_key
            {
                return Ok(false);
            }
        }

        let mut page = zeroed_page();
        self.storage.read_page(page_id, &mut page[..])?;
        let record_size = self.schema.record_size();
        let base = PAGE_SLOT_HEADER + slot as usize * record_size;
        let col_off = base + self.schema.column_offset(col_id);
        new_value.encode(col.ty, &mut page[col_off..col_off + col.ty.width()]);
        let bitmap_off = base + 4;
        set_null_bit(
            &mut page[bitmap_off..],
            col_id,
            !new_value.is_null(),
        );
        self.storage.write_page(page_id, &page[..])?;

        if let Some(index) = &mut self.indexes[col_id] {
            if let Some(key) = old_key {
                index.remove(&key, rid);
            }
            if let Some(key) = new_key {
                index.insert(key, rid)?;
            }
        }
        Ok(true)
    }

    /// Decodes all columns of a live record (user columns only).
    pub fn record_values(&self, rid: Rid) -> Result<Option<Vec<Value>>, TableError> {
        match self.directory.get(&rid) {
            Some(&(page_id, slot)) => Ok(Some(self.decode_slot(page_id, slot)?)),
            None => Ok(None),
        }
    }

    /// Decodes every column of a row into the row cache. Returns false if
    /// the rid is not live.
    pub fn cache_record(&self, rid: Rid) -> Result<bool, TableError> {
        let Some(&(page_id, slot)) = self.directory.get(&rid) else {
            return Ok(false);
        };
        let values = self.decode_slot(page_id, slot)?;
        let mut cache = self.row_cache.write();
        for (entry, value) in cache.iter_mut().zip(values.into_iter()) {
            *entry = Some(value);
        }
        let rowid_pos = self.schema.user_column_count();
        cache[rowid_pos] = Some(Value::Int(rid as i32));
        Ok(true)
    }

    /// The cached value of a column for the current row (NULL when the
    /// row is not cached).
    pub fn cached_column(&self, col_id: usize) -> Value {
        self.row_cache
            .read()
            .get(col_id)
            .and_then(|v| v.clone())
            .unwrap_or(Value::Null)
    }

    /// Drops all per-row cached column values.
    pub fn clear_cache(&self) {
        for entry in self.row_cache.write().iter_mut() {
            *entry = None;
        }
    }

    /// Returns true if any live record holds the given value in the named
    /// column. Uses the column index when one exists, a full scan
    /// otherwise.
    pub fn value_exists(&self, column: &str, value: &Value) -> Result<bool, TableError> {
        let col_id = self
            .lookup_column(column)
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        if col_id >= self.schema.user_column_count() {
            return Ok(self
                .directory
                .contains_key(&match value {
                    Value::Int(n) => *n as u32,
                    _ => return Ok(false),
                }));
        }
        let target = value.coerce_to(self.schema.columns[col_id].ty)?;
        let Some(key) = IndexKey::from_value(&target) else {
            return Ok(false);
        };
        if let Some(index) = &self.indexes[col_id] {
            return Ok(index.contains_key(&key));
        }
        for (&_rid, &(page_id, slot)) in &self.directory {
            if self.decode_slot(page_id, slot)?[col_id] == target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Builds an index over the named column by scanning all records.
    pub fn create_index(&mut self, column: &str) -> Result<(), TableError> {
        let col_id = self
            .lookup_column(column)
            .filter(|&c| c < self.schema.user_column_count())
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        if self.indexes[col_id].is_some() {
            return Err(TableError::IndexExists(column.to_string()));
        }

        let mut index = ColumnIndex::new(false);
        for (&rid, &(page_id, slot)) in &self.directory {
            let value = &self.decode_slot(page_id, slot)?[col_id];
            if let Some(key) = IndexKey::from_value(value) {
                index.insert(key, rid)?;
            }
        }
        debug!(
            table = %self.schema.name,
            column,
            entries = index.len(),
            "built index"
        );
        self.indexes[col_id] = Some(index);
        self.schema.columns[col_id].indexed = true;
        self.flush_header()
    }

    /// Detaches the index on the named column, if any. Returns true if an
    /// index was removed.
    pub fn drop_index(&mut self, column: &str) -> Result<bool, TableError> {
        let col_id = self
            .lookup_column(column)
            .filter(|&c| c < self.schema.user_column_count())
            .ok_or_else(|| TableError::ColumnNotFound(column.to_string()))?;
        if self.schema.columns[col_id].primary_key {
            // The primary key's unique index enforces the constraint.
            return Ok(false);
        }
        let removed = self.indexes[col_id].take().is_some();
        if removed {
            self.schema.columns[col_id].indexed = false;
            self.flush_header()?;
        }
        Ok(removed)
    }

    // --- record plumbing ---

    fn encode_record(&self, rid: Rid, values: &[Value]) -> Vec<u8> {
        let record_size = self.schema.record_size();
        let mut record = vec![0u8; record_size];
        record[..4].copy_from_slice(&rid.to_le_bytes());
        for (col_id, (col, value)) in self.schema.columns.iter().zip(values).enumerate() {
            set_null_bit(&mut record[4..], col_id, !value.is_null());
            let off = self.schema.column_offset(col_id);
            value.encode(col.ty, &mut record[off..off + col.ty.width()]);
        }
        record
    }

    fn index_record(&mut self, rid: Rid, record: &[u8]) -> Result<(), TableError> {
        let values = self.decode_record(record);
        for (col_id, value) in values.iter().enumerate() {
            if let Some(index) = &mut self.indexes[col_id] {
                if let Some(key) = IndexKey::from_value(value) {
                    index.insert(key, rid)?;
                }
            }
        }
        Ok(())
    }

    fn decode_record(&self, record: &[u8]) -> Vec<Value> {
        self.schema
            .columns
            .iter()
            .enumerate()
            .map(|(col_id, col)| {
                if !null_bit(&record[4..], col_id) {
                    Value::Null
                } else {
                    let off = self.schema.column_offset(col_id);
                    Value::decode(col.ty, &record[off..off + col.ty.width()])
                }
            })
            .collect()
    }

    fn decode_slot(&self, page_id: PageId, slot: u16) -> Result<Vec<Value>, TableError> {
        let mut page = zeroed_page();
        self.storage.read_page(page_id, &mut page[..])?;
        let record_size = self.schema.record_size();
        let off = PAGE_SLOT_HEADER + slot as usize * record_size;
        Ok(self.decode_record(&page[off..off + record_size]))
    }

    /// Writes a record image into a free slot, allocating a fresh page
    /// when none is free.
    fn place_record(&mut self, record: &[u8]) -> Result<(PageId, u16), TableError> {
        let (page_id, slot) = match self.free_slots.pop_first() {
            Some(pos) => pos,
            None => {
                let page_id = self.storage.allocate_page()?;
                for s in 1..self.schema.slots_per_page() as u16 {
                    self.free_slots.insert((page_id, s));
                }
                (page_id, 0)
            }
        };

        let mut page = zeroed_page();
        self.storage.read_page(page_id, &mut page[..])?;
        let off = PAGE_SLOT_HEADER + slot as usize * self.schema.record_size();
        page[off..off + record.len()].copy_from_slice(record);
        set_slot_used(&mut page[..], slot, true);
        self.storage.write_page(page_id, &page[..])?;
        Ok((page_id, slot))
    }
}

// --- page slot bitmap helpers ---

fn slot_used(page: &[u8], slot: u16) -> bool {
    page[4 + (slot / 8) as usize] & (1 << (slot % 8)) != 0
}

fn set_slot_used(page: &mut [u8], slot: u16, used: bool) {
    let byte = &mut page[4 + (slot / 8) as usize];
    let used_before = *byte & (1 << (slot % 8)) != 0;
    if used {
        *byte |= 1 << (slot % 8);
    } else {
        *byte &= !(1 << (slot % 8));
    }
    let count = u16::from_le_bytes(page[..2].try_into().unwrap());
    let count = match (used_before, used) {
        (false, true) => count + 1,
        (true, false) => count.saturating_sub(1),
        _ => count,
    };
    page[..2].copy_from_slice(&count.to_le_bytes());
}

fn null_bit(bitmap: &[u8], col_id: usize) -> bool {
    bitmap[col_id / 8] & (1 << (col_id % 8)) != 0
}

fn set_null_bit(bitmap: &mut [u8], col_id: usize, not_null: bool) {
    if not_null {
        bitmap[col_id / 8] |= 1 << (col_id % 8);
    } else {
        bitmap[col_id / 8] &= !(1 << (col_id % 8));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::table::ColumnDef;

    fn open_test_table() -> Table {
        let schema = TableSchema::new(
            "users",
            vec![
                ColumnDef::new("id", Type::Int).primary_key(),
                ColumnDef::new("name", Type::Char(8)).not_null(),
                ColumnDef::new("score", Type::Float),
            ],
        );
        Table::create(schema, Box::new(MemoryStorage::new())).unwrap()
    }

    fn row(id: i32, name: &str, score: Option<f32>) -> Vec<Value> {
        vec![
            Value::Int(id),
            Value::Str(name.into()),
            score.map(Value::Float).unwrap_or(Value::Null),
        ]
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut table = open_test_table();
        let rid = table.insert_record(&row(1, "alice", Some(9.5))).unwrap();
        assert_eq!(rid, 1);

        let values = table.record_values(rid).unwrap().unwrap();
        assert_eq!(
            values,
            vec![Value::Int(1), Value::Str("alice".into()), Value::Float(9.5)]
        );
    }

    #[test]
    fn test_rowids_monotonic_never_reused() {
        let mut table = open_test_table();
        let r1 = table.insert_record(&row(1, "a", None)).unwrap();
        let r2 = table.insert_record(&row(2, "b", None)).unwrap();
        assert!(table.remove_record(r2).unwrap());
        let r3 = table.insert_record(&row(3, "c", None)).unwrap();
        assert!(r3 > r2 && r2 > r1);
        assert_eq!(table.live_rids(), vec![r1, r3]);
    }

    #[test]
    fn test_primary_key_unique() {
        let mut table = open_test_table();
        table.insert_record(&row(1, "a", None)).unwrap();
        let dup = table.insert_record(&row(1, "b", None));
        assert!(matches!(
            dup,
            Err(TableError::Index(IndexError::UniqueViolation { .. }))
        ));
        // Failed tuple left the table unchanged.
        assert_eq!(table.record_count(), 1);
    }

    #[test]
    fn test_null_violation() {
        let mut table = open_test_table();
        let bad = table.insert_record(&[Value::Int(1), Value::Null, Value::Null]);
        assert!(matches!(bad, Err(TableError::NullViolation { .. })));
    }

    #[test]
    fn test_arity_check() {
        let mut table = open_test_table();
        let bad = table.insert_record(&[Value::Int(1)]);
        assert!(matches!(bad, Err(TableError::ValueCount { .. })));
    }

    #[test]
    fn test_modify_updates_index() {
        let mut table = open_test_table();
        let rid = table.insert_record(&row(1, "a", None)).unwrap();
        table.insert_record(&row(2, "b", None)).unwrap();

        assert!(table.modify_record(rid, 0, &Value::Int(10)).unwrap());
        assert!(table.value_exists("id", &Value::Int(10)).unwrap());
        assert!(!table.value_exists("id", &Value::Int(1)).unwrap());

        // Unique clash with the other record's key is rejected.
        assert!(!table.modify_record(rid, 0, &Value::Int(2)).unwrap());
        assert_eq!(
            table.record_values(rid).unwrap().unwrap()[0],
            Value::Int(10)
        );
    }

    #[test]
    fn test_row_cache_roundtrip() {
        let mut table = open_test_table();
        let rid = table.insert_record(&row(7, "carol", Some(1.5))).unwrap();

        assert!(table.cache_record(rid).unwrap());
        assert_eq!(table.cached_column(0), Value::Int(7));
        assert_eq!(table.cached_column(1), Value::Str("carol".into()));
        // Reading twice yields the identical value.
        assert_eq!(table.cached_column(2), table.cached_column(2));
        // Hidden trailing rowid column.
        let rowid_col = table.lookup_column(ROWID_COLUMN).unwrap();
        assert_eq!(table.cached_column(rowid_col), Value::Int(rid as i32));

        table.clear_cache();
        assert_eq!(table.cached_column(0), Value::Null);
    }

    #[test]
    fn test_create_index_backfills() {
        let mut table = open_test_table();
        for i in 0..10 {
            table
                .insert_record(&row(i, "x", Some(i as f32 / 2.0)))
                .unwrap();
        }
        table.create_index("score").unwrap();
        let col = table.lookup_column("score").unwrap();
        assert_eq!(table.get_index(col).unwrap().len(), 10);

        assert!(matches!(
            table.create_index("score"),
            Err(TableError::IndexExists(_))
        ));
    }

    #[test]
    fn test_drop_index() {
        let mut table = open_test_table();
        table.create_index("name").unwrap();
        let col = table.lookup_column("name").unwrap();
        assert!(table.get_index(col).is_some());
        assert!(table.drop_index("name").unwrap());
        assert!(table.get_index(col).is_none());
        // The primary key index cannot be dropped.
        assert!(!table.drop_index("id").unwrap());
    }

    #[test]
    fn test_value_exists_scan_and_index() {
        let mut table = open_test_table();
        table.insert_record(&row(1, "a", Some(0.5))).unwrap();
        // id is indexed; score is not.
        assert!(table.value_exists("id", &Value::Int(1)).unwrap());
        assert!(!table.value_exists("id", &Value::Int(9)).unwrap());
        assert!(table.value_exists("score", &Value::Float(0.5)).unwrap());
        assert!(!table.value_exists("score", &Value::Float(0.6)).unwrap());
    }

    #[test]
    fn test_reopen_rebuilds_state() {
        // Reopen needs a second handle to the same backing pages, so wrap
        // a shared MemoryStorage.
        let shared = std::sync::Arc::new(MemoryStorage::new());

        struct Shared(std::sync::Arc<MemoryStorage>);
        impl Storage for Shared {
            fn read_page(&self, id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
                self.0.read_page(id, buf)
            }
            fn write_page(&self, id: PageId, buf: &[u8]) -> Result<(), StorageError> {
                self.0.write_page(id, buf)
            }
            fn allocate_page(&self) -> Result<PageId, StorageError> {
                self.0.allocate_page()
            }
            fn page_count(&self) -> u32 {
                self.0.page_count()
            }
            fn sync_all(&self) -> Result<(), StorageError> {
                self.0.sync_all()
            }
        }

        let schema = TableSchema::new(
            "t",
            vec![
                ColumnDef::new("a", Type::Int).indexed(),
                ColumnDef::new("b", Type::Char(4)),
            ],
        );
        {
            let mut table =
                Table::create(schema, Box::new(Shared(std::sync::Arc::clone(&shared)))).unwrap();
            table
                .insert_record(&[Value::Int(5), Value::Str("x".into())])
                .unwrap();
            table
                .insert_record(&[Value::Int(6), Value::Null])
                .unwrap();
            table.close().unwrap();
        }

        let table = Table::open(Box::new(Shared(shared))).unwrap();
        assert_eq!(table.name(), "t");
        assert_eq!(table.record_count(), 2);
        assert_eq!(
            table.record_values(1).unwrap().unwrap(),
            vec![Value::Int(5), Value::Str("x".into())]
        );
        let col = table.lookup_column("a").unwrap();
        assert_eq!(table.get_index(col).unwrap().len(), 2);
    }
}
