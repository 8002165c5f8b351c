//! Table schemas and the on-disk table header.
//!
//! The header occupies page 0 of a table file: a magic, the table name,
//! the rowid counter, and the column definitions (name, type, width,
//! flags, default). Fixed-width name fields keep the layout stable; the
//! in-memory representation uses growable strings and vectors.

use bytes::{Buf, BufMut};

use crate::datum::{Type, Value};
use crate::storage::PAGE_SIZE;

/// Maximum byte length of table and column names.
pub const MAX_NAME_LEN: usize = 64;

/// Maximum number of user columns per table.
pub const MAX_COLUMNS: usize = 32;

/// Name of the hidden trailing rowid column.
pub const ROWID_COLUMN: &str = "__rowid__";

const HEADER_MAGIC: u32 = 0x5142_544C; // "QBTL"
const HEADER_VERSION: u16 = 1;

/// Bytes reserved at the front of each data page: a used-slot counter plus
/// a presence bitmap of up to 512 slots.
pub(crate) const PAGE_SLOT_HEADER: usize = 4 + 64;

/// Maximum record slots per data page (bitmap capacity).
pub(crate) const MAX_SLOTS_PER_PAGE: usize = 512;

/// A single column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage type (carries the width for CHAR).
    pub ty: Type,
    /// Whether NULL values are accepted.
    pub nullable: bool,
    /// Default value applied when an INSERT omits the column.
    pub default: Option<Value>,
    /// Whether the column carries an index.
    pub indexed: bool,
    /// Whether the column is the primary key (non-null, unique index).
    pub primary_key: bool,
}

impl ColumnDef {
    /// Creates a nullable column with no default and no index.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            default: None,
            indexed: false,
            primary_key: false,
        }
    }

    /// Marks the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Attaches an index to the column.
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Marks the column as the primary key: NOT NULL with a unique index.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.indexed = true;
        self
    }

    /// Sets the column default.
    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// A table schema: name plus ordered user column definitions.
///
/// The hidden `__rowid__` column is not part of the schema; the table
/// appends it at the trailing position.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// User columns in order.
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Creates a schema from a name and columns.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Validates structural invariants.
    ///
    /// Checks name lengths, the column count, duplicate and reserved
    /// column names, at most one primary key, and that a record fits in a
    /// data page.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() || self.name.len() > MAX_NAME_LEN {
            return Err(format!("invalid table name `{}`", self.name));
        }
        if self.columns.is_empty() {
            return Err("table must have at least one column".to_string());
        }
        if self.columns.len() > MAX_COLUMNS {
            return Err(format!(
                "too many columns: {} (max {})",
                self.columns.len(),
                MAX_COLUMNS
            ));
        }
        let mut primary_seen = false;
        for (i, col) in self.columns.iter().enumerate() {
            if col.name.is_empty() || col.name.len() > MAX_NAME_LEN {
                return Err(format!("invalid column name `{}`", col.name));
            }
            if col.name == ROWID_COLUMN {
                return Err(format!("column name `{ROWID_COLUMN}` is reserved"));
            }
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                return Err(format!("duplicate column `{}`", col.name));
            }
            if col.primary_key {
                if primary_seen {
                    return Err("multiple primary key columns".to_string());
                }
                primary_seen = true;
            }
            if let Some(default) = &col.default {
                if !default.is_null() && !col.ty.accepts(default) {
                    return Err(format!("default incompatible with column `{}`", col.name));
                }
            }
        }
        if self.record_size() > PAGE_SIZE - PAGE_SLOT_HEADER {
            return Err("record too large for one page".to_string());
        }
        Ok(())
    }

    /// Number of user columns (excluding `__rowid__`).
    pub fn user_column_count(&self) -> usize {
        self.columns.len()
    }

    /// Byte size of one record image: rowid, null bitmap, column slots.
    pub fn record_size(&self) -> usize {
        4 + self.columns.len().div_ceil(8)
            + self.columns.iter().map(|c| c.ty.width()).sum::<usize>()
    }

    /// Byte offset of a user column's slot within the record image.
    pub fn column_offset(&self, col_id: usize) -> usize {
        4 + self.columns.len().div_ceil(8)
            + self.columns[..col_id]
                .iter()
                .map(|c| c.ty.width())
                .sum::<usize>()
    }

    /// Record slots per data page for this schema.
    pub fn slots_per_page(&self) -> usize {
        ((PAGE_SIZE - PAGE_SLOT_HEADER) / self.record_size()).min(MAX_SLOTS_PER_PAGE)
    }

    /// Serializes the header (schema plus rowid counter) into a page
    /// buffer.
    pub fn encode_header(&self, next_rowid: u32, page: &mut [u8]) {
        debug_assert_eq!(page.len(), PAGE_SIZE);
        page.fill(0);
        let mut buf = &mut page[..];
        buf.put_u32_le(HEADER_MAGIC);
        buf.put_u16_le(HEADER_VERSION);
        put_name(&mut buf, &self.name);
        buf.put_u32_le(next_rowid);
        buf.put_u16_le(self.columns.len() as u16);
        for col in &self.columns {
            put_name(&mut buf, &col.name);
            buf.put_u8(col.ty.code());
            let width = match col.ty {
                Type::Char(n) => n,
                _ => 0,
            };
            buf.put_u16_le(width);
            let mut flags = 0u8;
            if col.nullable {
                flags |= 1;
            }
            if col.indexed {
                flags |= 2;
            }
            if col.primary_key {
                flags |= 4;
            }
            buf.put_u8(flags);
            match &col.default {
                Some(v) if !v.is_null() => {
                    buf.put_u8(1);
                    let coerced = v
                        .coerce_to(col.ty)
                        .expect("validated default must coerce");
                    let slot = coerced.encode_to_vec(col.ty);
                    buf.put_slice(&slot);
                }
                _ => buf.put_u8(0),
            }
        }
    }

    /// Deserializes a header page into a schema and rowid counter.
    pub fn decode_header(page: &[u8]) -> Result<(TableSchema, u32), String> {
        debug_assert_eq!(page.len(), PAGE_SIZE);
        let mut buf = page;
        if buf.get_u32_le() != HEADER_MAGIC {
            return Err("bad table header magic".to_string());
        }
        let version = buf.get_u16_le();
        if version != HEADER_VERSION {
            return Err(format!("unsupported table header version {version}"));
        }
        let name = get_name(&mut buf)?;
        let next_rowid = buf.get_u32_le();
        let count = buf.get_u16_le() as usize;
        if count > MAX_COLUMNS {
            return Err(format!("column count {count} out of range"));
        }
        let mut columns = Vec::with_capacity(count);
        for _ in 0..count {
            let col_name = get_name(&mut buf)?;
            let code = buf.get_u8();
            let width = buf.get_u16_le();
            let ty = Type::from_code(code, width)
                .ok_or_else(|| format!("unknown column type code {code}"))?;
            let flags = buf.get_u8();
            let has_default = buf.get_u8() == 1;
            let default = if has_default {
                let mut slot = vec![0u8; ty.width()];
                buf.copy_to_slice(&mut slot);
                Some(Value::decode(ty, &slot))
            } else {
                None
            };
            columns.push(ColumnDef {
                name: col_name,
                ty,
                nullable: flags & 1 != 0,
                default,
                indexed: flags & 2 != 0,
                primary_key: flags & 4 != 0,
            });
        }
        Ok((TableSchema { name, columns }, next_rowid))
    }
}

/// Writes a name as a fixed `MAX_NAME_LEN`-byte field with a length prefix.
fn put_name(buf: &mut impl BufMut, name: &str) {
    debug_assert!(name.len() <= MAX_NAME_LEN);
    buf.put_u16_le(name.len() as u16);
    buf.put_slice(name.as_bytes());
    buf.put_bytes(0, MAX_NAME_LEN - name.len());
}

/// Reads a fixed-width name field.
fn get_name(buf: &mut &[u8]) -> Result<String, String> {
    let len = buf.get_u16_le() as usize;
    if len > MAX_NAME_LEN {
        return Err(format!("name length {len} out of range"));
    }
    let mut field = vec![0u8; MAX_NAME_LEN];
    buf.copy_to_slice(&mut field);
    String::from_utf8(field[..len].to_vec()).map_err(|e| format!("invalid name: {e}"))
}
