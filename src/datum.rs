//! Database data types and values.
//!
//! This module defines the canonical type system and value representation
//! for the engine. [`Type`] describes a column's storage type (with width
//! for fixed-length strings), and [`Value`] is the tagged union used as the
//! universal currency between the expression evaluator, the coercion layer,
//! and record serialization.

use std::fmt;

use bytes::BufMut;
use chrono::{DateTime, NaiveDate};

/// Date rendering and parsing template (`YYYY-MM-DD`).
pub const DATE_TEMPLATE: &str = "%Y-%m-%d";

/// Errors from the type coercion layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeError {
    /// Target type description.
    pub expected: String,
    /// Offending value description.
    pub found: String,
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "incompatible data type: expected {}, found {}",
            self.expected, self.found
        )
    }
}

impl std::error::Error for TypeError {}

/// Column storage type.
///
/// Every type has a fixed on-disk width, so records are fixed-width byte
/// images with each column at a known offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    /// 4-byte signed integer.
    Int,
    /// 4-byte IEEE float.
    Float,
    /// Fixed-length string of the given byte width, zero-padded.
    Char(u16),
    /// Boolean, one byte.
    Bool,
    /// Date, stored as epoch seconds (8 bytes).
    Date,
}

impl Type {
    /// Returns the fixed on-disk width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Type::Int => 4,
            Type::Float => 4,
            Type::Char(n) => n as usize,
            Type::Bool => 1,
            Type::Date => 8,
        }
    }

    /// Returns the SQL display name for this type.
    pub fn display_name(self) -> String {
        match self {
            Type::Int => "INT".to_string(),
            Type::Float => "FLOAT".to_string(),
            Type::Char(n) => format!("CHAR({n})"),
            Type::Bool => "BOOL".to_string(),
            Type::Date => "DATE".to_string(),
        }
    }

    /// Stable storage code used in table headers.
    pub const fn code(self) -> u8 {
        match self {
            Type::Int => 1,
            Type::Float => 2,
            Type::Char(_) => 3,
            Type::Bool => 4,
            Type::Date => 5,
        }
    }

    /// Reconstructs a type from its storage code and width.
    pub fn from_code(code: u8, width: u16) -> Option<Self> {
        match code {
            1 => Some(Type::Int),
            2 => Some(Type::Float),
            3 => Some(Type::Char(width)),
            4 => Some(Type::Bool),
            5 => Some(Type::Date),
            _ => None,
        }
    }

    /// Returns true if a value may be written to a column of this type.
    ///
    /// A value is compatible when its variant matches the column type, or
    /// promotes: INT into FLOAT, any value whose text form fits into a
    /// CHAR column of sufficient width, and a STRING parseable under
    /// [`DATE_TEMPLATE`] into DATE. NULL compatibility (nullability) is a
    /// column property, not a type property, and is checked by the table.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Type::Int, Value::Int(_)) => true,
            (Type::Float, Value::Float(_) | Value::Int(_)) => true,
            (Type::Char(n), v) => v.to_text().len() <= n as usize,
            (Type::Bool, Value::Bool(_)) => true,
            (Type::Date, Value::Date(_)) => true,
            (Type::Date, Value::Str(s)) => parse_date(s).is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// A typed database value.
///
/// This is the evaluated-value representation shared by the expression
/// evaluator and the coercion layer: 32-bit integers and floats, owned
/// strings (fixed-length on disk), booleans, dates as epoch seconds, and
/// SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL (type is unknown/any).
    Null,
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit floating point.
    Float(f32),
    /// String (stored fixed-width, truncated to column width).
    Str(String),
    /// Boolean.
    Bool(bool),
    /// Date as epoch seconds.
    Date(i64),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns a human-readable type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "INT",
            Value::Float(_) => "FLOAT",
            Value::Str(_) => "STRING",
            Value::Bool(_) => "BOOL",
            Value::Date(_) => "DATE",
        }
    }

    /// Converts this value to a boolean for use in a filter context.
    ///
    /// INT and FLOAT are true when nonzero, STRING when non-empty, BOOL
    /// as-is, DATE when nonzero, and NULL is false.
    pub fn to_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Date(d) => *d != 0,
        }
    }

    /// Coerces this value to the storage representation of `target`.
    ///
    /// Applies the promotions described by [`Type::accepts`]: INT widens to
    /// FLOAT, any value stringifies into a CHAR column, a date-formatted
    /// STRING parses into DATE. NULL passes through unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError`] if the value is incompatible with the target.
    pub fn coerce_to(&self, target: Type) -> Result<Value, TypeError> {
        let mismatch = || TypeError {
            expected: target.display_name(),
            found: self.type_name().to_string(),
        };
        match (target, self) {
            (_, Value::Null) => Ok(Value::Null),
            (Type::Int, Value::Int(n)) => Ok(Value::Int(*n)),
            (Type::Float, Value::Float(f)) => Ok(Value::Float(*f)),
            (Type::Float, Value::Int(n)) => Ok(Value::Float(*n as f32)),
            (Type::Char(n), v) => {
                let text = v.to_text();
                if text.len() > n as usize {
                    return Err(TypeError {
                        expected: target.display_name(),
                        found: format!("STRING of length {}", text.len()),
                    });
                }
                Ok(Value::Str(text))
            }
            (Type::Bool, Value::Bool(b)) => Ok(Value::Bool(*b)),
            (Type::Date, Value::Date(d)) => Ok(Value::Date(*d)),
            (Type::Date, Value::Str(s)) => parse_date(s).map(Value::Date).ok_or_else(mismatch),
            _ => Err(mismatch()),
        }
    }

    /// Serializes this value into a fixed-width column slot.
    ///
    /// The caller must have coerced the value to the column type first;
    /// `buf` must be exactly `ty.width()` bytes. CHAR values are written
    /// zero-padded and truncated to the column width. NULL writes zeros
    /// (the null bitmap is authoritative).
    pub fn encode(&self, ty: Type, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ty.width());
        buf.fill(0);
        match (ty, self) {
            (_, Value::Null) => {}
            (Type::Int, Value::Int(n)) => buf.copy_from_slice(&n.to_le_bytes()),
            (Type::Float, Value::Float(f)) => buf.copy_from_slice(&f.to_le_bytes()),
            (Type::Char(n), Value::Str(s)) => {
                let len = s.len().min(n as usize);
                buf[..len].copy_from_slice(&s.as_bytes()[..len]);
            }
            (Type::Bool, Value::Bool(b)) => buf[0] = *b as u8,
            (Type::Date, Value::Date(d)) => buf.copy_from_slice(&d.to_le_bytes()),
            _ => debug_assert!(false, "encode of uncoerced value"),
        }
    }

    /// Serialized form of this value for a column slot, as owned bytes.
    pub fn encode_to_vec(&self, ty: Type) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ty.width());
        buf.put_bytes(0, ty.width());
        self.encode(ty, &mut buf);
        buf
    }

    /// Decodes a non-null value from a fixed-width column slot.
    pub fn decode(ty: Type, buf: &[u8]) -> Value {
        debug_assert_eq!(buf.len(), ty.width());
        match ty {
            Type::Int => Value::Int(i32::from_le_bytes(buf[..4].try_into().unwrap())),
            Type::Float => Value::Float(f32::from_le_bytes(buf[..4].try_into().unwrap())),
            Type::Char(_) => {
                let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
                Value::Str(String::from_utf8_lossy(&buf[..end]).into_owned())
            }
            Type::Bool => Value::Bool(buf[0] != 0),
            Type::Date => Value::Date(i64::from_le_bytes(buf[..8].try_into().unwrap())),
        }
    }

    /// Plain text form without formatting conventions, used when
    /// stringifying into CHAR columns.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Result-stream rendering: BOOL as `TRUE`/`FALSE`, FLOAT with six
/// fractional digits, DATE under [`DATE_TEMPLATE`], NULL as `NULL`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:.6}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Value::Date(d) => write!(f, "{}", format_date(*d)),
        }
    }
}

/// Parses a `YYYY-MM-DD` string into epoch seconds at UTC midnight.
pub fn parse_date(s: &str) -> Option<i64> {
    let date = NaiveDate::parse_from_str(s, DATE_TEMPLATE).ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// Formats epoch seconds as a `YYYY-MM-DD` string (UTC).
pub fn format_date(epoch: i64) -> String {
    match DateTime::from_timestamp(epoch, 0) {
        Some(dt) => dt.format(DATE_TEMPLATE).to_string(),
        None => "NULL".to_string(),
    }
}
