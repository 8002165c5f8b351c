//! Expression evaluator.
//!
//! Evaluates [`Expr`] trees against the per-row column caches of the tables
//! currently in scope, producing a single [`Value`]. Column references are
//! resolved by table and column name; a bare column name resolves only when
//! exactly one in-scope table has a column with that name.
//!
//! Failures are returned as [`EvalError`] values; callers fold them into
//! the iteration's stop/continue channel at the statement boundary.

use std::cmp::Ordering;
use std::fmt;

use crate::datum::{TypeError, Value};
use crate::table::Table;

use super::ast::{BinaryOperator, Expr, UnaryOperator};
use super::like::like_match;

/// Errors raised while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A column reference did not resolve in the current scope.
    UnresolvedColumn {
        /// Qualifying table name, if written.
        table: Option<String>,
        /// Column name.
        column: String,
    },
    /// A bare column name matched more than one in-scope table.
    AmbiguousColumn {
        /// Column name.
        column: String,
    },
    /// Operand types incompatible with the operator.
    TypeMismatch {
        /// What the operator required.
        expected: String,
        /// What it got.
        found: String,
    },
    /// Division by zero.
    DivisionByZero,
    /// Integer arithmetic overflow.
    Overflow,
    /// An aggregate call appeared where a scalar was required.
    MisplacedAggregate,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::UnresolvedColumn { table, column } => match table {
                Some(t) => write!(f, "column `{t}.{column}` not found"),
                None => write!(f, "column `{column}` not found"),
            },
            EvalError::AmbiguousColumn { column } => {
                write!(f, "column `{column}` is ambiguous")
            }
            EvalError::TypeMismatch { expected, found } => {
                write!(f, "incompatible data type: expected {expected}, found {found}")
            }
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::Overflow => write!(f, "integer overflow"),
            EvalError::MisplacedAggregate => {
                write!(f, "aggregate not allowed in this context")
            }
        }
    }
}

impl std::error::Error for EvalError {}

impl From<TypeError> for EvalError {
    fn from(err: TypeError) -> Self {
        EvalError::TypeMismatch {
            expected: err.expected,
            found: err.found,
        }
    }
}

/// Name-resolution scope for one statement: the tables whose row caches
/// feed column references.
pub struct EvalScope<'a> {
    tables: &'a [&'a Table],
}

impl<'a> EvalScope<'a> {
    /// Creates a scope over the given tables.
    pub fn new(tables: &'a [&'a Table]) -> Self {
        Self { tables }
    }

    /// Resolves a column reference to `(table position, column id)`.
    pub fn resolve(
        &self,
        table: Option<&str>,
        column: &str,
    ) -> Result<(usize, usize), EvalError> {
        let unresolved = || EvalError::UnresolvedColumn {
            table: table.map(str::to_string),
            column: column.to_string(),
        };
        match table {
            Some(name) => {
                let pos = self
                    .tables
                    .iter()
                    .position(|t| t.name() == name)
                    .ok_or_else(unresolved)?;
                let cid = self.tables[pos].lookup_column(column).ok_or_else(unresolved)?;
                Ok((pos, cid))
            }
            None => {
                let mut found = None;
                for (pos, t) in self.tables.iter().enumerate() {
                    if let Some(cid) = t.lookup_column(column) {
                        if found.is_some() {
                            return Err(EvalError::AmbiguousColumn {
                                column: column.to_string(),
                            });
                        }
                        found = Some((pos, cid));
                    }
                }
                found.ok_or_else(unresolved)
            }
        }
    }

    /// Recursively reduces an expression to a concrete value, consulting
    /// the row caches for column references.
    pub fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),

            Expr::Column { table, column } => {
                let (pos, cid) = self.resolve(table.as_deref(), column)?;
                Ok(self.tables[pos].cached_column(cid))
            }

            Expr::Binary { left, op, right } => {
                let l = self.eval(left)?;
                let r = self.eval(right)?;
                eval_binary_op(&l, *op, &r)
            }

            Expr::Unary { op, operand } => {
                let v = self.eval(operand)?;
                eval_unary_op(*op, &v)
            }

            Expr::Aggregate { .. } => Err(EvalError::MisplacedAggregate),
        }
    }
}

/// Evaluates a binary operation.
fn eval_binary_op(left: &Value, op: BinaryOperator, right: &Value) -> Result<Value, EvalError> {
    // Logical operators use three-valued NULL logic over truthiness.
    match op {
        BinaryOperator::And => return Ok(eval_and(left, right)),
        BinaryOperator::Or => return Ok(eval_or(left, right)),
        _ => {}
    }

    // Any NULL operand yields NULL for every other operator.
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }

    match op {
        BinaryOperator::Eq => Ok(Value::Bool(compare_values(left, right)? == Ordering::Equal)),
        BinaryOperator::Neq => Ok(Value::Bool(compare_values(left, right)? != Ordering::Equal)),
        BinaryOperator::Lt => Ok(Value::Bool(compare_values(left, right)? == Ordering::Less)),
        BinaryOperator::LtEq => Ok(Value::Bool(
            compare_values(left, right)? != Ordering::Greater,
        )),
        BinaryOperator::Gt => Ok(Value::Bool(
            compare_values(left, right)? == Ordering::Greater,
        )),
        BinaryOperator::GtEq => Ok(Value::Bool(compare_values(left, right)? != Ordering::Less)),

        BinaryOperator::Like => match (left, right) {
            (Value::Str(s), Value::Str(p)) => Ok(Value::Bool(like_match(s, p))),
            _ => Err(EvalError::TypeMismatch {
                expected: "STRING LIKE STRING".to_string(),
                found: format!("{} LIKE {}", left.type_name(), right.type_name()),
            }),
        },

        BinaryOperator::Add | BinaryOperator::Sub | BinaryOperator::Mul | BinaryOperator::Div => {
            eval_arithmetic(left, op, right)
        }

        BinaryOperator::And | BinaryOperator::Or => unreachable!(),
    }
}

/// Evaluates AND with three-valued NULL logic over truthiness.
fn eval_and(left: &Value, right: &Value) -> Value {
    match (truthiness(left), truthiness(right)) {
        (Some(false), _) | (_, Some(false)) => Value::Bool(false),
        (Some(true), Some(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

/// Evaluates OR with three-valued NULL logic over truthiness.
fn eval_or(left: &Value, right: &Value) -> Value {
    match (truthiness(left), truthiness(right)) {
        (Some(true), _) | (_, Some(true)) => Value::Bool(true),
        (Some(false), Some(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Truthiness of a value in a logical operand position (None for NULL).
fn truthiness(v: &Value) -> Option<bool> {
    match v {
        Value::Null => None,
        other => Some(other.to_bool()),
    }
}

/// Evaluates arithmetic operators over INT/FLOAT.
///
/// INT promotes to FLOAT when either operand is FLOAT. Integer division
/// rounds toward zero; division by zero and detected overflow fail.
fn eval_arithmetic(left: &Value, op: BinaryOperator, right: &Value) -> Result<Value, EvalError> {
    match promote_numeric(left, right)? {
        Numeric::Int(a, b) => {
            let result = match op {
                BinaryOperator::Add => a.checked_add(b).ok_or(EvalError::Overflow)?,
                BinaryOperator::Sub => a.checked_sub(b).ok_or(EvalError::Overflow)?,
                BinaryOperator::Mul => a.checked_mul(b).ok_or(EvalError::Overflow)?,
                BinaryOperator::Div => {
                    if b == 0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a.checked_div(b).ok_or(EvalError::Overflow)?
                }
                _ => unreachable!(),
            };
            Ok(Value::Int(result))
        }
        Numeric::Float(a, b) => {
            let result = match op {
                BinaryOperator::Add => a + b,
                BinaryOperator::Sub => a - b,
                BinaryOperator::Mul => a * b,
                BinaryOperator::Div => {
                    if b == 0.0 {
                        return Err(EvalError::DivisionByZero);
                    }
                    a / b
                }
                _ => unreachable!(),
            };
            Ok(Value::Float(result))
        }
    }
}

/// A numeric operand pair after promotion.
enum Numeric {
    Int(i32, i32),
    Float(f32, f32),
}

/// Promotes two numeric values to a common representation.
fn promote_numeric(left: &Value, right: &Value) -> Result<Numeric, EvalError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Numeric::Int(*a, *b)),
        (Value::Float(a), Value::Float(b)) => Ok(Numeric::Float(*a, *b)),
        (Value::Int(a), Value::Float(b)) => Ok(Numeric::Float(*a as f32, *b)),
        (Value::Float(a), Value::Int(b)) => Ok(Numeric::Float(*a, *b as f32)),
        _ => Err(EvalError::TypeMismatch {
            expected: "numeric".to_string(),
            found: format!("{}, {}", left.type_name(), right.type_name()),
        }),
    }
}

/// Compares two non-null values.
///
/// INT and FLOAT promote to a common representation; STRING compares
/// byte-wise; DATE compares as epoch seconds; BOOL orders false < true.
fn compare_values(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Ok(a.as_bytes().cmp(b.as_bytes())),
        (Value::Date(a), Value::Date(b)) => Ok(a.cmp(b)),
        _ => match promote_numeric(left, right)? {
            Numeric::Int(a, b) => Ok(a.cmp(&b)),
            Numeric::Float(a, b) => Ok(a.partial_cmp(&b).unwrap_or(Ordering::Equal)),
        },
    }
}

/// Evaluates a unary operation.
fn eval_unary_op(op: UnaryOperator, val: &Value) -> Result<Value, EvalError> {
    match op {
        // IS NULL is the one operator that does not propagate NULL.
        UnaryOperator::IsNull => Ok(Value::Bool(val.is_null())),
        UnaryOperator::Not => match truthiness(val) {
            Some(b) => Ok(Value::Bool(!b)),
            None => Ok(Value::Null),
        },
    }
}
