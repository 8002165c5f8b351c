//! Expression tree node types.
//!
//! The tree is produced by a front-end parser (out of scope for this crate)
//! and consumed by the evaluator and the join planner. `Display` provides
//! the stable canonical rendering used for result-set headers.

use std::fmt;

use crate::datum::Value;

/// A node in an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value (INT, FLOAT, STRING, BOOL, DATE, NULL).
    Literal(Value),
    /// Column reference, optionally qualified with a table name.
    ///
    /// The table name may be elided when only one table is in scope.
    Column {
        /// Qualifying table name, if written.
        table: Option<String>,
        /// Column name.
        column: String,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<Expr>,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Aggregate call. `operand` is `None` for `COUNT(*)`.
    Aggregate {
        /// Aggregate function.
        func: AggregateFunc,
        /// Inner expression, absent for `COUNT(*)`.
        operand: Option<Box<Expr>>,
    },
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `LIKE`
    Like,
}

impl BinaryOperator {
    /// Returns the display string for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Eq => "=",
            BinaryOperator::Neq => "<>",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => " AND ",
            BinaryOperator::Or => " OR ",
            BinaryOperator::Like => " LIKE ",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `NOT`
    Not,
    /// `IS NULL`
    IsNull,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    /// `COUNT`
    Count,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
}

impl AggregateFunc {
    /// Returns the display string for this function.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
        }
    }
}

impl Expr {
    /// Convenience constructor for a bare column reference.
    pub fn column(name: impl Into<String>) -> Expr {
        Expr::Column {
            table: None,
            column: name.into(),
        }
    }

    /// Convenience constructor for a table-qualified column reference.
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Expr {
        Expr::Column {
            table: Some(table.into()),
            column: column.into(),
        }
    }

    /// Convenience constructor for a binary operation.
    pub fn binary(left: Expr, op: BinaryOperator, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Returns true iff the root of this tree is an aggregate call.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Expr::Aggregate { .. })
    }

    /// Flattens an AND-chain into its conjuncts, left to right.
    ///
    /// A node that is not an `AND` yields itself as the single conjunct.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        self.collect_conjuncts(&mut out);
        out
    }

    fn collect_conjuncts<'a>(&'a self, out: &mut Vec<&'a Expr>) {
        match self {
            Expr::Binary {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                left.collect_conjuncts(out);
                right.collect_conjuncts(out);
            }
            other => out.push(other),
        }
    }

    /// If this node is a column-to-column equality, returns both refs as
    /// `((left_table, left_column), (right_table, right_column))`.
    pub fn as_column_equality(&self) -> Option<((Option<&str>, &str), (Option<&str>, &str))> {
        let Expr::Binary {
            left,
            op: BinaryOperator::Eq,
            right,
        } = self
        else {
            return None;
        };
        match (left.as_ref(), right.as_ref()) {
            (
                Expr::Column {
                    table: lt,
                    column: lc,
                },
                Expr::Column {
                    table: rt,
                    column: rc,
                },
            ) => Some(((lt.as_deref(), lc), (rt.as_deref(), rc))),
            _ => None,
        }
    }
}

/// Stable canonical rendering used for result-set headers.
///
/// Column refs render as written (`a` or `t.a`), aggregates as
/// `FUNC(inner)` with `COUNT(*)` for the starless form, string literals
/// single-quoted. Uniqueness across projected expressions is not enforced;
/// duplicate labels display first-wins.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Value::Str(s)) => write!(f, "'{s}'"),
            Expr::Literal(v) => write!(f, "{v}"),
            Expr::Column { table, column } => match table {
                Some(t) => write!(f, "{t}.{column}"),
                None => write!(f, "{column}"),
            },
            Expr::Unary {
                op: UnaryOperator::Not,
                operand,
            } => write!(f, "NOT {operand}"),
            Expr::Unary {
                op: UnaryOperator::IsNull,
                operand,
            } => write!(f, "{operand} IS NULL"),
            Expr::Binary { left, op, right } => {
                write!(f, "{left}{}{right}", op.as_str())
            }
            Expr::Aggregate { func, operand } => match operand {
                Some(inner) => write!(f, "{}({inner})", func.as_str()),
                None => write!(f, "{}(*)", func.as_str()),
            },
        }
    }
}
