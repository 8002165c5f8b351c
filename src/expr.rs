//! Expression trees and evaluation.
//!
//! This module defines the typed expression tree consumed by the engine
//! ([`Expr`]) and the evaluator that reduces a tree to a concrete
//! [`Value`](crate::datum::Value) against the per-row column caches of the
//! tables in scope.
//!
//! Expression trees are owned by the parsed statement and outlive
//! evaluation; evaluated values are transient within one row.

mod ast;
mod eval;
mod like;

pub use ast::{AggregateFunc, BinaryOperator, Expr, UnaryOperator};
pub use eval::{EvalError, EvalScope};
pub use like::like_match;
