//! The embedded expression language: dotted-path lookups and comparison /
//! logical operators, reachable only through the narrow `parse` /
//! `evaluate` interface re-exported below.

mod ast;
mod eval;
mod lexer;
mod parser;

pub use ast::Expr;
pub use eval::{default_null_substitution, evaluate, EvalError, MemoryView, NullSubstitution, Options};
pub use parser::{parse, ExprParseError};
