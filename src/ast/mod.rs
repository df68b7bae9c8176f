//! Abstract syntax tree produced by the parser and consumed by the interpreter.
//!
//! The teacher's pest-grammar AST models each node as its own struct so that
//! `from_pair` has somewhere to live; Gopa's hand-rolled recursive-descent
//! parser builds nodes directly, so the node set is modeled as two enums
//! (`Expr`, `Stmt`) instead, the way the teacher's own dormant hand-lexer path
//! would need to. See `DESIGN.md` for the full rationale.

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;
