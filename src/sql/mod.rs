//! SQL layer - parsing, validation, and type checking
//!
//! This module provides:
//! - `Parser`: Parses SQL text into internal AST
//! - `SqlValidator`: Resolves names against the catalog reader and types expressions
//! - `TypeChecker`: Validates types and grouping in resolved queries
//! - `OperatorTable`: Built-in scalar and aggregate functions

pub mod ast;
pub mod error;
pub mod operators;
pub mod parser;
pub mod typecheck;
pub mod validator;

pub use ast::*;
pub use error::{SqlError, SqlResult};
pub use operators::{AggFunction, FunctionKind, OperatorTable};
pub use parser::Parser;
pub use typecheck::TypeChecker;
pub use validator::SqlValidator;
