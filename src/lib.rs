//! relctx - translation context for compiling SQL into relational algebra
//!
//! Features:
//! - Lazily built, memoized session components (algebra builder, catalog
//!   reader, validator, optimizer workspace, converter)
//! - View expansion through a weak hook back into the context
//! - Hive-style schema roots with a default database search path
//!
//! ```ignore
//! use relctx::RelContextProvider;
//!
//! let context = RelContextProvider::new(Some(schema))?;
//! let root = context.compile("SELECT id FROM orders")?;
//! ```

pub mod catalog;
pub mod config;
pub mod context;
pub mod planner;
pub mod sql;

#[cfg(test)]
pub(crate) mod test_utils;

pub use catalog::{CatalogReader, MemorySchema, Schema};
pub use config::SessionConfig;
pub use context::{Component, ContextError, ContextResult, RelContextProvider};
pub use planner::{ExplainOutput, RelNode, RelRoot, SqlToRelConverter};
