//! Query planner
//!
//! Turns validated SQL into relational algebra.
//!
//! ## Pipeline
//!
//! ```text
//! ValidatedQuery
//!   → SqlToRelConverter::convert_query() → RelRoot
//!   → Planner::optimize() (driven by the caller) → RelNode
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use relctx::planner::ExplainOutput;
//!
//! let converter = context.converter()?;
//! let root = converter.convert_query(&validated, true)?;
//! let optimized = converter
//!     .cluster()
//!     .planner()
//!     .optimize(root.rel, converter.cluster().rex_builder())?;
//! println!("{}", ExplainOutput::format(&optimized));
//! ```

pub mod cluster;
pub mod convertlet;
pub mod converter;
pub mod error;
pub mod explain;
pub mod logical;
pub mod optimizer;

pub use cluster::{Cluster, ClusterMetadata};
pub use convertlet::ConvertletTable;
pub use converter::SqlToRelConverter;
pub use error::{PlannerError, PlannerResult};
pub use explain::ExplainOutput;
pub use logical::{AlgebraBuilder, RelBuilder, RelNode, RelRoot};
pub use optimizer::Planner;
