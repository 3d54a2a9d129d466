//! Planner error types

use std::fmt;

use crate::sql::error::SqlError;

/// Planner error
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerError {
    /// Invalid plan structure
    InvalidPlan(String),
    /// Unsupported operation
    UnsupportedOperation(String),
    /// Internal error
    Internal(String),
    /// A view definition could not be compiled
    ViewExpansion { view: String, reason: String },
    /// View definitions nest deeper than the configured limit
    ViewDepthExceeded { view: String, depth: usize },
    /// The context that owns the view compiler has been dropped
    ContextDropped,
    /// Parse or validation error raised while compiling a view
    Sql(SqlError),
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InvalidPlan(msg) => write!(f, "Invalid plan: {}", msg),
            PlannerError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            PlannerError::Internal(msg) => write!(f, "Internal planner error: {}", msg),
            PlannerError::ViewExpansion { view, reason } => {
                write!(f, "Cannot expand view '{}': {}", view, reason)
            }
            PlannerError::ViewDepthExceeded { view, depth } => write!(
                f,
                "View '{}' exceeds the maximum expansion depth of {}",
                view, depth
            ),
            PlannerError::ContextDropped => write!(f, "Translation context has been dropped"),
            PlannerError::Sql(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PlannerError {}

impl From<SqlError> for PlannerError {
    fn from(err: SqlError) -> Self {
        PlannerError::Sql(err)
    }
}

/// Result type for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
