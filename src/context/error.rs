//! Context error types

use std::fmt;

use thiserror::Error;

use crate::planner::error::PlannerError;
use crate::sql::error::SqlError;

/// Lazily built components of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    AlgebraBuilder,
    CatalogReader,
    Validator,
    Cluster,
    Converter,
}

impl Component {
    /// All components, in dependency order
    pub const ALL: [Component; 5] = [
        Component::AlgebraBuilder,
        Component::CatalogReader,
        Component::Cluster,
        Component::Validator,
        Component::Converter,
    ];
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Component::AlgebraBuilder => "algebra builder",
            Component::CatalogReader => "catalog reader",
            Component::Validator => "validator",
            Component::Cluster => "cluster",
            Component::Converter => "converter",
        };
        write!(f, "{}", s)
    }
}

/// Context operation errors
#[derive(Error, Debug)]
pub enum ContextError {
    /// Missing schema root or unusable configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A component was requested while it could not be provided
    #[error("{component} is not ready: {reason}")]
    DependencyNotReady {
        component: Component,
        reason: String,
    },

    /// The schema adapter for a root name was registered with other settings
    #[error(
        "Schema root '{root}' is already registered with default database '{existing}', \
         not '{requested}'"
    )]
    RegistrationConflict {
        root: String,
        existing: String,
        requested: String,
    },

    /// Parse or validation error
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// Conversion error
    #[error(transparent)]
    Planner(#[from] PlannerError),
}

impl ContextError {
    pub(crate) fn not_ready(component: Component, reason: impl Into<String>) -> Self {
        ContextError::DependencyNotReady {
            component,
            reason: reason.into(),
        }
    }
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
