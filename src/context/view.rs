//! View expansion
//!
//! When the converter meets a view it hands a `ViewExpansion` to its
//! `ViewExpander`. The hook built by the context forwards the request to the
//! context's `ViewCompiler`, which parses, validates and converts the view
//! text with the session's cached components.
//!
//! The hook holds a `Weak` reference, so a converter cached inside the
//! context does not keep the context alive.

use std::fmt;
use std::sync::Weak;

use tracing::trace;

use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{RelRoot, RelTypeRef};

/// Request to compile one view reference
#[derive(Debug, Clone)]
pub struct ViewExpansion {
    /// Qualified name of the view
    pub view_path: Vec<String>,
    /// Schema the view lives in; unqualified names in its text resolve here
    pub schema_path: Vec<String>,
    /// Stored definition
    pub sql: String,
    /// Row type the catalog declares for the view
    pub row_type: RelTypeRef,
    /// Nesting level of the view body (1 for a view named by the top query)
    pub depth: usize,
}

impl ViewExpansion {
    /// Dotted name of the view
    pub fn view_name(&self) -> String {
        self.view_path.join(".")
    }
}

/// Expands view references encountered during conversion
pub trait ViewExpander: Send + Sync {
    fn expand_view(&self, request: ViewExpansion) -> PlannerResult<RelRoot>;
}

/// Compiles view text into a relational tree
///
/// Implemented by the context; the only capability a hook can reach.
pub trait ViewCompiler: Send + Sync {
    fn compile_view(&self, request: &ViewExpansion) -> PlannerResult<RelRoot>;
}

/// Per-request hook handed to a converter
pub struct ViewExpansionHook {
    compiler: Weak<dyn ViewCompiler>,
}

impl ViewExpansionHook {
    pub fn new(compiler: Weak<dyn ViewCompiler>) -> Self {
        Self { compiler }
    }

    /// Whether the compiler behind this hook is still alive
    pub fn is_attached(&self) -> bool {
        self.compiler.strong_count() > 0
    }
}

impl fmt::Debug for ViewExpansionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewExpansionHook")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl ViewExpander for ViewExpansionHook {
    fn expand_view(&self, request: ViewExpansion) -> PlannerResult<RelRoot> {
        let compiler = self.compiler.upgrade().ok_or(PlannerError::ContextDropped)?;
        trace!(view = %request.view_name(), depth = request.depth, "Expanding view");
        compiler.compile_view(&request)
    }
}
