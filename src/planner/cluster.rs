//! Optimizer workspace
//!
//! A `Cluster` is shared by every tree converted in one session. It owns the
//! expression factory the trees are built with and the rule registry a later
//! optimization pass drives, and it records lineage for the compilation in
//! progress.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::planner::logical::{RexBuilder, TypeFactory};
use crate::planner::optimizer::Planner;

/// Lineage recorded while converting one top-level query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterMetadata {
    /// Qualified names of scanned tables, in conversion order
    pub tables_scanned: Vec<String>,
    /// Qualified names of expanded views, once per reference
    pub views_expanded: Vec<String>,
    /// Relational nodes produced by the last conversion
    pub rel_nodes: usize,
}

/// Session-wide optimizer workspace
#[derive(Debug)]
pub struct Cluster {
    planner: Planner,
    rex_builder: Arc<RexBuilder>,
    metadata: Mutex<ClusterMetadata>,
    compilations: AtomicU64,
}

impl Cluster {
    /// Create a workspace over a rule registry and expression factory
    pub fn new(planner: Planner, rex_builder: Arc<RexBuilder>) -> Self {
        Self {
            planner,
            rex_builder,
            metadata: Mutex::new(ClusterMetadata::default()),
            compilations: AtomicU64::new(0),
        }
    }

    /// Rule registry seeded from the session's rule set
    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Expression factory shared by every converted tree
    pub fn rex_builder(&self) -> &Arc<RexBuilder> {
        &self.rex_builder
    }

    /// Type factory behind the expression factory
    pub fn type_factory(&self) -> &Arc<TypeFactory> {
        self.rex_builder.type_factory()
    }

    /// Start recording a new top-level compilation
    ///
    /// Clears the lineage of the previous one.
    pub fn begin_compilation(&self) {
        *self.metadata.lock() = ClusterMetadata::default();
        self.compilations.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of top-level compilations started so far
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    pub fn record_scan(&self, table: &[String]) {
        self.metadata.lock().tables_scanned.push(table.join("."));
    }

    pub fn record_view_expansion(&self, view: &[String]) {
        self.metadata.lock().views_expanded.push(view.join("."));
    }

    pub fn record_nodes(&self, count: usize) {
        self.metadata.lock().rel_nodes = count;
    }

    /// Snapshot of the current compilation's lineage
    pub fn metadata(&self) -> ClusterMetadata {
        self.metadata.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleId;

    fn cluster() -> Cluster {
        let rex = Arc::new(RexBuilder::new(Arc::new(TypeFactory::new())));
        Cluster::new(Planner::new(&RuleId::standard()), rex)
    }

    #[test]
    fn test_metadata_is_scoped_per_compilation() {
        let cluster = cluster();
        cluster.begin_compilation();
        cluster.record_scan(&["hive".to_string(), "default".to_string(), "orders".to_string()]);
        cluster.record_view_expansion(&["hive".to_string(), "default".to_string(), "v".to_string()]);
        cluster.record_nodes(3);

        let meta = cluster.metadata();
        assert_eq!(meta.tables_scanned, vec!["hive.default.orders"]);
        assert_eq!(meta.views_expanded, vec!["hive.default.v"]);
        assert_eq!(meta.rel_nodes, 3);

        cluster.begin_compilation();
        assert_eq!(cluster.metadata(), ClusterMetadata::default());
        assert_eq!(cluster.compilations(), 2);
    }

    #[test]
    fn test_shares_type_factory_with_rex_builder() {
        let cluster = cluster();
        assert!(Arc::ptr_eq(
            cluster.type_factory(),
            cluster.rex_builder().type_factory()
        ));
        assert_eq!(cluster.planner().rule_names().len(), 3);
    }
}
