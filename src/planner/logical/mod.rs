//! Logical plan representation
//!
//! Relational-algebra trees produced by the converter. Every node knows its
//! output row type; field references inside a node are positional against
//! its input (for joins, against left fields followed by right fields).

pub mod builder;
pub mod rex;
pub mod types;

pub use builder::{AlgebraBuilder, RelBuilder};
pub use rex::{AggregateCall, FieldCollation, RexBuilder, RexNode, RexOp};
pub use types::{RelDataType, RelField, RelTypeRef, TypeFactory};

use std::sync::Arc;

use crate::sql::JoinType;

/// Logical plan node
#[derive(Debug, Clone, PartialEq)]
pub enum RelNode {
    /// Table scan - read all rows from a table (or an unexpanded view)
    Scan {
        /// Fully qualified name
        table: Vec<String>,
        row_type: RelTypeRef,
        /// Optional pushed-down filter predicate
        filter: Option<RexNode>,
    },

    /// Constant rows
    Values {
        tuples: Vec<Vec<RexNode>>,
        row_type: RelTypeRef,
    },

    /// Filter rows based on a predicate
    Filter {
        input: Box<RelNode>,
        condition: RexNode,
    },

    /// Compute one output field per expression
    Project {
        input: Box<RelNode>,
        exprs: Vec<RexNode>,
        row_type: RelTypeRef,
    },

    /// Join two inputs
    Join {
        left: Box<RelNode>,
        right: Box<RelNode>,
        join_type: JoinType,
        condition: Option<RexNode>,
        row_type: RelTypeRef,
    },

    /// Aggregate with optional grouping; output is group fields then aggregates
    Aggregate {
        input: Box<RelNode>,
        group_set: Vec<usize>,
        aggregates: Vec<AggregateCall>,
        row_type: RelTypeRef,
    },

    /// Sort rows
    Sort {
        input: Box<RelNode>,
        collation: Vec<FieldCollation>,
    },

    /// Limit rows returned
    Limit {
        input: Box<RelNode>,
        fetch: Option<u64>,
        offset: Option<u64>,
    },

    /// Remove duplicate rows
    Distinct { input: Box<RelNode> },

    /// Concatenate inputs with compatible row types
    Union {
        inputs: Vec<RelNode>,
        all: bool,
        row_type: RelTypeRef,
    },
}

impl RelNode {
    /// Output row type of this node
    pub fn row_type(&self) -> RelTypeRef {
        match self {
            RelNode::Scan { row_type, .. }
            | RelNode::Values { row_type, .. }
            | RelNode::Project { row_type, .. }
            | RelNode::Join { row_type, .. }
            | RelNode::Aggregate { row_type, .. }
            | RelNode::Union { row_type, .. } => Arc::clone(row_type),
            RelNode::Filter { input, .. }
            | RelNode::Sort { input, .. }
            | RelNode::Limit { input, .. }
            | RelNode::Distinct { input } => input.row_type(),
        }
    }

    /// Direct inputs
    pub fn inputs(&self) -> Vec<&RelNode> {
        match self {
            RelNode::Scan { .. } | RelNode::Values { .. } => vec![],
            RelNode::Filter { input, .. }
            | RelNode::Project { input, .. }
            | RelNode::Aggregate { input, .. }
            | RelNode::Sort { input, .. }
            | RelNode::Limit { input, .. }
            | RelNode::Distinct { input } => vec![input.as_ref()],
            RelNode::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            RelNode::Union { inputs, .. } => inputs.iter().collect(),
        }
    }

    /// Node name as rendered by explain
    pub fn kind(&self) -> &'static str {
        match self {
            RelNode::Scan { .. } => "LogicalTableScan",
            RelNode::Values { .. } => "LogicalValues",
            RelNode::Filter { .. } => "LogicalFilter",
            RelNode::Project { .. } => "LogicalProject",
            RelNode::Join { .. } => "LogicalJoin",
            RelNode::Aggregate { .. } => "LogicalAggregate",
            RelNode::Sort { .. } => "LogicalSort",
            RelNode::Limit { .. } => "LogicalLimit",
            RelNode::Distinct { .. } => "LogicalDistinct",
            RelNode::Union { .. } => "LogicalUnion",
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + self.inputs().iter().map(|i| i.node_count()).sum::<usize>()
    }

    /// Qualified names of all scanned tables, in tree order
    pub fn scanned_tables(&self) -> Vec<Vec<String>> {
        let mut tables = Vec::new();
        self.collect_scans(&mut tables);
        tables
    }

    fn collect_scans(&self, out: &mut Vec<Vec<String>>) {
        if let RelNode::Scan { table, .. } = self {
            out.push(table.clone());
        }
        for input in self.inputs() {
            input.collect_scans(out);
        }
    }
}

/// Result of converting a query: the tree plus the row type validation promised
#[derive(Debug, Clone)]
pub struct RelRoot {
    pub rel: RelNode,
    pub validated_row_type: RelTypeRef,
}

impl RelRoot {
    /// Wrap a tree
    pub fn new(rel: RelNode, validated_row_type: RelTypeRef) -> Self {
        Self {
            rel,
            validated_row_type,
        }
    }

    /// Output field names
    pub fn field_names(&self) -> Vec<String> {
        self.validated_row_type
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}
