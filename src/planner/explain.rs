//! EXPLAIN output formatting
//!
//! Renders a relational tree one node per line, children indented under
//! their parent:
//!
//! ```text
//! LogicalProject(id=[$0])
//!   LogicalFilter(condition=[>($2, 10)])
//!     LogicalTableScan(table=[[hive, default, orders]])
//! ```

use std::fmt::{self, Write};

use crate::planner::logical::RelNode;

/// Format a relational tree for EXPLAIN output
pub struct ExplainOutput;

impl ExplainOutput {
    /// Format a tree as a string
    pub fn format(plan: &RelNode) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail
        let _ = Self::format_node(plan, 0, &mut output);
        output
    }

    fn format_node(plan: &RelNode, indent: usize, out: &mut String) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        writeln!(out, "{}{}({})", prefix, plan.kind(), Self::attributes(plan))?;
        for input in plan.inputs() {
            Self::format_node(input, indent + 1, out)?;
        }
        Ok(())
    }

    fn attributes(plan: &RelNode) -> String {
        match plan {
            RelNode::Scan { table, filter, .. } => {
                let mut attrs = format!("table=[[{}]]", table.join(", "));
                if let Some(f) = filter {
                    attrs.push_str(&format!(", filter=[{}]", f));
                }
                attrs
            }

            RelNode::Values { tuples, .. } => {
                let rows: Vec<_> = tuples
                    .iter()
                    .map(|row| {
                        let values: Vec<_> = row.iter().map(|v| v.to_string()).collect();
                        format!("{{ {} }}", values.join(", "))
                    })
                    .collect();
                format!("tuples=[[{}]]", rows.join(", "))
            }

            RelNode::Filter { condition, .. } => format!("condition=[{}]", condition),

            RelNode::Project {
                exprs, row_type, ..
            } => {
                let parts: Vec<_> = row_type
                    .field_names()
                    .into_iter()
                    .zip(exprs)
                    .map(|(name, e)| format!("{}=[{}]", name, e))
                    .collect();
                parts.join(", ")
            }

            RelNode::Join {
                join_type,
                condition,
                ..
            } => {
                let cond = condition
                    .as_ref()
                    .map_or_else(|| "true".to_string(), |c| c.to_string());
                format!("condition=[{}], joinType=[{}]", cond, join_type)
            }

            RelNode::Aggregate {
                group_set,
                aggregates,
                row_type,
                ..
            } => {
                let keys: Vec<_> = group_set.iter().map(|g| g.to_string()).collect();
                let mut parts = vec![format!("group=[{{{}}}]", keys.join(", "))];
                let names = row_type.field_names();
                for (i, agg) in aggregates.iter().enumerate() {
                    let name = names
                        .get(group_set.len() + i)
                        .copied()
                        .unwrap_or(agg.name.as_str());
                    parts.push(format!("{}=[{}]", name, agg));
                }
                parts.join(", ")
            }

            RelNode::Sort { collation, .. } => {
                let mut parts = Vec::new();
                for (i, c) in collation.iter().enumerate() {
                    parts.push(format!("sort{}=[${}]", i, c.field));
                }
                for (i, c) in collation.iter().enumerate() {
                    parts.push(format!("dir{}=[{}]", i, c.direction()));
                }
                parts.join(", ")
            }

            RelNode::Limit { fetch, offset, .. } => {
                let mut parts = Vec::new();
                if let Some(o) = offset {
                    parts.push(format!("offset=[{}]", o));
                }
                if let Some(l) = fetch {
                    parts.push(format!("fetch=[{}]", l));
                }
                parts.join(", ")
            }

            RelNode::Distinct { .. } => String::new(),

            RelNode::Union { all, .. } => format!("all=[{}]", all),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::config::SessionConfig;
    use crate::planner::logical::{AlgebraBuilder, FieldCollation, RexOp};
    use crate::sql::{JoinType, Literal};
    use std::sync::Arc;

    #[test]
    fn test_explain_tree() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let f = algebra.type_factory();
        let row = f.create_struct_type(vec![
            ("id".to_string(), f.create_sql_type(DataType::Int)),
            ("total".to_string(), f.create_scalar(DataType::Double, true)),
        ]);
        let table = |name: &str| vec!["hive".to_string(), "default".to_string(), name.to_string()];

        let mut b = algebra.rel_builder();
        b.scan(table("orders"), Arc::clone(&row));
        b.scan(table("refunds"), row);
        let cond = b
            .rex()
            .make_call(
                RexOp::Equals,
                vec![b.field(0).unwrap(), b.field(0).unwrap().shift(2)],
            )
            .unwrap();
        b.join(JoinType::Left, Some(cond)).unwrap();
        let cond = b
            .rex()
            .make_call(
                RexOp::GreaterThan,
                vec![b.field(1).unwrap(), b.rex().make_literal(Literal::Integer(10))],
            )
            .unwrap();
        b.filter(cond).unwrap();
        let id = b.field(0).unwrap();
        b.project(vec![id], vec!["id".to_string()]).unwrap();
        b.sort(vec![FieldCollation::asc(0)]).unwrap();
        b.limit(None, Some(5)).unwrap();
        let plan = b.build().unwrap();

        let expected = "\
LogicalLimit(fetch=[5])
  LogicalSort(sort0=[$0], dir0=[ASC])
    LogicalProject(id=[$0])
      LogicalFilter(condition=[>($1, 10)])
        LogicalJoin(condition=[=($0, $2)], joinType=[left])
          LogicalTableScan(table=[[hive, default, orders]])
          LogicalTableScan(table=[[hive, default, refunds]])
";
        assert_eq!(ExplainOutput::format(&plan), expected);
    }

    #[test]
    fn test_explain_values_and_union() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let mut b = algebra.rel_builder();
        b.values_single_row();
        b.values_single_row();
        b.union(true, 2).unwrap();
        let plan = b.build().unwrap();

        assert_eq!(
            ExplainOutput::format(&plan),
            "LogicalUnion(all=[true])\n  LogicalValues(tuples=[[{  }]])\n  LogicalValues(tuples=[[{  }]])\n"
        );
    }
}
