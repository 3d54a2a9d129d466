//! Optimization rules
//!
//! Rules rewrite a relational tree bottom-up. Each one preserves the row type
//! of every node it replaces.

use crate::planner::error::PlannerResult;
use crate::planner::logical::{RelNode, RexBuilder};
use crate::planner::optimizer::transform_inputs;

/// Optimization rule trait
pub trait OptimizationRule: Send + Sync {
    /// Rule name for debugging
    fn name(&self) -> &'static str;

    /// Apply the rule to a tree
    fn apply(&self, plan: RelNode, rex: &RexBuilder) -> PlannerResult<RelNode>;
}

/// Push filter predicates into the table scan directly below them
pub struct PredicatePushdown;

impl OptimizationRule for PredicatePushdown {
    fn name(&self) -> &'static str {
        "predicate_pushdown"
    }

    fn apply(&self, plan: RelNode, rex: &RexBuilder) -> PlannerResult<RelNode> {
        let plan = transform_inputs(plan, &mut |input| self.apply(input, rex))?;
        match plan {
            RelNode::Filter { input, condition } => match *input {
                RelNode::Scan {
                    table,
                    row_type,
                    filter: None,
                } => Ok(RelNode::Scan {
                    table,
                    row_type,
                    filter: Some(condition),
                }),
                // Scan already has a filter: AND them
                RelNode::Scan {
                    table,
                    row_type,
                    filter: Some(existing),
                } => Ok(RelNode::Scan {
                    table,
                    row_type,
                    filter: Some(rex.and(vec![existing, condition])?),
                }),
                other => Ok(RelNode::Filter {
                    input: Box::new(other),
                    condition,
                }),
            },
            other => Ok(other),
        }
    }
}

/// Merge consecutive filter nodes
pub struct FilterMerge;

impl OptimizationRule for FilterMerge {
    fn name(&self) -> &'static str {
        "filter_merge"
    }

    fn apply(&self, plan: RelNode, rex: &RexBuilder) -> PlannerResult<RelNode> {
        let plan = transform_inputs(plan, &mut |input| self.apply(input, rex))?;
        match plan {
            RelNode::Filter { input, condition } => match *input {
                RelNode::Filter {
                    input: inner_input,
                    condition: inner_condition,
                } => Ok(RelNode::Filter {
                    input: inner_input,
                    condition: rex.and(vec![inner_condition, condition])?,
                }),
                other => Ok(RelNode::Filter {
                    input: Box::new(other),
                    condition,
                }),
            },
            other => Ok(other),
        }
    }
}

/// Collapse a projection over another projection into one
pub struct ProjectMerge;

impl OptimizationRule for ProjectMerge {
    fn name(&self) -> &'static str {
        "project_merge"
    }

    fn apply(&self, plan: RelNode, rex: &RexBuilder) -> PlannerResult<RelNode> {
        let plan = transform_inputs(plan, &mut |input| self.apply(input, rex))?;
        match plan {
            RelNode::Project {
                input,
                exprs,
                row_type,
            } => match *input {
                RelNode::Project {
                    input: inner_input,
                    exprs: inner_exprs,
                    ..
                } => {
                    let exprs = exprs
                        .iter()
                        .map(|e| e.substitute(&inner_exprs))
                        .collect::<PlannerResult<Vec<_>>>()?;
                    Ok(RelNode::Project {
                        input: inner_input,
                        exprs,
                        row_type,
                    })
                }
                other => Ok(RelNode::Project {
                    input: Box::new(other),
                    exprs,
                    row_type,
                }),
            },
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::planner::logical::{RelTypeRef, RexNode, RexOp, TypeFactory};
    use crate::sql::Literal;
    use std::sync::Arc;

    fn rex() -> RexBuilder {
        RexBuilder::new(Arc::new(TypeFactory::new()))
    }

    fn row(rex: &RexBuilder) -> RelTypeRef {
        let f = rex.type_factory();
        f.create_struct_type(vec![
            ("id".to_string(), f.create_sql_type(DataType::Int)),
            ("age".to_string(), f.create_scalar(DataType::Int, true)),
        ])
    }

    fn make_scan(rex: &RexBuilder) -> RelNode {
        RelNode::Scan {
            table: vec!["hive".to_string(), "default".to_string(), "users".to_string()],
            row_type: row(rex),
            filter: None,
        }
    }

    fn greater_than(rex: &RexBuilder, field: usize, value: i64) -> RexNode {
        let row = row(rex);
        rex.make_call(
            RexOp::GreaterThan,
            vec![
                rex.make_input_ref(&row, field).unwrap(),
                rex.make_literal(Literal::Integer(value)),
            ],
        )
        .unwrap()
    }

    fn make_filter(input: RelNode, condition: RexNode) -> RelNode {
        RelNode::Filter {
            input: Box::new(input),
            condition,
        }
    }

    #[test]
    fn test_predicate_pushdown_into_scan() {
        let rex = rex();
        let plan = make_filter(make_scan(&rex), greater_than(&rex, 1, 18));
        let result = PredicatePushdown.apply(plan, &rex).unwrap();

        match result {
            RelNode::Scan { filter, .. } => {
                assert_eq!(filter.unwrap().to_string(), ">($1, 18)");
            }
            _ => panic!("Expected Scan with filter"),
        }
    }

    #[test]
    fn test_predicate_pushdown_ands_existing_filter() {
        let rex = rex();
        let plan = make_filter(
            make_filter(make_scan(&rex), greater_than(&rex, 0, 1)),
            greater_than(&rex, 1, 18),
        );
        let result = PredicatePushdown.apply(plan, &rex).unwrap();

        match result {
            RelNode::Scan { filter, .. } => {
                assert_eq!(filter.unwrap().to_string(), "AND(>($0, 1), >($1, 18))");
            }
            _ => panic!("Expected Scan with filter"),
        }
    }

    #[test]
    fn test_filter_merge() {
        let rex = rex();
        let plan = make_filter(
            make_filter(make_scan(&rex), greater_than(&rex, 0, 1)),
            greater_than(&rex, 1, 18),
        );
        let result = FilterMerge.apply(plan, &rex).unwrap();

        match result {
            RelNode::Filter { input, condition } => {
                assert!(matches!(*input, RelNode::Scan { .. }));
                assert_eq!(condition.to_string(), "AND(>($0, 1), >($1, 18))");
            }
            _ => panic!("Expected Filter"),
        }
    }

    #[test]
    fn test_project_merge() {
        let rex = rex();
        let scan = make_scan(&rex);
        let row = scan.row_type();
        let f = rex.type_factory();

        let inner_exprs = vec![
            rex.make_input_ref(&row, 1).unwrap(),
            rex.make_input_ref(&row, 0).unwrap(),
        ];
        let inner_type = f.create_struct_type(vec![
            ("age".to_string(), Arc::clone(inner_exprs[0].ty())),
            ("id".to_string(), Arc::clone(inner_exprs[1].ty())),
        ]);
        let inner = RelNode::Project {
            input: Box::new(scan),
            exprs: inner_exprs,
            row_type: Arc::clone(&inner_type),
        };

        let outer_type =
            f.create_struct_type(vec![("id".to_string(), f.create_sql_type(DataType::Int))]);
        let outer = RelNode::Project {
            input: Box::new(inner),
            exprs: vec![rex.make_input_ref(&inner_type, 1).unwrap()],
            row_type: Arc::clone(&outer_type),
        };

        match ProjectMerge.apply(outer, &rex).unwrap() {
            RelNode::Project {
                input,
                exprs,
                row_type,
            } => {
                assert!(matches!(*input, RelNode::Scan { .. }));
                assert_eq!(exprs[0].to_string(), "$0");
                assert!(Arc::ptr_eq(&row_type, &outer_type));
            }
            _ => panic!("Expected Project"),
        }
    }
}
