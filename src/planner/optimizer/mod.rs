//! Rule registry
//!
//! The `Planner` holds the transformation rules a session is seeded with.
//! The context registers them up front; translation itself never runs them.
//! A driver optimizing the converted tree calls `optimize`.

pub mod rules;

pub use rules::{FilterMerge, OptimizationRule, PredicatePushdown, ProjectMerge};

use std::fmt;

use crate::config::RuleId;
use crate::planner::error::PlannerResult;
use crate::planner::logical::{RelNode, RexBuilder};

/// Registry of optimization rules, applied in registration order
pub struct Planner {
    rules: Vec<Box<dyn OptimizationRule>>,
}

impl Planner {
    /// Create a planner seeded with the given rules
    pub fn new(rule_ids: &[RuleId]) -> Self {
        Self {
            rules: rule_ids.iter().map(|id| rule_for(*id)).collect(),
        }
    }

    /// Create a planner with custom rules
    pub fn with_rules(rules: Vec<Box<dyn OptimizationRule>>) -> Self {
        Self { rules }
    }

    /// Register one more rule
    pub fn add_rule(&mut self, rule: Box<dyn OptimizationRule>) {
        self.rules.push(rule);
    }

    /// Rewrite a tree by applying every rule once
    pub fn optimize(&self, plan: RelNode, rex: &RexBuilder) -> PlannerResult<RelNode> {
        let mut current = plan;
        for rule in &self.rules {
            current = rule.apply(current, rex)?;
        }
        Ok(current)
    }

    /// Get the names of all registered rules
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }
}

impl fmt::Debug for Planner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("rules", &self.rule_names())
            .finish()
    }
}

fn rule_for(id: RuleId) -> Box<dyn OptimizationRule> {
    match id {
        RuleId::FilterMerge => Box::new(FilterMerge),
        RuleId::PredicatePushdown => Box::new(PredicatePushdown),
        RuleId::ProjectMerge => Box::new(ProjectMerge),
    }
}

/// Rebuild `plan` with `f` applied to each direct input
pub(crate) fn transform_inputs(
    plan: RelNode,
    f: &mut dyn FnMut(RelNode) -> PlannerResult<RelNode>,
) -> PlannerResult<RelNode> {
    Ok(match plan {
        RelNode::Scan { .. } | RelNode::Values { .. } => plan,
        RelNode::Filter { input, condition } => RelNode::Filter {
            input: Box::new(f(*input)?),
            condition,
        },
        RelNode::Project {
            input,
            exprs,
            row_type,
        } => RelNode::Project {
            input: Box::new(f(*input)?),
            exprs,
            row_type,
        },
        RelNode::Join {
            left,
            right,
            join_type,
            condition,
            row_type,
        } => RelNode::Join {
            left: Box::new(f(*left)?),
            right: Box::new(f(*right)?),
            join_type,
            condition,
            row_type,
        },
        RelNode::Aggregate {
            input,
            group_set,
            aggregates,
            row_type,
        } => RelNode::Aggregate {
            input: Box::new(f(*input)?),
            group_set,
            aggregates,
            row_type,
        },
        RelNode::Sort { input, collation } => RelNode::Sort {
            input: Box::new(f(*input)?),
            collation,
        },
        RelNode::Limit {
            input,
            fetch,
            offset,
        } => RelNode::Limit {
            input: Box::new(f(*input)?),
            fetch,
            offset,
        },
        RelNode::Distinct { input } => RelNode::Distinct {
            input: Box::new(f(*input)?),
        },
        RelNode::Union {
            inputs,
            all,
            row_type,
        } => RelNode::Union {
            inputs: inputs.into_iter().map(|i| f(i)).collect::<PlannerResult<_>>()?,
            all,
            row_type,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::planner::logical::{RexOp, TypeFactory};
    use crate::sql::Literal;
    use std::sync::Arc;

    #[test]
    fn test_rule_registration_order() {
        let planner = Planner::new(&RuleId::standard());
        assert_eq!(
            planner.rule_names(),
            vec!["filter_merge", "predicate_pushdown", "project_merge"]
        );
        assert!(Planner::new(&[]).rule_names().is_empty());
    }

    #[test]
    fn test_optimizer_pushes_filter_to_scan() {
        let rex = RexBuilder::new(Arc::new(TypeFactory::new()));
        let f = rex.type_factory();
        let row = f.create_struct_type(vec![
            ("id".to_string(), f.create_sql_type(DataType::Int)),
            ("age".to_string(), f.create_scalar(DataType::Int, true)),
        ]);

        let mut b = crate::planner::logical::RelBuilder::new(&rex);
        b.scan(vec!["users".to_string()], Arc::clone(&row));
        let cond = rex
            .make_call(
                RexOp::GreaterThan,
                vec![
                    b.field(1).unwrap(),
                    rex.make_literal(Literal::Integer(18)),
                ],
            )
            .unwrap();
        b.filter(cond).unwrap();
        let id = b.field(0).unwrap();
        b.project(vec![id], vec!["id".to_string()]).unwrap();
        let plan = b.build().unwrap();

        let optimized = Planner::new(&RuleId::standard())
            .optimize(plan, &rex)
            .unwrap();

        // Plan should be: Project -> Scan (with filter)
        match optimized {
            RelNode::Project { input, .. } => match *input {
                RelNode::Scan { filter, .. } => {
                    assert!(filter.is_some(), "Filter should be pushed to scan");
                }
                _ => panic!("Expected Scan after optimization"),
            },
            _ => panic!("Expected Project"),
        }
    }
}
