//! Relational algebra builder
//!
//! `AlgebraBuilder` is the session-wide entry point: it owns the type
//! factory and expression factory every other component shares. Trees are
//! assembled with the stack-based `RelBuilder` it hands out.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::SessionConfig;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::rex::{AggregateCall, FieldCollation, RexBuilder, RexNode};
use crate::planner::logical::types::{RelTypeRef, TypeFactory};
use crate::planner::logical::RelNode;
use crate::sql::ast::Literal;
use crate::sql::JoinType;

/// Make names unique by appending a counter to repeats
///
/// Comparison ignores ASCII case, so `ID` after `id` becomes `ID0`.
pub fn uniquify_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 0;
            while !seen.insert(candidate.to_ascii_lowercase()) {
                candidate = format!("{}{}", name, suffix);
                suffix += 1;
            }
            candidate
        })
        .collect()
}

/// Session-wide relational algebra builder
#[derive(Debug)]
pub struct AlgebraBuilder {
    config: Arc<SessionConfig>,
    type_factory: Arc<TypeFactory>,
    rex_builder: Arc<RexBuilder>,
}

impl AlgebraBuilder {
    /// Create a builder with a fresh type factory
    pub fn new(config: Arc<SessionConfig>) -> Self {
        let type_factory = Arc::new(TypeFactory::new());
        let rex_builder = Arc::new(RexBuilder::new(Arc::clone(&type_factory)));
        Self {
            config,
            type_factory,
            rex_builder,
        }
    }

    /// Session configuration
    pub fn config(&self) -> &Arc<SessionConfig> {
        &self.config
    }

    /// Type factory shared by the whole session
    pub fn type_factory(&self) -> &Arc<TypeFactory> {
        &self.type_factory
    }

    /// Expression factory shared by the whole session
    pub fn rex_builder(&self) -> &Arc<RexBuilder> {
        &self.rex_builder
    }

    /// Start building a tree
    pub fn rel_builder(&self) -> RelBuilder<'_> {
        RelBuilder::new(&self.rex_builder)
    }
}

/// Stack-based tree builder
///
/// Leaf operations push a node; other operations pop their inputs and push
/// the result. `build` pops the finished tree.
pub struct RelBuilder<'a> {
    rex: &'a RexBuilder,
    stack: Vec<RelNode>,
}

impl<'a> RelBuilder<'a> {
    /// Create an empty builder
    pub fn new(rex: &'a RexBuilder) -> Self {
        Self {
            rex,
            stack: Vec::new(),
        }
    }

    /// Expression factory
    pub fn rex(&self) -> &'a RexBuilder {
        self.rex
    }

    /// Push an existing node
    pub fn push(&mut self, node: RelNode) -> &mut Self {
        self.stack.push(node);
        self
    }

    /// Push a scan of a named relation
    pub fn scan(&mut self, table: Vec<String>, row_type: RelTypeRef) -> &mut Self {
        self.push(RelNode::Scan {
            table,
            row_type,
            filter: None,
        })
    }

    /// Push a single row with no fields
    pub fn values_single_row(&mut self) -> &mut Self {
        let row_type = self.rex.type_factory().create_struct_type(vec![]);
        self.push(RelNode::Values {
            tuples: vec![vec![]],
            row_type,
        })
    }

    /// Number of nodes on the stack
    pub fn size(&self) -> usize {
        self.stack.len()
    }

    /// Top of the stack
    pub fn peek(&self) -> PlannerResult<&RelNode> {
        self.stack
            .last()
            .ok_or_else(|| PlannerError::InvalidPlan("builder stack is empty".to_string()))
    }

    fn pop(&mut self) -> PlannerResult<RelNode> {
        self.stack
            .pop()
            .ok_or_else(|| PlannerError::InvalidPlan("builder stack is empty".to_string()))
    }

    /// Reference to field `index` of the top node
    pub fn field(&self, index: usize) -> PlannerResult<RexNode> {
        let row_type = self.peek()?.row_type();
        self.rex.make_input_ref(&row_type, index)
    }

    /// References to every field of the top node
    pub fn fields(&self) -> PlannerResult<Vec<RexNode>> {
        let row_type = self.peek()?.row_type();
        (0..row_type.field_count())
            .map(|i| self.rex.make_input_ref(&row_type, i))
            .collect()
    }

    /// Filter the top node; a literal TRUE condition is dropped
    pub fn filter(&mut self, condition: RexNode) -> PlannerResult<&mut Self> {
        if matches!(
            condition,
            RexNode::Literal {
                value: Literal::Boolean(true),
                ..
            }
        ) {
            return Ok(self);
        }
        if !condition.ty().is_boolean() {
            return Err(PlannerError::InvalidPlan(format!(
                "filter condition {} has type {}",
                condition,
                condition.ty()
            )));
        }
        let input = self.pop()?;
        Ok(self.push(RelNode::Filter {
            input: Box::new(input),
            condition,
        }))
    }

    /// Project the top node; an identity projection is dropped
    pub fn project(&mut self, exprs: Vec<RexNode>, names: Vec<String>) -> PlannerResult<&mut Self> {
        if exprs.len() != names.len() {
            return Err(PlannerError::InvalidPlan(format!(
                "{} expressions but {} names",
                exprs.len(),
                names.len()
            )));
        }
        let input_type = self.peek()?.row_type();

        let identity = exprs.len() == input_type.field_count()
            && exprs.iter().enumerate().all(|(i, e)| e.as_input_ref() == Some(i))
            && names
                .iter()
                .zip(input_type.field_names())
                .all(|(a, b)| a == b);
        if identity {
            return Ok(self);
        }

        let fields = names
            .into_iter()
            .zip(exprs.iter())
            .map(|(name, e)| (name, Arc::clone(e.ty())))
            .collect();
        let row_type = self.rex.type_factory().create_struct_type(fields);

        let input = self.pop()?;
        Ok(self.push(RelNode::Project {
            input: Box::new(input),
            exprs,
            row_type,
        }))
    }

    /// Join the two top nodes (left pushed first)
    pub fn join(
        &mut self,
        join_type: JoinType,
        condition: Option<RexNode>,
    ) -> PlannerResult<&mut Self> {
        if let Some(cond) = &condition {
            if !cond.ty().is_boolean() {
                return Err(PlannerError::InvalidPlan(format!(
                    "join condition {} is not boolean",
                    cond
                )));
            }
        }
        let right = self.pop()?;
        let left = self.pop()?;
        let row_type = self.join_row_type(&left.row_type(), &right.row_type(), join_type);

        Ok(self.push(RelNode::Join {
            left: Box::new(left),
            right: Box::new(right),
            join_type,
            condition,
            row_type,
        }))
    }

    fn join_row_type(&self, left: &RelTypeRef, right: &RelTypeRef, join_type: JoinType) -> RelTypeRef {
        let factory = self.rex.type_factory();
        let left_nullable = matches!(join_type, JoinType::Right | JoinType::Full);
        let right_nullable = matches!(join_type, JoinType::Left | JoinType::Full);

        let mut names = Vec::new();
        let mut types = Vec::new();
        for (side, nullable) in [(left, left_nullable), (right, right_nullable)] {
            for field in side.fields() {
                names.push(field.name.clone());
                types.push(if nullable {
                    factory.create_type_with_nullability(&field.data_type, true)
                } else {
                    Arc::clone(&field.data_type)
                });
            }
        }

        factory.create_struct_type(uniquify_names(names).into_iter().zip(types).collect())
    }

    /// Aggregate the top node
    pub fn aggregate(
        &mut self,
        group_set: Vec<usize>,
        aggregates: Vec<AggregateCall>,
    ) -> PlannerResult<&mut Self> {
        let input_type = self.peek()?.row_type();
        let mut names = Vec::new();
        let mut types = Vec::new();
        for &g in &group_set {
            let field = input_type.fields().get(g).ok_or_else(|| {
                PlannerError::InvalidPlan(format!("group key ${} out of range", g))
            })?;
            names.push(field.name.clone());
            types.push(Arc::clone(&field.data_type));
        }
        for agg in &aggregates {
            if let Some(bad) = agg.args.iter().find(|a| **a >= input_type.field_count()) {
                return Err(PlannerError::InvalidPlan(format!(
                    "aggregate argument ${} out of range",
                    bad
                )));
            }
            names.push(agg.name.clone());
            types.push(Arc::clone(&agg.ty));
        }

        let row_type = self
            .rex
            .type_factory()
            .create_struct_type(uniquify_names(names).into_iter().zip(types).collect());

        let input = self.pop()?;
        Ok(self.push(RelNode::Aggregate {
            input: Box::new(input),
            group_set,
            aggregates,
            row_type,
        }))
    }

    /// Sort the top node; an empty collation is dropped
    pub fn sort(&mut self, collation: Vec<FieldCollation>) -> PlannerResult<&mut Self> {
        if collation.is_empty() {
            return Ok(self);
        }
        let width = self.peek()?.row_type().field_count();
        if let Some(bad) = collation.iter().find(|c| c.field >= width) {
            return Err(PlannerError::InvalidPlan(format!(
                "sort key ${} out of range",
                bad.field
            )));
        }
        let input = self.pop()?;
        Ok(self.push(RelNode::Sort {
            input: Box::new(input),
            collation,
        }))
    }

    /// Skip `offset` rows and return at most `fetch`
    pub fn limit(&mut self, offset: Option<u64>, fetch: Option<u64>) -> PlannerResult<&mut Self> {
        if offset.is_none() && fetch.is_none() {
            return Ok(self);
        }
        let input = self.pop()?;
        Ok(self.push(RelNode::Limit {
            input: Box::new(input),
            fetch,
            offset,
        }))
    }

    /// Remove duplicates from the top node
    pub fn distinct(&mut self) -> PlannerResult<&mut Self> {
        let input = self.pop()?;
        Ok(self.push(RelNode::Distinct {
            input: Box::new(input),
        }))
    }

    /// Union the `n` top nodes, in push order
    pub fn union(&mut self, all: bool, n: usize) -> PlannerResult<&mut Self> {
        if n < 2 || n > self.stack.len() {
            return Err(PlannerError::InvalidPlan(format!(
                "union of {} inputs with {} on the stack",
                n,
                self.stack.len()
            )));
        }
        let inputs = self.stack.split_off(self.stack.len() - n);
        let types: Vec<_> = inputs.iter().map(RelNode::row_type).collect();
        let row_type = self
            .rex
            .type_factory()
            .least_restrictive(&types)
            .ok_or_else(|| {
                PlannerError::InvalidPlan("union inputs have incompatible row types".to_string())
            })?;

        Ok(self.push(RelNode::Union {
            inputs,
            all,
            row_type,
        }))
    }

    /// Pop the finished tree
    pub fn build(&mut self) -> PlannerResult<RelNode> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::planner::logical::rex::RexOp;
    use crate::sql::operators::AggFunction;

    fn orders_type(factory: &TypeFactory) -> RelTypeRef {
        factory.create_struct_type(vec![
            ("id".to_string(), factory.create_sql_type(DataType::Int)),
            ("total".to_string(), factory.create_scalar(DataType::Double, true)),
        ])
    }

    fn table(name: &str) -> Vec<String> {
        vec!["hive".to_string(), "default".to_string(), name.to_string()]
    }

    #[test]
    fn test_build_filter_project() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let row = orders_type(algebra.type_factory());
        let mut b = algebra.rel_builder();

        b.scan(table("orders"), row);
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
        let plan = b.build().unwrap();

        match &plan {
            RelNode::Project { input, row_type, .. } => {
                assert_eq!(row_type.field_names(), vec!["id"]);
                assert!(matches!(**input, RelNode::Filter { .. }));
            }
            _ => panic!("Expected Project"),
        }
        assert_eq!(b.size(), 0);
    }

    #[test]
    fn test_identity_project_and_true_filter_are_dropped() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let row = orders_type(algebra.type_factory());
        let mut b = algebra.rel_builder();

        b.scan(table("orders"), row);
        let fields = b.fields().unwrap();
        b.project(fields, vec!["id".to_string(), "total".to_string()])
            .unwrap();
        let t = b.rex().make_bool(true);
        b.filter(t).unwrap();
        assert!(matches!(b.build().unwrap(), RelNode::Scan { .. }));
    }

    #[test]
    fn test_left_join_makes_right_nullable() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let row = orders_type(algebra.type_factory());
        let mut b = algebra.rel_builder();

        b.scan(table("a"), Arc::clone(&row));
        b.scan(table("b"), row);
        b.join(JoinType::Left, None).unwrap();
        let join_type = b.peek().unwrap().row_type();

        assert_eq!(join_type.field_names(), vec!["id", "total", "id0", "total0"]);
        assert!(!join_type.fields()[0].data_type.is_nullable());
        assert!(join_type.fields()[2].data_type.is_nullable());
    }

    #[test]
    fn test_aggregate_row_type() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let factory = Arc::clone(algebra.type_factory());
        let mut b = algebra.rel_builder();

        b.scan(table("orders"), orders_type(&factory));
        b.aggregate(
            vec![0],
            vec![AggregateCall {
                func: AggFunction::Count,
                distinct: false,
                args: vec![],
                ty: factory.create_sql_type(DataType::BigInt),
                name: "cnt".to_string(),
            }],
        )
        .unwrap();
        let plan = b.build().unwrap();
        assert_eq!(plan.row_type().field_names(), vec!["id", "cnt"]);
        assert!(b.aggregate(vec![], vec![]).is_err());
    }

    #[test]
    fn test_union_requires_compatible_inputs() {
        let algebra = AlgebraBuilder::new(Arc::new(SessionConfig::default()));
        let factory = Arc::clone(algebra.type_factory());
        let mut b = algebra.rel_builder();

        b.scan(table("a"), orders_type(&factory));
        b.scan(table("b"), orders_type(&factory));
        b.union(true, 2).unwrap();
        assert!(matches!(b.peek().unwrap(), RelNode::Union { all: true, .. }));

        let text = factory.create_struct_type(vec![(
            "name".to_string(),
            factory.create_sql_type(DataType::Text),
        )]);
        b.scan(table("c"), text);
        assert!(b.union(false, 2).is_err());
    }

    #[test]
    fn test_uniquify_names() {
        let names = vec!["id", "ID", "id0", "x"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(uniquify_names(names), vec!["id", "ID0", "id00", "x"]);
    }
}
