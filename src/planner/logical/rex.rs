//! Row expressions
//!
//! `RexNode` is the expression language of the relational tree. Column
//! references are positional (`$0`, `$1`, ...) against the input row of the
//! node that owns the expression. Every node carries its type, which always
//! comes from the session's `TypeFactory`.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::catalog::DataType;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::types::{RelTypeRef, TypeFactory};
use crate::sql::ast::Literal;
use crate::sql::operators::AggFunction;

/// Operator of a call expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RexOp {
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Not,
    Negate,
    Like,
    IsNull,
    IsNotNull,
    /// `CASE WHEN c1 THEN r1 .. ELSE e END`; operands are c1, r1, .., e
    Case,
    Cast,
    Concat,
    /// Named scalar function
    Function(String),
}

impl RexOp {
    /// Check if the operator yields a boolean
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            RexOp::Equals
                | RexOp::NotEquals
                | RexOp::LessThan
                | RexOp::LessThanOrEqual
                | RexOp::GreaterThan
                | RexOp::GreaterThanOrEqual
                | RexOp::And
                | RexOp::Or
                | RexOp::Not
                | RexOp::Like
                | RexOp::IsNull
                | RexOp::IsNotNull
        )
    }

    fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            RexOp::Plus | RexOp::Minus | RexOp::Times | RexOp::Divide | RexOp::Mod
        )
    }
}

impl fmt::Display for RexOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RexOp::Plus => "+",
            RexOp::Minus | RexOp::Negate => "-",
            RexOp::Times => "*",
            RexOp::Divide => "/",
            RexOp::Mod => "MOD",
            RexOp::Equals => "=",
            RexOp::NotEquals => "<>",
            RexOp::LessThan => "<",
            RexOp::LessThanOrEqual => "<=",
            RexOp::GreaterThan => ">",
            RexOp::GreaterThanOrEqual => ">=",
            RexOp::And => "AND",
            RexOp::Or => "OR",
            RexOp::Not => "NOT",
            RexOp::Like => "LIKE",
            RexOp::IsNull => "IS NULL",
            RexOp::IsNotNull => "IS NOT NULL",
            RexOp::Case => "CASE",
            RexOp::Cast => "CAST",
            RexOp::Concat => "||",
            RexOp::Function(name) => return write!(f, "{}", name.to_uppercase()),
        };
        write!(f, "{}", s)
    }
}

/// Row expression
#[derive(Debug, Clone, PartialEq)]
pub enum RexNode {
    /// Reference to a field of the input row
    InputRef { index: usize, ty: RelTypeRef },
    /// Constant
    Literal { value: Literal, ty: RelTypeRef },
    /// Operator applied to operands
    Call {
        op: RexOp,
        operands: Vec<RexNode>,
        ty: RelTypeRef,
    },
}

impl RexNode {
    /// Type of this expression
    pub fn ty(&self) -> &RelTypeRef {
        match self {
            RexNode::InputRef { ty, .. } | RexNode::Literal { ty, .. } | RexNode::Call { ty, .. } => {
                ty
            }
        }
    }

    /// Field index if this is a plain input reference
    pub fn as_input_ref(&self) -> Option<usize> {
        match self {
            RexNode::InputRef { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// All input fields this expression reads
    pub fn input_refs(&self) -> BTreeSet<usize> {
        let mut refs = BTreeSet::new();
        self.collect_refs(&mut refs);
        refs
    }

    fn collect_refs(&self, refs: &mut BTreeSet<usize>) {
        match self {
            RexNode::InputRef { index, .. } => {
                refs.insert(*index);
            }
            RexNode::Literal { .. } => {}
            RexNode::Call { operands, .. } => {
                for op in operands {
                    op.collect_refs(refs);
                }
            }
        }
    }

    /// Copy with every input reference moved by `offset`
    pub fn shift(&self, offset: isize) -> RexNode {
        match self {
            RexNode::InputRef { index, ty } => RexNode::InputRef {
                index: index.saturating_add_signed(offset),
                ty: Arc::clone(ty),
            },
            RexNode::Literal { .. } => self.clone(),
            RexNode::Call { op, operands, ty } => RexNode::Call {
                op: op.clone(),
                operands: operands.iter().map(|o| o.shift(offset)).collect(),
                ty: Arc::clone(ty),
            },
        }
    }

    /// Replace each input reference `$i` with `exprs[i]`
    pub fn substitute(&self, exprs: &[RexNode]) -> PlannerResult<RexNode> {
        match self {
            RexNode::InputRef { index, .. } => exprs.get(*index).cloned().ok_or_else(|| {
                PlannerError::Internal(format!(
                    "input reference ${} out of range ({} fields)",
                    index,
                    exprs.len()
                ))
            }),
            RexNode::Literal { .. } => Ok(self.clone()),
            RexNode::Call { op, operands, ty } => Ok(RexNode::Call {
                op: op.clone(),
                operands: operands
                    .iter()
                    .map(|o| o.substitute(exprs))
                    .collect::<PlannerResult<Vec<_>>>()?,
                ty: Arc::clone(ty),
            }),
        }
    }
}

impl fmt::Display for RexNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RexNode::InputRef { index, .. } => write!(f, "${}", index),
            RexNode::Literal { value, .. } => write!(f, "{}", value),
            RexNode::Call {
                op: RexOp::Cast,
                operands,
                ty,
            } => {
                let arg = operands.first().map(|o| o.to_string()).unwrap_or_default();
                write!(f, "CAST({}):{}", arg, ty)
            }
            RexNode::Call { op, operands, .. } => {
                let args: Vec<_> = operands.iter().map(|o| o.to_string()).collect();
                write!(f, "{}({})", op, args.join(", "))
            }
        }
    }
}

/// Aggregate call inside an `Aggregate` node
///
/// Arguments are field indexes of the aggregate's input.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCall {
    pub func: AggFunction,
    pub distinct: bool,
    pub args: Vec<usize>,
    pub ty: RelTypeRef,
    pub name: String,
}

impl fmt::Display for AggregateCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<_> = self.args.iter().map(|a| format!("${}", a)).collect();
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        write!(f, "{}({}{})", self.func, distinct, args.join(", "))
    }
}

/// Sort key of a `Sort` node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCollation {
    pub field: usize,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl FieldCollation {
    /// Ascending, nulls last
    pub fn asc(field: usize) -> Self {
        Self {
            field,
            ascending: true,
            nulls_first: false,
        }
    }

    /// Direction as rendered by explain
    pub fn direction(&self) -> &'static str {
        match (self.ascending, self.nulls_first) {
            (true, false) => "ASC",
            (true, true) => "ASC-nulls-first",
            (false, true) => "DESC",
            (false, false) => "DESC-nulls-last",
        }
    }
}

/// Factory for row expressions
///
/// Types of derived expressions are inferred with the builder's type factory,
/// so expressions built here share interned types with the rest of the tree.
#[derive(Debug)]
pub struct RexBuilder {
    type_factory: Arc<TypeFactory>,
}

impl RexBuilder {
    /// Create a builder over a type factory
    pub fn new(type_factory: Arc<TypeFactory>) -> Self {
        Self { type_factory }
    }

    /// The factory expression types come from
    pub fn type_factory(&self) -> &Arc<TypeFactory> {
        &self.type_factory
    }

    /// Reference field `index` of `row_type`
    pub fn make_input_ref(&self, row_type: &RelTypeRef, index: usize) -> PlannerResult<RexNode> {
        let field = row_type.fields().get(index).ok_or_else(|| {
            PlannerError::InvalidPlan(format!(
                "field ${} out of range for {}",
                index, row_type
            ))
        })?;
        Ok(RexNode::InputRef {
            index,
            ty: Arc::clone(&field.data_type),
        })
    }

    /// Constant with its natural type
    pub fn make_literal(&self, value: Literal) -> RexNode {
        let ty = self.type_factory.create_sql_type(value.data_type());
        RexNode::Literal { value, ty }
    }

    /// Constant with an explicit type
    pub fn make_typed_literal(&self, value: Literal, ty: RelTypeRef) -> RexNode {
        RexNode::Literal { value, ty }
    }

    /// Boolean constant
    pub fn make_bool(&self, value: bool) -> RexNode {
        self.make_literal(Literal::Boolean(value))
    }

    /// Call with an explicit result type
    pub fn make_typed_call(&self, op: RexOp, operands: Vec<RexNode>, ty: RelTypeRef) -> RexNode {
        RexNode::Call { op, operands, ty }
    }

    /// Call whose result type is inferred from the operands
    pub fn make_call(&self, op: RexOp, operands: Vec<RexNode>) -> PlannerResult<RexNode> {
        let ty = self.infer_type(&op, &operands)?;
        Ok(RexNode::Call { op, operands, ty })
    }

    /// CAST to `ty`; a no-op when the operand already has that type
    pub fn make_cast(&self, expr: RexNode, ty: RelTypeRef) -> RexNode {
        if expr.ty() == &ty {
            return expr;
        }
        RexNode::Call {
            op: RexOp::Cast,
            operands: vec![expr],
            ty,
        }
    }

    /// Conjunction; empty input yields TRUE and one operand is returned as is
    pub fn and(&self, mut operands: Vec<RexNode>) -> PlannerResult<RexNode> {
        match operands.len() {
            0 => Ok(self.make_bool(true)),
            1 => Ok(operands.remove(0)),
            _ => self.make_call(RexOp::And, operands),
        }
    }

    /// Disjunction; empty input yields FALSE
    pub fn or(&self, mut operands: Vec<RexNode>) -> PlannerResult<RexNode> {
        match operands.len() {
            0 => Ok(self.make_bool(false)),
            1 => Ok(operands.remove(0)),
            _ => self.make_call(RexOp::Or, operands),
        }
    }

    /// Negation
    pub fn not(&self, operand: RexNode) -> PlannerResult<RexNode> {
        self.make_call(RexOp::Not, vec![operand])
    }

    fn infer_type(&self, op: &RexOp, operands: &[RexNode]) -> PlannerResult<RelTypeRef> {
        let factory = &self.type_factory;
        let any_nullable = operands.iter().any(|o| o.ty().is_nullable());

        match op {
            RexOp::IsNull | RexOp::IsNotNull => Ok(factory.create_sql_type(DataType::Boolean)),
            op if op.is_predicate() => Ok(factory.create_scalar(DataType::Boolean, any_nullable)),
            op if op.is_arithmetic() => {
                let types: Vec<_> = operands.iter().map(|o| Arc::clone(o.ty())).collect();
                factory.least_restrictive(&types).ok_or_else(|| {
                    PlannerError::InvalidPlan(format!("no common type for {} operands", op))
                })
            }
            RexOp::Negate => operands
                .first()
                .map(|o| Arc::clone(o.ty()))
                .ok_or_else(|| PlannerError::InvalidPlan("negate needs an operand".to_string())),
            RexOp::Concat => Ok(factory.create_scalar(DataType::Text, any_nullable)),
            RexOp::Case => {
                // Results sit at odd positions plus the trailing ELSE
                let mut results: Vec<RelTypeRef> = operands
                    .iter()
                    .skip(1)
                    .step_by(2)
                    .map(|o| Arc::clone(o.ty()))
                    .collect();
                if let Some(last) = operands.last() {
                    if operands.len() % 2 == 1 {
                        results.push(Arc::clone(last.ty()));
                    }
                }
                let ty = factory.least_restrictive(&results).ok_or_else(|| {
                    PlannerError::InvalidPlan("CASE branches have no common type".to_string())
                })?;
                let has_else = operands.len() % 2 == 1;
                Ok(factory.create_type_with_nullability(&ty, ty.is_nullable() || !has_else))
            }
            RexOp::Cast | RexOp::Function(_) => Err(PlannerError::InvalidPlan(format!(
                "result type of {} cannot be inferred",
                op
            ))),
            _ => Err(PlannerError::Internal(format!("unhandled operator {}", op))),
        }
    }
}
