//! Convertlet table
//!
//! Maps SQL operators that have no direct row-expression counterpart to a
//! rewrite in terms of core operators. `x BETWEEN a AND b` becomes
//! `AND(>=(x, a), <=(x, b))`, `IFNULL(a, b)` becomes a CASE, and so on.
//! Operators without an entry are kept as named function calls.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{RelTypeRef, RexBuilder, RexNode, RexOp};
use crate::sql::Literal;

/// Rewrite of one operator call; receives converted operands and the
/// validated result type
pub type Convertlet = fn(&RexBuilder, Vec<RexNode>, &RelTypeRef) -> PlannerResult<RexNode>;

/// Operator name to rewrite
pub struct ConvertletTable {
    convertlets: HashMap<&'static str, Convertlet>,
}

impl fmt::Debug for ConvertletTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("ConvertletTable")
            .field("convertlets", &names)
            .finish()
    }
}

impl ConvertletTable {
    /// The shared standard table
    pub fn standard() -> &'static ConvertletTable {
        static STANDARD: OnceLock<ConvertletTable> = OnceLock::new();
        STANDARD.get_or_init(Self::build_standard)
    }

    fn build_standard() -> Self {
        let entries: [(&'static str, Convertlet); 9] = [
            ("BETWEEN", convert_between),
            ("NOT BETWEEN", convert_not_between),
            ("IN", convert_in),
            ("NOT IN", convert_not_in),
            ("NOT LIKE", convert_not_like),
            ("COALESCE", convert_coalesce),
            ("IFNULL", convert_coalesce),
            ("NVL", convert_coalesce),
            ("NULLIF", convert_nullif),
        ];
        Self {
            convertlets: entries.into_iter().collect(),
        }
    }

    /// Look up the rewrite for an operator
    pub fn get(&self, name: &str) -> Option<Convertlet> {
        self.convertlets.get(name.to_uppercase().as_str()).copied()
    }

    /// Names of all operators with a rewrite
    pub fn names(&self) -> Vec<&'static str> {
        self.convertlets.keys().copied().collect()
    }

    /// Convert a call to `name`, falling back to a named function call
    pub fn convert_call(
        &self,
        name: &str,
        rex: &RexBuilder,
        operands: Vec<RexNode>,
        ty: &RelTypeRef,
    ) -> PlannerResult<RexNode> {
        match self.get(name) {
            Some(convertlet) => convertlet(rex, operands, ty),
            None => Ok(rex.make_typed_call(
                RexOp::Function(name.to_string()),
                operands,
                ty.clone(),
            )),
        }
    }
}

fn arity(name: &str, operands: &[RexNode], expected: usize) -> PlannerResult<()> {
    if operands.len() != expected {
        return Err(PlannerError::InvalidPlan(format!(
            "{} expects {} operands, got {}",
            name,
            expected,
            operands.len()
        )));
    }
    Ok(())
}

fn convert_between(
    rex: &RexBuilder,
    operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    arity("BETWEEN", &operands, 3)?;
    let [value, low, high]: [RexNode; 3] = operands
        .try_into()
        .map_err(|_| PlannerError::Internal("BETWEEN operands".to_string()))?;
    let ge = rex.make_call(RexOp::GreaterThanOrEqual, vec![value.clone(), low])?;
    let le = rex.make_call(RexOp::LessThanOrEqual, vec![value, high])?;
    Ok(rex.make_typed_call(RexOp::And, vec![ge, le], ty.clone()))
}

fn convert_not_between(
    rex: &RexBuilder,
    operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    arity("NOT BETWEEN", &operands, 3)?;
    let [value, low, high]: [RexNode; 3] = operands
        .try_into()
        .map_err(|_| PlannerError::Internal("NOT BETWEEN operands".to_string()))?;
    let lt = rex.make_call(RexOp::LessThan, vec![value.clone(), low])?;
    let gt = rex.make_call(RexOp::GreaterThan, vec![value, high])?;
    Ok(rex.make_typed_call(RexOp::Or, vec![lt, gt], ty.clone()))
}

/// `x IN (a, b)` as `OR(=(x, a), =(x, b))`; first operand is `x`
fn convert_in(rex: &RexBuilder, operands: Vec<RexNode>, ty: &RelTypeRef) -> PlannerResult<RexNode> {
    let (value, list) = operands
        .split_first()
        .ok_or_else(|| PlannerError::InvalidPlan("IN needs a value".to_string()))?;
    let mut disjuncts = Vec::with_capacity(list.len());
    for item in list {
        disjuncts.push(rex.make_call(RexOp::Equals, vec![value.clone(), item.clone()])?);
    }
    if disjuncts.len() == 1 {
        return Ok(disjuncts.remove(0));
    }
    Ok(rex.make_typed_call(RexOp::Or, disjuncts, ty.clone()))
}

fn convert_not_in(
    rex: &RexBuilder,
    operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    let positive = convert_in(rex, operands, ty)?;
    Ok(rex.make_typed_call(RexOp::Not, vec![positive], ty.clone()))
}

fn convert_not_like(
    rex: &RexBuilder,
    operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    arity("NOT LIKE", &operands, 2)?;
    let like = rex.make_typed_call(RexOp::Like, operands, ty.clone());
    Ok(rex.make_typed_call(RexOp::Not, vec![like], ty.clone()))
}

/// `COALESCE(a, b, c)` as `CASE(IS NOT NULL(a), a, IS NOT NULL(b), b, c)`
fn convert_coalesce(
    rex: &RexBuilder,
    mut operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    let last = operands
        .pop()
        .ok_or_else(|| PlannerError::InvalidPlan("COALESCE needs an operand".to_string()))?;
    if operands.is_empty() {
        return Ok(rex.make_cast(last, ty.clone()));
    }
    let mut case_operands = Vec::with_capacity(operands.len() * 2 + 1);
    for operand in operands {
        case_operands.push(rex.make_call(RexOp::IsNotNull, vec![operand.clone()])?);
        case_operands.push(operand);
    }
    case_operands.push(last);
    Ok(rex.make_typed_call(RexOp::Case, case_operands, ty.clone()))
}

/// `NULLIF(a, b)` as `CASE(=(a, b), NULL, a)`
fn convert_nullif(
    rex: &RexBuilder,
    operands: Vec<RexNode>,
    ty: &RelTypeRef,
) -> PlannerResult<RexNode> {
    arity("NULLIF", &operands, 2)?;
    let [a, b]: [RexNode; 2] = operands
        .try_into()
        .map_err(|_| PlannerError::Internal("NULLIF operands".to_string()))?;
    let eq = rex.make_call(RexOp::Equals, vec![a.clone(), b])?;
    let null = rex.make_typed_literal(Literal::Null, ty.clone());
    Ok(rex.make_typed_call(RexOp::Case, vec![eq, null, a], ty.clone()))
}
