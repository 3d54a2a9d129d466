//! Type checking for validated queries
//!
//! The type checker verifies:
//! - WHERE, HAVING and join conditions are boolean
//! - Operands of comparisons, arithmetic and LIKE have usable types
//! - Non-aggregated columns of an aggregate query appear in GROUP BY
//! - UNION inputs line up field by field

use crate::catalog::DataType;
use crate::planner::logical::types::RelTypeRef;
use crate::sql::ast::*;
use crate::sql::error::{SqlError, SqlResult};

/// Type checker
pub struct TypeChecker;

impl TypeChecker {
    /// Check a resolved SELECT
    pub fn check_select(select: &ResolvedSelect) -> SqlResult<()> {
        if let Some(filter) = &select.filter {
            Self::check_is_boolean(filter)?;
        }

        if let Some(having) = &select.having {
            Self::check_is_boolean(having)?;
        }

        for from in &select.from {
            for join in &from.joins {
                if let Some(cond) = &join.condition {
                    Self::check_is_boolean(cond)?;
                }
            }
        }

        if select.is_aggregate() {
            Self::check_grouping(select)?;
        }

        Ok(())
    }

    /// Check that both sides of a UNION have compatible row types
    pub fn check_union(left: &RelTypeRef, right: &RelTypeRef) -> SqlResult<()> {
        if left.field_count() != right.field_count() {
            return Err(SqlError::InvalidOperation(format!(
                "UNION inputs have {} and {} columns",
                left.field_count(),
                right.field_count()
            )));
        }
        for (l, r) in left.fields().iter().zip(right.fields()) {
            let lt = l.data_type.sql_type().cloned().unwrap_or(DataType::Null);
            let rt = r.data_type.sql_type().cloned().unwrap_or(DataType::Null);
            if lt.least_restrictive(&rt).is_none() {
                return Err(SqlError::TypeMismatch {
                    expected: lt,
                    found: rt,
                });
            }
        }
        Ok(())
    }

    /// Check if expression evaluates to boolean
    pub fn check_is_boolean(expr: &ResolvedExpr) -> SqlResult<()> {
        if expr.data_type().is_boolean() {
            Ok(())
        } else {
            Err(SqlError::TypeMismatch {
                expected: DataType::Boolean,
                found: sql_type_of(expr),
            })
        }
    }

    /// Check that an expression is numeric
    pub fn check_numeric(expr: &ResolvedExpr) -> SqlResult<()> {
        if expr.data_type().is_numeric() {
            Ok(())
        } else {
            Err(SqlError::TypeMismatch {
                expected: DataType::Double,
                found: sql_type_of(expr),
            })
        }
    }

    /// Check that an expression is a string
    pub fn check_string(expr: &ResolvedExpr) -> SqlResult<()> {
        match sql_type_of(expr) {
            DataType::Null => Ok(()),
            t if t.is_string() => Ok(()),
            other => Err(SqlError::TypeMismatch {
                expected: DataType::Text,
                found: other,
            }),
        }
    }

    /// Check that two expressions can be compared
    pub fn check_comparable(left: &ResolvedExpr, right: &ResolvedExpr) -> SqlResult<()> {
        let lt = sql_type_of(left);
        let rt = sql_type_of(right);
        if types_compatible(&lt, &rt) {
            Ok(())
        } else {
            Err(SqlError::TypeMismatch {
                expected: lt,
                found: rt,
            })
        }
    }

    fn check_grouping(select: &ResolvedSelect) -> SqlResult<()> {
        for item in &select.columns {
            Self::check_grouped(&item.expr, &select.group_by)?;
        }
        if let Some(having) = &select.having {
            Self::check_grouped(having, &select.group_by)?;
        }
        for item in &select.order_by {
            Self::check_grouped(&item.expr, &select.group_by)?;
        }
        Ok(())
    }

    /// Every column outside an aggregate must be covered by a group expression
    fn check_grouped(expr: &ResolvedExpr, group_by: &[ResolvedExpr]) -> SqlResult<()> {
        if group_by.contains(expr) || expr.is_aggregate() {
            return Ok(());
        }
        if let ResolvedExpr::Column(col) = expr {
            return Err(SqlError::NotGrouped(format!("{}.{}", col.table, col.name)));
        }
        for child in expr.children() {
            Self::check_grouped(child, group_by)?;
        }
        Ok(())
    }
}

fn sql_type_of(expr: &ResolvedExpr) -> DataType {
    expr.data_type()
        .sql_type()
        .cloned()
        .unwrap_or(DataType::Null)
}

/// Check if types are compatible for comparison
pub fn types_compatible(a: &DataType, b: &DataType) -> bool {
    match (a, b) {
        // Same types are always compatible
        (a, b) if a == b => true,

        // Untyped NULL compares with anything
        (DataType::Null, _) | (_, DataType::Null) => true,

        // All numeric types are compatible with each other
        (a, b) if a.is_numeric() && b.is_numeric() => true,

        // All string types are compatible with each other
        (a, b) if a.is_string() && b.is_string() => true,

        // Dates and timestamps compare with each other and with string literals
        (a, b) if a.is_temporal() && (b.is_temporal() || b.is_string()) => true,
        (a, b) if a.is_string() && b.is_temporal() => true,

        _ => false,
    }
}
