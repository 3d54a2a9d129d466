//! Standard operator table
//!
//! Built-in scalar and aggregate functions with their argument counts and
//! return-type rules. Lookups are case-insensitive.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::catalog::DataType;
use crate::planner::logical::types::{RelTypeRef, TypeFactory};
use crate::sql::error::{SqlError, SqlResult};

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl fmt::Display for AggFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggFunction::Count => "COUNT",
            AggFunction::Sum => "SUM",
            AggFunction::Avg => "AVG",
            AggFunction::Min => "MIN",
            AggFunction::Max => "MAX",
        };
        write!(f, "{}", s)
    }
}

/// Whether a function maps rows or groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    Aggregate(AggFunction),
}

/// How a function's return type is derived
#[derive(Debug, Clone, PartialEq)]
enum ReturnType {
    /// Always this type
    Fixed(DataType),
    /// Type of the first argument
    FirstArg,
    /// Least restrictive type of all arguments
    LeastRestrictive,
}

/// Function signature in the operator table
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub kind: FunctionKind,
    pub min_args: usize,
    pub max_args: Option<usize>,
    return_type: ReturnType,
}

impl FunctionSignature {
    fn scalar(name: &'static str, min_args: usize, max_args: Option<usize>, rt: ReturnType) -> Self {
        Self {
            name,
            kind: FunctionKind::Scalar,
            min_args,
            max_args,
            return_type: rt,
        }
    }

    fn aggregate(name: &'static str, func: AggFunction, min_args: usize, rt: ReturnType) -> Self {
        Self {
            name,
            kind: FunctionKind::Aggregate(func),
            min_args,
            max_args: Some(1),
            return_type: rt,
        }
    }

    /// Check an argument count
    pub fn check_arity(&self, found: usize) -> SqlResult<()> {
        let ok = found >= self.min_args && self.max_args.map_or(true, |max| found <= max);
        if ok {
            return Ok(());
        }
        let expected = match self.max_args {
            Some(max) if max == self.min_args => max.to_string(),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        };
        Err(SqlError::WrongArgumentCount {
            function: self.name.to_string(),
            expected,
            found,
        })
    }

    /// Infer the result type for the given argument types
    pub fn infer_return_type(
        &self,
        args: &[RelTypeRef],
        factory: &TypeFactory,
    ) -> SqlResult<RelTypeRef> {
        let any_nullable = args.iter().any(|a| a.is_nullable());

        let sql_type = match &self.return_type {
            ReturnType::Fixed(t) => t.clone(),
            ReturnType::FirstArg => args
                .first()
                .and_then(|a| a.sql_type().cloned())
                .unwrap_or(DataType::Double),
            ReturnType::LeastRestrictive => {
                let ty = factory.least_restrictive(args).ok_or_else(|| {
                    SqlError::InvalidOperation(format!(
                        "Arguments of {} have no common type",
                        self.name
                    ))
                })?;
                // COALESCE is only NULL when every argument is
                let all_nullable = args.iter().all(|a| a.is_nullable());
                let base = ty.sql_type().cloned().unwrap_or(DataType::Null);
                return Ok(factory.create_scalar(base, all_nullable));
            }
        };

        let nullable = match self.kind {
            FunctionKind::Aggregate(AggFunction::Count) => false,
            FunctionKind::Aggregate(_) => true,
            FunctionKind::Scalar => any_nullable || self.name == "NULLIF",
        };

        // SUM widens integers so it cannot overflow the argument type
        let sql_type = match self.kind {
            FunctionKind::Aggregate(AggFunction::Sum) if sql_type.is_integer() => DataType::BigInt,
            _ => sql_type,
        };

        Ok(factory.create_scalar(sql_type, nullable))
    }
}

/// Table of built-in functions
#[derive(Debug)]
pub struct OperatorTable {
    functions: HashMap<&'static str, FunctionSignature>,
}

impl OperatorTable {
    /// The shared standard table
    pub fn standard() -> &'static OperatorTable {
        static STANDARD: OnceLock<OperatorTable> = OnceLock::new();
        STANDARD.get_or_init(Self::build_standard)
    }

    fn build_standard() -> Self {
        use ReturnType::*;

        let signatures = vec![
            FunctionSignature::aggregate("COUNT", AggFunction::Count, 0, Fixed(DataType::BigInt)),
            FunctionSignature::aggregate("SUM", AggFunction::Sum, 1, FirstArg),
            FunctionSignature::aggregate("AVG", AggFunction::Avg, 1, Fixed(DataType::Double)),
            FunctionSignature::aggregate("MIN", AggFunction::Min, 1, FirstArg),
            FunctionSignature::aggregate("MAX", AggFunction::Max, 1, FirstArg),
            FunctionSignature::scalar("COALESCE", 1, None, LeastRestrictive),
            FunctionSignature::scalar("IFNULL", 2, Some(2), LeastRestrictive),
            FunctionSignature::scalar("NVL", 2, Some(2), LeastRestrictive),
            FunctionSignature::scalar("NULLIF", 2, Some(2), FirstArg),
            FunctionSignature::scalar("CONCAT", 1, None, Fixed(DataType::Text)),
            FunctionSignature::scalar("UPPER", 1, Some(1), Fixed(DataType::Text)),
            FunctionSignature::scalar("LOWER", 1, Some(1), Fixed(DataType::Text)),
            FunctionSignature::scalar("TRIM", 1, Some(1), Fixed(DataType::Text)),
            FunctionSignature::scalar("LTRIM", 1, Some(1), Fixed(DataType::Text)),
            FunctionSignature::scalar("RTRIM", 1, Some(1), Fixed(DataType::Text)),
            FunctionSignature::scalar("SUBSTRING", 2, Some(3), Fixed(DataType::Text)),
            FunctionSignature::scalar("SUBSTR", 2, Some(3), Fixed(DataType::Text)),
            FunctionSignature::scalar("LENGTH", 1, Some(1), Fixed(DataType::Int)),
            FunctionSignature::scalar("CHAR_LENGTH", 1, Some(1), Fixed(DataType::Int)),
            FunctionSignature::scalar("ABS", 1, Some(1), FirstArg),
            FunctionSignature::scalar("CEIL", 1, Some(1), FirstArg),
            FunctionSignature::scalar("FLOOR", 1, Some(1), FirstArg),
            FunctionSignature::scalar("ROUND", 1, Some(2), FirstArg),
            FunctionSignature::scalar("NOW", 0, Some(0), Fixed(DataType::Timestamp)),
            FunctionSignature::scalar("CURRENT_TIMESTAMP", 0, Some(0), Fixed(DataType::Timestamp)),
            FunctionSignature::scalar("CURRENT_DATE", 0, Some(0), Fixed(DataType::Date)),
        ];

        Self {
            functions: signatures.into_iter().map(|s| (s.name, s)).collect(),
        }
    }

    /// Look up a function by name
    pub fn lookup(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name.to_uppercase().as_str())
    }

    /// Names of all functions, sorted
    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = OperatorTable::standard();
        let count = table.lookup("count").unwrap();
        assert_eq!(count.kind, FunctionKind::Aggregate(AggFunction::Count));
        assert!(table.lookup("Upper").is_some());
        assert!(table.lookup("no_such_fn").is_none());
    }

    #[test]
    fn test_arity() {
        let table = OperatorTable::standard();
        assert!(table.lookup("SUM").unwrap().check_arity(1).is_ok());
        assert!(matches!(
            table.lookup("SUM").unwrap().check_arity(2),
            Err(SqlError::WrongArgumentCount { found: 2, .. })
        ));
        assert!(table.lookup("COALESCE").unwrap().check_arity(5).is_ok());
        assert!(table.lookup("COUNT").unwrap().check_arity(0).is_ok());
    }

    #[test]
    fn test_return_types() {
        let table = OperatorTable::standard();
        let factory = TypeFactory::new();
        let int = factory.create_sql_type(DataType::Int);
        let nullable_int = factory.create_scalar(DataType::Int, true);

        let count = table
            .lookup("COUNT")
            .unwrap()
            .infer_return_type(&[], &factory)
            .unwrap();
        assert_eq!(count.to_string(), "BIGINT NOT NULL");

        let sum = table
            .lookup("SUM")
            .unwrap()
            .infer_return_type(&[int.clone()], &factory)
            .unwrap();
        assert_eq!(sum.to_string(), "BIGINT");

        let upper = table
            .lookup("UPPER")
            .unwrap()
            .infer_return_type(&[factory.create_sql_type(DataType::Text)], &factory)
            .unwrap();
        assert!(!upper.is_nullable());

        let coalesce = table
            .lookup("COALESCE")
            .unwrap()
            .infer_return_type(&[nullable_int, int], &factory)
            .unwrap();
        assert_eq!(coalesce.to_string(), "INTEGER NOT NULL");
    }
}
