//! Internal AST types
//!
//! These types represent parsed queries in a form that's easier to work
//! with than the sqlparser AST, and the validated form the converter reads.

use std::fmt;

use crate::catalog::{DataType, ResolvedTable};
use crate::planner::logical::types::RelTypeRef;
use crate::sql::operators::FunctionKind;

/// Literal value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
}

impl Literal {
    /// SQL type a literal of this kind has
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Null => DataType::Null,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::Integer(n) if i32::try_from(*n).is_ok() => DataType::Int,
            Literal::Integer(_) => DataType::BigInt,
            Literal::Float(_) => DataType::Double,
            Literal::String(_) => DataType::Text,
            Literal::Blob(_) => DataType::Blob,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Integer(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Blob(bytes) => {
                write!(f, "X'")?;
                for b in bytes {
                    write!(f, "{:02X}", b)?;
                }
                write!(f, "'")
            }
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    // Logical
    And,
    Or,
    // String
    Like,
    NotLike,
    Concat,
}

impl BinaryOp {
    /// Check if this is an arithmetic operator
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    /// Check if this is a comparison operator
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
        )
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Expression (before resolution)
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference (optionally qualified with table name)
    Column { table: Option<String>, name: String },
    /// Literal value
    Literal(Literal),
    /// Binary operation
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Unary operation
    UnaryOp { op: UnaryOp, expr: Box<Expr> },
    /// Function call
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },
    /// IN (list)
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// BETWEEN low AND high
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    /// CAST(expr AS type)
    Cast { expr: Box<Expr>, data_type: DataType },
    /// CASE [operand] WHEN .. THEN .. [ELSE ..] END
    Case {
        operand: Option<Box<Expr>>,
        conditions: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    /// Wildcard argument (COUNT(*))
    Wildcard,
}

/// SELECT item (column in SELECT list)
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Expression with optional alias
    Expr { expr: Expr, alias: Option<String> },
    /// Wildcard (*)
    Wildcard,
    /// Qualified wildcard (table.*)
    QualifiedWildcard(String),
}

/// Table reference in FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum TableRef {
    /// Table or view, possibly qualified with database and root
    Named {
        name: Vec<String>,
        alias: Option<String>,
    },
    /// Derived table
    Subquery {
        query: Box<Query>,
        alias: Option<String>,
    },
}

/// JOIN type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
            JoinType::Cross => "cross",
        };
        write!(f, "{}", s)
    }
}

/// JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub table: TableRef,
    pub join_type: JoinType,
    pub condition: Option<Expr>,
}

/// One comma-separated entry of the FROM clause with its joins
#[derive(Debug, Clone, PartialEq)]
pub struct FromItem {
    pub table: TableRef,
    pub joins: Vec<Join>,
}

/// ORDER BY item
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls_first: Option<bool>,
}

/// SELECT statement
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub distinct: bool,
    pub columns: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    pub filter: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Single SELECT
    Select(Box<SelectStatement>),
    /// UNION [ALL] of two queries
    Union {
        left: Box<Query>,
        right: Box<Query>,
        all: bool,
    },
}

// ============ Resolved types (after validation) ============

/// Resolved column reference with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedColumn {
    /// Alias of the FROM source the column belongs to
    pub table: String,
    /// Column name as declared by the source
    pub name: String,
    /// Offset in the row produced by the FROM clause
    pub index: usize,
    /// Type after outer-join nullability adjustment
    pub data_type: RelTypeRef,
}

/// Resolved expression with type information
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedExpr {
    /// Resolved column reference
    Column(ResolvedColumn),
    /// Literal value
    Literal {
        value: Literal,
        data_type: RelTypeRef,
    },
    /// Binary operation with result type
    BinaryOp {
        left: Box<ResolvedExpr>,
        op: BinaryOp,
        right: Box<ResolvedExpr>,
        result_type: RelTypeRef,
    },
    /// Unary operation with result type
    UnaryOp {
        op: UnaryOp,
        expr: Box<ResolvedExpr>,
        result_type: RelTypeRef,
    },
    /// Function call with result type
    Function {
        name: String,
        kind: FunctionKind,
        args: Vec<ResolvedExpr>,
        distinct: bool,
        result_type: RelTypeRef,
    },
    /// IS NULL / IS NOT NULL
    IsNull {
        expr: Box<ResolvedExpr>,
        negated: bool,
        result_type: RelTypeRef,
    },
    /// IN (list)
    InList {
        expr: Box<ResolvedExpr>,
        list: Vec<ResolvedExpr>,
        negated: bool,
        result_type: RelTypeRef,
    },
    /// BETWEEN
    Between {
        expr: Box<ResolvedExpr>,
        low: Box<ResolvedExpr>,
        high: Box<ResolvedExpr>,
        negated: bool,
        result_type: RelTypeRef,
    },
    /// CAST
    Cast {
        expr: Box<ResolvedExpr>,
        result_type: RelTypeRef,
    },
    /// CASE
    Case {
        operand: Option<Box<ResolvedExpr>>,
        conditions: Vec<(ResolvedExpr, ResolvedExpr)>,
        else_result: Option<Box<ResolvedExpr>>,
        result_type: RelTypeRef,
    },
}

impl ResolvedExpr {
    /// Get the type of this expression
    pub fn data_type(&self) -> &RelTypeRef {
        match self {
            ResolvedExpr::Column(col) => &col.data_type,
            ResolvedExpr::Literal { data_type, .. } => data_type,
            ResolvedExpr::BinaryOp { result_type, .. }
            | ResolvedExpr::UnaryOp { result_type, .. }
            | ResolvedExpr::Function { result_type, .. }
            | ResolvedExpr::IsNull { result_type, .. }
            | ResolvedExpr::InList { result_type, .. }
            | ResolvedExpr::Between { result_type, .. }
            | ResolvedExpr::Cast { result_type, .. }
            | ResolvedExpr::Case { result_type, .. } => result_type,
        }
    }

    /// Check if this expression is nullable
    pub fn is_nullable(&self) -> bool {
        self.data_type().is_nullable()
    }

    /// Check if this is an aggregate function call
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            ResolvedExpr::Function {
                kind: FunctionKind::Aggregate(_),
                ..
            }
        )
    }

    /// Check if this expression contains an aggregate function anywhere
    pub fn contains_aggregate(&self) -> bool {
        self.is_aggregate() || self.children().into_iter().any(|c| c.contains_aggregate())
    }

    /// Direct subexpressions
    pub fn children(&self) -> Vec<&ResolvedExpr> {
        match self {
            ResolvedExpr::Column(_) | ResolvedExpr::Literal { .. } => vec![],
            ResolvedExpr::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ResolvedExpr::UnaryOp { expr, .. }
            | ResolvedExpr::IsNull { expr, .. }
            | ResolvedExpr::Cast { expr, .. } => vec![expr.as_ref()],
            ResolvedExpr::Function { args, .. } => args.iter().collect(),
            ResolvedExpr::InList { expr, list, .. } => {
                let mut out: Vec<&ResolvedExpr> = vec![expr.as_ref()];
                out.extend(list.iter());
                out
            }
            ResolvedExpr::Between {
                expr, low, high, ..
            } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
            ResolvedExpr::Case {
                operand,
                conditions,
                else_result,
                ..
            } => {
                let mut out = Vec::new();
                if let Some(op) = operand {
                    out.push(op.as_ref());
                }
                for (when, then) in conditions {
                    out.push(when);
                    out.push(then);
                }
                if let Some(e) = else_result {
                    out.push(e.as_ref());
                }
                out
            }
        }
    }
}

impl fmt::Display for ResolvedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedExpr::Column(col) => write!(f, "{}.{}", col.table, col.name),
            ResolvedExpr::Literal { value, .. } => write!(f, "{}", value),
            ResolvedExpr::BinaryOp {
                left, op, right, ..
            } => write!(f, "{} {:?} {}", left, op, right),
            ResolvedExpr::UnaryOp { op, expr, .. } => write!(f, "{:?} {}", op, expr),
            ResolvedExpr::Function { name, args, .. } => {
                let args: Vec<_> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", name, args.join(", "))
            }
            ResolvedExpr::IsNull { expr, negated, .. } => {
                if *negated {
                    write!(f, "{} IS NOT NULL", expr)
                } else {
                    write!(f, "{} IS NULL", expr)
                }
            }
            ResolvedExpr::InList { expr, .. } => write!(f, "{} IN (..)", expr),
            ResolvedExpr::Between { expr, .. } => write!(f, "{} BETWEEN ..", expr),
            ResolvedExpr::Cast { expr, result_type } => {
                write!(f, "CAST({} AS {})", expr, result_type)
            }
            ResolvedExpr::Case { .. } => write!(f, "CASE .. END"),
        }
    }
}

/// Resolved SELECT item, wildcards already expanded
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelectItem {
    pub expr: ResolvedExpr,
    /// Unique output field name
    pub name: String,
}

/// What a FROM source reads
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// Catalog table or view
    Table(ResolvedTable),
    /// Derived table
    Subquery(Box<ValidatedQuery>),
}

/// Resolved FROM source
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub alias: String,
    pub kind: SourceKind,
    /// Row type the source itself produces
    pub row_type: RelTypeRef,
}

/// Resolved JOIN clause
///
/// Column indexes in `condition` are relative to the enclosing `ResolvedFrom`.
#[derive(Debug, Clone)]
pub struct ResolvedJoin {
    pub source: ResolvedSource,
    pub join_type: JoinType,
    pub condition: Option<ResolvedExpr>,
}

/// Resolved FROM entry
#[derive(Debug, Clone)]
pub struct ResolvedFrom {
    pub source: ResolvedSource,
    pub joins: Vec<ResolvedJoin>,
}

/// Resolved ORDER BY item
#[derive(Debug, Clone)]
pub struct ResolvedOrderByItem {
    pub expr: ResolvedExpr,
    pub ascending: bool,
    pub nulls_first: bool,
    /// Select-list position the expression refers to, when it does
    pub select_index: Option<usize>,
}

/// Resolved SELECT statement
#[derive(Debug, Clone)]
pub struct ResolvedSelect {
    pub distinct: bool,
    pub columns: Vec<ResolvedSelectItem>,
    pub from: Vec<ResolvedFrom>,
    pub filter: Option<ResolvedExpr>,
    pub group_by: Vec<ResolvedExpr>,
    pub having: Option<ResolvedExpr>,
    pub order_by: Vec<ResolvedOrderByItem>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Output row type
    pub row_type: RelTypeRef,
}

impl ResolvedSelect {
    /// Whether the SELECT aggregates its input
    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty()
            || self.columns.iter().any(|c| c.expr.contains_aggregate())
            || self
                .having
                .as_ref()
                .map_or(false, ResolvedExpr::contains_aggregate)
            || self.order_by.iter().any(|o| o.expr.contains_aggregate())
    }
}

/// Validated query
#[derive(Debug, Clone)]
pub enum ValidatedQuery {
    Select(Box<ResolvedSelect>),
    Union {
        left: Box<ValidatedQuery>,
        right: Box<ValidatedQuery>,
        all: bool,
        row_type: RelTypeRef,
    },
}

impl ValidatedQuery {
    /// Output row type
    pub fn row_type(&self) -> &RelTypeRef {
        match self {
            ValidatedQuery::Select(select) => &select.row_type,
            ValidatedQuery::Union { row_type, .. } => row_type,
        }
    }
}
