//! SQL parser wrapper around sqlparser crate
//!
//! Parses query text with the session's dialect and lowers the sqlparser
//! AST into the internal `Query` form. Only queries are accepted.

use sqlparser::ast as sp;
use sqlparser::parser::Parser as SqlParser;

use crate::catalog::DataType;
use crate::config::SqlDialect;
use crate::sql::ast::*;
use crate::sql::error::{SqlError, SqlResult};

/// SQL parser
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    dialect: SqlDialect,
}

impl Parser {
    /// Create a parser for the given dialect
    pub fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    /// Parse a single query with the default dialect
    pub fn parse_one(sql: &str) -> SqlResult<Query> {
        Self::default().parse_query(sql)
    }

    /// Parse a single query
    pub fn parse_query(&self, sql: &str) -> SqlResult<Query> {
        let dialect = self.dialect.parser_dialect();
        let mut ast = SqlParser::parse_sql(dialect.as_ref(), sql)?;

        if ast.len() > 1 {
            return Err(SqlError::Parse(
                "Multiple statements not supported".to_string(),
            ));
        }
        let stmt = ast
            .pop()
            .ok_or_else(|| SqlError::Parse("Empty SQL statement".to_string()))?;

        match stmt {
            sp::Statement::Query(query) => lower_query(*query),
            other => Err(SqlError::Unsupported(format!(
                "Only queries can be translated, found: {}",
                statement_kind(&other)
            ))),
        }
    }
}

fn statement_kind(stmt: &sp::Statement) -> String {
    let text = stmt.to_string();
    text.split_whitespace()
        .next()
        .unwrap_or_default()
        .to_uppercase()
}

fn lower_query(query: sp::Query) -> SqlResult<Query> {
    if query.with.is_some() {
        return Err(SqlError::Unsupported("WITH clause".to_string()));
    }

    let order_by = query
        .order_by
        .map(|ob| ob.exprs)
        .unwrap_or_default()
        .into_iter()
        .map(lower_order_by)
        .collect::<SqlResult<Vec<_>>>()?;
    let limit = query.limit.map(lower_row_count).transpose()?;
    let offset = query.offset.map(|o| lower_row_count(o.value)).transpose()?;

    let body = lower_set_expr(*query.body)?;
    let has_modifiers = !order_by.is_empty() || limit.is_some() || offset.is_some();
    if !has_modifiers {
        return Ok(body);
    }

    match body {
        Query::Select(mut select)
            if select.order_by.is_empty() && select.limit.is_none() && select.offset.is_none() =>
        {
            select.order_by = order_by;
            select.limit = limit;
            select.offset = offset;
            Ok(Query::Select(select))
        }
        Query::Select(_) => Err(SqlError::Unsupported(
            "Nested ORDER BY / LIMIT on the same query".to_string(),
        )),
        Query::Union { .. } => Err(SqlError::Unsupported(
            "ORDER BY / LIMIT on UNION".to_string(),
        )),
    }
}

fn lower_set_expr(expr: sp::SetExpr) -> SqlResult<Query> {
    match expr {
        sp::SetExpr::Select(select) => lower_select(*select),
        sp::SetExpr::Query(query) => lower_query(*query),
        sp::SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right,
            ..
        } => {
            if !matches!(op, sp::SetOperator::Union) {
                return Err(SqlError::Unsupported(format!("Set operation {}", op)));
            }
            let all = match set_quantifier {
                sp::SetQuantifier::All => true,
                sp::SetQuantifier::Distinct | sp::SetQuantifier::None => false,
                other => {
                    return Err(SqlError::Unsupported(format!("UNION {}", other)));
                }
            };
            Ok(Query::Union {
                left: Box::new(lower_set_expr(*left)?),
                right: Box::new(lower_set_expr(*right)?),
                all,
            })
        }
        other => Err(SqlError::Unsupported(format!("Query body: {}", other))),
    }
}

fn lower_select(select: sp::Select) -> SqlResult<Query> {
    let distinct = match select.distinct {
        None => false,
        Some(sp::Distinct::Distinct) => true,
        Some(sp::Distinct::On(_)) => {
            return Err(SqlError::Unsupported("DISTINCT ON".to_string()));
        }
    };

    let columns = select
        .projection
        .into_iter()
        .map(lower_select_item)
        .collect::<SqlResult<Vec<_>>>()?;

    let from = select
        .from
        .into_iter()
        .map(lower_table_with_joins)
        .collect::<SqlResult<Vec<_>>>()?;

    let filter = select.selection.map(lower_expr).transpose()?;

    let group_by = match select.group_by {
        sp::GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(SqlError::Unsupported("GROUP BY modifiers".to_string()));
            }
            exprs
                .into_iter()
                .map(lower_expr)
                .collect::<SqlResult<Vec<_>>>()?
        }
        sp::GroupByExpr::All(_) => {
            return Err(SqlError::Unsupported("GROUP BY ALL".to_string()));
        }
    };

    let having = select.having.map(lower_expr).transpose()?;

    Ok(Query::Select(Box::new(SelectStatement {
        distinct,
        columns,
        from,
        filter,
        group_by,
        having,
        order_by: vec![],
        limit: None,
        offset: None,
    })))
}

fn lower_table_with_joins(twj: sp::TableWithJoins) -> SqlResult<FromItem> {
    let table = lower_table_factor(twj.relation)?;
    let joins = twj
        .joins
        .into_iter()
        .map(lower_join)
        .collect::<SqlResult<Vec<_>>>()?;
    Ok(FromItem { table, joins })
}

fn lower_table_factor(factor: sp::TableFactor) -> SqlResult<TableRef> {
    match factor {
        sp::TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                return Err(SqlError::Unsupported("Table-valued function".to_string()));
            }
            Ok(TableRef::Named {
                name: name.0.into_iter().map(|ident| ident.value).collect(),
                alias: alias.map(|a| a.name.value),
            })
        }
        sp::TableFactor::Derived {
            lateral,
            subquery,
            alias,
            ..
        } => {
            if lateral {
                return Err(SqlError::Unsupported("LATERAL".to_string()));
            }
            Ok(TableRef::Subquery {
                query: Box::new(lower_query(*subquery)?),
                alias: alias.map(|a| a.name.value),
            })
        }
        other => Err(SqlError::Unsupported(format!("FROM item: {}", other))),
    }
}

fn lower_join(join: sp::Join) -> SqlResult<Join> {
    let (join_type, constraint) = match join.join_operator {
        sp::JoinOperator::Inner(c) => (JoinType::Inner, Some(c)),
        sp::JoinOperator::LeftOuter(c) => (JoinType::Left, Some(c)),
        sp::JoinOperator::RightOuter(c) => (JoinType::Right, Some(c)),
        sp::JoinOperator::FullOuter(c) => (JoinType::Full, Some(c)),
        sp::JoinOperator::CrossJoin => (JoinType::Cross, None),
        other => {
            return Err(SqlError::Unsupported(format!("Join operator {:?}", other)));
        }
    };

    let condition = match constraint {
        Some(sp::JoinConstraint::On(expr)) => Some(lower_expr(expr)?),
        Some(sp::JoinConstraint::None) | None => None,
        Some(_) => {
            return Err(SqlError::Unsupported(
                "USING and NATURAL joins".to_string(),
            ));
        }
    };

    Ok(Join {
        table: lower_table_factor(join.relation)?,
        join_type,
        condition,
    })
}

fn lower_select_item(item: sp::SelectItem) -> SqlResult<SelectItem> {
    match item {
        sp::SelectItem::UnnamedExpr(expr) => Ok(SelectItem::Expr {
            expr: lower_expr(expr)?,
            alias: None,
        }),
        sp::SelectItem::ExprWithAlias { expr, alias } => Ok(SelectItem::Expr {
            expr: lower_expr(expr)?,
            alias: Some(alias.value),
        }),
        sp::SelectItem::Wildcard(_) => Ok(SelectItem::Wildcard),
        sp::SelectItem::QualifiedWildcard(name, _) => {
            let table = name
                .0
                .into_iter()
                .last()
                .map(|ident| ident.value)
                .ok_or_else(|| SqlError::Parse("Empty qualified wildcard".to_string()))?;
            Ok(SelectItem::QualifiedWildcard(table))
        }
    }
}

fn lower_order_by(order: sp::OrderByExpr) -> SqlResult<OrderByItem> {
    Ok(OrderByItem {
        expr: lower_expr(order.expr)?,
        ascending: order.asc.unwrap_or(true),
        nulls_first: order.nulls_first,
    })
}

fn lower_row_count(expr: sp::Expr) -> SqlResult<u64> {
    match expr {
        sp::Expr::Value(sp::Value::Number(n, _)) => n
            .parse::<u64>()
            .map_err(|_| SqlError::Parse(format!("Invalid row count: {}", n))),
        other => Err(SqlError::Unsupported(format!(
            "Non-literal LIMIT/OFFSET: {}",
            other
        ))),
    }
}

fn lower_expr(expr: sp::Expr) -> SqlResult<Expr> {
    match expr {
        sp::Expr::Identifier(ident) => Ok(Expr::Column {
            table: None,
            name: ident.value,
        }),
        sp::Expr::CompoundIdentifier(parts) => {
            let mut names: Vec<String> = parts.into_iter().map(|p| p.value).collect();
            let name = names
                .pop()
                .ok_or_else(|| SqlError::Parse("Empty identifier".to_string()))?;
            // db.table.column keeps only the table qualifier
            Ok(Expr::Column {
                table: names.pop(),
                name,
            })
        }
        sp::Expr::Value(value) => Ok(Expr::Literal(lower_value(value)?)),
        sp::Expr::Nested(inner) => lower_expr(*inner),
        sp::Expr::BinaryOp { left, op, right } => Ok(Expr::BinaryOp {
            left: Box::new(lower_expr(*left)?),
            op: lower_binary_op(op)?,
            right: Box::new(lower_expr(*right)?),
        }),
        sp::Expr::UnaryOp { op, expr } => match op {
            sp::UnaryOperator::Plus => lower_expr(*expr),
            sp::UnaryOperator::Minus => match lower_expr(*expr)? {
                Expr::Literal(Literal::Integer(n)) => Ok(Expr::Literal(Literal::Integer(-n))),
                Expr::Literal(Literal::Float(x)) => Ok(Expr::Literal(Literal::Float(-x))),
                other => Ok(Expr::UnaryOp {
                    op: UnaryOp::Neg,
                    expr: Box::new(other),
                }),
            },
            sp::UnaryOperator::Not => Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                expr: Box::new(lower_expr(*expr)?),
            }),
            other => Err(SqlError::Unsupported(format!("Unary operator {}", other))),
        },
        sp::Expr::Function(func) => lower_function(func),
        sp::Expr::IsNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(*inner)?),
            negated: false,
        }),
        sp::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(*inner)?),
            negated: true,
        }),
        sp::Expr::InList {
            expr,
            list,
            negated,
        } => Ok(Expr::InList {
            expr: Box::new(lower_expr(*expr)?),
            list: list
                .into_iter()
                .map(lower_expr)
                .collect::<SqlResult<Vec<_>>>()?,
            negated,
        }),
        sp::Expr::Between {
            expr,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(lower_expr(*expr)?),
            low: Box::new(lower_expr(*low)?),
            high: Box::new(lower_expr(*high)?),
            negated,
        }),
        sp::Expr::Like {
            negated,
            expr,
            pattern,
            ..
        } => Ok(Expr::BinaryOp {
            left: Box::new(lower_expr(*expr)?),
            op: if negated {
                BinaryOp::NotLike
            } else {
                BinaryOp::Like
            },
            right: Box::new(lower_expr(*pattern)?),
        }),
        sp::Expr::Cast {
            expr, data_type, ..
        } => Ok(Expr::Cast {
            expr: Box::new(lower_expr(*expr)?),
            data_type: lower_data_type(&data_type)?,
        }),
        sp::Expr::Case {
            operand,
            conditions,
            results,
            else_result,
        } => {
            let conditions = conditions
                .into_iter()
                .zip(results)
                .map(|(when, then)| Ok((lower_expr(when)?, lower_expr(then)?)))
                .collect::<SqlResult<Vec<_>>>()?;
            Ok(Expr::Case {
                operand: operand.map(|o| lower_expr(*o)).transpose()?.map(Box::new),
                conditions,
                else_result: else_result
                    .map(|e| lower_expr(*e))
                    .transpose()?
                    .map(Box::new),
            })
        }
        sp::Expr::Subquery(_) | sp::Expr::InSubquery { .. } | sp::Expr::Exists { .. } => {
            Err(SqlError::Unsupported("Subquery expressions".to_string()))
        }
        other => Err(SqlError::Unsupported(format!("Expression: {}", other))),
    }
}

fn lower_function(func: sp::Function) -> SqlResult<Expr> {
    if func.over.is_some() {
        return Err(SqlError::Unsupported("Window functions".to_string()));
    }
    if func.filter.is_some() {
        return Err(SqlError::Unsupported("Aggregate FILTER".to_string()));
    }

    let name = func
        .name
        .0
        .into_iter()
        .last()
        .map(|ident| ident.value)
        .ok_or_else(|| SqlError::Parse("Empty function name".to_string()))?;

    let (args, distinct) = match func.args {
        sp::FunctionArguments::None => (vec![], false),
        sp::FunctionArguments::List(list) => {
            let distinct = matches!(
                list.duplicate_treatment,
                Some(sp::DuplicateTreatment::Distinct)
            );
            let args = list
                .args
                .into_iter()
                .map(|arg| match arg {
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Expr(e)) => lower_expr(e),
                    sp::FunctionArg::Unnamed(sp::FunctionArgExpr::Wildcard) => Ok(Expr::Wildcard),
                    other => Err(SqlError::Unsupported(format!("Function argument: {}", other))),
                })
                .collect::<SqlResult<Vec<_>>>()?;
            (args, distinct)
        }
        sp::FunctionArguments::Subquery(_) => {
            return Err(SqlError::Unsupported("Subquery function argument".to_string()));
        }
    };

    Ok(Expr::Function {
        name,
        args,
        distinct,
    })
}

fn lower_value(value: sp::Value) -> SqlResult<Literal> {
    match value {
        sp::Value::Null => Ok(Literal::Null),
        sp::Value::Boolean(b) => Ok(Literal::Boolean(b)),
        sp::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Literal::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Literal::Float)
                    .map_err(|_| SqlError::Parse(format!("Invalid number: {}", n)))
            }
        }
        sp::Value::SingleQuotedString(s) | sp::Value::DoubleQuotedString(s) => {
            Ok(Literal::String(s))
        }
        sp::Value::HexStringLiteral(hex) => decode_hex(&hex).map(Literal::Blob),
        other => Err(SqlError::Unsupported(format!("Literal: {}", other))),
    }
}

fn decode_hex(hex: &str) -> SqlResult<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(SqlError::Parse(format!("Odd-length hex literal: {}", hex)));
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| SqlError::Parse(format!("Invalid hex literal: {}", hex)))
        })
        .collect()
}

fn lower_binary_op(op: sp::BinaryOperator) -> SqlResult<BinaryOp> {
    match op {
        sp::BinaryOperator::Plus => Ok(BinaryOp::Add),
        sp::BinaryOperator::Minus => Ok(BinaryOp::Sub),
        sp::BinaryOperator::Multiply => Ok(BinaryOp::Mul),
        sp::BinaryOperator::Divide => Ok(BinaryOp::Div),
        sp::BinaryOperator::Modulo => Ok(BinaryOp::Mod),
        sp::BinaryOperator::Eq => Ok(BinaryOp::Eq),
        sp::BinaryOperator::NotEq => Ok(BinaryOp::NotEq),
        sp::BinaryOperator::Lt => Ok(BinaryOp::Lt),
        sp::BinaryOperator::LtEq => Ok(BinaryOp::LtEq),
        sp::BinaryOperator::Gt => Ok(BinaryOp::Gt),
        sp::BinaryOperator::GtEq => Ok(BinaryOp::GtEq),
        sp::BinaryOperator::And => Ok(BinaryOp::And),
        sp::BinaryOperator::Or => Ok(BinaryOp::Or),
        sp::BinaryOperator::StringConcat => Ok(BinaryOp::Concat),
        other => Err(SqlError::Unsupported(format!("Binary operator {}", other))),
    }
}

/// Map a parsed type name onto a catalog type
fn lower_data_type(data_type: &sp::DataType) -> SqlResult<DataType> {
    let text = data_type.to_string().to_uppercase();
    let (base, params) = match text.find('(') {
        Some(pos) => (text[..pos].trim(), Some(text[pos + 1..].trim_end_matches(')'))),
        None => (text.trim(), None),
    };

    let mapped = match base {
        "BOOLEAN" | "BOOL" => DataType::Boolean,
        "TINYINT" => DataType::TinyInt,
        "SMALLINT" => DataType::SmallInt,
        "INT" | "INTEGER" => DataType::Int,
        "BIGINT" => DataType::BigInt,
        "FLOAT" | "REAL" => DataType::Float,
        "DOUBLE" | "DOUBLE PRECISION" => DataType::Double,
        "VARCHAR" | "CHAR" | "CHARACTER VARYING" => {
            let len = params
                .and_then(|p| p.trim().parse::<u32>().ok())
                .unwrap_or(u32::from(u16::MAX));
            DataType::Varchar(len)
        }
        "STRING" | "TEXT" => DataType::Text,
        "BINARY" | "BLOB" | "VARBINARY" => DataType::Blob,
        "DATE" => DataType::Date,
        "TIMESTAMP" | "DATETIME" => DataType::Timestamp,
        _ => return Err(SqlError::Unsupported(format!("Data type {}", text))),
    };
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> SelectStatement {
        match Parser::parse_one(sql).unwrap() {
            Query::Select(select) => *select,
            other => panic!("Expected SELECT, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_select() {
        let s = select("SELECT id, name FROM users WHERE id = 1");
        assert_eq!(s.columns.len(), 2);
        assert!(s.filter.is_some());
        assert_eq!(
            s.from[0].table,
            TableRef::Named {
                name: vec!["users".to_string()],
                alias: None
            }
        );
    }

    #[test]
    fn test_parse_qualified_table_and_alias() {
        let s = select("SELECT o.id FROM hive.sales.orders o");
        match &s.from[0].table {
            TableRef::Named { name, alias } => {
                assert_eq!(name.len(), 3);
                assert_eq!(alias.as_deref(), Some("o"));
            }
            _ => panic!("Expected named table"),
        }
        assert_eq!(
            s.columns[0],
            SelectItem::Expr {
                expr: Expr::Column {
                    table: Some("o".to_string()),
                    name: "id".to_string()
                },
                alias: None
            }
        );
    }

    #[test]
    fn test_parse_join() {
        let s = select("SELECT u.name, o.total FROM users u LEFT JOIN orders o ON u.id = o.user_id");
        assert_eq!(s.from.len(), 1);
        assert_eq!(s.from[0].joins.len(), 1);
        assert_eq!(s.from[0].joins[0].join_type, JoinType::Left);
        assert!(s.from[0].joins[0].condition.is_some());
    }

    #[test]
    fn test_parse_derived_table() {
        let s = select("SELECT * FROM (SELECT id FROM orders) v");
        match &s.from[0].table {
            TableRef::Subquery { alias, .. } => assert_eq!(alias.as_deref(), Some("v")),
            _ => panic!("Expected subquery"),
        }
    }

    #[test]
    fn test_parse_order_limit() {
        let s = select("SELECT id FROM orders ORDER BY id DESC LIMIT 10 OFFSET 5");
        assert_eq!(s.order_by.len(), 1);
        assert!(!s.order_by[0].ascending);
        assert_eq!(s.limit, Some(10));
        assert_eq!(s.offset, Some(5));
    }

    #[test]
    fn test_parse_union() {
        let q = Parser::parse_one("SELECT id FROM a UNION ALL SELECT id FROM b").unwrap();
        assert!(matches!(q, Query::Union { all: true, .. }));
    }

    #[test]
    fn test_parse_count_star_and_distinct() {
        let s = select("SELECT COUNT(*), COUNT(DISTINCT id) FROM orders");
        match &s.columns[0] {
            SelectItem::Expr {
                expr: Expr::Function { args, .. },
                ..
            } => assert_eq!(args, &vec![Expr::Wildcard]),
            _ => panic!("Expected function"),
        }
        match &s.columns[1] {
            SelectItem::Expr {
                expr: Expr::Function { distinct, .. },
                ..
            } => assert!(*distinct),
            _ => panic!("Expected function"),
        }
    }

    #[test]
    fn test_parse_cast_and_negative_literal() {
        let s = select("SELECT CAST(id AS BIGINT), -5 FROM orders");
        match &s.columns[0] {
            SelectItem::Expr {
                expr: Expr::Cast { data_type, .. },
                ..
            } => assert_eq!(*data_type, DataType::BigInt),
            _ => panic!("Expected cast"),
        }
        assert_eq!(
            s.columns[1],
            SelectItem::Expr {
                expr: Expr::Literal(Literal::Integer(-5)),
                alias: None
            }
        );
    }

    #[test]
    fn test_rejects_non_queries() {
        assert!(matches!(
            Parser::parse_one("DELETE FROM users WHERE id = 1"),
            Err(SqlError::Unsupported(_))
        ));
        assert!(matches!(
            Parser::parse_one("SELEC id FROM"),
            Err(SqlError::Parse(_))
        ));
        assert!(matches!(
            Parser::parse_one("SELECT 1; SELECT 2"),
            Err(SqlError::Parse(_))
        ));
    }

    #[test]
    fn test_other_dialect() {
        let parser = Parser::new(SqlDialect::PostgreSql);
        assert!(parser.parse_query("SELECT \"id\" FROM orders").is_ok());
    }
}
