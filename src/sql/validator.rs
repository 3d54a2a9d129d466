//! SQL validator
//!
//! Resolves parsed queries against the catalog reader's namespace:
//! - Table and view names to catalog definitions, derived tables recursively
//! - Column references to positions in the row produced by the FROM clause
//! - Function calls to the standard operator table or catalog functions
//!
//! Every expression gets a type from the session's type factory. The
//! conformance level decides which alias and ordinal shortcuts GROUP BY,
//! HAVING and ORDER BY accept.

use std::cell::Cell;
use std::ops::Range;
use std::sync::Arc;

use crate::catalog::{CatalogReader, DataType, NameMatcher};
use crate::config::Conformance;
use crate::planner::logical::builder::uniquify_names;
use crate::planner::logical::types::{RelTypeRef, TypeFactory};
use crate::sql::ast::*;
use crate::sql::error::{SqlError, SqlResult};
use crate::sql::operators::{AggFunction, FunctionKind, OperatorTable};
use crate::sql::typecheck::TypeChecker;

/// Semantic validator
#[derive(Debug)]
pub struct SqlValidator {
    operators: &'static OperatorTable,
    catalog_reader: Arc<CatalogReader>,
    type_factory: Arc<TypeFactory>,
    conformance: Conformance,
}

impl SqlValidator {
    /// Create a validator
    pub fn new(
        operators: &'static OperatorTable,
        catalog_reader: Arc<CatalogReader>,
        type_factory: Arc<TypeFactory>,
        conformance: Conformance,
    ) -> Self {
        Self {
            operators,
            catalog_reader,
            type_factory,
            conformance,
        }
    }

    /// Operator table functions are resolved against
    pub fn operator_table(&self) -> &'static OperatorTable {
        self.operators
    }

    /// Catalog reader names are resolved against
    pub fn catalog_reader(&self) -> &Arc<CatalogReader> {
        &self.catalog_reader
    }

    /// Type factory expression types come from
    pub fn type_factory(&self) -> &Arc<TypeFactory> {
        &self.type_factory
    }

    /// Conformance level
    pub fn conformance(&self) -> Conformance {
        self.conformance
    }

    /// Validate a query against the reader's default search path
    pub fn validate(&self, query: &Query) -> SqlResult<ValidatedQuery> {
        self.resolver(&self.catalog_reader).resolve_query(query)
    }

    /// Validate a query as if issued from inside `schema_path`
    ///
    /// Used for view definitions, whose unqualified names refer to the
    /// database the view lives in.
    pub fn validate_in_schema(
        &self,
        query: &Query,
        schema_path: &[String],
    ) -> SqlResult<ValidatedQuery> {
        let reader = self.catalog_reader.with_schema_path(schema_path.to_vec());
        self.resolver(&reader).resolve_query(query)
    }

    fn resolver<'a>(&'a self, reader: &'a CatalogReader) -> Resolver<'a> {
        Resolver {
            reader,
            factory: self.type_factory.as_ref(),
            operators: self.operators,
            conformance: self.conformance,
            matcher: reader.name_matcher(),
            next_alias: Cell::new(0),
        }
    }
}

// ============ Scope ============

/// Relations visible to column references, in FROM order
#[derive(Debug, Default)]
struct Scope {
    entries: Vec<ScopeEntry>,
}

#[derive(Debug)]
struct ScopeEntry {
    alias: String,
    row_type: RelTypeRef,
    /// Position of the first field in the combined row
    offset: usize,
}

impl Scope {
    fn width(&self) -> usize {
        self.entries
            .last()
            .map_or(0, |e| e.offset + e.row_type.field_count())
    }

    fn add(&mut self, alias: String, row_type: RelTypeRef, matcher: NameMatcher) -> SqlResult<()> {
        if self.entries.iter().any(|e| matcher.matches(&e.alias, &alias)) {
            return Err(SqlError::InvalidOperation(format!(
                "Duplicate relation alias '{}'",
                alias
            )));
        }
        let offset = self.width();
        self.entries.push(ScopeEntry {
            alias,
            row_type,
            offset,
        });
        Ok(())
    }

    fn append(&mut self, other: Scope, matcher: NameMatcher) -> SqlResult<()> {
        for entry in other.entries {
            self.add(entry.alias, entry.row_type, matcher)?;
        }
        Ok(())
    }

    /// Mark every field of the given entries nullable (outer-join side)
    fn make_nullable(&mut self, entries: Range<usize>, factory: &TypeFactory) {
        for entry in &mut self.entries[entries] {
            entry.row_type = factory.create_type_with_nullability(&entry.row_type, true);
        }
    }

    fn find(&self, alias: &str, matcher: NameMatcher) -> SqlResult<Option<&ScopeEntry>> {
        let idx = matcher
            .position(self.entries.iter().map(|e| e.alias.as_str()), alias)
            .map_err(|_| SqlError::AmbiguousName(alias.to_string()))?;
        Ok(idx.map(|i| &self.entries[i]))
    }

    fn column(entry: &ScopeEntry, field: usize) -> ResolvedColumn {
        let f = &entry.row_type.fields()[field];
        ResolvedColumn {
            table: entry.alias.clone(),
            name: f.name.clone(),
            index: entry.offset + field,
            data_type: Arc::clone(&f.data_type),
        }
    }
}

// ============ Resolver ============

struct Resolver<'a> {
    reader: &'a CatalogReader,
    factory: &'a TypeFactory,
    operators: &'a OperatorTable,
    conformance: Conformance,
    matcher: NameMatcher,
    next_alias: Cell<usize>,
}

impl<'a> Resolver<'a> {
    fn resolve_query(&self, query: &Query) -> SqlResult<ValidatedQuery> {
        match query {
            Query::Select(select) => Ok(ValidatedQuery::Select(Box::new(
                self.resolve_select(select)?,
            ))),
            Query::Union { left, right, all } => {
                let left = self.resolve_query(left)?;
                let right = self.resolve_query(right)?;
                TypeChecker::check_union(left.row_type(), right.row_type())?;

                let row_type = self
                    .factory
                    .least_restrictive(&[Arc::clone(left.row_type()), Arc::clone(right.row_type())])
                    .ok_or_else(|| {
                        SqlError::InvalidOperation(
                            "UNION inputs have incompatible row types".to_string(),
                        )
                    })?;

                Ok(ValidatedQuery::Union {
                    left: Box::new(left),
                    right: Box::new(right),
                    all: *all,
                    row_type,
                })
            }
        }
    }

    fn resolve_select(&self, select: &SelectStatement) -> SqlResult<ResolvedSelect> {
        // Build scope from FROM clause
        let mut scope = Scope::default();
        let mut from = Vec::with_capacity(select.from.len());
        for item in &select.from {
            let (resolved, local) = self.resolve_from_item(item)?;
            scope.append(local, self.matcher)?;
            from.push(resolved);
        }

        // Resolve columns
        let mut exprs = Vec::new();
        let mut names = Vec::new();
        for item in &select.columns {
            self.resolve_select_item(item, &scope, &mut exprs, &mut names)?;
        }
        let columns: Vec<ResolvedSelectItem> = exprs
            .into_iter()
            .zip(uniquify_names(names))
            .map(|(expr, name)| ResolvedSelectItem { expr, name })
            .collect();

        // Resolve filter
        let filter = match &select.filter {
            Some(f) => {
                let f = self.resolve_expr(f, &scope)?;
                if f.contains_aggregate() {
                    return Err(SqlError::InvalidOperation(
                        "Aggregate functions are not allowed in WHERE".to_string(),
                    ));
                }
                Some(f)
            }
            None => None,
        };

        // Resolve GROUP BY
        let mut group_by = Vec::with_capacity(select.group_by.len());
        for expr in &select.group_by {
            let resolved = self.resolve_group_expr(expr, &scope, &columns)?;
            if resolved.contains_aggregate() {
                return Err(SqlError::InvalidOperation(
                    "Aggregate functions are not allowed in GROUP BY".to_string(),
                ));
            }
            group_by.push(resolved);
        }

        // Resolve HAVING
        let having = select
            .having
            .as_ref()
            .map(|h| self.resolve_aliased(h, &scope, &columns, self.conformance.is_having_alias()))
            .transpose()?;

        // Resolve ORDER BY
        let mut order_by = Vec::with_capacity(select.order_by.len());
        for item in &select.order_by {
            order_by.push(self.resolve_order_item(item, &scope, &columns, select.distinct)?);
        }

        let row_type = self.factory.create_struct_type(
            columns
                .iter()
                .map(|c| (c.name.clone(), Arc::clone(c.expr.data_type())))
                .collect(),
        );

        let resolved = ResolvedSelect {
            distinct: select.distinct,
            columns,
            from,
            filter,
            group_by,
            having,
            order_by,
            limit: select.limit,
            offset: select.offset,
            row_type,
        };
        TypeChecker::check_select(&resolved)?;
        Ok(resolved)
    }

    /// Resolve one FROM entry; join conditions see only this entry's relations
    fn resolve_from_item(&self, item: &FromItem) -> SqlResult<(ResolvedFrom, Scope)> {
        let mut local = Scope::default();
        let source = self.resolve_table_ref(&item.table)?;
        local.add(source.alias.clone(), Arc::clone(&source.row_type), self.matcher)?;

        let mut joins = Vec::with_capacity(item.joins.len());
        for join in &item.joins {
            let source = self.resolve_table_ref(&join.table)?;
            let before = local.entries.len();
            local.add(source.alias.clone(), Arc::clone(&source.row_type), self.matcher)?;

            let condition = match &join.condition {
                Some(cond) => {
                    let cond = self.resolve_expr(cond, &local)?;
                    if cond.contains_aggregate() {
                        return Err(SqlError::InvalidOperation(
                            "Aggregate functions are not allowed in ON".to_string(),
                        ));
                    }
                    Some(cond)
                }
                None => None,
            };

            let all = 0..local.entries.len();
            match join.join_type {
                JoinType::Left => local.make_nullable(before..all.end, self.factory),
                JoinType::Right => local.make_nullable(0..before, self.factory),
                JoinType::Full => local.make_nullable(all, self.factory),
                JoinType::Inner | JoinType::Cross => {}
            }

            joins.push(ResolvedJoin {
                source,
                join_type: join.join_type,
                condition,
            });
        }

        Ok((ResolvedFrom { source, joins }, local))
    }

    fn resolve_table_ref(&self, table: &TableRef) -> SqlResult<ResolvedSource> {
        match table {
            TableRef::Named { name, alias } => {
                let resolved = self
                    .reader
                    .get_table(name)?
                    .ok_or_else(|| SqlError::TableNotFound(name.join(".")))?;
                let alias = alias
                    .clone()
                    .or_else(|| name.last().cloned())
                    .unwrap_or_else(|| resolved.name().to_string());
                let row_type = Arc::clone(&resolved.row_type);
                Ok(ResolvedSource {
                    alias,
                    kind: SourceKind::Table(resolved),
                    row_type,
                })
            }
            TableRef::Subquery { query, alias } => {
                let validated = self.resolve_query(query)?;
                let row_type = Arc::clone(validated.row_type());
                let alias = alias.clone().unwrap_or_else(|| self.generated_alias());
                Ok(ResolvedSource {
                    alias,
                    kind: SourceKind::Subquery(Box::new(validated)),
                    row_type,
                })
            }
        }
    }

    fn generated_alias(&self) -> String {
        let n = self.next_alias.get();
        self.next_alias.set(n + 1);
        format!("EXPR${}", n)
    }

    /// Resolve SELECT item, expanding wildcards in scope order
    fn resolve_select_item(
        &self,
        item: &SelectItem,
        scope: &Scope,
        exprs: &mut Vec<ResolvedExpr>,
        names: &mut Vec<String>,
    ) -> SqlResult<()> {
        match item {
            SelectItem::Expr { expr, alias } => {
                let resolved = self.resolve_expr(expr, scope)?;
                let name = match (alias, &resolved) {
                    (Some(alias), _) => alias.clone(),
                    (None, ResolvedExpr::Column(col)) => col.name.clone(),
                    (None, _) => format!("EXPR${}", exprs.len()),
                };
                exprs.push(resolved);
                names.push(name);
            }
            SelectItem::Wildcard => {
                if scope.entries.is_empty() {
                    return Err(SqlError::InvalidOperation(
                        "SELECT * requires a FROM clause".to_string(),
                    ));
                }
                for entry in &scope.entries {
                    Self::push_all_fields(entry, exprs, names);
                }
            }
            SelectItem::QualifiedWildcard(table) => {
                let entry = scope
                    .find(table, self.matcher)?
                    .ok_or_else(|| SqlError::TableNotFound(table.clone()))?;
                Self::push_all_fields(entry, exprs, names);
            }
        }
        Ok(())
    }

    fn push_all_fields(entry: &ScopeEntry, exprs: &mut Vec<ResolvedExpr>, names: &mut Vec<String>) {
        for field in 0..entry.row_type.field_count() {
            let col = Scope::column(entry, field);
            names.push(col.name.clone());
            exprs.push(ResolvedExpr::Column(col));
        }
    }

    fn resolve_group_expr(
        &self,
        expr: &Expr,
        scope: &Scope,
        columns: &[ResolvedSelectItem],
    ) -> SqlResult<ResolvedExpr> {
        if self.conformance.is_group_by_ordinal() {
            if let Some(i) = ordinal_target(expr, columns)? {
                return Ok(columns[i].expr.clone());
            }
        }
        self.resolve_aliased(expr, scope, columns, self.conformance.is_group_by_alias())
    }

    fn resolve_order_item(
        &self,
        item: &OrderByItem,
        scope: &Scope,
        columns: &[ResolvedSelectItem],
        distinct: bool,
    ) -> SqlResult<ResolvedOrderByItem> {
        let ordinal = if self.conformance.is_sort_by_ordinal() {
            ordinal_target(&item.expr, columns)?
        } else {
            None
        };

        let (expr, select_index) = match ordinal {
            Some(i) => (columns[i].expr.clone(), Some(i)),
            None => {
                let alias = self.alias_target(&item.expr, columns)?;
                match alias {
                    Some(i) if self.conformance.is_sort_by_alias() => {
                        (columns[i].expr.clone(), Some(i))
                    }
                    _ => match self.resolve_expr(&item.expr, scope) {
                        Ok(expr) => (expr, None),
                        Err(err @ SqlError::ColumnNotFound(_)) => match alias {
                            Some(i) => (columns[i].expr.clone(), Some(i)),
                            None => return Err(err),
                        },
                        Err(err) => return Err(err),
                    },
                }
            }
        };

        let select_index = select_index.or_else(|| columns.iter().position(|c| c.expr == expr));
        if distinct && select_index.is_none() {
            return Err(SqlError::InvalidOperation(format!(
                "ORDER BY expression {} must appear in the select list of a DISTINCT query",
                expr
            )));
        }

        Ok(ResolvedOrderByItem {
            expr,
            ascending: item.ascending,
            nulls_first: item.nulls_first.unwrap_or(!item.ascending),
            select_index,
        })
    }

    /// Resolve `expr`, falling back to a select-list alias for a bare identifier
    fn resolve_aliased(
        &self,
        expr: &Expr,
        scope: &Scope,
        columns: &[ResolvedSelectItem],
        allow_alias: bool,
    ) -> SqlResult<ResolvedExpr> {
        let err = match self.resolve_expr(expr, scope) {
            Err(err @ SqlError::ColumnNotFound(_)) if allow_alias => err,
            other => return other,
        };
        match self.alias_target(expr, columns)? {
            Some(i) => Ok(columns[i].expr.clone()),
            None => Err(err),
        }
    }

    /// Select-list position whose output name matches a bare identifier
    fn alias_target(&self, expr: &Expr, columns: &[ResolvedSelectItem]) -> SqlResult<Option<usize>> {
        let Expr::Column { table: None, name } = expr else {
            return Ok(None);
        };
        self.matcher
            .position(columns.iter().map(|c| c.name.as_str()), name)
            .map_err(|_| SqlError::AmbiguousColumn(name.clone()))
    }

    /// Resolve expression
    fn resolve_expr(&self, expr: &Expr, scope: &Scope) -> SqlResult<ResolvedExpr> {
        match expr {
            Expr::Column { table, name } => self.resolve_column(table.as_deref(), name, scope),
            Expr::Literal(value) => Ok(ResolvedExpr::Literal {
                value: value.clone(),
                data_type: self.factory.create_sql_type(value.data_type()),
            }),
            Expr::BinaryOp { left, op, right } => {
                let left = self.resolve_expr(left, scope)?;
                let right = self.resolve_expr(right, scope)?;
                let result_type = self.binary_result_type(*op, &left, &right)?;
                Ok(ResolvedExpr::BinaryOp {
                    left: Box::new(left),
                    op: *op,
                    right: Box::new(right),
                    result_type,
                })
            }
            Expr::UnaryOp { op, expr } => {
                let expr = self.resolve_expr(expr, scope)?;
                let result_type = match op {
                    UnaryOp::Not => {
                        TypeChecker::check_is_boolean(&expr)?;
                        self.factory
                            .create_scalar(DataType::Boolean, expr.is_nullable())
                    }
                    UnaryOp::Neg => {
                        TypeChecker::check_numeric(&expr)?;
                        Arc::clone(expr.data_type())
                    }
                };
                Ok(ResolvedExpr::UnaryOp {
                    op: *op,
                    expr: Box::new(expr),
                    result_type,
                })
            }
            Expr::Function {
                name,
                args,
                distinct,
            } => self.resolve_function(name, args, *distinct, scope),
            Expr::IsNull { expr, negated } => Ok(ResolvedExpr::IsNull {
                expr: Box::new(self.resolve_expr(expr, scope)?),
                negated: *negated,
                result_type: self.factory.create_sql_type(DataType::Boolean),
            }),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                let expr = self.resolve_expr(expr, scope)?;
                let mut resolved_list = Vec::with_capacity(list.len());
                for item in list {
                    let item = self.resolve_expr(item, scope)?;
                    TypeChecker::check_comparable(&expr, &item)?;
                    resolved_list.push(item);
                }
                let nullable =
                    expr.is_nullable() || resolved_list.iter().any(ResolvedExpr::is_nullable);
                Ok(ResolvedExpr::InList {
                    expr: Box::new(expr),
                    list: resolved_list,
                    negated: *negated,
                    result_type: self.factory.create_scalar(DataType::Boolean, nullable),
                })
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                let expr = self.resolve_expr(expr, scope)?;
                let low = self.resolve_expr(low, scope)?;
                let high = self.resolve_expr(high, scope)?;
                TypeChecker::check_comparable(&expr, &low)?;
                TypeChecker::check_comparable(&expr, &high)?;
                let nullable = expr.is_nullable() || low.is_nullable() || high.is_nullable();
                Ok(ResolvedExpr::Between {
                    expr: Box::new(expr),
                    low: Box::new(low),
                    high: Box::new(high),
                    negated: *negated,
                    result_type: self.factory.create_scalar(DataType::Boolean, nullable),
                })
            }
            Expr::Cast { expr, data_type } => {
                let expr = self.resolve_expr(expr, scope)?;
                let result_type = self
                    .factory
                    .create_scalar(data_type.clone(), expr.is_nullable());
                Ok(ResolvedExpr::Cast {
                    expr: Box::new(expr),
                    result_type,
                })
            }
            Expr::Case {
                operand,
                conditions,
                else_result,
            } => self.resolve_case(operand.as_deref(), conditions, else_result.as_deref(), scope),
            Expr::Wildcard => Err(SqlError::InvalidOperation(
                "'*' is only allowed as the argument of COUNT".to_string(),
            )),
        }
    }

    /// Resolve column reference
    fn resolve_column(
        &self,
        table: Option<&str>,
        name: &str,
        scope: &Scope,
    ) -> SqlResult<ResolvedExpr> {
        if let Some(table_name) = table {
            // Qualified column reference
            let entry = scope
                .find(table_name, self.matcher)?
                .ok_or_else(|| SqlError::TableNotFound(table_name.to_string()))?;
            let field = self
                .matcher
                .position(entry.row_type.field_names(), name)
                .map_err(|_| SqlError::AmbiguousColumn(format!("{}.{}", table_name, name)))?
                .ok_or_else(|| SqlError::ColumnNotFound(format!("{}.{}", table_name, name)))?;
            return Ok(ResolvedExpr::Column(Scope::column(entry, field)));
        }

        // Unqualified column reference - search all relations
        let mut found = None;
        for entry in &scope.entries {
            let field = self
                .matcher
                .position(entry.row_type.field_names(), name)
                .map_err(|_| SqlError::AmbiguousColumn(name.to_string()))?;
            if let Some(field) = field {
                if found.is_some() {
                    return Err(SqlError::AmbiguousColumn(name.to_string()));
                }
                found = Some(Scope::column(entry, field));
            }
        }

        found
            .map(ResolvedExpr::Column)
            .ok_or_else(|| SqlError::ColumnNotFound(name.to_string()))
    }

    fn binary_result_type(
        &self,
        op: BinaryOp,
        left: &ResolvedExpr,
        right: &ResolvedExpr,
    ) -> SqlResult<RelTypeRef> {
        let nullable = left.is_nullable() || right.is_nullable();
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                TypeChecker::check_numeric(left)?;
                TypeChecker::check_numeric(right)?;
                self.factory
                    .least_restrictive(&[Arc::clone(left.data_type()), Arc::clone(right.data_type())])
                    .ok_or_else(|| {
                        SqlError::InvalidOperation(format!(
                            "No common type for {} and {}",
                            left.data_type(),
                            right.data_type()
                        ))
                    })
            }
            BinaryOp::Eq
            | BinaryOp::NotEq
            | BinaryOp::Lt
            | BinaryOp::LtEq
            | BinaryOp::Gt
            | BinaryOp::GtEq => {
                TypeChecker::check_comparable(left, right)?;
                Ok(self.factory.create_scalar(DataType::Boolean, nullable))
            }
            BinaryOp::And | BinaryOp::Or => {
                TypeChecker::check_is_boolean(left)?;
                TypeChecker::check_is_boolean(right)?;
                Ok(self.factory.create_scalar(DataType::Boolean, nullable))
            }
            BinaryOp::Like | BinaryOp::NotLike => {
                TypeChecker::check_string(left)?;
                TypeChecker::check_string(right)?;
                Ok(self.factory.create_scalar(DataType::Boolean, nullable))
            }
            BinaryOp::Concat => Ok(self.factory.create_scalar(DataType::Text, nullable)),
        }
    }

    fn resolve_function(
        &self,
        name: &str,
        args: &[Expr],
        distinct: bool,
        scope: &Scope,
    ) -> SqlResult<ResolvedExpr> {
        if let Some(sig) = self.operators.lookup(name) {
            let is_count = sig.kind == FunctionKind::Aggregate(AggFunction::Count);
            let resolved = if is_count && matches!(args, [Expr::Wildcard]) {
                Vec::new()
            } else {
                self.resolve_args(args, scope)?
            };
            sig.check_arity(resolved.len())?;

            match sig.kind {
                FunctionKind::Aggregate(func) => {
                    if resolved.iter().any(ResolvedExpr::contains_aggregate) {
                        return Err(SqlError::InvalidOperation(format!(
                            "Aggregate function {} cannot contain another aggregate",
                            sig.name
                        )));
                    }
                    if matches!(func, AggFunction::Sum | AggFunction::Avg) {
                        for arg in &resolved {
                            TypeChecker::check_numeric(arg)?;
                        }
                    }
                }
                FunctionKind::Scalar if distinct => {
                    return Err(SqlError::InvalidOperation(format!(
                        "DISTINCT is not allowed in scalar function {}",
                        sig.name
                    )));
                }
                FunctionKind::Scalar => {}
            }

            let arg_types: Vec<RelTypeRef> =
                resolved.iter().map(|a| Arc::clone(a.data_type())).collect();
            let result_type = sig.infer_return_type(&arg_types, self.factory)?;
            return Ok(ResolvedExpr::Function {
                name: sig.name.to_string(),
                kind: sig.kind,
                args: resolved,
                distinct,
                result_type,
            });
        }

        if let Some(def) = self.reader.get_function(name)? {
            let resolved = self.resolve_args(args, scope)?;
            if let Some(arity) = def.arity {
                if arity != resolved.len() {
                    return Err(SqlError::WrongArgumentCount {
                        function: def.name.clone(),
                        expected: arity.to_string(),
                        found: resolved.len(),
                    });
                }
            }
            if distinct {
                return Err(SqlError::InvalidOperation(format!(
                    "DISTINCT is not allowed in scalar function {}",
                    def.name
                )));
            }
            let nullable = resolved.iter().any(ResolvedExpr::is_nullable);
            return Ok(ResolvedExpr::Function {
                name: def.name.clone(),
                kind: FunctionKind::Scalar,
                args: resolved,
                distinct: false,
                result_type: self.factory.create_scalar(def.return_type.clone(), nullable),
            });
        }

        Err(SqlError::FunctionNotFound(name.to_string()))
    }

    fn resolve_args(&self, args: &[Expr], scope: &Scope) -> SqlResult<Vec<ResolvedExpr>> {
        args.iter().map(|a| self.resolve_expr(a, scope)).collect()
    }

    fn resolve_case(
        &self,
        operand: Option<&Expr>,
        conditions: &[(Expr, Expr)],
        else_result: Option<&Expr>,
        scope: &Scope,
    ) -> SqlResult<ResolvedExpr> {
        let operand = operand.map(|o| self.resolve_expr(o, scope)).transpose()?;

        let mut resolved = Vec::with_capacity(conditions.len());
        for (when, then) in conditions {
            let when = self.resolve_expr(when, scope)?;
            match &operand {
                Some(op) => TypeChecker::check_comparable(op, &when)?,
                None => TypeChecker::check_is_boolean(&when)?,
            }
            let then = self.resolve_expr(then, scope)?;
            resolved.push((when, then));
        }
        let else_result = else_result.map(|e| self.resolve_expr(e, scope)).transpose()?;

        let mut branch_types: Vec<RelTypeRef> = resolved
            .iter()
            .map(|(_, then)| Arc::clone(then.data_type()))
            .collect();
        if let Some(e) = &else_result {
            branch_types.push(Arc::clone(e.data_type()));
        }
        let ty = self.factory.least_restrictive(&branch_types).ok_or_else(|| {
            SqlError::InvalidOperation("CASE branches have no common type".to_string())
        })?;
        let result_type = self
            .factory
            .create_type_with_nullability(&ty, ty.is_nullable() || else_result.is_none());

        Ok(ResolvedExpr::Case {
            operand: operand.map(Box::new),
            conditions: resolved,
            else_result: else_result.map(Box::new),
            result_type,
        })
    }
}

/// Select-list position named by a positive integer literal
fn ordinal_target(expr: &Expr, columns: &[ResolvedSelectItem]) -> SqlResult<Option<usize>> {
    let Expr::Literal(Literal::Integer(n)) = expr else {
        return Ok(None);
    };
    match usize::try_from(*n) {
        Ok(n) if n >= 1 && n <= columns.len() => Ok(Some(n - 1)),
        _ => Err(SqlError::InvalidOperation(format!(
            "Ordinal {} is out of range (select list has {} items)",
            n,
            columns.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{test_reader, test_validator, validate_sql, validate_with};

    fn select(query: ValidatedQuery) -> ResolvedSelect {
        match query {
            ValidatedQuery::Select(select) => *select,
            _ => panic!("Expected Select"),
        }
    }

    #[test]
    fn test_resolve_select() {
        let s = select(validate_sql("SELECT id, total FROM orders WHERE id > 1").unwrap());
        assert_eq!(s.row_type.field_names(), vec!["id", "total"]);
        assert_eq!(s.row_type.to_string(), "RecordType(INTEGER NOT NULL id, DOUBLE total)");
        assert!(s.filter.is_some());

        match &s.columns[1].expr {
            ResolvedExpr::Column(col) => {
                assert_eq!(col.table, "orders");
                assert_eq!(col.index, 2);
            }
            _ => panic!("Expected Column"),
        }
    }

    #[test]
    fn test_column_type_is_catalog_type() {
        let reader = Arc::new(test_reader());
        let factory = Arc::clone(reader.type_factory());
        let validator = SqlValidator::new(
            OperatorTable::standard(),
            Arc::clone(&reader),
            factory,
            Conformance::default(),
        );
        let query = crate::sql::Parser::parse_one("SELECT id FROM orders").unwrap();
        let validated = validator.validate(&query).unwrap();

        let orders = reader
            .get_table(&["orders".to_string()])
            .unwrap()
            .unwrap();
        assert!(Arc::ptr_eq(
            &validated.row_type().fields()[0].data_type,
            &orders.row_type.fields()[0].data_type
        ));
    }

    #[test]
    fn test_resolve_errors() {
        assert!(matches!(
            validate_sql("SELECT * FROM nonexistent"),
            Err(SqlError::TableNotFound(_))
        ));
        assert!(matches!(
            validate_sql("SELECT nonexistent FROM orders"),
            Err(SqlError::ColumnNotFound(_))
        ));
        assert!(matches!(
            validate_sql("SELECT id FROM orders o JOIN users u ON o.user_id = u.id"),
            Err(SqlError::AmbiguousColumn(_))
        ));
        assert!(matches!(
            validate_sql("SELECT x.id FROM orders o"),
            Err(SqlError::TableNotFound(_))
        ));
        assert!(matches!(
            validate_sql("SELECT o.id FROM orders o, users o"),
            Err(SqlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_case_insensitive_names() {
        let s = select(validate_sql("SELECT ID, O.Total FROM ORDERS o").unwrap());
        assert_eq!(s.row_type.field_names(), vec!["id", "total"]);
    }

    #[test]
    fn test_wildcard_expansion_order() {
        let s = select(
            validate_sql("SELECT * FROM orders o JOIN users u ON o.user_id = u.id").unwrap(),
        );
        assert_eq!(
            s.row_type.field_names(),
            vec!["id", "user_id", "total", "id0", "name"]
        );

        let s = select(
            validate_sql("SELECT u.* FROM orders o JOIN users u ON o.user_id = u.id").unwrap(),
        );
        match &s.columns[0].expr {
            ResolvedExpr::Column(col) => assert_eq!(col.index, 3),
            _ => panic!("Expected Column"),
        }
    }

    #[test]
    fn test_outer_join_nullability() {
        let s = select(
            validate_sql("SELECT u.id, o.id FROM orders o LEFT JOIN users u ON o.user_id = u.id")
                .unwrap(),
        );
        assert!(s.columns[0].expr.is_nullable());
        assert!(!s.columns[1].expr.is_nullable());
        assert_eq!(s.row_type.field_names(), vec!["id", "id0"]);

        let s = select(
            validate_sql("SELECT o.id FROM orders o FULL JOIN users u ON o.user_id = u.id")
                .unwrap(),
        );
        assert!(s.columns[0].expr.is_nullable());
    }

    #[test]
    fn test_derived_table() {
        let s = select(
            validate_sql("SELECT t.n FROM (SELECT id AS n FROM orders) t WHERE t.n > 0").unwrap(),
        );
        assert_eq!(s.from[0].source.alias, "t");
        assert!(matches!(s.from[0].source.kind, SourceKind::Subquery(_)));
    }

    #[test]
    fn test_view_is_resolved_as_relation() {
        let s = select(validate_sql("SELECT * FROM v").unwrap());
        match &s.from[0].source.kind {
            SourceKind::Table(t) => {
                assert!(t.is_view());
                assert_eq!(t.qualified_name, vec!["hive", "default", "v"]);
            }
            _ => panic!("Expected Table"),
        }
        assert_eq!(s.row_type.to_string(), "RecordType(INTEGER NOT NULL id)");
    }

    #[test]
    fn test_generated_names() {
        let s = select(validate_sql("SELECT id + 1, total * 2, id AS x FROM orders").unwrap());
        assert_eq!(s.row_type.field_names(), vec!["EXPR$0", "EXPR$1", "x"]);
    }

    #[test]
    fn test_functions() {
        let s = select(validate_sql("SELECT COUNT(*), MAX(total) FROM orders").unwrap());
        assert_eq!(s.columns[0].expr.data_type().to_string(), "BIGINT NOT NULL");
        assert!(s.columns[0].expr.is_aggregate());

        let s = select(validate_sql("SELECT normalize(total) FROM orders").unwrap());
        assert_eq!(s.columns[0].expr.data_type().to_string(), "STRING");

        assert!(matches!(
            validate_sql("SELECT no_such_fn(id) FROM orders"),
            Err(SqlError::FunctionNotFound(_))
        ));
        assert!(matches!(
            validate_sql("SELECT normalize(id, total) FROM orders"),
            Err(SqlError::WrongArgumentCount { .. })
        ));
        assert!(matches!(
            validate_sql("SELECT SUM(id, total) FROM orders"),
            Err(SqlError::WrongArgumentCount { .. })
        ));
    }

    #[test]
    fn test_aggregate_placement() {
        assert!(matches!(
            validate_sql("SELECT id FROM orders WHERE COUNT(*) > 1"),
            Err(SqlError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_sql("SELECT SUM(COUNT(*)) FROM orders"),
            Err(SqlError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_sql("SELECT SUM(name) FROM users"),
            Err(SqlError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(
            validate_sql("SELECT name + 1 FROM users"),
            Err(SqlError::TypeMismatch { .. })
        ));
        assert!(matches!(
            validate_sql("SELECT id FROM users WHERE name = 1"),
            Err(SqlError::TypeMismatch { .. })
        ));
        assert!(validate_sql("SELECT id FROM users WHERE name LIKE 'a%'").is_ok());
    }

    #[test]
    fn test_order_by_alias_depends_on_conformance() {
        let sql = "SELECT total AS id, id AS total FROM orders ORDER BY id";

        let pragmatic = select(validate_with(sql, Conformance::Pragmatic2003).unwrap());
        assert_eq!(pragmatic.order_by[0].select_index, Some(1));

        let lenient = select(validate_with(sql, Conformance::Lenient).unwrap());
        assert_eq!(lenient.order_by[0].select_index, Some(0));
    }

    #[test]
    fn test_order_by_ordinal_and_hidden_expression() {
        let s = select(validate_sql("SELECT id, total FROM orders ORDER BY 2 DESC").unwrap());
        assert_eq!(s.order_by[0].select_index, Some(1));
        assert!(!s.order_by[0].ascending);
        assert!(s.order_by[0].nulls_first);

        let s = select(validate_sql("SELECT id FROM orders ORDER BY total").unwrap());
        assert_eq!(s.order_by[0].select_index, None);

        assert!(matches!(
            validate_sql("SELECT DISTINCT id FROM orders ORDER BY total"),
            Err(SqlError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_sql("SELECT id FROM orders ORDER BY 3"),
            Err(SqlError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_group_by_ordinal_and_alias_lenient_only() {
        let sql = "SELECT user_id AS u, COUNT(*) FROM orders GROUP BY u";
        assert!(matches!(
            validate_with(sql, Conformance::Pragmatic2003),
            Err(SqlError::ColumnNotFound(_))
        ));
        let s = select(validate_with(sql, Conformance::Lenient).unwrap());
        assert_eq!(s.group_by.len(), 1);

        let s = select(
            validate_with("SELECT user_id, COUNT(*) FROM orders GROUP BY 1", Conformance::Lenient)
                .unwrap(),
        );
        assert!(matches!(s.group_by[0], ResolvedExpr::Column(_)));
    }

    #[test]
    fn test_union() {
        let q = validate_sql("SELECT id FROM orders UNION ALL SELECT id FROM users").unwrap();
        match &q {
            ValidatedQuery::Union { all, row_type, .. } => {
                assert!(*all);
                assert_eq!(row_type.field_names(), vec!["id"]);
            }
            _ => panic!("Expected Union"),
        }

        assert!(matches!(
            validate_sql("SELECT id, total FROM orders UNION SELECT id FROM users"),
            Err(SqlError::InvalidOperation(_))
        ));
        assert!(matches!(
            validate_sql("SELECT id FROM orders UNION SELECT name FROM users"),
            Err(SqlError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_in_schema() {
        let validator = test_validator(Conformance::default());
        let query = crate::sql::Parser::parse_one("SELECT amount FROM invoices").unwrap();
        assert!(matches!(
            validator.validate(&query),
            Err(SqlError::TableNotFound(_))
        ));
        let path = vec!["hive".to_string(), "sales".to_string()];
        assert!(validator.validate_in_schema(&query, &path).is_ok());
    }

    #[test]
    fn test_select_without_from() {
        let s = select(validate_sql("SELECT 1 + 2 AS three").unwrap());
        assert!(s.from.is_empty());
        assert_eq!(s.row_type.to_string(), "RecordType(INTEGER NOT NULL three)");
    }
}
