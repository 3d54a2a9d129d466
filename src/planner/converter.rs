//! SQL-to-relational converter
//!
//! Turns a validated query into a relational-algebra tree:
//!
//! ```text
//! FROM entries      → Scan / expanded view / subquery, joined left-deep
//! WHERE             → Filter
//! GROUP BY, aggs    → Project (keys, arguments) → Aggregate
//! HAVING            → Filter over the aggregate
//! SELECT list       → Project (plus hidden ORDER BY keys)
//! DISTINCT          → Distinct
//! ORDER BY          → Sort
//! LIMIT / OFFSET    → Limit
//! ```
//!
//! Column references in the validated query are positions in the row the
//! FROM clause produces (join conditions: in the row of their own FROM
//! entry), so they map one-to-one onto input references.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::catalog::{CatalogReader, ResolvedTable};
use crate::config::ConverterConfig;
use crate::context::view::{ViewExpander, ViewExpansion};
use crate::planner::cluster::Cluster;
use crate::planner::convertlet::ConvertletTable;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::builder::uniquify_names;
use crate::planner::logical::{
    AggregateCall, FieldCollation, RelBuilder, RelNode, RelRoot, RelTypeRef, RexBuilder, RexNode,
    RexOp,
};
use crate::sql::ast::{
    BinaryOp, JoinType, ResolvedExpr, ResolvedFrom, ResolvedSelect, ResolvedSource, SourceKind,
    UnaryOp, ValidatedQuery,
};
use crate::sql::error::SqlError;
use crate::sql::operators::FunctionKind;
use crate::sql::validator::SqlValidator;

/// What column references and aggregate calls read
enum Bindings<'s> {
    /// Fields of the input row
    Input(RelTypeRef),
    /// Output of an aggregate: group keys, then aggregate calls
    Aggregate {
        groups: &'s [ResolvedExpr],
        aggregates: Vec<&'s ResolvedExpr>,
        row: RelTypeRef,
    },
}

/// Converts validated SQL into relational algebra
pub struct SqlToRelConverter {
    view_expander: Box<dyn ViewExpander>,
    validator: Arc<SqlValidator>,
    catalog_reader: Arc<CatalogReader>,
    cluster: Arc<Cluster>,
    convertlets: &'static ConvertletTable,
    config: ConverterConfig,
}

impl fmt::Debug for SqlToRelConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlToRelConverter")
            .field("cluster", &self.cluster)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqlToRelConverter {
    pub fn new(
        view_expander: Box<dyn ViewExpander>,
        validator: Arc<SqlValidator>,
        catalog_reader: Arc<CatalogReader>,
        cluster: Arc<Cluster>,
        convertlets: &'static ConvertletTable,
        config: ConverterConfig,
    ) -> Self {
        Self {
            view_expander,
            validator,
            catalog_reader,
            cluster,
            convertlets,
            config,
        }
    }

    pub fn validator(&self) -> &Arc<SqlValidator> {
        &self.validator
    }

    pub fn catalog_reader(&self) -> &Arc<CatalogReader> {
        &self.catalog_reader
    }

    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    pub fn convertlet_table(&self) -> &'static ConvertletTable {
        self.convertlets
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert a validated query
    ///
    /// A top-level conversion starts a new compilation in the cluster, which
    /// resets the recorded lineage.
    pub fn convert_query(&self, query: &ValidatedQuery, top_level: bool) -> PlannerResult<RelRoot> {
        if top_level {
            self.cluster.begin_compilation();
        }
        let rel = self.convert(query, 0)?;
        if top_level {
            self.cluster.record_nodes(rel.node_count());
            let meta = self.cluster.metadata();
            debug!(
                nodes = meta.rel_nodes,
                tables = meta.tables_scanned.len(),
                views = meta.views_expanded.len(),
                "Converted query"
            );
        }
        Ok(RelRoot::new(rel, Arc::clone(query.row_type())))
    }

    /// Convert the body of a view nested `depth` levels below the top query
    pub fn convert_view_query(&self, query: &ValidatedQuery, depth: usize) -> PlannerResult<RelRoot> {
        let rel = self.convert(query, depth)?;
        Ok(RelRoot::new(rel, Arc::clone(query.row_type())))
    }

    fn rex(&self) -> &RexBuilder {
        self.cluster.rex_builder()
    }

    fn rel_builder(&self) -> RelBuilder<'_> {
        RelBuilder::new(self.cluster.rex_builder())
    }

    fn convert(&self, query: &ValidatedQuery, depth: usize) -> PlannerResult<RelNode> {
        match query {
            ValidatedQuery::Select(select) => self.convert_select(select, depth),
            ValidatedQuery::Union {
                left, right, all, ..
            } => {
                let left = self.convert(left, depth)?;
                let right = self.convert(right, depth)?;
                let mut b = self.rel_builder();
                b.push(left).push(right);
                b.union(*all, 2)?;
                b.build()
            }
        }
    }

    fn convert_select(&self, select: &ResolvedSelect, depth: usize) -> PlannerResult<RelNode> {
        let mut b = self.rel_builder();

        // FROM entries are cross-joined left to right
        if select.from.is_empty() {
            b.values_single_row();
        }
        for (i, item) in select.from.iter().enumerate() {
            self.convert_from_item(&mut b, item, depth)?;
            if i > 0 {
                b.join(JoinType::Inner, None)?;
            }
        }

        if let Some(filter) = &select.filter {
            let cond = self.convert_expr(filter, &Bindings::Input(b.peek()?.row_type()))?;
            b.filter(cond)?;
        }

        let bindings = if select.is_aggregate() {
            self.convert_aggregate(&mut b, select)?
        } else {
            Bindings::Input(b.peek()?.row_type())
        };

        if let Some(having) = &select.having {
            let cond = self.convert_expr(having, &bindings)?;
            b.filter(cond)?;
        }

        let mut exprs = Vec::with_capacity(select.columns.len());
        let mut names = Vec::with_capacity(select.columns.len());
        for column in &select.columns {
            exprs.push(self.convert_expr(&column.expr, &bindings)?);
            names.push(column.name.clone());
        }
        let visible = exprs.len();

        // Sort keys missing from the select list become hidden fields
        let mut collation = Vec::with_capacity(select.order_by.len());
        for item in &select.order_by {
            let field = match item.select_index {
                Some(i) => i,
                None => {
                    let expr = self.convert_expr(&item.expr, &bindings)?;
                    match exprs.iter().position(|e| *e == expr) {
                        Some(i) => i,
                        None => {
                            names.push(format!("EXPR${}", exprs.len()));
                            exprs.push(expr);
                            exprs.len() - 1
                        }
                    }
                }
            };
            collation.push(FieldCollation {
                field,
                ascending: item.ascending,
                nulls_first: item.nulls_first,
            });
        }

        b.project(exprs, uniquify_names(names))?;
        if select.distinct {
            b.distinct()?;
        }
        b.sort(collation)?;
        b.limit(select.offset, select.limit)?;

        if b.peek()?.row_type().field_count() > visible {
            let fields = (0..visible)
                .map(|i| b.field(i))
                .collect::<PlannerResult<Vec<_>>>()?;
            let names = select.columns.iter().map(|c| c.name.clone()).collect();
            b.project(fields, names)?;
        }

        b.build()
    }

    /// Push one FROM entry with its joins
    fn convert_from_item(
        &self,
        b: &mut RelBuilder<'_>,
        item: &ResolvedFrom,
        depth: usize,
    ) -> PlannerResult<()> {
        let source = self.convert_source(&item.source, depth)?;
        b.push(source);

        for join in &item.joins {
            let right = self.convert_source(&join.source, depth)?;
            let condition = match &join.condition {
                Some(cond) => {
                    let row = self.concat_rows(&b.peek()?.row_type(), &right.row_type());
                    Some(self.convert_expr(cond, &Bindings::Input(row))?)
                }
                None => None,
            };
            b.push(right);
            b.join(join.join_type, condition)?;
        }
        Ok(())
    }

    fn concat_rows(&self, left: &RelTypeRef, right: &RelTypeRef) -> RelTypeRef {
        let fields = left
            .fields()
            .iter()
            .chain(right.fields())
            .map(|f| (f.name.clone(), Arc::clone(&f.data_type)))
            .collect();
        self.cluster.type_factory().create_struct_type(fields)
    }

    fn convert_source(&self, source: &ResolvedSource, depth: usize) -> PlannerResult<RelNode> {
        match &source.kind {
            SourceKind::Subquery(query) => self.convert(query, depth),
            SourceKind::Table(table) if table.is_view() && self.config.expand_views => {
                self.expand_view(table, depth)
            }
            SourceKind::Table(table) => {
                self.cluster.record_scan(&table.qualified_name);
                Ok(RelNode::Scan {
                    table: table.qualified_name.clone(),
                    row_type: Arc::clone(&table.row_type),
                    filter: None,
                })
            }
        }
    }

    fn expand_view(&self, table: &ResolvedTable, depth: usize) -> PlannerResult<RelNode> {
        let view = table.display_name();
        let depth = depth + 1;
        if depth > self.config.max_view_depth {
            return Err(PlannerError::ViewDepthExceeded {
                view,
                depth: self.config.max_view_depth,
            });
        }
        let sql = table.def.view_definition().ok_or_else(|| {
            PlannerError::Internal(format!("view {} has no definition", view))
        })?;

        self.cluster.record_view_expansion(&table.qualified_name);
        let root = self.view_expander.expand_view(ViewExpansion {
            view_path: table.qualified_name.clone(),
            schema_path: table.schema_path().to_vec(),
            sql: sql.to_string(),
            row_type: Arc::clone(&table.row_type),
            depth,
        })?;

        self.reconcile_view(root.rel, &table.row_type, &view)
    }

    /// Rename and cast an expanded view to its declared row type
    fn reconcile_view(
        &self,
        rel: RelNode,
        declared: &RelTypeRef,
        view: &str,
    ) -> PlannerResult<RelNode> {
        let actual = rel.row_type();
        if actual == *declared {
            return Ok(rel);
        }
        if actual.field_count() != declared.field_count() {
            return Err(PlannerError::ViewExpansion {
                view: view.to_string(),
                reason: format!(
                    "definition produces {} columns but {} are declared",
                    actual.field_count(),
                    declared.field_count()
                ),
            });
        }

        let rex = self.rex();
        let mut exprs = Vec::with_capacity(declared.field_count());
        for field in declared.fields() {
            let input = rex.make_input_ref(&actual, field.index)?;
            exprs.push(rex.make_cast(input, Arc::clone(&field.data_type)));
        }
        let names = declared
            .field_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut b = self.rel_builder();
        b.push(rel);
        b.project(exprs, names)?;
        b.build()
    }

    /// Push the pre-projection and aggregate of an aggregating SELECT
    fn convert_aggregate<'s>(
        &self,
        b: &mut RelBuilder<'_>,
        select: &'s ResolvedSelect,
    ) -> PlannerResult<Bindings<'s>> {
        let input_row = b.peek()?.row_type();
        let input = Bindings::Input(Arc::clone(&input_row));

        let mut calls = Vec::new();
        for column in &select.columns {
            collect_aggregates(&column.expr, &mut calls);
        }
        if let Some(having) = &select.having {
            collect_aggregates(having, &mut calls);
        }
        for item in &select.order_by {
            collect_aggregates(&item.expr, &mut calls);
        }

        // Group keys first, then aggregate arguments
        let mut pre_exprs = Vec::new();
        for key in &select.group_by {
            pre_exprs.push(self.convert_expr(key, &input)?);
        }
        let group_count = pre_exprs.len();

        let mut agg_calls = Vec::with_capacity(calls.len());
        for (i, call) in calls.iter().enumerate() {
            let ResolvedExpr::Function {
                kind: FunctionKind::Aggregate(func),
                args,
                distinct,
                result_type,
                ..
            } = call
            else {
                return Err(PlannerError::Internal(format!(
                    "{} is not an aggregate call",
                    call
                )));
            };

            let mut arg_fields = Vec::with_capacity(args.len());
            for arg in args {
                let arg = self.convert_expr(arg, &input)?;
                let pos = match pre_exprs.iter().position(|e| *e == arg) {
                    Some(pos) => pos,
                    None => {
                        pre_exprs.push(arg);
                        pre_exprs.len() - 1
                    }
                };
                arg_fields.push(pos);
            }

            let name = select
                .columns
                .iter()
                .find(|c| c.expr == **call)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("$f{}", group_count + i));
            agg_calls.push(AggregateCall {
                func: *func,
                distinct: *distinct,
                args: arg_fields,
                ty: Arc::clone(result_type),
                name,
            });
        }

        if !pre_exprs.is_empty() {
            let names = pre_exprs
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    e.as_input_ref()
                        .and_then(|idx| input_row.fields().get(idx))
                        .map_or_else(|| format!("$f{}", i), |f| f.name.clone())
                })
                .collect();
            b.project(pre_exprs, uniquify_names(names))?;
        }
        b.aggregate((0..group_count).collect(), agg_calls)?;

        Ok(Bindings::Aggregate {
            groups: &select.group_by,
            aggregates: calls,
            row: b.peek()?.row_type(),
        })
    }

    /// Convert an expression against `bindings`
    fn convert_expr(&self, expr: &ResolvedExpr, bindings: &Bindings<'_>) -> PlannerResult<RexNode> {
        let rex = self.rex();

        if let Bindings::Aggregate {
            groups,
            aggregates,
            row,
        } = bindings
        {
            if let Some(i) = groups.iter().position(|g| g == expr) {
                return rex.make_input_ref(row, i);
            }
            if let Some(j) = aggregates.iter().position(|a| *a == expr) {
                return rex.make_input_ref(row, groups.len() + j);
            }
        }

        match expr {
            ResolvedExpr::Column(col) => match bindings {
                Bindings::Input(row) => rex.make_input_ref(row, col.index),
                Bindings::Aggregate { .. } => Err(PlannerError::Sql(SqlError::NotGrouped(
                    format!("{}.{}", col.table, col.name),
                ))),
            },

            ResolvedExpr::Literal { value, data_type } => {
                Ok(rex.make_typed_literal(value.clone(), Arc::clone(data_type)))
            }

            ResolvedExpr::BinaryOp {
                left,
                op,
                right,
                result_type,
            } => {
                let operands = vec![
                    self.convert_expr(left, bindings)?,
                    self.convert_expr(right, bindings)?,
                ];
                match binary_op(*op) {
                    Some(op) => Ok(rex.make_typed_call(op, operands, Arc::clone(result_type))),
                    None => self
                        .convertlets
                        .convert_call("NOT LIKE", rex, operands, result_type),
                }
            }

            ResolvedExpr::UnaryOp {
                op,
                expr,
                result_type,
            } => {
                let operand = self.convert_expr(expr, bindings)?;
                let op = match op {
                    UnaryOp::Not => RexOp::Not,
                    UnaryOp::Neg => RexOp::Negate,
                };
                Ok(rex.make_typed_call(op, vec![operand], Arc::clone(result_type)))
            }

            ResolvedExpr::Function {
                name,
                kind: FunctionKind::Aggregate(_),
                ..
            } => Err(PlannerError::InvalidPlan(format!(
                "aggregate {} outside an aggregating query",
                name
            ))),

            ResolvedExpr::Function {
                name,
                args,
                result_type,
                ..
            } => {
                let operands = self.convert_exprs(args, bindings)?;
                self.convertlets
                    .convert_call(name, rex, operands, result_type)
            }

            ResolvedExpr::IsNull {
                expr,
                negated,
                result_type,
            } => {
                let operand = self.convert_expr(expr, bindings)?;
                let op = if *negated {
                    RexOp::IsNotNull
                } else {
                    RexOp::IsNull
                };
                Ok(rex.make_typed_call(op, vec![operand], Arc::clone(result_type)))
            }

            ResolvedExpr::InList {
                expr,
                list,
                negated,
                result_type,
            } => {
                let mut operands = vec![self.convert_expr(expr, bindings)?];
                operands.extend(self.convert_exprs(list, bindings)?);
                let name = if *negated { "NOT IN" } else { "IN" };
                self.convertlets
                    .convert_call(name, rex, operands, result_type)
            }

            ResolvedExpr::Between {
                expr,
                low,
                high,
                negated,
                result_type,
            } => {
                let operands = vec![
                    self.convert_expr(expr, bindings)?,
                    self.convert_expr(low, bindings)?,
                    self.convert_expr(high, bindings)?,
                ];
                let name = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                self.convertlets
                    .convert_call(name, rex, operands, result_type)
            }

            ResolvedExpr::Cast { expr, result_type } => {
                let operand = self.convert_expr(expr, bindings)?;
                Ok(rex.make_cast(operand, Arc::clone(result_type)))
            }

            ResolvedExpr::Case {
                operand,
                conditions,
                else_result,
                result_type,
            } => {
                let operand = operand
                    .as_ref()
                    .map(|o| self.convert_expr(o, bindings))
                    .transpose()?;
                let mut operands = Vec::with_capacity(conditions.len() * 2 + 1);
                for (when, then) in conditions {
                    let when = self.convert_expr(when, bindings)?;
                    let when = match &operand {
                        Some(value) => rex.make_call(RexOp::Equals, vec![value.clone(), when])?,
                        None => when,
                    };
                    operands.push(when);
                    operands.push(self.convert_expr(then, bindings)?);
                }
                if let Some(e) = else_result {
                    operands.push(self.convert_expr(e, bindings)?);
                }
                Ok(rex.make_typed_call(RexOp::Case, operands, Arc::clone(result_type)))
            }
        }
    }

    fn convert_exprs(
        &self,
        exprs: &[ResolvedExpr],
        bindings: &Bindings<'_>,
    ) -> PlannerResult<Vec<RexNode>> {
        exprs
            .iter()
            .map(|e| self.convert_expr(e, bindings))
            .collect()
    }
}

/// Aggregate calls in `expr`, outermost first, without repeats
fn collect_aggregates<'s>(expr: &'s ResolvedExpr, out: &mut Vec<&'s ResolvedExpr>) {
    if expr.is_aggregate() {
        if !out.iter().any(|e| *e == expr) {
            out.push(expr);
        }
        return;
    }
    for child in expr.children() {
        collect_aggregates(child, out);
    }
}

/// Row-expression operator for a binary SQL operator; NOT LIKE has none
fn binary_op(op: BinaryOp) -> Option<RexOp> {
    let op = match op {
        BinaryOp::Add => RexOp::Plus,
        BinaryOp::Sub => RexOp::Minus,
        BinaryOp::Mul => RexOp::Times,
        BinaryOp::Div => RexOp::Divide,
        BinaryOp::Mod => RexOp::Mod,
        BinaryOp::Eq => RexOp::Equals,
        BinaryOp::NotEq => RexOp::NotEquals,
        BinaryOp::Lt => RexOp::LessThan,
        BinaryOp::LtEq => RexOp::LessThanOrEqual,
        BinaryOp::Gt => RexOp::GreaterThan,
        BinaryOp::GtEq => RexOp::GreaterThanOrEqual,
        BinaryOp::And => RexOp::And,
        BinaryOp::Or => RexOp::Or,
        BinaryOp::Like => RexOp::Like,
        BinaryOp::Concat => RexOp::Concat,
        BinaryOp::NotLike => return None,
    };
    Some(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Conformance, RuleId};
    use crate::planner::explain::ExplainOutput;
    use crate::planner::optimizer::Planner;
    use crate::sql::Parser;
    use crate::test_utils::test_validator;

    struct NoViews;

    impl ViewExpander for NoViews {
        fn expand_view(&self, request: ViewExpansion) -> PlannerResult<RelRoot> {
            Err(PlannerError::ViewExpansion {
                view: request.view_name(),
                reason: "views are not available".to_string(),
            })
        }
    }

    fn converter(config: ConverterConfig) -> SqlToRelConverter {
        let validator = Arc::new(test_validator(Conformance::default()));
        let reader = Arc::clone(validator.catalog_reader());
        let rex = Arc::new(RexBuilder::new(Arc::clone(validator.type_factory())));
        let cluster = Arc::new(Cluster::new(Planner::new(&RuleId::standard()), rex));
        SqlToRelConverter::new(
            Box::new(NoViews),
            validator,
            reader,
            cluster,
            ConvertletTable::standard(),
            config,
        )
    }

    fn convert(converter: &SqlToRelConverter, sql: &str) -> PlannerResult<RelRoot> {
        let query = Parser::parse_one(sql)?;
        let validated = converter.validator().validate(&query)?;
        converter.convert_query(&validated, true)
    }

    fn explain(sql: &str) -> String {
        let converter = converter(ConverterConfig::default());
        ExplainOutput::format(&convert(&converter, sql).unwrap().rel)
    }

    #[test]
    fn test_simple_projection() {
        let converter = converter(ConverterConfig::default());
        let root = convert(&converter, "SELECT id FROM orders").unwrap();
        assert_eq!(root.field_names(), vec!["id"]);
        assert_eq!(root.rel.row_type(), root.validated_row_type);
        assert_eq!(
            ExplainOutput::format(&root.rel),
            "LogicalProject(id=[$0])\n  LogicalTableScan(table=[[hive, default, orders]])\n"
        );
    }

    #[test]
    fn test_select_star_has_no_project() {
        assert_eq!(
            explain("SELECT * FROM users"),
            "LogicalTableScan(table=[[hive, default, users]])\n"
        );
    }

    #[test]
    fn test_filter_and_between() {
        assert_eq!(
            explain("SELECT id FROM orders WHERE total BETWEEN 10 AND 20"),
            "\
LogicalProject(id=[$0])
  LogicalFilter(condition=[AND(>=($2, 10), <=($2, 20))])
    LogicalTableScan(table=[[hive, default, orders]])
"
        );
    }

    #[test]
    fn test_join_condition_uses_combined_row() {
        assert_eq!(
            explain("SELECT o.id, u.name FROM orders o LEFT JOIN users u ON o.user_id = u.id"),
            "\
LogicalProject(id=[$0], name=[$4])
  LogicalJoin(condition=[=($1, $3)], joinType=[left])
    LogicalTableScan(table=[[hive, default, orders]])
    LogicalTableScan(table=[[hive, default, users]])
"
        );
    }

    #[test]
    fn test_comma_join_is_cross_product() {
        assert_eq!(
            explain("SELECT o.id FROM orders o, users u WHERE o.user_id = u.id"),
            "\
LogicalProject(id=[$0])
  LogicalFilter(condition=[=($1, $3)])
    LogicalJoin(condition=[true], joinType=[inner])
      LogicalTableScan(table=[[hive, default, orders]])
      LogicalTableScan(table=[[hive, default, users]])
"
        );
    }

    #[test]
    fn test_aggregate_with_having() {
        assert_eq!(
            explain(
                "SELECT user_id, COUNT(*) AS n FROM orders GROUP BY user_id HAVING SUM(total) > 100"
            ),
            "\
LogicalProject(user_id=[$0], n=[$1])
  LogicalFilter(condition=[>($2, 100)])
    LogicalAggregate(group=[{0}], n=[COUNT()], $f2=[SUM($1)])
      LogicalProject(user_id=[$1], total=[$2])
        LogicalTableScan(table=[[hive, default, orders]])
"
        );
    }

    #[test]
    fn test_global_aggregate() {
        let converter = converter(ConverterConfig::default());
        let root = convert(&converter, "SELECT COUNT(*) FROM orders").unwrap();
        assert_eq!(
            ExplainOutput::format(&root.rel),
            "\
LogicalAggregate(group=[{}], EXPR$0=[COUNT()])
  LogicalTableScan(table=[[hive, default, orders]])
"
        );
        assert_eq!(root.validated_row_type.to_string(), "RecordType(BIGINT NOT NULL EXPR$0)");
    }

    #[test]
    fn test_order_by_hidden_column() {
        assert_eq!(
            explain("SELECT id FROM orders ORDER BY total DESC LIMIT 5"),
            "\
LogicalProject(id=[$0])
  LogicalLimit(fetch=[5])
    LogicalSort(sort0=[$1], dir0=[DESC])
      LogicalProject(id=[$0], EXPR$1=[$2])
        LogicalTableScan(table=[[hive, default, orders]])
"
        );
    }

    #[test]
    fn test_union_all() {
        assert_eq!(
            explain("SELECT id FROM orders UNION ALL SELECT id FROM users"),
            "\
LogicalUnion(all=[true])
  LogicalProject(id=[$0])
    LogicalTableScan(table=[[hive, default, orders]])
  LogicalProject(id=[$0])
    LogicalTableScan(table=[[hive, default, users]])
"
        );
    }

    #[test]
    fn test_lineage_recorded() {
        let converter = converter(ConverterConfig::default());
        convert(&converter, "SELECT o.id FROM orders o JOIN users u ON o.user_id = u.id").unwrap();
        let meta = converter.cluster().metadata();
        assert_eq!(
            meta.tables_scanned,
            vec!["hive.default.orders", "hive.default.users"]
        );
        assert!(meta.views_expanded.is_empty());
        assert_eq!(meta.rel_nodes, 4);

        convert(&converter, "SELECT 1").unwrap();
        assert!(converter.cluster().metadata().tables_scanned.is_empty());
        assert_eq!(converter.cluster().compilations(), 2);
    }

    #[test]
    fn test_unexpanded_view_is_scanned() {
        let converter = converter(ConverterConfig {
            expand_views: false,
            ..ConverterConfig::default()
        });
        let root = convert(&converter, "SELECT * FROM v").unwrap();
        assert_eq!(
            ExplainOutput::format(&root.rel),
            "LogicalTableScan(table=[[hive, default, v]])\n"
        );
    }

    #[test]
    fn test_view_errors_propagate() {
        let converter = converter(ConverterConfig::default());
        match convert(&converter, "SELECT * FROM v") {
            Err(PlannerError::ViewExpansion { view, .. }) => assert_eq!(view, "hive.default.v"),
            _ => panic!("Expected ViewExpansion error"),
        }

        let converter = converter_with_depth(0);
        match convert(&converter, "SELECT * FROM v") {
            Err(PlannerError::ViewDepthExceeded { depth, .. }) => assert_eq!(depth, 0),
            _ => panic!("Expected ViewDepthExceeded error"),
        }
    }

    fn converter_with_depth(max_view_depth: usize) -> SqlToRelConverter {
        converter(ConverterConfig {
            max_view_depth,
            ..ConverterConfig::default()
        })
    }
}
