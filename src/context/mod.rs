//! Translation context
//!
//! `RelContextProvider` assembles, on demand and in dependency order, the
//! components a SQL-to-algebra compilation needs:
//!
//! ```text
//! SessionConfig
//!   → AlgebraBuilder (type factory, expression factory)
//!       → CatalogReader ──┐
//!       → Cluster         ├─→ SqlValidator ─→ SqlToRelConverter
//!                         └────────────────────↗   (+ ViewExpansionHook)
//! ```
//!
//! Each component is built at most once per context and the same `Arc` is
//! returned afterwards. The view expansion hook is the exception: every
//! request gets a new one.

pub mod adapter;
pub mod error;
pub mod slot;
pub mod view;

pub use adapter::SchemaAdapter;
pub use error::{Component, ContextError, ContextResult};
pub use view::{ViewCompiler, ViewExpander, ViewExpansion, ViewExpansionHook};

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::debug;

use crate::catalog::{CatalogReader, RootSchema, Schema};
use crate::config::SessionConfig;
use crate::planner::cluster::Cluster;
use crate::planner::convertlet::ConvertletTable;
use crate::planner::converter::SqlToRelConverter;
use crate::planner::error::{PlannerError, PlannerResult};
use crate::planner::logical::{AlgebraBuilder, RelRoot};
use crate::planner::optimizer::Planner;
use crate::sql::operators::OperatorTable;
use crate::sql::parser::Parser;
use crate::sql::validator::SqlValidator;

use slot::Slot;

/// Provides the components of one compilation session
pub struct RelContextProvider {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    self_ref: Weak<ContextInner>,
    config: Arc<SessionConfig>,
    schema: Arc<dyn Schema>,
    algebra_builder: Slot<AlgebraBuilder>,
    catalog_reader: Slot<CatalogReader>,
    validator: Slot<SqlValidator>,
    cluster: Slot<Cluster>,
    converter: Slot<SqlToRelConverter>,
}

impl RelContextProvider {
    /// Create a context over `schema` with the default configuration
    pub fn new(schema: Option<Arc<dyn Schema>>) -> ContextResult<Self> {
        Self::with_config(schema, SessionConfig::default())
    }

    /// Create a context over `schema` with an explicit configuration
    pub fn with_config(
        schema: Option<Arc<dyn Schema>>,
        config: SessionConfig,
    ) -> ContextResult<Self> {
        let schema = schema
            .ok_or_else(|| ContextError::InvalidArgument("schema root is required".to_string()))?;
        config.check().map_err(ContextError::InvalidArgument)?;
        debug!(
            root = %config.root_schema,
            default_database = %config.default_database,
            "Created translation context"
        );
        Ok(Self {
            inner: ContextInner::new(schema, Arc::new(config)),
        })
    }

    /// Session configuration
    pub fn config(&self) -> &Arc<SessionConfig> {
        &self.inner.config
    }

    /// Schema root this context resolves names against
    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.inner.schema
    }

    pub fn algebra_builder(&self) -> ContextResult<Arc<AlgebraBuilder>> {
        self.inner.algebra_builder()
    }

    pub fn catalog_reader(&self) -> ContextResult<Arc<CatalogReader>> {
        self.inner.catalog_reader()
    }

    pub fn validator(&self) -> ContextResult<Arc<SqlValidator>> {
        self.inner.validator()
    }

    pub fn cluster(&self) -> ContextResult<Arc<Cluster>> {
        self.inner.cluster()
    }

    /// New hook for expanding views through this context
    pub fn view_expansion_hook(&self) -> ViewExpansionHook {
        self.inner.view_expansion_hook()
    }

    pub fn converter(&self) -> ContextResult<Arc<SqlToRelConverter>> {
        self.inner.converter()
    }

    /// Parse, validate and convert one query
    pub fn compile(&self, sql: &str) -> ContextResult<RelRoot> {
        let converter = self.converter()?;
        let query = self.inner.parser().parse_query(sql)?;
        let validated = converter.validator().validate(&query)?;
        Ok(converter.convert_query(&validated, true)?)
    }

    /// Discard every built component and start a new session
    ///
    /// Components handed out earlier stay usable, but hooks and converters
    /// from before the reset can no longer expand views.
    pub fn reset(&mut self) {
        debug!(root = %self.inner.config.root_schema, "Resetting translation context");
        self.inner = ContextInner::new(
            Arc::clone(&self.inner.schema),
            Arc::clone(&self.inner.config),
        );
    }

    /// How many times a component has been built in this session
    pub fn construction_count(&self, component: Component) -> usize {
        let inner = &self.inner;
        match component {
            Component::AlgebraBuilder => inner.algebra_builder.builds(),
            Component::CatalogReader => inner.catalog_reader.builds(),
            Component::Validator => inner.validator.builds(),
            Component::Cluster => inner.cluster.builds(),
            Component::Converter => inner.converter.builds(),
        }
    }
}

impl fmt::Debug for RelContextProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelContextProvider")
            .field("config", &self.inner.config)
            .field("algebra_builder", &self.inner.algebra_builder)
            .field("catalog_reader", &self.inner.catalog_reader)
            .field("validator", &self.inner.validator)
            .field("cluster", &self.inner.cluster)
            .field("converter", &self.inner.converter)
            .finish()
    }
}

impl ContextInner {
    fn new(schema: Arc<dyn Schema>, config: Arc<SessionConfig>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| ContextInner {
            self_ref: self_ref.clone(),
            config,
            schema,
            algebra_builder: Slot::new(Component::AlgebraBuilder),
            catalog_reader: Slot::new(Component::CatalogReader),
            validator: Slot::new(Component::Validator),
            cluster: Slot::new(Component::Cluster),
            converter: Slot::new(Component::Converter),
        })
    }

    fn parser(&self) -> Parser {
        Parser::new(self.config.dialect)
    }

    fn algebra_builder(&self) -> ContextResult<Arc<AlgebraBuilder>> {
        self.algebra_builder
            .get_or_try_init(|| Ok(AlgebraBuilder::new(Arc::clone(&self.config))))
    }

    fn catalog_reader(&self) -> ContextResult<Arc<CatalogReader>> {
        self.catalog_reader.get_or_try_init(|| {
            let adapter = adapter::ensure_registered(&self.config)?;
            let algebra = self.algebra_builder()?;
            let case_sensitive = self.config.effective_case_sensitive();
            let root = RootSchema::mount(adapter.root_name.clone(), Arc::clone(&self.schema));
            debug!(
                search_path = ?adapter.search_path(),
                case_sensitive,
                "Building catalog reader"
            );
            Ok(CatalogReader::new(
                Arc::new(root),
                adapter.search_path(),
                Arc::clone(algebra.type_factory()),
                case_sensitive,
            ))
        })
    }

    fn validator(&self) -> ContextResult<Arc<SqlValidator>> {
        self.validator.get_or_try_init(|| {
            let algebra = self.algebra_builder()?;
            let reader = self.catalog_reader()?;
            if !Arc::ptr_eq(reader.type_factory(), algebra.type_factory()) {
                return Err(ContextError::not_ready(
                    Component::Validator,
                    "catalog reader and algebra builder use different type factories",
                ));
            }
            Ok(SqlValidator::new(
                OperatorTable::standard(),
                reader,
                Arc::clone(algebra.type_factory()),
                self.config.conformance,
            ))
        })
    }

    fn cluster(&self) -> ContextResult<Arc<Cluster>> {
        self.cluster.get_or_try_init(|| {
            let algebra = self.algebra_builder()?;
            Ok(Cluster::new(
                Planner::new(&self.config.rules),
                Arc::clone(algebra.rex_builder()),
            ))
        })
    }

    fn view_expansion_hook(&self) -> ViewExpansionHook {
        let compiler: Weak<dyn ViewCompiler> = self.self_ref.clone();
        ViewExpansionHook::new(compiler)
    }

    fn converter(&self) -> ContextResult<Arc<SqlToRelConverter>> {
        self.converter.get_or_try_init(|| {
            let validator = self.validator()?;
            let reader = self.catalog_reader()?;
            let cluster = self.cluster()?;
            Ok(SqlToRelConverter::new(
                Box::new(self.view_expansion_hook()),
                validator,
                reader,
                cluster,
                ConvertletTable::standard(),
                self.config.converter.clone(),
            ))
        })
    }
}

impl ViewCompiler for ContextInner {
    fn compile_view(&self, request: &ViewExpansion) -> PlannerResult<RelRoot> {
        let failed = |reason: String| PlannerError::ViewExpansion {
            view: request.view_name(),
            reason,
        };
        let converter = self.converter().map_err(|e| failed(e.to_string()))?;
        let query = self
            .parser()
            .parse_query(&request.sql)
            .map_err(|e| failed(e.to_string()))?;
        let validated = converter
            .validator()
            .validate_in_schema(&query, &request.schema_path)
            .map_err(|e| failed(e.to_string()))?;
        converter.convert_view_query(&validated, request.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_schema;

    fn context() -> RelContextProvider {
        RelContextProvider::new(Some(test_schema())).unwrap()
    }

    #[test]
    fn test_getters_are_memoized() {
        let ctx = context();
        assert!(Arc::ptr_eq(
            &ctx.algebra_builder().unwrap(),
            &ctx.algebra_builder().unwrap()
        ));
        assert!(Arc::ptr_eq(&ctx.validator().unwrap(), &ctx.validator().unwrap()));
        assert!(Arc::ptr_eq(&ctx.cluster().unwrap(), &ctx.cluster().unwrap()));
        assert!(Arc::ptr_eq(&ctx.converter().unwrap(), &ctx.converter().unwrap()));
    }

    #[test]
    fn test_dependencies_share_one_type_factory() {
        let ctx = context();
        let converter = ctx.converter().unwrap();
        let algebra = ctx.algebra_builder().unwrap();
        assert!(Arc::ptr_eq(
            converter.catalog_reader().type_factory(),
            algebra.type_factory()
        ));
        assert!(Arc::ptr_eq(
            converter.validator().type_factory(),
            algebra.type_factory()
        ));
        assert!(Arc::ptr_eq(converter.cluster().type_factory(), algebra.type_factory()));
        assert!(Arc::ptr_eq(converter.cluster(), &ctx.cluster().unwrap()));
    }

    #[test]
    fn test_missing_schema() {
        match RelContextProvider::new(None) {
            Err(ContextError::InvalidArgument(_)) => {}
            _ => panic!("Expected InvalidArgument"),
        }
    }

    #[test]
    fn test_invalid_config() {
        let config = SessionConfig::default().with_root_schema("");
        match RelContextProvider::with_config(Some(test_schema()), config) {
            Err(ContextError::InvalidArgument(msg)) => assert!(msg.contains("root schema")),
            _ => panic!("Expected InvalidArgument"),
        }
    }

    #[test]
    fn test_compile_expands_view() {
        let ctx = context();
        let root = ctx.compile("SELECT * FROM v").unwrap();
        assert_eq!(root.field_names(), vec!["id"]);
        let meta = ctx.cluster().unwrap().metadata();
        assert_eq!(meta.views_expanded, vec!["hive.default.v"]);
        assert_eq!(meta.tables_scanned, vec!["hive.default.orders"]);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut ctx = context();
        let before = ctx.converter().unwrap();
        ctx.reset();
        assert_eq!(ctx.construction_count(Component::Converter), 0);

        let after = ctx.converter().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert!(!Arc::ptr_eq(
            before.cluster().type_factory(),
            after.cluster().type_factory()
        ));
    }
}
