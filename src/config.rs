//! Session configuration
//!
//! Settings resolved once when a translation context is created. Every
//! component the context builds reads them; none of them mutates them.

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{
    AnsiDialect, Dialect, GenericDialect, HiveDialect, MySqlDialect, PostgreSqlDialect,
};

/// Well-known identifier the schema root is mounted under
pub const DEFAULT_ROOT_SCHEMA: &str = "hive";

/// Database searched for unqualified table names
pub const DEFAULT_DATABASE: &str = "default";

/// Maximum nesting of view definitions expanded inside one compilation
pub const DEFAULT_MAX_VIEW_DEPTH: usize = 32;

/// Identifier of an optimization rule the planner can be seeded with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Combine stacked filters into one conjunction
    FilterMerge,
    /// Push filter predicates into table scans
    PredicatePushdown,
    /// Collapse a projection sitting directly on another projection
    ProjectMerge,
}

impl RuleId {
    /// The standard rule set, in application order
    pub fn standard() -> Vec<RuleId> {
        vec![
            RuleId::FilterMerge,
            RuleId::PredicatePushdown,
            RuleId::ProjectMerge,
        ]
    }

    /// Rule name as reported by the planner
    pub fn name(&self) -> &'static str {
        match self {
            RuleId::FilterMerge => "filter_merge",
            RuleId::PredicatePushdown => "predicate_pushdown",
            RuleId::ProjectMerge => "project_merge",
        }
    }
}

/// SQL conformance level the validator enforces
///
/// Only the behaviors the validator actually consults are modelled; each
/// level answers the same questions the way the corresponding standard
/// (or its pragmatic relaxation) does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conformance {
    /// Historical default behavior
    Default,
    /// Strict SQL:92
    Strict92,
    /// Strict SQL:2003
    Strict2003,
    /// SQL:2003 with the common extensions most engines accept
    #[default]
    Pragmatic2003,
    /// Accept everything that is not ambiguous
    Lenient,
}

impl Conformance {
    /// Whether `GROUP BY x` may refer to a select-list alias `x`
    pub fn is_group_by_alias(&self) -> bool {
        matches!(self, Conformance::Lenient)
    }

    /// Whether `GROUP BY 2` refers to the second select-list item
    pub fn is_group_by_ordinal(&self) -> bool {
        matches!(self, Conformance::Lenient)
    }

    /// Whether `ORDER BY x` prefers the select-list alias `x` over a column `x`
    pub fn is_sort_by_alias(&self) -> bool {
        matches!(
            self,
            Conformance::Default | Conformance::Strict92 | Conformance::Lenient
        )
    }

    /// Whether `ORDER BY 2` refers to the second select-list item
    pub fn is_sort_by_ordinal(&self) -> bool {
        !matches!(self, Conformance::Strict2003)
    }

    /// Whether `HAVING x` may refer to a select-list alias `x`
    pub fn is_having_alias(&self) -> bool {
        matches!(self, Conformance::Lenient)
    }
}

/// Grammar the external SQL parser is driven with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlDialect {
    #[default]
    Hive,
    Generic,
    Ansi,
    MySql,
    PostgreSql,
}

impl SqlDialect {
    /// Instantiate the parser dialect
    pub fn parser_dialect(&self) -> Box<dyn Dialect> {
        match self {
            SqlDialect::Hive => Box::new(HiveDialect {}),
            SqlDialect::Generic => Box::new(GenericDialect {}),
            SqlDialect::Ansi => Box::new(AnsiDialect {}),
            SqlDialect::MySql => Box::new(MySqlDialect {}),
            SqlDialect::PostgreSql => Box::new(PostgreSqlDialect {}),
        }
    }
}

/// Connection-style overrides
///
/// When present these take precedence over the session defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Override for identifier case sensitivity
    pub case_sensitive: Option<bool>,
}

/// Settings for the SQL-to-algebra converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Maximum depth of nested view expansion
    pub max_view_depth: usize,
    /// Expand views into their definitions; otherwise scan them by name
    pub expand_views: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            max_view_depth: DEFAULT_MAX_VIEW_DEPTH,
            expand_views: true,
        }
    }
}

/// Immutable per-session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Identifier the schema root is mounted under
    pub root_schema: String,
    /// Database searched for unqualified names
    pub default_database: String,
    /// Whether identifiers match case-sensitively
    pub case_sensitive: bool,
    /// Rules pre-registered with the planner, in order
    pub rules: Vec<RuleId>,
    /// Conformance level for validation
    pub conformance: Conformance,
    /// Dialect of the external parser
    pub dialect: SqlDialect,
    /// Optional connection-style overrides
    pub connection: Option<ConnectionConfig>,
    /// Converter settings
    pub converter: ConverterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            root_schema: DEFAULT_ROOT_SCHEMA.to_string(),
            default_database: DEFAULT_DATABASE.to_string(),
            case_sensitive: false,
            rules: RuleId::standard(),
            conformance: Conformance::default(),
            dialect: SqlDialect::default(),
            connection: None,
            converter: ConverterConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root schema identifier
    #[must_use]
    pub fn with_root_schema(mut self, name: impl Into<String>) -> Self {
        self.root_schema = name.into();
        self
    }

    /// Set the default database
    #[must_use]
    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }

    /// Set default case sensitivity
    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Replace the rule set
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<RuleId>) -> Self {
        self.rules = rules;
        self
    }

    /// Set the conformance level
    #[must_use]
    pub fn with_conformance(mut self, conformance: Conformance) -> Self {
        self.conformance = conformance;
        self
    }

    /// Set the parser dialect
    #[must_use]
    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Attach connection-style overrides
    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Replace the converter settings
    #[must_use]
    pub fn with_converter(mut self, converter: ConverterConfig) -> Self {
        self.converter = converter;
        self
    }

    /// Case sensitivity after applying connection overrides
    pub fn effective_case_sensitive(&self) -> bool {
        self.connection
            .as_ref()
            .and_then(|c| c.case_sensitive)
            .unwrap_or(self.case_sensitive)
    }

    /// Check the settings that every component relies on
    pub fn check(&self) -> Result<(), String> {
        if self.root_schema.is_empty() {
            return Err("root schema name must not be empty".to_string());
        }
        if self.default_database.is_empty() {
            return Err("default database name must not be empty".to_string());
        }
        if self.converter.max_view_depth == 0 {
            return Err("max view depth must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.root_schema, "hive");
        assert_eq!(config.default_database, "default");
        assert!(!config.case_sensitive);
        assert_eq!(config.conformance, Conformance::Pragmatic2003);
        assert_eq!(config.rules, RuleId::standard());
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_connection_override_wins() {
        let config = SessionConfig::new().with_connection(ConnectionConfig {
            case_sensitive: Some(true),
        });
        assert!(config.effective_case_sensitive());

        let config = SessionConfig::new()
            .case_sensitive(true)
            .with_connection(ConnectionConfig::default());
        assert!(config.effective_case_sensitive());
    }

    #[test]
    fn test_check_rejects_empty_names() {
        assert!(SessionConfig::new().with_root_schema("").check().is_err());
        assert!(SessionConfig::new()
            .with_default_database("")
            .check()
            .is_err());
    }

    #[test]
    fn test_conformance_table() {
        let pragmatic = Conformance::Pragmatic2003;
        assert!(!pragmatic.is_group_by_alias());
        assert!(pragmatic.is_sort_by_ordinal());
        assert!(!pragmatic.is_sort_by_alias());

        assert!(Conformance::Lenient.is_group_by_ordinal());
        assert!(!Conformance::Strict2003.is_sort_by_ordinal());
    }
}
