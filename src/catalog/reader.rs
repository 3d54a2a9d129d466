//! Catalog reader
//!
//! Resolves qualified names against a schema root. Unqualified and partially
//! qualified names are tried under the full search path first, then under
//! each shorter prefix of it, down to the root itself.

use std::sync::Arc;

use crate::catalog::{FunctionDef, Schema, TableDef};
use crate::planner::logical::types::{RelTypeRef, TypeFactory};
use crate::sql::error::{SqlError, SqlResult};

/// Identifier comparison policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameMatcher {
    case_sensitive: bool,
}

impl NameMatcher {
    /// Create a matcher
    pub fn new(case_sensitive: bool) -> Self {
        Self { case_sensitive }
    }

    /// Whether names compare case-sensitively
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Compare two identifiers
    pub fn matches(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Position of the candidate that matches `name`
    ///
    /// An exact match always wins. Otherwise at most one case-folded match
    /// may exist; `Err` carries the match count when there are several.
    pub fn position<'c>(
        &self,
        candidates: impl IntoIterator<Item = &'c str>,
        name: &str,
    ) -> Result<Option<usize>, usize> {
        let mut folded = Vec::new();
        for (idx, candidate) in candidates.into_iter().enumerate() {
            if candidate == name {
                return Ok(Some(idx));
            }
            if self.matches(candidate, name) {
                folded.push(idx);
            }
        }
        match folded.len() {
            0 => Ok(None),
            1 => Ok(Some(folded[0])),
            n => Err(n),
        }
    }
}

/// Table or view found in the catalog
#[derive(Debug, Clone)]
pub struct ResolvedTable {
    /// Fully qualified path from the top-level root, using catalog spelling
    pub qualified_name: Vec<String>,
    /// Definition as stored in the schema
    pub def: Arc<TableDef>,
    /// Row type built by the session's type factory
    pub row_type: RelTypeRef,
}

impl ResolvedTable {
    /// Unqualified name
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Path of the schema containing this table
    pub fn schema_path(&self) -> &[String] {
        let len = self.qualified_name.len();
        &self.qualified_name[..len.saturating_sub(1)]
    }

    /// Check if this is a view
    pub fn is_view(&self) -> bool {
        self.def.view_definition().is_some()
    }

    /// Dotted qualified name
    pub fn display_name(&self) -> String {
        self.qualified_name.join(".")
    }
}

/// Resolves names against a schema root
#[derive(Debug, Clone)]
pub struct CatalogReader {
    root: Arc<dyn Schema>,
    search_path: Vec<String>,
    type_factory: Arc<TypeFactory>,
    matcher: NameMatcher,
}

impl CatalogReader {
    /// Create a reader over `root` with the given default search path
    pub fn new(
        root: Arc<dyn Schema>,
        search_path: Vec<String>,
        type_factory: Arc<TypeFactory>,
        case_sensitive: bool,
    ) -> Self {
        Self {
            root,
            search_path,
            type_factory,
            matcher: NameMatcher::new(case_sensitive),
        }
    }

    /// Reader over the same root and type factory with a different search path
    pub fn with_schema_path(&self, schema_path: Vec<String>) -> Self {
        Self {
            root: Arc::clone(&self.root),
            search_path: schema_path,
            type_factory: Arc::clone(&self.type_factory),
            matcher: self.matcher,
        }
    }

    /// Default search path
    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// Type factory row types are built with
    pub fn type_factory(&self) -> &Arc<TypeFactory> {
        &self.type_factory
    }

    /// Identifier comparison policy
    pub fn name_matcher(&self) -> NameMatcher {
        self.matcher
    }

    /// Top-level namespace
    pub fn root_schema(&self) -> &Arc<dyn Schema> {
        &self.root
    }

    /// Look up a table or view by (possibly partially) qualified name
    pub fn get_table(&self, names: &[String]) -> SqlResult<Option<ResolvedTable>> {
        let Some((last, parents)) = names.split_last() else {
            return Ok(None);
        };

        for prefix in self.prefixes() {
            let mut path: Vec<String> = prefix.to_vec();
            path.extend(parents.iter().cloned());

            let Some((schema, mut resolved_path)) = self.navigate(&path)? else {
                continue;
            };

            let table_names = schema.table_names();
            let idx = self
                .matcher
                .position(table_names.iter().map(String::as_str), last)
                .map_err(|_| SqlError::AmbiguousName(names.join(".")))?;

            if let Some(idx) = idx {
                let actual = &table_names[idx];
                if let Some(def) = schema.table(actual) {
                    resolved_path.push(actual.clone());
                    let row_type = self.row_type_of(&def);
                    return Ok(Some(ResolvedTable {
                        qualified_name: resolved_path,
                        def,
                        row_type,
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Look up a user-defined function visible from the search path
    pub fn get_function(&self, name: &str) -> SqlResult<Option<Arc<FunctionDef>>> {
        for prefix in self.prefixes() {
            let Some((schema, _)) = self.navigate(prefix)? else {
                continue;
            };
            let function_names = schema.function_names();
            let idx = self
                .matcher
                .position(function_names.iter().map(String::as_str), name)
                .map_err(|_| SqlError::AmbiguousName(name.to_string()))?;
            if let Some(idx) = idx {
                if let Some(def) = schema.function(&function_names[idx]) {
                    return Ok(Some(def));
                }
            }
        }
        Ok(None)
    }

    /// Row type of a table definition
    pub fn row_type_of(&self, def: &TableDef) -> RelTypeRef {
        let fields = def
            .columns
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    self.type_factory
                        .create_scalar(c.data_type.clone(), c.nullable),
                )
            })
            .collect();
        self.type_factory.create_struct_type(fields)
    }

    /// Search path prefixes, longest first, ending with the root itself
    fn prefixes(&self) -> impl Iterator<Item = &[String]> {
        (0..=self.search_path.len())
            .rev()
            .map(move |n| &self.search_path[..n])
    }

    /// Walk from the root along `path`, returning the schema and its catalog spelling
    fn navigate(&self, path: &[String]) -> SqlResult<Option<(Arc<dyn Schema>, Vec<String>)>> {
        let mut schema = Arc::clone(&self.root);
        let mut resolved = Vec::with_capacity(path.len());

        for segment in path {
            let names = schema.sub_schema_names();
            let idx = self
                .matcher
                .position(names.iter().map(String::as_str), segment)
                .map_err(|_| SqlError::AmbiguousName(path.join(".")))?;
            let Some(idx) = idx else {
                return Ok(None);
            };
            let Some(child) = schema.sub_schema(&names[idx]) else {
                return Ok(None);
            };
            resolved.push(names[idx].clone());
            schema = child;
        }

        Ok(Some((schema, resolved)))
    }
}
