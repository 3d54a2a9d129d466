//! Catalog - schema namespaces (databases, tables, views, functions)
//!
//! The schema root handed to a translation context is an externally owned
//! namespace tree. This module defines the `Schema` trait the context reads it
//! through, an in-memory implementation, and the `CatalogReader` that
//! resolves qualified names against a mounted root.

pub mod reader;

pub use reader::{CatalogReader, NameMatcher, ResolvedTable};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// SQL data types
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Type of the untyped NULL literal
    Null,
    /// Boolean (true/false)
    Boolean,
    /// 8-bit signed integer
    TinyInt,
    /// 16-bit signed integer
    SmallInt,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    BigInt,
    /// 32-bit floating point
    Float,
    /// 64-bit floating point
    Double,
    /// Variable-length string with max length
    Varchar(u32),
    /// Unlimited text
    Text,
    /// Binary data
    Blob,
    /// Calendar date
    Date,
    /// Timestamp (date and time)
    Timestamp,
}

impl DataType {
    /// Check if this type is numeric
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt
                | DataType::SmallInt
                | DataType::Int
                | DataType::BigInt
                | DataType::Float
                | DataType::Double
        )
    }

    /// Check if this type is an integer
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::TinyInt | DataType::SmallInt | DataType::Int | DataType::BigInt
        )
    }

    /// Check if this type is a string type
    pub fn is_string(&self) -> bool {
        matches!(self, DataType::Varchar(_) | DataType::Text)
    }

    /// Check if this type is a date/time type
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Timestamp)
    }

    /// Smallest type both `self` and `other` can be converted to without loss
    pub fn least_restrictive(&self, other: &DataType) -> Option<DataType> {
        match (self, other) {
            (a, b) if a == b => Some(a.clone()),
            (DataType::Null, t) | (t, DataType::Null) => Some(t.clone()),
            (a, b) if a.is_numeric() && b.is_numeric() => Some(wider_numeric_type(a, b)),
            (DataType::Varchar(a), DataType::Varchar(b)) => Some(DataType::Varchar(*a.max(b))),
            (a, b) if a.is_string() && b.is_string() => Some(DataType::Text),
            (DataType::Date, DataType::Timestamp) | (DataType::Timestamp, DataType::Date) => {
                Some(DataType::Timestamp)
            }
            _ => None,
        }
    }
}

/// Get the wider of two numeric types
fn wider_numeric_type(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (DataType::Double, _) | (_, DataType::Double) => DataType::Double,
        (DataType::Float, _) | (_, DataType::Float) => DataType::Float,
        (DataType::BigInt, _) | (_, DataType::BigInt) => DataType::BigInt,
        (DataType::Int, _) | (_, DataType::Int) => DataType::Int,
        (DataType::SmallInt, _) | (_, DataType::SmallInt) => DataType::SmallInt,
        _ => DataType::TinyInt,
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Null => write!(f, "NULL"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::TinyInt => write!(f, "TINYINT"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Int => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Varchar(n) => write!(f, "VARCHAR({})", n),
            DataType::Text => write!(f, "STRING"),
            DataType::Blob => write!(f, "BINARY"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Data type
    pub data_type: DataType,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a new nullable column definition
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    /// Set nullable
    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Whether a named relation is stored data or a stored query
#[derive(Debug, Clone, PartialEq)]
pub enum TableKind {
    /// Base table
    Table,
    /// View with its defining query text
    View { definition: String },
}

/// Table or view definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    /// Table name
    pub name: String,
    /// Column definitions (declared row type for views)
    pub columns: Vec<ColumnDef>,
    /// Table or view
    pub kind: TableKind,
}

impl TableDef {
    /// Create a new base table definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: TableKind::Table,
        }
    }

    /// Create a view definition over the given query text
    pub fn view(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: TableKind::View {
                definition: definition.into(),
            },
        }
    }

    /// Add a column
    #[must_use]
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Get column by exact name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get column index by exact name
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// View definition text, if this is a view
    pub fn view_definition(&self) -> Option<&str> {
        match &self.kind {
            TableKind::View { definition } => Some(definition),
            TableKind::Table => None,
        }
    }
}

/// User-defined scalar function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,
    /// Declared return type
    pub return_type: DataType,
    /// Exact argument count, if fixed
    pub arity: Option<usize>,
}

impl FunctionDef {
    /// Create a variadic function definition
    pub fn new(name: impl Into<String>, return_type: DataType) -> Self {
        Self {
            name: name.into(),
            return_type,
            arity: None,
        }
    }

    /// Fix the argument count
    #[must_use]
    pub fn arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

/// A node in a schema namespace tree
///
/// Lookups are by exact name; case folding is the catalog reader's job,
/// which is why implementations also enumerate their names.
pub trait Schema: Send + Sync + fmt::Debug {
    /// Table or view directly inside this schema
    fn table(&self, name: &str) -> Option<Arc<TableDef>>;

    /// Names of all tables and views directly inside this schema
    fn table_names(&self) -> Vec<String>;

    /// Child schema
    fn sub_schema(&self, name: &str) -> Option<Arc<dyn Schema>>;

    /// Names of all child schemas
    fn sub_schema_names(&self) -> Vec<String>;

    /// User-defined function directly inside this schema
    fn function(&self, _name: &str) -> Option<Arc<FunctionDef>> {
        None
    }

    /// Names of all user-defined functions directly inside this schema
    fn function_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Catalog error
#[derive(Debug, Clone)]
pub enum CatalogError {
    /// Table or view already exists
    TableExists(String),
    /// Table or view not found
    TableNotFound(String),
    /// Child schema already exists
    SchemaExists(String),
    /// Function already exists
    FunctionExists(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::TableExists(name) => write!(f, "Table '{}' already exists", name),
            CatalogError::TableNotFound(name) => write!(f, "Table '{}' not found", name),
            CatalogError::SchemaExists(name) => write!(f, "Schema '{}' already exists", name),
            CatalogError::FunctionExists(name) => {
                write!(f, "Function '{}' already exists", name)
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// In-memory schema
///
/// Built up with `&mut` methods and then frozen behind an `Arc` before it
/// is handed to a context.
#[derive(Debug, Default)]
pub struct MemorySchema {
    tables: BTreeMap<String, Arc<TableDef>>,
    sub_schemas: BTreeMap<String, Arc<dyn Schema>>,
    functions: BTreeMap<String, Arc<FunctionDef>>,
}

impl MemorySchema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table
    pub fn create_table(&mut self, def: TableDef) -> CatalogResult<()> {
        if self.tables.contains_key(&def.name) {
            return Err(CatalogError::TableExists(def.name.clone()));
        }
        self.tables.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Create a view; the definition must carry its declared columns
    pub fn create_view(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<String>,
        columns: Vec<ColumnDef>,
    ) -> CatalogResult<()> {
        let mut def = TableDef::view(name, definition);
        def.columns = columns;
        self.create_table(def)
    }

    /// Drop a table or view
    pub fn drop_table(&mut self, name: &str) -> CatalogResult<()> {
        if self.tables.remove(name).is_none() {
            return Err(CatalogError::TableNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Attach a child schema (a database, for a Hive-style root)
    pub fn add_sub_schema(
        &mut self,
        name: impl Into<String>,
        schema: Arc<dyn Schema>,
    ) -> CatalogResult<()> {
        let name = name.into();
        if self.sub_schemas.contains_key(&name) {
            return Err(CatalogError::SchemaExists(name));
        }
        self.sub_schemas.insert(name, schema);
        Ok(())
    }

    /// Register a user-defined function
    pub fn create_function(&mut self, def: FunctionDef) -> CatalogResult<()> {
        if self.functions.contains_key(&def.name) {
            return Err(CatalogError::FunctionExists(def.name.clone()));
        }
        self.functions.insert(def.name.clone(), Arc::new(def));
        Ok(())
    }

    /// Check if a table or view exists
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

impl Schema for MemorySchema {
    fn table(&self, name: &str) -> Option<Arc<TableDef>> {
        self.tables.get(name).cloned()
    }

    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn sub_schema(&self, name: &str) -> Option<Arc<dyn Schema>> {
        self.sub_schemas.get(name).cloned()
    }

    fn sub_schema_names(&self) -> Vec<String> {
        self.sub_schemas.keys().cloned().collect()
    }

    fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

/// Top-level namespace a context resolves against
///
/// Holds nothing but mounts; the externally supplied schema root is mounted
/// under the session's root identifier and is never mutated.
#[derive(Debug, Default)]
pub struct RootSchema {
    mounts: BTreeMap<String, Arc<dyn Schema>>,
}

impl RootSchema {
    /// Create a root with a single mount
    pub fn mount(name: impl Into<String>, schema: Arc<dyn Schema>) -> Self {
        let mut mounts = BTreeMap::new();
        mounts.insert(name.into(), schema);
        Self { mounts }
    }
}

impl Schema for RootSchema {
    fn table(&self, _name: &str) -> Option<Arc<TableDef>> {
        None
    }

    fn table_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn sub_schema(&self, name: &str) -> Option<Arc<dyn Schema>> {
        self.mounts.get(name).cloned()
    }

    fn sub_schema_names(&self) -> Vec<String> {
        self.mounts.keys().cloned().collect()
    }
}
