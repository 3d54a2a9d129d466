//! Shared test utilities for unit tests

use std::sync::Arc;

use crate::catalog::{
    CatalogReader, ColumnDef, DataType, FunctionDef, MemorySchema, RootSchema, Schema, TableDef,
};
use crate::config::Conformance;
use crate::planner::logical::types::TypeFactory;
use crate::sql::ast::ValidatedQuery;
use crate::sql::error::SqlResult;
use crate::sql::operators::OperatorTable;
use crate::sql::parser::Parser;
use crate::sql::validator::SqlValidator;

/// Hive-style schema root with a `default` and a `sales` database
///
/// `default` holds `orders`, `users`, the view `v` over `orders` and the
/// function `normalize`; `sales` holds `invoices`.
pub fn test_schema() -> Arc<dyn Schema> {
    let mut default_db = MemorySchema::new();
    default_db
        .create_table(
            TableDef::new("orders")
                .column(ColumnDef::new("id", DataType::Int).nullable(false))
                .column(ColumnDef::new("user_id", DataType::Int))
                .column(ColumnDef::new("total", DataType::Double)),
        )
        .unwrap();
    default_db
        .create_table(
            TableDef::new("users")
                .column(ColumnDef::new("id", DataType::Int).nullable(false))
                .column(ColumnDef::new("name", DataType::Varchar(100))),
        )
        .unwrap();
    default_db
        .create_view(
            "v",
            "SELECT id FROM orders",
            vec![ColumnDef::new("id", DataType::Int).nullable(false)],
        )
        .unwrap();
    default_db
        .create_function(FunctionDef::new("normalize", DataType::Text).arity(1))
        .unwrap();

    let mut sales = MemorySchema::new();
    sales
        .create_table(
            TableDef::new("invoices")
                .column(ColumnDef::new("id", DataType::BigInt).nullable(false))
                .column(ColumnDef::new("amount", DataType::Double)),
        )
        .unwrap();

    let mut hive = MemorySchema::new();
    hive.add_sub_schema("default", Arc::new(default_db)).unwrap();
    hive.add_sub_schema("sales", Arc::new(sales)).unwrap();
    Arc::new(hive)
}

/// Case-insensitive reader over `test_schema()` mounted as `hive`
pub fn test_reader() -> CatalogReader {
    let root = RootSchema::mount("hive", test_schema());
    CatalogReader::new(
        Arc::new(root),
        vec!["hive".to_string(), "default".to_string()],
        Arc::new(TypeFactory::new()),
        false,
    )
}

/// Validator over `test_reader()`
pub fn test_validator(conformance: Conformance) -> SqlValidator {
    let reader = Arc::new(test_reader());
    let factory = Arc::clone(reader.type_factory());
    SqlValidator::new(OperatorTable::standard(), reader, factory, conformance)
}

/// Parse and validate with the default conformance
pub fn validate_sql(sql: &str) -> SqlResult<ValidatedQuery> {
    validate_with(sql, Conformance::default())
}

/// Parse and validate with an explicit conformance
pub fn validate_with(sql: &str, conformance: Conformance) -> SqlResult<ValidatedQuery> {
    let query = Parser::parse_one(sql)?;
    test_validator(conformance).validate(&query)
}
