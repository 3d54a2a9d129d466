//! Shared test utilities
//!
//! Note: clippy reports false-positive dead_code warnings because it can't
//! trace usage across test binaries. These utilities are used by multiple tests.

#![allow(dead_code)]

use std::sync::Arc;

use relctx::catalog::{ColumnDef, DataType, FunctionDef, MemorySchema, Schema, TableDef};
use relctx::{RelContextProvider, SessionConfig};
use tracing_subscriber::EnvFilter;

/// Initialize tracing; `RUST_LOG=relctx=debug` shows component construction
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn int_key(name: &str) -> ColumnDef {
    ColumnDef::new(name, DataType::Int).nullable(false)
}

/// Hive-style schema root with a `default` and a `sales` database
///
/// `default` holds:
/// - tables `orders(id, user_id, total)` and `users(id, name)`
/// - `v`: `SELECT id FROM orders`
/// - `big_orders`: orders with a total above 100
/// - `v_big`: a view over `big_orders`
/// - `v_wide`: `orders.id` declared as `BIGINT order_id`
/// - `v_arity`: declares more columns than its query produces
/// - `bad_view`: refers to a missing column
/// - `loop_a` and `loop_b`: defined in terms of each other
/// - function `normalize`
///
/// `sales` holds `invoices` and the view `recent` over it.
pub fn test_schema() -> Arc<dyn Schema> {
    let mut db = MemorySchema::new();
    db.create_table(
        TableDef::new("orders")
            .column(int_key("id"))
            .column(ColumnDef::new("user_id", DataType::Int))
            .column(ColumnDef::new("total", DataType::Double)),
    )
    .unwrap();
    db.create_table(
        TableDef::new("users")
            .column(int_key("id"))
            .column(ColumnDef::new("name", DataType::Varchar(100))),
    )
    .unwrap();

    db.create_view("v", "SELECT id FROM orders", vec![int_key("id")])
        .unwrap();
    db.create_view(
        "big_orders",
        "SELECT id, total FROM orders WHERE total > 100",
        vec![int_key("id"), ColumnDef::new("total", DataType::Double)],
    )
    .unwrap();
    db.create_view("v_big", "SELECT id FROM big_orders", vec![int_key("id")])
        .unwrap();
    db.create_view(
        "v_wide",
        "SELECT id FROM orders",
        vec![ColumnDef::new("order_id", DataType::BigInt).nullable(false)],
    )
    .unwrap();
    db.create_view(
        "v_arity",
        "SELECT id FROM orders",
        vec![int_key("id"), ColumnDef::new("extra", DataType::Int)],
    )
    .unwrap();
    db.create_view(
        "bad_view",
        "SELECT nope FROM orders",
        vec![ColumnDef::new("nope", DataType::Int)],
    )
    .unwrap();
    db.create_view("loop_a", "SELECT id FROM loop_b", vec![int_key("id")])
        .unwrap();
    db.create_view("loop_b", "SELECT id FROM loop_a", vec![int_key("id")])
        .unwrap();
    db.create_function(FunctionDef::new("normalize", DataType::Text).arity(1))
        .unwrap();

    let mut sales = MemorySchema::new();
    sales
        .create_table(
            TableDef::new("invoices")
                .column(ColumnDef::new("id", DataType::BigInt).nullable(false))
                .column(ColumnDef::new("amount", DataType::Double)),
        )
        .unwrap();
    sales
        .create_view(
            "recent",
            "SELECT id FROM invoices",
            vec![ColumnDef::new("id", DataType::BigInt).nullable(false)],
        )
        .unwrap();

    let mut hive = MemorySchema::new();
    hive.add_sub_schema("default", Arc::new(db)).unwrap();
    hive.add_sub_schema("sales", Arc::new(sales)).unwrap();
    Arc::new(hive)
}

/// Schema root whose `default` database only has an `events` table
pub fn other_schema() -> Arc<dyn Schema> {
    let mut db = MemorySchema::new();
    db.create_table(
        TableDef::new("events")
            .column(int_key("id"))
            .column(ColumnDef::new("kind", DataType::Varchar(20))),
    )
    .unwrap();

    let mut root = MemorySchema::new();
    root.add_sub_schema("default", Arc::new(db)).unwrap();
    Arc::new(root)
}

/// Context over `test_schema()` with the default configuration
pub fn test_context() -> RelContextProvider {
    init_tracing();
    RelContextProvider::new(Some(test_schema())).unwrap()
}

/// Context over `test_schema()` with an explicit configuration
pub fn context_with(config: SessionConfig) -> RelContextProvider {
    init_tracing();
    RelContextProvider::with_config(Some(test_schema()), config).unwrap()
}
