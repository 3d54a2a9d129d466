//! Process-wide schema adapter registry
//!
//! A schema root is served under a well-known name (`hive` by default) with
//! a default database. The first context that reads a catalog under a root
//! name registers the pairing for the whole process. Later contexts must
//! agree with it: two sessions resolving unqualified names under the same
//! root against different databases would translate the same text
//! differently.
//!
//! Registration happens when a context first builds its catalog reader,
//! never when a context is created.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use tracing::info;

use crate::config::SessionConfig;
use crate::context::error::{ContextError, ContextResult};

/// Root name and default database pairing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAdapter {
    pub root_name: String,
    pub default_database: String,
}

impl SchemaAdapter {
    pub fn new(root_name: impl Into<String>, default_database: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
            default_database: default_database.into(),
        }
    }

    /// Adapter a session configuration asks for
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.root_schema.clone(), config.default_database.clone())
    }

    /// Default search path: the root, then the default database under it
    pub fn search_path(&self) -> Vec<String> {
        vec![self.root_name.clone(), self.default_database.clone()]
    }
}

fn registry() -> &'static RwLock<HashMap<String, SchemaAdapter>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, SchemaAdapter>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn check_compatible(existing: &SchemaAdapter, requested: &SchemaAdapter) -> ContextResult<()> {
    if existing == requested {
        return Ok(());
    }
    Err(ContextError::RegistrationConflict {
        root: requested.root_name.clone(),
        existing: existing.default_database.clone(),
        requested: requested.default_database.clone(),
    })
}

/// Register an adapter
///
/// Returns `true` when this call performed the registration. Registering an
/// equal adapter again is a no-op.
pub fn register_adapter(adapter: SchemaAdapter) -> ContextResult<bool> {
    if let Some(existing) = registry().read().get(&adapter.root_name) {
        check_compatible(existing, &adapter)?;
        return Ok(false);
    }

    let mut registry = registry().write();
    // Another thread may have won between the read and the write lock
    if let Some(existing) = registry.get(&adapter.root_name) {
        check_compatible(existing, &adapter)?;
        return Ok(false);
    }
    info!(
        root = %adapter.root_name,
        default_database = %adapter.default_database,
        "Registered schema adapter"
    );
    registry.insert(adapter.root_name.clone(), adapter);
    Ok(true)
}

/// Make sure the adapter `config` needs is registered, and return it
pub fn ensure_registered(config: &SessionConfig) -> ContextResult<SchemaAdapter> {
    let adapter = SchemaAdapter::from_config(config);
    register_adapter(adapter.clone())?;
    Ok(adapter)
}

/// Registered adapter for a root name
pub fn lookup(root_name: &str) -> Option<SchemaAdapter> {
    registry().read().get(root_name).cloned()
}

/// Number of registered root names
pub fn registration_count() -> usize {
    registry().read().len()
}
