//! Relational data types and the type factory
//!
//! Every type used while translating one session comes from a single
//! `TypeFactory`. The factory interns what it creates, so two structurally
//! equal types built by the same factory are the same `Arc`.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::DataType;

/// Shared, interned type
pub type RelTypeRef = Arc<RelDataType>;

/// Type of a column, an expression, or a whole row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RelDataType {
    /// Single SQL value
    Scalar { sql_type: DataType, nullable: bool },
    /// Ordered, named fields
    Row { fields: Vec<RelField> },
}

/// Field of a row type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelField {
    pub name: String,
    pub index: usize,
    pub data_type: RelTypeRef,
}

impl RelDataType {
    /// Check if this is a row type
    pub fn is_struct(&self) -> bool {
        matches!(self, RelDataType::Row { .. })
    }

    /// Fields of a row type; empty for scalars
    pub fn fields(&self) -> &[RelField] {
        match self {
            RelDataType::Row { fields } => fields,
            RelDataType::Scalar { .. } => &[],
        }
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields().len()
    }

    /// Field names in order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields().iter().map(|f| f.name.as_str()).collect()
    }

    /// Underlying SQL type of a scalar
    pub fn sql_type(&self) -> Option<&DataType> {
        match self {
            RelDataType::Scalar { sql_type, .. } => Some(sql_type),
            RelDataType::Row { .. } => None,
        }
    }

    /// Whether values of this type may be NULL
    pub fn is_nullable(&self) -> bool {
        match self {
            RelDataType::Scalar { nullable, .. } => *nullable,
            RelDataType::Row { .. } => false,
        }
    }

    /// Check if this is a BOOLEAN (or untyped NULL) scalar
    pub fn is_boolean(&self) -> bool {
        matches!(self.sql_type(), Some(DataType::Boolean) | Some(DataType::Null))
    }

    /// Check if this is a numeric (or untyped NULL) scalar
    pub fn is_numeric(&self) -> bool {
        self.sql_type()
            .map_or(false, |t| t.is_numeric() || *t == DataType::Null)
    }
}

impl fmt::Display for RelDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelDataType::Scalar { sql_type, nullable } => {
                if *nullable {
                    write!(f, "{}", sql_type)
                } else {
                    write!(f, "{} NOT NULL", sql_type)
                }
            }
            RelDataType::Row { fields } => {
                let parts: Vec<_> = fields
                    .iter()
                    .map(|field| format!("{} {}", field.data_type, field.name))
                    .collect();
                write!(f, "RecordType({})", parts.join(", "))
            }
        }
    }
}

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

/// Creates and interns relational types
#[derive(Debug)]
pub struct TypeFactory {
    id: u64,
    interned: Mutex<HashSet<RelTypeRef>>,
}

impl Default for TypeFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeFactory {
    /// Create a new factory with an empty intern table
    pub fn new() -> Self {
        Self {
            id: NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed),
            interned: Mutex::new(HashSet::new()),
        }
    }

    /// Process-unique identifier of this factory
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of distinct types created so far
    pub fn interned_count(&self) -> usize {
        self.interned.lock().len()
    }

    fn canonize(&self, ty: RelDataType) -> RelTypeRef {
        let mut interned = self.interned.lock();
        if let Some(existing) = interned.get(&ty) {
            return Arc::clone(existing);
        }
        let ty = Arc::new(ty);
        interned.insert(Arc::clone(&ty));
        ty
    }

    /// Create a NOT NULL scalar type (the NULL type is always nullable)
    pub fn create_sql_type(&self, sql_type: DataType) -> RelTypeRef {
        let nullable = sql_type == DataType::Null;
        self.canonize(RelDataType::Scalar { sql_type, nullable })
    }

    /// Create a scalar type with explicit nullability
    pub fn create_scalar(&self, sql_type: DataType, nullable: bool) -> RelTypeRef {
        let nullable = nullable || sql_type == DataType::Null;
        self.canonize(RelDataType::Scalar { sql_type, nullable })
    }

    /// Copy of `ty` with the given nullability; row types apply it to every field
    pub fn create_type_with_nullability(&self, ty: &RelTypeRef, nullable: bool) -> RelTypeRef {
        match ty.as_ref() {
            RelDataType::Scalar { sql_type, .. } => self.create_scalar(sql_type.clone(), nullable),
            RelDataType::Row { fields } => {
                let fields = fields
                    .iter()
                    .map(|f| {
                        (
                            f.name.clone(),
                            self.create_type_with_nullability(&f.data_type, nullable),
                        )
                    })
                    .collect();
                self.create_struct_type(fields)
            }
        }
    }

    /// Create a row type from (name, type) pairs
    pub fn create_struct_type(&self, fields: Vec<(String, RelTypeRef)>) -> RelTypeRef {
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(index, (name, data_type))| RelField {
                name,
                index,
                data_type,
            })
            .collect();
        self.canonize(RelDataType::Row { fields })
    }

    /// Type all of `types` can be converted to, if one exists
    ///
    /// Row types must have equal arity and take their field names from the
    /// first type.
    pub fn least_restrictive(&self, types: &[RelTypeRef]) -> Option<RelTypeRef> {
        let (first, rest) = types.split_first()?;
        match first.as_ref() {
            RelDataType::Scalar { sql_type, nullable } => {
                let mut sql_type = sql_type.clone();
                let mut nullable = *nullable;
                for ty in rest {
                    let other = ty.sql_type()?;
                    sql_type = sql_type.least_restrictive(other)?;
                    nullable |= ty.is_nullable();
                }
                Some(self.create_scalar(sql_type, nullable))
            }
            RelDataType::Row { fields } => {
                if rest.iter().any(|t| t.field_count() != fields.len()) {
                    return None;
                }
                let mut merged = Vec::with_capacity(fields.len());
                for field in fields {
                    let mut column = vec![Arc::clone(&field.data_type)];
                    for ty in rest {
                        column.push(Arc::clone(&ty.fields()[field.index].data_type));
                    }
                    merged.push((field.name.clone(), self.least_restrictive(&column)?));
                }
                Some(self.create_struct_type(merged))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_returns_same_instance() {
        let factory = TypeFactory::new();
        let a = factory.create_sql_type(DataType::Int);
        let b = factory.create_sql_type(DataType::Int);
        assert!(Arc::ptr_eq(&a, &b));

        let nullable = factory.create_type_with_nullability(&a, true);
        assert!(!Arc::ptr_eq(&a, &nullable));
        assert!(nullable.is_nullable());
    }

    #[test]
    fn test_distinct_factories() {
        let f1 = TypeFactory::new();
        let f2 = TypeFactory::new();
        assert_ne!(f1.id(), f2.id());

        let a = f1.create_sql_type(DataType::Int);
        let b = f2.create_sql_type(DataType::Int);
        assert_eq!(a, b);
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_struct_type() {
        let factory = TypeFactory::new();
        let int = factory.create_sql_type(DataType::Int);
        let dbl = factory.create_scalar(DataType::Double, true);
        let row = factory.create_struct_type(vec![
            ("id".to_string(), int.clone()),
            ("total".to_string(), dbl),
        ]);

        assert!(row.is_struct());
        assert_eq!(row.field_names(), vec!["id", "total"]);
        assert!(Arc::ptr_eq(&row.fields()[0].data_type, &int));
        assert_eq!(
            row.to_string(),
            "RecordType(INTEGER NOT NULL id, DOUBLE total)"
        );
    }

    #[test]
    fn test_least_restrictive() {
        let factory = TypeFactory::new();
        let int = factory.create_sql_type(DataType::Int);
        let big = factory.create_scalar(DataType::BigInt, true);
        let text = factory.create_sql_type(DataType::Text);

        let wide = factory.least_restrictive(&[int.clone(), big]).unwrap();
        assert_eq!(wide.sql_type(), Some(&DataType::BigInt));
        assert!(wide.is_nullable());

        assert!(factory.least_restrictive(&[int, text]).is_none());
        assert!(factory.least_restrictive(&[]).is_none());
    }

    #[test]
    fn test_row_nullability() {
        let factory = TypeFactory::new();
        let row = factory.create_struct_type(vec![(
            "id".to_string(),
            factory.create_sql_type(DataType::Int),
        )]);
        let nullable = factory.create_type_with_nullability(&row, true);
        assert!(nullable.fields()[0].data_type.is_nullable());
    }
}
