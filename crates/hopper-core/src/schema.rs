use crate::types::Type;

/// How rows are arranged inside a partition. Row-major is the only layout the
/// ingestion core produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLayout {
    Row,
}

/// A memory layout paired with a row type.
///
/// The row type is always a tuple; non-tuple types are wrapped into a unary
/// tuple so that a sequence of scalars becomes a single-column dataset.
/// Schemas are shared as `Arc<Schema>` so every partition of a set points at
/// the same instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    layout: MemoryLayout,
    row_type: Type,
}

impl Schema {
    /// Create a row-layout schema, normalizing the row type to a tuple.
    pub fn row(row_type: Type) -> Schema {
        let row_type = if row_type.is_tuple() {
            row_type
        } else {
            Type::make_tuple(vec![row_type])
        };
        Schema {
            layout: MemoryLayout::Row,
            row_type,
        }
    }

    pub fn layout(&self) -> MemoryLayout {
        self.layout
    }

    pub fn row_type(&self) -> &Type {
        &self.row_type
    }

    /// Number of columns in a row.
    pub fn arity(&self) -> usize {
        self.row_type.params().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_row_type_is_wrapped() {
        let schema = Schema::row(Type::I64);
        assert_eq!(schema.row_type(), &Type::make_tuple(vec![Type::I64]));
        assert_eq!(schema.arity(), 1);
        assert_eq!(schema.layout(), MemoryLayout::Row);
    }

    #[test]
    fn test_tuple_row_type_is_kept() {
        let t = Type::make_tuple(vec![Type::I64, Type::Str]);
        let schema = Schema::row(t.clone());
        assert_eq!(schema.row_type(), &t);
        assert_eq!(schema.arity(), 2);
    }
}
