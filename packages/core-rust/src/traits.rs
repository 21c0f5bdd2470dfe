use std::sync::Arc;

use crate::schema::SchemaShape;

/// Read-only source of named schema shapes.
///
/// Implementations must be safe to share across threads; shapes are
/// returned behind `Arc` so every operation referencing the same name sees
/// the same immutable description.
pub trait SchemaSource: Send + Sync {
    /// Resolves a shape by name, or `None` if the name is unknown.
    fn load_shape(&self, name: &str) -> Option<Arc<SchemaShape>>;
}
