//! Structural payload shaping against named [`SchemaShape`]s.
//!
//! Mapping keeps only declared fields, recursing into nested shapes and into
//! each element of list-of-nested fields. Values are never type-coerced and
//! missing required fields are not injected; the store's own validation
//! decides what to do with them.

use std::sync::Arc;

use itemshape_core::{FieldKind, Item, SchemaShape, SchemaSource, Value};
use tracing::debug;

use crate::error::AdapterError;

/// Applies schema shapes resolved from an optional [`SchemaSource`].
#[derive(Clone, Default)]
pub struct SchemaMapper {
    source: Option<Arc<dyn SchemaSource>>,
}

impl SchemaMapper {
    #[must_use]
    pub fn new(source: Option<Arc<dyn SchemaSource>>) -> Self {
        Self { source }
    }

    /// Maps `item` onto the shape named `schema`.
    ///
    /// Without a schema name the item is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::SchemaNotFound`] if the name does not resolve,
    /// including when no source is attached.
    pub fn map(&self, item: &Item, schema: Option<&str>) -> Result<Item, AdapterError> {
        let Some(name) = schema else {
            return Ok(item.clone());
        };
        let shape = self
            .source
            .as_ref()
            .and_then(|source| source.load_shape(name))
            .ok_or_else(|| AdapterError::SchemaNotFound {
                name: name.to_string(),
            })?;
        let mapped = Self::map_to_shape(item, &shape);
        debug!(
            schema = name,
            kept = mapped.len(),
            dropped = item.len().saturating_sub(mapped.len()),
            "payload mapped to schema"
        );
        Ok(mapped)
    }

    /// Keeps only the fields `shape` declares, recursing into nested shapes.
    #[must_use]
    pub fn map_to_shape(item: &Item, shape: &SchemaShape) -> Item {
        shape
            .fields
            .iter()
            .filter_map(|field| {
                let value = item.get(&field.name)?;
                Some((field.name.clone(), Self::map_field(&field.kind, value)))
            })
            .collect()
    }

    fn map_field(kind: &FieldKind, value: &Value) -> Value {
        match (kind, value) {
            (FieldKind::Nested { shape }, Value::Map(inner)) => {
                Value::Map(Self::map_to_shape(inner, shape))
            }
            (FieldKind::ListOfNested { shape }, Value::List(elements)) => Value::List(
                elements
                    .iter()
                    .map(|element| match element {
                        Value::Map(inner) => Value::Map(Self::map_to_shape(inner, shape)),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            // scalars, scalar lists, and mismatched kinds are copied as-is
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use itemshape_core::{item_from_json, FieldDef, ScalarType, SchemaRegistry};
    use serde_json::json;

    use super::*;

    fn registry() -> Arc<dyn SchemaSource> {
        let line = SchemaShape::new(
            "Line",
            vec![
                FieldDef::scalar("sku", ScalarType::String, true),
                FieldDef::scalar("qty", ScalarType::Integer, false),
            ],
        );
        let address = SchemaShape::new(
            "Address",
            vec![FieldDef::scalar("city", ScalarType::String, false)],
        );
        let order = SchemaShape::new(
            "Order",
            vec![
                FieldDef::scalar("id", ScalarType::String, true),
                FieldDef::scalar("total", ScalarType::Number, true),
                FieldDef::nested("ship_to", address, false),
                FieldDef::list_of_nested("lines", line, false),
                FieldDef::list_of_scalar("tags", ScalarType::String, false),
            ],
        );
        Arc::new(SchemaRegistry::new().with_shape(order))
    }

    fn item(value: serde_json::Value) -> Item {
        item_from_json(value).unwrap()
    }

    #[test]
    fn unset_schema_returns_input_unchanged() {
        let mapper = SchemaMapper::new(Some(registry()));
        let input = item(json!({"id": "1", "extra": {"deep": [1, 2]}, "n": null}));
        assert_eq!(mapper.map(&input, None).unwrap(), input);
        assert_eq!(SchemaMapper::default().map(&input, None).unwrap(), input);
    }

    #[test]
    fn drops_undeclared_fields_at_every_depth() {
        let mapper = SchemaMapper::new(Some(registry()));
        let input = item(json!({
            "id": "o-1",
            "total": 12.5,
            "internal": true,
            "ship_to": {"city": "Oslo", "geo": [1, 2]},
            "lines": [{"sku": "a", "qty": 2, "note": "x"}, "loose"],
            "tags": ["new", "gift"]
        }));

        let mapped = mapper.map(&input, Some("Order")).unwrap();

        assert_eq!(
            mapped,
            item(json!({
                "id": "o-1",
                "total": 12.5,
                "ship_to": {"city": "Oslo"},
                "lines": [{"sku": "a", "qty": 2}, "loose"],
                "tags": ["new", "gift"]
            }))
        );
    }

    #[test]
    fn missing_required_fields_stay_absent() {
        let mapper = SchemaMapper::new(Some(registry()));
        let mapped = mapper
            .map(&item(json!({"ship_to": "not a map"})), Some("Order"))
            .unwrap();
        assert_eq!(mapped, item(json!({"ship_to": "not a map"})));
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let mapper = SchemaMapper::new(Some(registry()));
        let err = mapper.map(&Item::new(), Some("Invoice")).unwrap_err();
        assert!(matches!(err, AdapterError::SchemaNotFound { name } if name == "Invoice"));

        let err = SchemaMapper::default()
            .map(&Item::new(), Some("Order"))
            .unwrap_err();
        assert!(matches!(err, AdapterError::SchemaNotFound { .. }));
    }
}
