//! Structural schema shapes and the in-memory [`SchemaRegistry`].
//!
//! A [`SchemaShape`] describes which fields an entity carries and how each
//! field nests. Shapes are immutable once loaded and shared behind `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::traits::SchemaSource;

/// Primitive type declared for a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Number,
    Integer,
    Boolean,
    /// Free-form value (including objects without declared properties).
    Any,
}

/// How a declared field is shaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FieldKind {
    /// A single primitive value.
    Scalar { scalar: ScalarType },
    /// A nested mapping with its own shape.
    Nested { shape: SchemaShape },
    /// A list of primitive values.
    ListOfScalar { scalar: ScalarType },
    /// A list whose elements each follow a nested shape.
    ListOfNested { shape: SchemaShape },
}

/// Single field definition within a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Name of the field.
    pub name: String,
    /// Structural kind of the field.
    pub kind: FieldKind,
    /// Whether the field is declared required. Informational only: the
    /// mapper never injects missing required fields.
    #[serde(default)]
    pub required: bool,
}

impl FieldDef {
    /// Shorthand for a scalar field.
    #[must_use]
    pub fn scalar(name: &str, scalar: ScalarType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar { scalar },
            required,
        }
    }

    /// Shorthand for a nested-shape field.
    #[must_use]
    pub fn nested(name: &str, shape: SchemaShape, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Nested { shape },
            required,
        }
    }

    /// Shorthand for a list-of-scalar field.
    #[must_use]
    pub fn list_of_scalar(name: &str, scalar: ScalarType, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::ListOfScalar { scalar },
            required,
        }
    }

    /// Shorthand for a list-of-nested-shape field.
    #[must_use]
    pub fn list_of_nested(name: &str, shape: SchemaShape, required: bool) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::ListOfNested { shape },
            required,
        }
    }
}

/// Structural description of a named entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaShape {
    /// Entity name the shape was registered under.
    pub name: String,
    /// Declared fields, in declaration order.
    pub fields: Vec<FieldDef>,
}

impl SchemaShape {
    /// Creates a shape from its fields.
    #[must_use]
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }

    /// Looks up a declared field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// In-memory, read-only set of named shapes.
///
/// Build it once (by registering shapes or loading an `OpenAPI`-style JSON
/// document) and share it as `Arc<dyn SchemaSource>`.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    shapes: HashMap<String, Arc<SchemaShape>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shape under its own name, replacing any previous entry.
    pub fn register(&mut self, shape: SchemaShape) {
        self.shapes.insert(shape.name.clone(), Arc::new(shape));
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_shape(mut self, shape: SchemaShape) -> Self {
        self.register(shape);
        self
    }

    /// Number of registered shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether no shapes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Loads every entry of `components.schemas` from an `OpenAPI`-style JSON
    /// document.
    ///
    /// Local `$ref`s of the form `#/components/schemas/<Name>` are resolved
    /// and `allOf` members are flattened into a single field list.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON, the document has no
    /// `components.schemas` object, a `$ref` points outside of it or to a
    /// missing entry, or the references form a cycle.
    pub fn from_openapi_json(text: &str) -> anyhow::Result<Self> {
        let doc: Json = serde_json::from_str(text).context("schema document is not valid JSON")?;
        let schemas = doc
            .pointer("/components/schemas")
            .and_then(Json::as_object)
            .ok_or_else(|| anyhow!("schema document has no components.schemas object"))?;

        let mut registry = Self::new();
        for (name, schema) in schemas {
            let mut stack = vec![name.clone()];
            let shape = build_shape(name, schema, schemas, &mut stack)
                .with_context(|| format!("failed to load schema '{name}'"))?;
            registry.register(shape);
        }
        tracing::debug!(count = registry.len(), "loaded schema shapes");
        Ok(registry)
    }
}

impl SchemaSource for SchemaRegistry {
    fn load_shape(&self, name: &str) -> Option<Arc<SchemaShape>> {
        self.shapes.get(name).cloned()
    }
}

type SchemaMap = serde_json::Map<String, Json>;

const REF_PREFIX: &str = "#/components/schemas/";

/// Follows a `$ref` (if any), returning the target name and schema.
fn resolve<'a>(
    schema: &'a Json,
    schemas: &'a SchemaMap,
) -> anyhow::Result<(Option<&'a str>, &'a Json)> {
    let Some(reference) = schema.get("$ref").and_then(Json::as_str) else {
        return Ok((None, schema));
    };
    let name = reference
        .strip_prefix(REF_PREFIX)
        .ok_or_else(|| anyhow!("unsupported $ref '{reference}'"))?;
    let target = schemas
        .get(name)
        .ok_or_else(|| anyhow!("$ref '{reference}' does not resolve"))?;
    Ok((Some(name), target))
}

fn build_shape(
    name: &str,
    schema: &Json,
    schemas: &SchemaMap,
    stack: &mut Vec<String>,
) -> anyhow::Result<SchemaShape> {
    let mut fields = Vec::new();
    collect_fields(schema, schemas, stack, &mut fields)?;
    Ok(SchemaShape::new(name, fields))
}

/// Appends the properties of `schema` (and of its `allOf` members) to `fields`.
fn collect_fields(
    schema: &Json,
    schemas: &SchemaMap,
    stack: &mut Vec<String>,
    fields: &mut Vec<FieldDef>,
) -> anyhow::Result<()> {
    let (ref_name, schema) = resolve(schema, schemas)?;
    let pushed = enter(ref_name, stack)?;

    if let Some(members) = schema.get("allOf").and_then(Json::as_array) {
        for member in members {
            collect_fields(member, schemas, stack, fields)?;
        }
    }

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Json::as_array)
        .map(|r| r.iter().filter_map(Json::as_str).collect())
        .unwrap_or_default();

    if let Some(properties) = schema.get("properties").and_then(Json::as_object) {
        for (field_name, property) in properties {
            let kind = field_kind(field_name, property, schemas, stack)?;
            let field = FieldDef {
                name: field_name.clone(),
                kind,
                required: required.contains(&field_name.as_str()),
            };
            // A later allOf member redefining a field wins.
            fields.retain(|f| f.name != field.name);
            fields.push(field);
        }
    }

    if pushed {
        stack.pop();
    }
    Ok(())
}

/// Pushes a referenced name onto the resolution stack, failing on cycles.
fn enter(ref_name: Option<&str>, stack: &mut Vec<String>) -> anyhow::Result<bool> {
    let Some(name) = ref_name else {
        return Ok(false);
    };
    if stack.iter().any(|s| s == name) {
        bail!("cyclic $ref through '{name}'");
    }
    stack.push(name.to_string());
    Ok(true)
}

fn has_properties(schema: &Json) -> bool {
    schema.get("properties").is_some() || schema.get("allOf").is_some()
}

fn scalar_type(schema: &Json) -> ScalarType {
    match schema.get("type").and_then(Json::as_str) {
        Some("string") => ScalarType::String,
        Some("number") => ScalarType::Number,
        Some("integer") => ScalarType::Integer,
        Some("boolean") => ScalarType::Boolean,
        _ => ScalarType::Any,
    }
}

fn field_kind(
    field_name: &str,
    property: &Json,
    schemas: &SchemaMap,
    stack: &mut Vec<String>,
) -> anyhow::Result<FieldKind> {
    let (ref_name, resolved) = resolve(property, schemas)?;

    if has_properties(resolved) {
        let shape = build_shape(ref_name.unwrap_or(field_name), property, schemas, stack)?;
        return Ok(FieldKind::Nested { shape });
    }

    if resolved.get("type").and_then(Json::as_str) == Some("array") {
        let Some(items) = resolved.get("items") else {
            return Ok(FieldKind::ListOfScalar {
                scalar: ScalarType::Any,
            });
        };
        let (item_ref, item_schema) = resolve(items, schemas)?;
        if has_properties(item_schema) {
            let shape = build_shape(item_ref.unwrap_or(field_name), items, schemas, stack)?;
            return Ok(FieldKind::ListOfNested { shape });
        }
        return Ok(FieldKind::ListOfScalar {
            scalar: scalar_type(item_schema),
        });
    }

    Ok(FieldKind::Scalar {
        scalar: scalar_type(resolved),
    })
}
