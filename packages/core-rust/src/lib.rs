//! itemshape core: item values, schema shapes, key prefixing, and deep merge.

pub mod merge;
pub mod prefix;
pub mod schema;
pub mod traits;
pub mod types;

pub use merge::{merge, ListMergePolicy};
pub use prefix::{KeyPrefixer, KeyRole};
pub use schema::{FieldDef, FieldKind, ScalarType, SchemaRegistry, SchemaShape};
pub use traits::SchemaSource;
pub use types::{item_from_json, item_to_json, Item, Value};
