pub mod instance;
pub mod loader;
pub mod types;

pub use instance::IndexSchema;
pub use loader::SchemaLoader;
pub use types::{FacetTemplate, FieldDefinition, FieldType, SchemaDefinition};
