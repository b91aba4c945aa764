//! Record type -> table mapping: definitions and the registry that
//! resolves them.

pub mod convert;
pub mod definition;
pub mod registry;

pub use definition::{
    ColumnMapping, ColumnType, FnConverter, MappingDefinition, TypeKey, ValueConverter,
};
pub use registry::{MappingDefinitionProvider, MappingRegistry, StaticDefinitions};
