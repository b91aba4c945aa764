//! CQL Mapper - typed records to prepared INSERT statements
//!
//! Turns an in-memory record into a parameterized INSERT against a wide
//! column store, prepares each distinct statement text once per session, and
//! for conditional inserts reads the `[applied]` row back into a typed
//! result.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Mapper: insert / insert_if_not_exists (async + blocking)       │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                    │                      │
//!            ▼                    ▼                      ▼
//! ┌───────────────────┐ ┌───────────────────┐ ┌──────────────────────┐
//! │ MappingRegistry   │ │ build_insert      │ │ PreparedStatement    │
//! │ type -> definition│ │ text + values     │ │ Cache (single flight)│
//! └───────────────────┘ └───────────────────┘ └──────────────────────┘
//!                                                        │
//!                                                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Session (driver adapter)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cql_mapper::{ColumnMapping, ColumnType, Mapper, MappingDefinition, StaticDefinitions};
//!
//! let definitions = StaticDefinitions::new().with(MappingDefinition::new::<User>(
//!     "users",
//!     vec![
//!         ColumnMapping::new("id", "userid", ColumnType::Uuid).primary_key(),
//!         ColumnMapping::new("name", "name", ColumnType::Text),
//!     ],
//! ));
//! let mapper = Mapper::new(session, Arc::new(definitions));
//!
//! mapper.insert(&user).await?;
//! let info = mapper.insert_if_not_exists(&user).await?;
//! if !info.applied {
//!     tracing::info!(existing = ?info.existing, "user already present");
//! }
//! ```

pub mod config;
pub mod error;
pub mod mapper;
pub mod mapping;
pub mod record;
pub mod session;
pub mod statement;
pub mod value;

pub use config::MapperConfig;
pub use error::{DriverError, MapperError, Result};
pub use mapper::{AppliedInfo, BlockingMapper, Mapper, APPLIED_COLUMN};
pub use mapping::{
    ColumnMapping, ColumnType, FnConverter, MappingDefinition, MappingDefinitionProvider,
    MappingRegistry, StaticDefinitions, TypeKey, ValueConverter,
};
pub use record::{Poco, PropertyBag, PropertySource, PropertyValue};
pub use session::{
    BoundStatement, Consistency, PreparedStatement, Row, RowSet, SerialConsistency, Session,
};
pub use statement::{build_insert, GeneratedStatement, InsertOptions, PreparedStatementCache};
pub use value::{FromValue, Scalar, Value};
