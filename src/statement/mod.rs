//! Statement generation and prepared statement caching.

pub mod builder;
pub mod cache;

pub use builder::{build_insert, GeneratedStatement, InsertOptions};
pub use cache::PreparedStatementCache;
