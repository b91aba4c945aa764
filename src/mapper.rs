//! Insert executor.
//!
//! Resolve the definition, build the statement, fetch the prepared handle,
//! bind, execute, and for conditional inserts turn the `[applied]` row back
//! into a typed result. The only suspension points are the prepare (inside
//! the statement cache) and the execute.

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::MapperConfig;
use crate::error::{MapperError, Result};
use crate::mapping::convert::read_properties;
use crate::mapping::{MappingDefinition, MappingDefinitionProvider, MappingRegistry};
use crate::record::Poco;
use crate::session::{RowSet, Session};
use crate::statement::{build_insert, GeneratedStatement, InsertOptions, PreparedStatementCache};
use crate::value::FromValue;

/// Reserved column reporting the outcome of a lightweight transaction.
pub const APPLIED_COLUMN: &str = "[applied]";

/// Outcome of a conditional insert.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedInfo<T> {
    pub applied: bool,
    /// The row that prevented the insert, when it was not applied.
    pub existing: Option<T>,
}

/// Owns the mapping registry and prepared statement cache for one session.
pub struct Mapper {
    session: Arc<dyn Session>,
    registry: MappingRegistry,
    cache: PreparedStatementCache,
    config: MapperConfig,
}

impl Mapper {
    /// Create a mapper with the default configuration.
    pub fn new(session: Arc<dyn Session>, provider: Arc<dyn MappingDefinitionProvider>) -> Self {
        Self::with_config(session, provider, MapperConfig::default())
    }

    /// Create a mapper with explicit configuration.
    pub fn with_config(
        session: Arc<dyn Session>,
        provider: Arc<dyn MappingDefinitionProvider>,
        config: MapperConfig,
    ) -> Self {
        Self {
            cache: PreparedStatementCache::new(Arc::clone(&session)),
            registry: MappingRegistry::new(provider),
            session,
            config,
        }
    }

    /// Configuration this mapper was built with.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Resolved mapping definitions.
    pub fn registry(&self) -> &MappingRegistry {
        &self.registry
    }

    /// Prepared statements by statement text.
    pub fn statement_cache(&self) -> &PreparedStatementCache {
        &self.cache
    }

    /// Drop all cached prepared statements.
    pub fn reset(&self) {
        self.cache.clear();
    }

    /// Synchronous view with the same operations.
    pub fn blocking(&self) -> BlockingMapper<'_> {
        BlockingMapper { mapper: self }
    }

    /// Insert `instance` with the configured defaults.
    pub async fn insert<T: Poco>(&self, instance: &T) -> Result<()> {
        self.insert_with_options(instance, self.config.base_options())
            .await
            .map(|_| ())
    }

    /// Insert `instance`, optionally skipping null columns and setting a TTL.
    pub async fn insert_with<T: Poco>(
        &self,
        instance: &T,
        include_nulls: bool,
        ttl_seconds: Option<i32>,
    ) -> Result<()> {
        self.insert_with_options(instance, self.shaped(include_nulls, ttl_seconds))
            .await
            .map(|_| ())
    }

    /// Insert with full control over the statement and its execution.
    /// Returns `Some` only when `options.if_not_exists` is set.
    pub async fn insert_with_options<T: Poco>(
        &self,
        instance: &T,
        options: InsertOptions,
    ) -> Result<Option<AppliedInfo<T>>> {
        let conditional = options.if_not_exists;
        let (definition, cql, rows) = self.execute(instance, options).await?;
        if !conditional {
            return Ok(None);
        }
        applied_info(&definition, &cql, rows).map(Some)
    }

    /// Insert `instance` unless a row with its primary key exists.
    pub async fn insert_if_not_exists<T: Poco>(&self, instance: &T) -> Result<AppliedInfo<T>> {
        self.insert_if_not_exists_with_options(instance, self.config.base_options())
            .await
    }

    /// Conditional insert with null handling and TTL.
    pub async fn insert_if_not_exists_with<T: Poco>(
        &self,
        instance: &T,
        include_nulls: bool,
        ttl_seconds: Option<i32>,
    ) -> Result<AppliedInfo<T>> {
        self.insert_if_not_exists_with_options(instance, self.shaped(include_nulls, ttl_seconds))
            .await
    }

    /// Conditional insert; `if_not_exists` is forced on.
    pub async fn insert_if_not_exists_with_options<T: Poco>(
        &self,
        instance: &T,
        options: InsertOptions,
    ) -> Result<AppliedInfo<T>> {
        let (definition, cql, rows) = self.execute(instance, options.if_not_exists()).await?;
        applied_info(&definition, &cql, rows)
    }

    fn shaped(&self, include_nulls: bool, ttl_seconds: Option<i32>) -> InsertOptions {
        let options = self.config.base_options().include_nulls(include_nulls);
        match ttl_seconds {
            Some(ttl) => options.ttl(ttl),
            None => options,
        }
    }

    async fn execute<T: Poco>(
        &self,
        instance: &T,
        options: InsertOptions,
    ) -> Result<(Arc<MappingDefinition>, String, RowSet)> {
        let options = self.config.apply_defaults(options);
        let definition = self.registry.resolve_for::<T>()?;
        let GeneratedStatement { text, values } = build_insert(instance, &definition, &options)?;

        let prepared = self.cache.get(&text).await?;
        let bound = prepared
            .bind(values)
            .with_timestamp(options.timestamp)
            .with_consistency(options.consistency)
            .with_serial_consistency(options.serial_consistency);

        tracing::debug!(
            cql = %text,
            values = bound.values.len(),
            consistency = ?bound.consistency,
            "Executing insert"
        );
        let rows = self.session.execute(bound).await.map_err(|err| {
            tracing::warn!(cql = %text, error = %err, "Insert failed");
            MapperError::Execute {
                cql: text.clone(),
                source: err.into(),
            }
        })?;
        Ok((definition, text, rows))
    }
}

/// Read the single `[applied]` row of a conditional insert.
fn applied_info<T: Poco>(
    definition: &MappingDefinition,
    cql: &str,
    rows: RowSet,
) -> Result<AppliedInfo<T>> {
    let unexpected = |reason: String| MapperError::UnexpectedResult {
        cql: cql.to_string(),
        reason,
    };

    let mut rows = rows.into_rows();
    if rows.len() != 1 {
        return Err(unexpected(format!("expected one row, got {}", rows.len())));
    }
    let mut columns = rows.swap_remove(0).into_columns();
    let position = columns
        .iter()
        .position(|(name, _)| name == APPLIED_COLUMN)
        .ok_or_else(|| unexpected(format!("missing {APPLIED_COLUMN} column")))?;
    let (_, applied) = columns.remove(position);
    let applied = bool::from_value(applied)
        .map_err(|reason| unexpected(format!("{APPLIED_COLUMN}: {reason}")))?;

    if applied {
        return Ok(AppliedInfo {
            applied: true,
            existing: None,
        });
    }
    let existing = T::from_properties(read_properties(columns, definition)?)?;
    Ok(AppliedInfo {
        applied: false,
        existing: Some(existing),
    })
}

/// Blocking wrappers over the async operations of a [`Mapper`].
///
/// On a multi-thread runtime the worker is handed off with
/// `block_in_place`; outside any runtime a local executor drives the future.
/// A current-thread runtime cannot block and gets `BlockingUnsupported`.
pub struct BlockingMapper<'a> {
    mapper: &'a Mapper,
}

impl BlockingMapper<'_> {
    /// Blocking [`Mapper::insert`].
    pub fn insert<T: Poco>(&self, instance: &T) -> Result<()> {
        block_on(self.mapper.insert(instance))
    }

    /// Blocking [`Mapper::insert_with`].
    pub fn insert_with<T: Poco>(
        &self,
        instance: &T,
        include_nulls: bool,
        ttl_seconds: Option<i32>,
    ) -> Result<()> {
        block_on(self.mapper.insert_with(instance, include_nulls, ttl_seconds))
    }

    /// Blocking [`Mapper::insert_with_options`].
    pub fn insert_with_options<T: Poco>(
        &self,
        instance: &T,
        options: InsertOptions,
    ) -> Result<Option<AppliedInfo<T>>> {
        block_on(self.mapper.insert_with_options(instance, options))
    }

    /// Blocking [`Mapper::insert_if_not_exists`].
    pub fn insert_if_not_exists<T: Poco>(&self, instance: &T) -> Result<AppliedInfo<T>> {
        block_on(self.mapper.insert_if_not_exists(instance))
    }

    /// Blocking [`Mapper::insert_if_not_exists_with`].
    pub fn insert_if_not_exists_with<T: Poco>(
        &self,
        instance: &T,
        include_nulls: bool,
        ttl_seconds: Option<i32>,
    ) -> Result<AppliedInfo<T>> {
        block_on(
            self.mapper
                .insert_if_not_exists_with(instance, include_nulls, ttl_seconds),
        )
    }

    /// Blocking [`Mapper::insert_if_not_exists_with_options`].
    pub fn insert_if_not_exists_with_options<T: Poco>(
        &self,
        instance: &T,
        options: InsertOptions,
    ) -> Result<AppliedInfo<T>> {
        block_on(
            self.mapper
                .insert_if_not_exists_with_options(instance, options),
        )
    }
}

fn block_on<F, R>(future: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    match Handle::try_current() {
        Ok(handle) => match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => Err(MapperError::BlockingUnsupported),
            _ => tokio::task::block_in_place(|| handle.block_on(future)),
        },
        Err(_) => futures::executor::block_on(future),
    }
}
