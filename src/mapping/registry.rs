//! Mapping registry: record type -> resolved `MappingDefinition`.
//!
//! Definitions come from a `MappingDefinitionProvider` and are resolved once
//! per type for the life of the owning mapper. Lookups after the first take
//! only a read lock. First resolutions are serialized behind a separate
//! mutex so concurrent callers converge on one definition instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::{MapperError, Result};
use crate::mapping::definition::{MappingDefinition, TypeKey};

/// Source of mapping definitions, supplied by the application.
pub trait MappingDefinitionProvider: Send + Sync {
    fn definition_for(&self, key: TypeKey) -> Option<MappingDefinition>;
}

/// In-memory provider holding definitions registered up front.
#[derive(Default)]
pub struct StaticDefinitions {
    definitions: HashMap<TypeKey, MappingDefinition>,
}

impl StaticDefinitions {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any earlier one for the same type.
    pub fn register(&mut self, definition: MappingDefinition) -> &mut Self {
        self.definitions.insert(definition.type_key(), definition);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, definition: MappingDefinition) -> Self {
        self.register(definition);
        self
    }
}

impl MappingDefinitionProvider for StaticDefinitions {
    fn definition_for(&self, key: TypeKey) -> Option<MappingDefinition> {
        self.definitions.get(&key).cloned()
    }
}

/// Memoizing resolver in front of a provider.
pub struct MappingRegistry {
    provider: Arc<dyn MappingDefinitionProvider>,
    definitions: RwLock<HashMap<TypeKey, Arc<MappingDefinition>>>,
    resolving: Mutex<()>,
}

impl MappingRegistry {
    /// Create a registry resolving through `provider`.
    pub fn new(provider: Arc<dyn MappingDefinitionProvider>) -> Self {
        Self {
            provider,
            definitions: RwLock::new(HashMap::new()),
            resolving: Mutex::new(()),
        }
    }

    /// Resolve the definition for `T`.
    pub fn resolve_for<T: 'static>(&self) -> Result<Arc<MappingDefinition>> {
        self.resolve(TypeKey::of::<T>())
    }

    /// Resolve the definition used as an insert target for `key`.
    pub fn resolve(&self, key: TypeKey) -> Result<Arc<MappingDefinition>> {
        let definition = match self.cached(&key) {
            Some(definition) => definition,
            None => self.resolve_first(key)?,
        };
        definition
            .validate_table()
            .map_err(|reason| MapperError::InvalidMapping {
                type_name: key.name(),
                reason,
            })?;
        Ok(definition)
    }

    /// Number of resolved definitions, nested UDTs included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<TypeKey, Arc<MappingDefinition>>> {
        self.definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn cached(&self, key: &TypeKey) -> Option<Arc<MappingDefinition>> {
        self.read().get(key).cloned()
    }

    fn resolve_first(&self, key: TypeKey) -> Result<Arc<MappingDefinition>> {
        let _resolving = self
            .resolving
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        if let Some(definition) = self.cached(&key) {
            return Ok(definition);
        }

        let mut staged = HashMap::new();
        let definition = self.resolve_with(key, &mut Vec::new(), &mut staged)?;

        let count = staged.len();
        self.definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(staged);
        tracing::debug!(
            type_name = key.name(),
            table = definition.table(),
            resolved = count,
            "Resolved mapping definition"
        );
        Ok(definition)
    }

    /// Resolve `key` and every UDT it references. New definitions land in
    /// `staged` and are only published once the whole tree resolved.
    fn resolve_with(
        &self,
        key: TypeKey,
        path: &mut Vec<TypeKey>,
        staged: &mut HashMap<TypeKey, Arc<MappingDefinition>>,
    ) -> Result<Arc<MappingDefinition>> {
        if let Some(definition) = staged.get(&key).cloned().or_else(|| self.cached(&key)) {
            return Ok(definition);
        }
        if path.contains(&key) {
            return Err(MapperError::InvalidMapping {
                type_name: key.name(),
                reason: "user defined type contains itself".into(),
            });
        }

        let definition = self
            .provider
            .definition_for(key)
            .ok_or(MapperError::MappingNotFound(key.name()))?;
        if definition.type_key() != key {
            return Err(MapperError::InvalidMapping {
                type_name: key.name(),
                reason: format!(
                    "provider returned the definition of {}",
                    definition.type_key().name()
                ),
            });
        }
        definition
            .validate_columns()
            .map_err(|reason| MapperError::InvalidMapping {
                type_name: key.name(),
                reason,
            })?;

        path.push(key);
        let mut nested = HashMap::new();
        for udt in definition.referenced_udts() {
            let resolved = self.resolve_with(udt, path, staged)?;
            nested.insert(udt, resolved);
        }
        path.pop();

        let definition = Arc::new(definition.with_nested(nested));
        staged.insert(key, definition.clone());
        Ok(definition)
    }
}
