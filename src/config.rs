//! Mapper configuration.
//!
//! Loaded from YAML, with environment overrides for the consistency
//! defaults:
//!
//! ```yaml
//! default_consistency: local_quorum
//! default_serial_consistency: local_serial
//! include_nulls: true
//! ```

use std::str::FromStr;

use anyhow::Context;
use serde::Deserialize;

use crate::session::{Consistency, SerialConsistency};
use crate::statement::InsertOptions;

/// Overrides `default_consistency`.
pub const CONSISTENCY_ENV: &str = "CQL_MAPPER_CONSISTENCY";
/// Overrides `default_serial_consistency`.
pub const SERIAL_CONSISTENCY_ENV: &str = "CQL_MAPPER_SERIAL_CONSISTENCY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MapperConfig {
    /// Applied when an insert does not set its own consistency.
    #[serde(default)]
    pub default_consistency: Option<Consistency>,
    /// Applied when an insert does not set its own serial consistency.
    #[serde(default)]
    pub default_serial_consistency: Option<SerialConsistency>,
    /// `include_nulls` for the overloads that take no options.
    #[serde(default = "default_include_nulls")]
    pub include_nulls: bool,
}

fn default_include_nulls() -> bool {
    true
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            default_consistency: None,
            default_serial_consistency: None,
            include_nulls: default_include_nulls(),
        }
    }
}

impl MapperConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading mapper config {path}"))?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: MapperConfig =
            serde_yaml::from_str(content).context("parsing mapper config")?;
        Ok(config)
    }

    /// Apply `CQL_MAPPER_*` environment overrides.
    pub fn with_env_overrides(self) -> anyhow::Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        if let Some(level) = var(CONSISTENCY_ENV) {
            self.default_consistency = Some(
                Consistency::from_str(level.trim())
                    .with_context(|| format!("{CONSISTENCY_ENV}={level}"))?,
            );
        }
        if let Some(level) = var(SERIAL_CONSISTENCY_ENV) {
            self.default_serial_consistency = Some(
                SerialConsistency::from_str(level.trim())
                    .with_context(|| format!("{SERIAL_CONSISTENCY_ENV}={level}"))?,
            );
        }
        Ok(self)
    }

    /// Options used by the overloads that take none.
    pub(crate) fn base_options(&self) -> InsertOptions {
        InsertOptions::new().include_nulls(self.include_nulls)
    }

    /// Fill consistency levels the caller left unset.
    pub(crate) fn apply_defaults(&self, mut options: InsertOptions) -> InsertOptions {
        if options.consistency.is_none() {
            options.consistency = self.default_consistency;
        }
        if options.serial_consistency.is_none() {
            options.serial_consistency = self.default_serial_consistency;
        }
        options
    }
}
