//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading engine
//! configuration from YAML files.

use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};
use crate::evaluation::{InMemoryTableService, SalaryComparator, TableDefinition};

use super::types::{AggregationConfig, EngineConfig, EngineConfigFile, EngineMetadata};

/// Loads and provides access to engine configuration.
///
/// The `ConfigLoader` reads YAML configuration files from a directory once;
/// the loaded configuration is read-only afterwards.
///
/// # Directory Structure
///
/// ```text
/// config/default/
/// ├── engine.yaml          # Metadata, contribution groups, total policy
/// └── tables/              # Optional
///     └── income_tax.yaml  # One date-versioned lookup table per file
/// ```
///
/// # Example
///
/// ```no_run
/// use salary_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/default")?;
/// println!("Loaded configuration: {}", loader.metadata().name);
/// let comparator = loader.into_comparator();
/// # Ok::<(), salary_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: EngineConfig,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// Returns an error if `engine.yaml` is missing, or if any file contains
    /// invalid YAML or lacks a required field.
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let engine_path = path.join("engine.yaml");
        let engine = Self::load_yaml::<EngineConfigFile>(&engine_path)?;

        let tables = Self::load_tables(&path.join("tables"))?;

        tracing::info!(
            config = %engine.engine.name,
            tables = tables.len(),
            contribution_groups = engine.aggregation.contribution_groups.len(),
            "Configuration loaded"
        );

        Ok(Self {
            config: EngineConfig::new(engine.engine, engine.aggregation, tables),
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    /// Loads every table file from the tables directory, in file name order.
    ///
    /// A missing directory means no tables.
    fn load_tables(tables_dir: &Path) -> EngineResult<Vec<TableDefinition>> {
        if !tables_dir.exists() {
            return Ok(Vec::new());
        }

        let tables_dir_str = tables_dir.display().to_string();
        let entries = fs::read_dir(tables_dir).map_err(|_| EngineError::ConfigNotFound {
            path: tables_dir_str.clone(),
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|_| EngineError::ConfigNotFound {
                path: tables_dir_str.clone(),
            })?;

            let path = entry.path();
            if path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| Self::load_yaml::<TableDefinition>(path))
            .collect()
    }

    /// Returns the underlying configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the configuration metadata.
    pub fn metadata(&self) -> &EngineMetadata {
        self.config.metadata()
    }

    /// Returns the aggregation settings.
    pub fn aggregation(&self) -> &AggregationConfig {
        self.config.aggregation()
    }

    /// Builds an in-memory table service over the loaded tables.
    pub fn table_service(&self) -> InMemoryTableService {
        InMemoryTableService::from_definitions(self.config.tables().iter().cloned())
    }

    /// Builds a comparator using the loaded aggregation settings and tables.
    pub fn into_comparator(self) -> SalaryComparator<InMemoryTableService> {
        let tables = self.table_service();
        SalaryComparator::new(self.config.aggregation().clone(), tables)
    }
}
