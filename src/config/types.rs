//! Configuration types for salary evaluation.
//!
//! This module contains the strongly-typed configuration structures that
//! are deserialized from YAML configuration files.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::evaluation::TableDefinition;
use crate::models::ComputedComponent;

/// Metadata identifying a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMetadata {
    /// The configuration name.
    pub name: String,
    /// A description of the configuration.
    #[serde(default)]
    pub description: String,
}

/// A contribution group components may be reported under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionGroup {
    /// The group name used in component tags.
    pub name: String,
    /// A display label.
    #[serde(default)]
    pub label: Option<String>,
    /// Whether members of this group are tax components.
    #[serde(default)]
    pub tax: bool,
}

/// Which components an evaluation's total sums.
///
/// # Example
///
/// ```
/// use salary_engine::config::TotalPolicy;
///
/// let policy: TotalPolicy = serde_yaml::from_str("exclude_groups: [tax]").unwrap();
/// assert!(matches!(policy, TotalPolicy::ExcludeGroups(_)));
/// assert_eq!(TotalPolicy::default(), TotalPolicy::AllComponents);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalPolicy {
    /// Sum every computed component.
    #[default]
    AllComponents,
    /// Sum every component except members of these contribution groups.
    ExcludeGroups(BTreeSet<String>),
    /// Sum only these targets.
    Targets(BTreeSet<String>),
}

impl TotalPolicy {
    /// Returns true if `component` counts towards the total.
    pub fn includes(&self, component: &ComputedComponent) -> bool {
        match self {
            TotalPolicy::AllComponents => true,
            TotalPolicy::ExcludeGroups(groups) => component
                .tags
                .contribution_group
                .as_ref()
                .is_none_or(|group| !groups.contains(group)),
            TotalPolicy::Targets(targets) => targets.contains(&component.target),
        }
    }
}

/// How results are aggregated into totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Known contribution groups.
    #[serde(default)]
    pub contribution_groups: Vec<ContributionGroup>,
    /// Which components an evaluation total sums.
    #[serde(default)]
    pub total_policy: TotalPolicy,
}

impl AggregationConfig {
    /// Returns the configured group named `name`.
    pub fn group(&self, name: &str) -> Option<&ContributionGroup> {
        self.contribution_groups.iter().find(|g| g.name == name)
    }

    /// Returns true if `name` is configured as a tax group.
    pub fn is_tax_group(&self, name: &str) -> bool {
        self.group(name).is_some_and(|g| g.tax)
    }

    /// Returns true if `component` is a tax component.
    pub fn is_tax_component(&self, component: &ComputedComponent) -> bool {
        component
            .tags
            .contribution_group
            .as_deref()
            .is_some_and(|group| self.is_tax_group(group))
    }
}

/// The `engine.yaml` file structure.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfigFile {
    /// Configuration metadata.
    pub engine: EngineMetadata,
    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,
}

/// The complete configuration loaded from a configuration directory.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    metadata: EngineMetadata,
    aggregation: AggregationConfig,
    tables: Vec<TableDefinition>,
}

impl EngineConfig {
    /// Creates a new EngineConfig from its component parts.
    pub fn new(
        metadata: EngineMetadata,
        aggregation: AggregationConfig,
        tables: Vec<TableDefinition>,
    ) -> Self {
        Self {
            metadata,
            aggregation,
            tables,
        }
    }

    /// Returns the configuration metadata.
    pub fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    /// Returns the aggregation settings.
    pub fn aggregation(&self) -> &AggregationConfig {
        &self.aggregation
    }

    /// Returns the lookup table definitions.
    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }
}
