//! Configuration loading and management for the Salary Rule Evaluation Engine.
//!
//! This module loads the aggregation settings (contribution groups, tax
//! groups, total policy) and the lookup tables from YAML files.
//!
//! # Example
//!
//! ```no_run
//! use salary_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Loaded configuration: {}", config.metadata().name);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AggregationConfig, ContributionGroup, EngineConfig, EngineConfigFile, EngineMetadata,
    TotalPolicy,
};
