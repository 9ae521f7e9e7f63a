//! Table lookup capability.
//!
//! Expressions may read date-versioned table values such as tax brackets.
//! The engine calls a [`TableService`] for these; [`InMemoryTableService`]
//! is a ready implementation backed by loaded table definitions.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::LookupKey;

/// Errors returned by a [`TableService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The table does not exist for the tenant.
    #[error("Unknown table '{table}'")]
    UnknownTable {
        /// The requested table.
        table: String,
    },

    /// No row matches the keys on the date.
    #[error("No row in table '{table}' matches keys [{keys}] on {date}")]
    NoMatchingRow {
        /// The requested table.
        table: String,
        /// The keys, rendered for display.
        keys: String,
        /// The lookup date.
        date: NaiveDate,
    },

    /// The backing store could not be reached.
    #[error("Table service unavailable: {message}")]
    Unavailable {
        /// A description of the failure.
        message: String,
    },
}

/// Read-only access to date-versioned lookup tables.
///
/// Implementations must be safe to share between concurrent evaluations.
pub trait TableService: Send + Sync {
    /// Looks up the value of `table_name` for `keys` as of `on_date`.
    fn lookup(
        &self,
        tenant_id: &str,
        component_target: &str,
        table_name: &str,
        keys: &[LookupKey],
        on_date: NaiveDate,
    ) -> Result<Decimal, LookupError>;
}

impl<T: TableService + ?Sized> TableService for &T {
    fn lookup(
        &self,
        tenant_id: &str,
        component_target: &str,
        table_name: &str,
        keys: &[LookupKey],
        on_date: NaiveDate,
    ) -> Result<Decimal, LookupError> {
        (**self).lookup(tenant_id, component_target, table_name, keys, on_date)
    }
}

/// Matches one lookup key against a table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMatcher {
    /// The key must equal this value.
    Exact(LookupKey),
    /// The key must be numeric with `min <= key < max`. Missing bounds are open.
    Range {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<Decimal>,
        /// Exclusive upper bound.
        #[serde(default)]
        max: Option<Decimal>,
    },
    /// Any key matches.
    Any,
}

impl KeyMatcher {
    /// Returns true if `key` satisfies the matcher.
    pub fn matches(&self, key: &LookupKey) -> bool {
        match self {
            KeyMatcher::Exact(expected) => expected == key,
            KeyMatcher::Range { min, max } => match key {
                LookupKey::Number(value) => {
                    min.is_none_or(|min| *value >= min) && max.is_none_or(|max| *value < max)
                }
                LookupKey::Text(_) => false,
            },
            KeyMatcher::Any => true,
        }
    }
}

/// One row of a table version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// One matcher per key position.
    pub keys: Vec<KeyMatcher>,
    /// The value returned when the row matches.
    pub value: Decimal,
}

impl TableRow {
    fn matches(&self, keys: &[LookupKey]) -> bool {
        self.keys.len() == keys.len() && self.keys.iter().zip(keys).all(|(m, k)| m.matches(k))
    }
}

/// The rows of a table from a given date onwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableVersion {
    /// The first date this version applies.
    pub effective_from: NaiveDate,
    /// Rows, searched in order; the first match wins.
    pub rows: Vec<TableRow>,
}

/// A named, date-versioned table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// The table name used in expressions.
    pub name: String,
    /// Restricts the table to one tenant; shared when absent.
    #[serde(default)]
    pub tenant: Option<String>,
    /// The versions of the table.
    pub versions: Vec<TableVersion>,
}

/// A [`TableService`] over tables held in memory.
///
/// A lookup picks the latest version effective on or before the lookup
/// date, then returns the first row whose matchers accept the keys.
/// A tenant-specific table takes precedence over a shared one of the same name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTableService {
    tables: HashMap<(Option<String>, String), Vec<TableVersion>>,
}

impl InMemoryTableService {
    /// Creates an empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service holding `definitions`.
    pub fn from_definitions(definitions: impl IntoIterator<Item = TableDefinition>) -> Self {
        let mut service = Self::new();
        for definition in definitions {
            service.insert(definition);
        }
        service
    }

    /// Adds a table, merging its versions with any already loaded under the same name.
    pub fn insert(&mut self, definition: TableDefinition) {
        let versions = self
            .tables
            .entry((definition.tenant, definition.name))
            .or_default();
        versions.extend(definition.versions);
        versions.sort_by_key(|v| v.effective_from);
    }

    /// The number of distinct tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true if no table is loaded.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn versions(&self, tenant_id: &str, table_name: &str) -> Option<&[TableVersion]> {
        self.tables
            .get(&(Some(tenant_id.to_string()), table_name.to_string()))
            .or_else(|| self.tables.get(&(None, table_name.to_string())))
            .map(Vec::as_slice)
    }
}

impl TableService for InMemoryTableService {
    fn lookup(
        &self,
        tenant_id: &str,
        _component_target: &str,
        table_name: &str,
        keys: &[LookupKey],
        on_date: NaiveDate,
    ) -> Result<Decimal, LookupError> {
        let versions =
            self.versions(tenant_id, table_name)
                .ok_or_else(|| LookupError::UnknownTable {
                    table: table_name.to_string(),
                })?;

        let no_match = || LookupError::NoMatchingRow {
            table: table_name.to_string(),
            keys: keys
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            date: on_date,
        };

        // Versions are sorted by effective_from ascending, so search from the end
        let version = versions
            .iter()
            .rfind(|v| v.effective_from <= on_date)
            .ok_or_else(no_match)?;

        version
            .rows
            .iter()
            .find(|row| row.matches(keys))
            .map(|row| row.value)
            .ok_or_else(no_match)
    }
}
