//! Error types for the Salary Rule Evaluation Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while loading configuration,
//! building rules, and evaluating them.

use chrono::NaiveDate;
use thiserror::Error;

use crate::evaluation::LookupError;

/// The main error type for the Salary Rule Evaluation Engine.
///
/// Every failure aborts the whole evaluation. The error carries enough
/// context (component target, dependency, table) to diagnose the cause.
///
/// # Example
///
/// ```
/// use salary_engine::error::EngineError;
///
/// let error = EngineError::UnresolvedDependency {
///     target: "Bonus".to_string(),
///     dependency: "Base".to_string(),
/// };
/// assert_eq!(
///     error.to_string(),
///     "Component 'Bonus' depends on 'Base', which is neither an active component nor an input"
/// );
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A rule definition is internally inconsistent.
    #[error("Invalid rule '{target}': {message}")]
    InvalidRule {
        /// The target of the invalid rule.
        target: String,
        /// A description of what made the rule invalid.
        message: String,
    },

    /// A salary component definition cannot be compiled into a rule.
    #[error("Invalid salary component '{name}': {message}")]
    InvalidComponent {
        /// The name of the invalid component.
        name: String,
        /// A description of what made the component invalid.
        message: String,
    },

    /// Two rules for the same target are active on the same date.
    #[error("More than one rule for component '{target}' is active on {date}")]
    DuplicateActiveRule {
        /// The component target with overlapping rules.
        target: String,
        /// The evaluation date on which both rules are active.
        date: NaiveDate,
    },

    /// A declared dependency is neither an active component nor an input.
    #[error(
        "Component '{target}' depends on '{dependency}', which is neither an active component nor an input"
    )]
    UnresolvedDependency {
        /// The component whose dependency could not be resolved.
        target: String,
        /// The unresolved dependency name.
        dependency: String,
    },

    /// An expression reads a name its rule does not declare.
    #[error("Component '{target}' references '{reference}' without declaring it as a dependency")]
    UndeclaredDependency {
        /// The component whose expression holds the reference.
        target: String,
        /// The undeclared name.
        reference: String,
    },

    /// The active components contain a dependency cycle.
    #[error("Cyclic dependency between components: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// The targets forming the cycle, in dependency order.
        cycle: Vec<String>,
    },

    /// A table lookup failed for a component.
    #[error("Table lookup '{table}' failed for component '{target}': {source}")]
    LookupFailure {
        /// The component whose expression performed the lookup.
        target: String,
        /// The table that was queried.
        table: String,
        /// The underlying lookup error.
        #[source]
        source: LookupError,
    },

    /// An expression could not be evaluated.
    #[error("Failed to evaluate component '{target}': {message}")]
    ExpressionError {
        /// The component whose expression failed.
        target: String,
        /// A description of the failure.
        message: String,
    },

    /// Summing or subtracting computed amounts overflowed.
    #[error("Arithmetic overflow while computing {aggregate}")]
    AggregationOverflow {
        /// The aggregate being computed, such as a total or a delta.
        aggregate: String,
    },

    /// The two sides of a comparison were evaluated on different dates.
    #[error("Cannot compare evaluations on {original} and {simulated}")]
    DateMismatch {
        /// The original evaluation date.
        original: NaiveDate,
        /// The simulated evaluation date.
        simulated: NaiveDate,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
