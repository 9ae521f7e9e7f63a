//! Structured comparison of an original and a simulated evaluation.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// A component amount projected out of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAmount {
    /// The component target.
    pub target: String,
    /// The computed amount.
    pub amount: Decimal,
}

/// The change of one component between the original and simulated runs.
///
/// A side on which the component was not computed counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDelta {
    /// The component target.
    pub target: String,
    /// The original amount, if computed.
    pub original: Option<Decimal>,
    /// The simulated amount, if computed.
    pub simulated: Option<Decimal>,
    /// `simulated - original`.
    pub delta: Decimal,
}

impl ComponentDelta {
    /// Creates a delta, treating a missing side as zero.
    ///
    /// Returns `AggregationOverflow` if the difference overflows.
    ///
    /// # Example
    ///
    /// ```
    /// use salary_engine::models::ComponentDelta;
    /// use rust_decimal::Decimal;
    ///
    /// let delta = ComponentDelta::new("Bonus", None, Some(Decimal::from(30))).unwrap();
    /// assert_eq!(delta.delta, Decimal::from(30));
    /// ```
    pub fn new(
        target: impl Into<String>,
        original: Option<Decimal>,
        simulated: Option<Decimal>,
    ) -> EngineResult<Self> {
        let target = target.into();
        let delta = simulated
            .unwrap_or(Decimal::ZERO)
            .checked_sub(original.unwrap_or(Decimal::ZERO))
            .ok_or_else(|| EngineError::AggregationOverflow {
                aggregate: format!("delta of '{}'", target),
            })?;
        Ok(Self {
            target,
            original,
            simulated,
            delta,
        })
    }
}

/// The externally visible comparison of an original and a simulated salary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredSalaryResult {
    /// Unique identifier for this comparison.
    pub comparison_id: Uuid,
    /// When the comparison was produced.
    pub timestamp: DateTime<Utc>,
    /// The version of the engine that produced it.
    pub engine_version: String,
    /// The `tenant@version` identifier of the evaluated rule set.
    pub rule_set_id: String,
    /// The evaluation date of both runs.
    pub date: NaiveDate,
    /// Total of the original run.
    pub original_total: Decimal,
    /// Total of the simulated run.
    pub simulated_total: Decimal,
    /// Original component amounts in evaluation order.
    pub original_components: Vec<ComponentAmount>,
    /// Simulated component amounts in evaluation order.
    pub simulated_components: Vec<ComponentAmount>,
    /// Per-component deltas for every target present in either run.
    pub deltas: Vec<ComponentDelta>,
    /// Simulated totals per contribution group.
    pub contribution_totals: BTreeMap<String, Decimal>,
    /// Sum of taxable components in the original run.
    pub original_taxable_salary: Decimal,
    /// Sum of taxable components in the simulated run.
    pub simulated_taxable_salary: Decimal,
    /// Sum of tax components in the original run.
    pub original_total_tax: Decimal,
    /// Sum of tax components in the simulated run.
    pub simulated_total_tax: Decimal,
}

impl StructuredSalaryResult {
    /// `simulated_total - original_total`, or `None` if the difference overflows.
    pub fn total_delta(&self) -> Option<Decimal> {
        self.simulated_total.checked_sub(self.original_total)
    }

    /// Returns the delta for `target`.
    pub fn delta(&self, target: &str) -> Option<&ComponentDelta> {
        self.deltas.iter().find(|d| d.target == target)
    }
}
