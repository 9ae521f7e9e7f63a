//! Evaluation result models.
//!
//! This module contains the [`EvaluationResult`] produced by one evaluation
//! run, the [`ComponentLedger`] the engine fills while evaluating, and the
//! audit structures recording how each component was computed.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::{ComponentTags, EffectiveRange, LookupKey};

/// Sums `amounts`, failing with `AggregationOverflow` instead of overflowing.
pub(crate) fn checked_sum<I>(amounts: I, aggregate: &str) -> EngineResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(amount))
        .ok_or_else(|| EngineError::AggregationOverflow {
            aggregate: aggregate.to_string(),
        })
}

/// A table lookup performed while computing a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    /// The table that was queried.
    pub table: String,
    /// The keys passed to the table.
    pub keys: Vec<LookupKey>,
    /// The value returned.
    pub value: Decimal,
}

/// One computed salary component and its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedComponent {
    /// The component target.
    pub target: String,
    /// The display label of the producing rule.
    pub label: String,
    /// The computed amount.
    pub amount: Decimal,
    /// The effective range of the producing rule.
    pub rule_effective: EffectiveRange,
    /// Reporting tags copied from the producing rule.
    pub tags: ComponentTags,
    /// Table lookups performed for this component.
    #[serde(default)]
    pub lookups: Vec<LookupRecord>,
}

/// Append-only, insertion-ordered map from target to computed component.
///
/// Serializes as a plain list in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ComputedComponent>", into = "Vec<ComputedComponent>")]
pub struct ComponentLedger {
    entries: Vec<ComputedComponent>,
    index: HashMap<String, usize>,
}

impl ComponentLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a component. Returns false, leaving the ledger unchanged, if
    /// the target is already present.
    pub fn push(&mut self, component: ComputedComponent) -> bool {
        if self.index.contains_key(&component.target) {
            return false;
        }
        self.index
            .insert(component.target.clone(), self.entries.len());
        self.entries.push(component);
        true
    }

    /// Returns the component for `target`.
    pub fn get(&self, target: &str) -> Option<&ComputedComponent> {
        self.index.get(target).map(|&i| &self.entries[i])
    }

    /// Returns the amount computed for `target`.
    pub fn amount(&self, target: &str) -> Option<Decimal> {
        self.get(target).map(|c| c.amount)
    }

    /// Returns true if `target` has been computed.
    pub fn contains(&self, target: &str) -> bool {
        self.index.contains_key(target)
    }

    /// Iterates components in evaluation order.
    pub fn iter(&self) -> std::slice::Iter<'_, ComputedComponent> {
        self.entries.iter()
    }

    /// The number of computed components.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been computed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<ComputedComponent>> for ComponentLedger {
    fn from(components: Vec<ComputedComponent>) -> Self {
        let mut ledger = Self::new();
        for component in components {
            ledger.push(component);
        }
        ledger
    }
}

impl From<ComponentLedger> for Vec<ComputedComponent> {
    fn from(ledger: ComponentLedger) -> Self {
        ledger.entries
    }
}

impl<'a> IntoIterator for &'a ComponentLedger {
    type Item = &'a ComputedComponent;
    type IntoIter = std::slice::Iter<'a, ComputedComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A single step in the audit trace recording how a component was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number, starting at 1.
    pub step_number: u32,
    /// The target of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The resolved references and inputs read by the expression.
    pub input: serde_json::Value,
    /// The computed output.
    pub output: serde_json::Value,
    /// Human-readable explanation of the step.
    pub reasoning: String,
}

/// The complete audit trace for an evaluation, one step per component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of evaluation steps.
    pub steps: Vec<AuditStep>,
}

/// The result of evaluating one rule set against one context.
///
/// Contains no identifiers or timestamps, so equal inputs give equal results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// The tenant the evaluation ran for.
    pub tenant_id: String,
    /// The evaluation date.
    pub date: NaiveDate,
    /// Computed components in evaluation order.
    pub components: ComponentLedger,
    /// The aggregate total under the applied total policy.
    pub total: Decimal,
    /// How each component was computed.
    pub audit_trace: AuditTrace,
}

impl EvaluationResult {
    /// Returns the amount computed for `target`.
    pub fn amount(&self, target: &str) -> Option<Decimal> {
        self.components.amount(target)
    }

    /// Sums the amounts of components matching `predicate`.
    ///
    /// Returns `AggregationOverflow` naming `aggregate` if the sum overflows.
    pub fn sum_where<F>(&self, aggregate: &str, predicate: F) -> EngineResult<Decimal>
    where
        F: Fn(&ComputedComponent) -> bool,
    {
        checked_sum(
            self.components
                .iter()
                .filter(|c| predicate(c))
                .map(|c| c.amount),
            aggregate,
        )
    }

    /// The sum of all components flagged taxable.
    pub fn taxable_total(&self) -> EngineResult<Decimal> {
        self.sum_where("taxable salary", |c| c.tags.taxable)
    }
}
