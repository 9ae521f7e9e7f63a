//! Original-versus-simulated salary comparison.
//!
//! [`SalaryComparator`] evaluates a rule set twice, once with the original
//! inputs and once with overrides applied, and reports both breakdowns, the
//! per-component deltas, contribution group totals, and taxable and tax totals.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AggregationConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    ComponentAmount, ComponentDelta, EvalContext, EvaluationResult, Inputs, RuleSet,
    SimulationRequest, StructuredSalaryResult,
};

use super::engine::evaluate_rule_set;
use super::TableService;

/// The version reported in comparison results.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compares original and simulated evaluations of a rule set.
///
/// Holds the aggregation settings and the table service for its lifetime;
/// both are read-only and shared by the two concurrent runs.
#[derive(Debug, Clone)]
pub struct SalaryComparator<T> {
    config: AggregationConfig,
    tables: T,
}

impl<T: TableService> SalaryComparator<T> {
    /// Creates a comparator.
    pub fn new(config: AggregationConfig, tables: T) -> Self {
        Self { config, tables }
    }

    /// Returns the aggregation settings.
    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Returns the table service.
    pub fn tables(&self) -> &T {
        &self.tables
    }

    /// Evaluates `rule_set` for `context` under the configured total policy.
    pub fn evaluate(
        &self,
        rule_set: &RuleSet,
        context: &EvalContext,
    ) -> EngineResult<EvaluationResult> {
        evaluate_rule_set(rule_set, context, &self.tables, &self.config.total_policy)
    }

    /// Compares the salary for `original_inputs` with the salary after
    /// applying `overrides` on top of them, both on `date`.
    ///
    /// Fails if either evaluation fails.
    ///
    /// # Example
    ///
    /// ```
    /// use salary_engine::config::AggregationConfig;
    /// use salary_engine::evaluation::{InMemoryTableService, SalaryComparator};
    /// use salary_engine::models::{EffectiveRange, Expr, Inputs, Rule, RuleSet};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    /// let range = EffectiveRange::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    /// let rules = RuleSet::new("acme", "v1", vec![
    ///     Rule::new("Bonus", Expr::percent_of(Expr::reference("Base"), Decimal::from(10)),
    ///         vec!["Base".to_string()], range).unwrap(),
    /// ]).unwrap();
    ///
    /// let comparator = SalaryComparator::new(AggregationConfig::default(), InMemoryTableService::new());
    /// let original = Inputs::from([("Base".to_string(), Decimal::from(3000))]);
    /// let overrides = Inputs::from([("Base".to_string(), Decimal::from(3300))]);
    ///
    /// let result = comparator.compare(&rules, &original, &overrides, date).unwrap();
    /// assert_eq!(result.delta("Bonus").unwrap().delta, Decimal::from(30));
    /// ```
    pub fn compare(
        &self,
        rule_set: &RuleSet,
        original_inputs: &Inputs,
        overrides: &Inputs,
        date: NaiveDate,
    ) -> EngineResult<StructuredSalaryResult> {
        let original = EvalContext::new(rule_set.tenant_id.clone(), date, original_inputs.clone());
        let simulated = original.with_overrides(overrides);
        self.compare_contexts(rule_set, &original, &simulated)
    }

    /// Compares the contexts described by a simulation request.
    pub fn compare_request(
        &self,
        rule_set: &RuleSet,
        request: SimulationRequest,
        today: NaiveDate,
    ) -> EngineResult<StructuredSalaryResult> {
        let (original, simulated) = request.into_contexts_on(today);
        self.compare_contexts(rule_set, &original, &simulated)
    }

    /// Evaluates both contexts concurrently and compares the results.
    ///
    /// Returns `DateMismatch` if the contexts have different dates.
    pub fn compare_contexts(
        &self,
        rule_set: &RuleSet,
        original: &EvalContext,
        simulated: &EvalContext,
    ) -> EngineResult<StructuredSalaryResult> {
        if original.date != simulated.date {
            return Err(EngineError::DateMismatch {
                original: original.date,
                simulated: simulated.date,
            });
        }

        let start_time = Instant::now();

        let (original_result, simulated_result) = rayon::join(
            || self.evaluate(rule_set, original),
            || self.evaluate(rule_set, simulated),
        );

        let result = match (original_result, simulated_result) {
            (Ok(original), Ok(simulated)) => self.build_result(rule_set, &original, &simulated),
            (Err(err), _) | (_, Err(err)) => Err(err),
        };
        let result = result.inspect_err(|err| {
            warn!(
                rule_set = %rule_set.id(),
                error = %err,
                "Comparison failed"
            )
        })?;

        info!(
            comparison_id = %result.comparison_id,
            rule_set = %result.rule_set_id,
            original_total = %result.original_total,
            simulated_total = %result.simulated_total,
            duration_us = start_time.elapsed().as_micros(),
            "Comparison completed successfully"
        );

        Ok(result)
    }

    /// Builds the structured comparison of two completed evaluations.
    ///
    /// Returns `AggregationOverflow` if a delta or a total overflows.
    pub fn build_result(
        &self,
        rule_set: &RuleSet,
        original: &EvaluationResult,
        simulated: &EvaluationResult,
    ) -> EngineResult<StructuredSalaryResult> {
        Ok(StructuredSalaryResult {
            comparison_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            engine_version: ENGINE_VERSION.to_string(),
            rule_set_id: rule_set.id(),
            date: original.date,
            original_total: original.total,
            simulated_total: simulated.total,
            original_components: project(original),
            simulated_components: project(simulated),
            deltas: deltas(original, simulated)?,
            contribution_totals: self.contribution_totals(simulated)?,
            original_taxable_salary: original.taxable_total()?,
            simulated_taxable_salary: simulated.taxable_total()?,
            original_total_tax: self.total_tax(original)?,
            simulated_total_tax: self.total_tax(simulated)?,
        })
    }

    /// Sums components per contribution group.
    ///
    /// Every configured group is reported, with zero when no component is in it.
    /// Ungrouped components are left out.
    pub fn contribution_totals(
        &self,
        result: &EvaluationResult,
    ) -> EngineResult<BTreeMap<String, Decimal>> {
        let mut totals: BTreeMap<String, Decimal> = self
            .config
            .contribution_groups
            .iter()
            .map(|g| (g.name.clone(), Decimal::ZERO))
            .collect();

        for component in &result.components {
            if let Some(group) = &component.tags.contribution_group {
                let total = totals.entry(group.clone()).or_default();
                *total = total.checked_add(component.amount).ok_or_else(|| {
                    EngineError::AggregationOverflow {
                        aggregate: format!("contribution total of '{}'", group),
                    }
                })?;
            }
        }
        Ok(totals)
    }

    /// Sums the components belonging to a tax group.
    pub fn total_tax(&self, result: &EvaluationResult) -> EngineResult<Decimal> {
        result.sum_where("total tax", |c| self.config.is_tax_component(c))
    }
}

fn project(result: &EvaluationResult) -> Vec<ComponentAmount> {
    result
        .components
        .iter()
        .map(|c| ComponentAmount {
            target: c.target.clone(),
            amount: c.amount,
        })
        .collect()
}

/// Deltas for every target of either run: original order first, then
/// targets only the simulated run produced.
fn deltas(
    original: &EvaluationResult,
    simulated: &EvaluationResult,
) -> EngineResult<Vec<ComponentDelta>> {
    let changed = original.components.iter().map(|c| {
        ComponentDelta::new(c.target.clone(), Some(c.amount), simulated.amount(&c.target))
    });
    let introduced = simulated
        .components
        .iter()
        .filter(|c| !original.components.contains(&c.target))
        .map(|c| ComponentDelta::new(c.target.clone(), None, Some(c.amount)));

    changed.chain(introduced).collect()
}
