//! Dependency-ordered evaluation of active rules.
//!
//! [`evaluate`] orders the active rules, evaluates each expression once its
//! dependencies are available, and aggregates the results. The first failure
//! aborts the whole evaluation; a partial result is never returned.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::TotalPolicy;
use crate::error::EngineResult;
use crate::models::{
    ActiveRuleIndex, AuditStep, AuditTrace, ComponentLedger, ComputedComponent, EvalContext,
    EvaluationResult, RuleSet, checked_sum,
};

use super::dependency_graph::DependencyGraph;
use super::expression_eval::Scope;
use super::TableService;

/// Evaluates the active rules, summing every component into the total.
///
/// # Example
///
/// ```
/// use salary_engine::evaluation::{evaluate, InMemoryTableService};
/// use salary_engine::models::{EffectiveRange, EvalContext, Expr, Inputs, Rule, RuleSet};
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
/// let range = EffectiveRange::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
/// let rules = RuleSet::new("acme", "v1", vec![
///     Rule::new("Base", Expr::literal(Decimal::from(3000)), vec![], range).unwrap(),
///     Rule::new("Bonus", Expr::percent_of(Expr::reference("Base"), Decimal::from(10)),
///         vec!["Base".to_string()], range).unwrap(),
/// ]).unwrap();
///
/// let active = rules.active_rule_index(date).unwrap();
/// let context = EvalContext::new("acme", date, Inputs::new());
/// let result = evaluate(&active, &context, &InMemoryTableService::new()).unwrap();
///
/// assert_eq!(result.amount("Bonus"), Some(Decimal::from(300)));
/// assert_eq!(result.total, Decimal::from(3300));
/// ```
pub fn evaluate(
    active: &ActiveRuleIndex<'_>,
    context: &EvalContext,
    tables: &dyn TableService,
) -> EngineResult<EvaluationResult> {
    evaluate_with_policy(active, context, tables, &TotalPolicy::AllComponents)
}

/// Evaluates the active rules, summing the components `policy` includes into the total.
pub fn evaluate_with_policy(
    active: &ActiveRuleIndex<'_>,
    context: &EvalContext,
    tables: &dyn TableService,
    policy: &TotalPolicy,
) -> EngineResult<EvaluationResult> {
    let start_time = Instant::now();

    let result = run(active, context, tables, policy);
    match &result {
        Ok(evaluation) => info!(
            tenant_id = %context.tenant_id,
            date = %context.date,
            components = evaluation.components.len(),
            total = %evaluation.total,
            duration_us = start_time.elapsed().as_micros(),
            "Evaluation completed successfully"
        ),
        Err(err) => warn!(
            tenant_id = %context.tenant_id,
            date = %context.date,
            error = %err,
            "Evaluation failed"
        ),
    }
    result
}

/// Selects the rules active on the context date and evaluates them.
pub fn evaluate_rule_set(
    rule_set: &RuleSet,
    context: &EvalContext,
    tables: &dyn TableService,
    policy: &TotalPolicy,
) -> EngineResult<EvaluationResult> {
    let active = rule_set.active_rule_index(context.date).inspect_err(|err| {
        warn!(
            rule_set = %rule_set.id(),
            date = %context.date,
            error = %err,
            "Active rule selection failed"
        )
    })?;
    evaluate_with_policy(&active, context, tables, policy)
}

fn run(
    active: &ActiveRuleIndex<'_>,
    context: &EvalContext,
    tables: &dyn TableService,
    policy: &TotalPolicy,
) -> EngineResult<EvaluationResult> {
    let graph = DependencyGraph::build(active, context)?;
    let order = graph.evaluation_order()?;

    let mut components = ComponentLedger::new();
    let mut steps = Vec::with_capacity(order.len());

    for (step_number, rule) in (1u32..).zip(order) {
        let value = Scope {
            target: &rule.target,
            context,
            computed: &components,
            tables,
        }
        .evaluate(&rule.expression)?;

        debug!(
            component = %rule.target,
            amount = %value.amount,
            lookups = value.lookups.len(),
            "Component evaluated"
        );

        steps.push(AuditStep {
            step_number,
            rule_id: rule.target.clone(),
            rule_name: rule.label().to_string(),
            input: serde_json::json!({
                "expression": rule.expression.to_string(),
                "components": value.components,
                "inputs": value.inputs,
                "lookups": value.lookups,
                "effective_from": rule.effective.from.to_string(),
            }),
            output: serde_json::json!({
                "amount": value.amount.to_string(),
            }),
            reasoning: format!(
                "{} = {} = {}",
                rule.target, rule.expression, value.amount
            ),
        });

        components.push(ComputedComponent {
            target: rule.target.clone(),
            label: rule.label().to_string(),
            amount: value.amount,
            rule_effective: rule.effective,
            tags: rule.tags.clone(),
            lookups: value.lookups,
        });
    }

    let total = checked_sum(
        components
            .iter()
            .filter(|c| policy.includes(c))
            .map(|c| c.amount),
        "total",
    )?;

    Ok(EvaluationResult {
        tenant_id: context.tenant_id.clone(),
        date: context.date,
        components,
        total,
        audit_trace: AuditTrace { steps },
    })
}
