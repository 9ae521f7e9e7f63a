//! Core data models for the Salary Rule Evaluation Engine.
//!
//! This module contains the rule definitions, the evaluation context, and
//! the result types used throughout the engine.

mod context;
mod evaluation_result;
mod expression;
mod rule;
mod rule_set;
mod salary_component;
mod salary_result;

pub use context::{
    EmployeeInput, EvalContext, EvaluationRequest, INPUT_BASE, INPUT_HOURS, INPUT_RATE, Inputs,
    PeriodRequest, SimulationRequest,
};
pub use evaluation_result::{
    AuditStep, AuditTrace, ComponentLedger, ComputedComponent, EvaluationResult, LookupRecord,
};
pub(crate) use evaluation_result::checked_sum;
pub use expression::{BinaryOp, Expr, KeyArg, LookupKey};
pub use rule::{ComponentTags, EffectiveRange, LABEL_META_KEY, Rule};
pub use rule_set::{ActiveRuleIndex, RuleSet};
pub use salary_component::SalaryComponent;
pub use salary_result::{ComponentAmount, ComponentDelta, StructuredSalaryResult};
