//! Evaluation context and its construction from external requests.
//!
//! An [`EvalContext`] holds the named numeric inputs and the date of one
//! evaluation. [`EvaluationRequest`] is the shape a request-handling layer
//! receives; mapping it into a context is a pure function of the request
//! and the current date.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Named numeric inputs, keyed by case-sensitive name.
pub type Inputs = BTreeMap<String, Decimal>;

/// Reserved input name for the base salary.
pub const INPUT_BASE: &str = "Base";
/// Reserved input name for the hours worked.
pub const INPUT_HOURS: &str = "HOURS";
/// Reserved input name for the hourly rate.
pub const INPUT_RATE: &str = "RATE";

/// The environment of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalContext {
    /// The tenant whose tables are queried.
    pub tenant_id: String,
    /// The evaluation date. Selects active rules and table versions.
    pub date: NaiveDate,
    /// Terminal values consumed by expressions.
    pub inputs: Inputs,
}

impl EvalContext {
    /// Creates a context.
    pub fn new(tenant_id: impl Into<String>, date: NaiveDate, inputs: Inputs) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            date,
            inputs,
        }
    }

    /// Returns the input named `name`.
    pub fn input(&self, name: &str) -> Option<Decimal> {
        self.inputs.get(name).copied()
    }

    /// Returns true if an input named `name` exists.
    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// Returns a copy of this context with `overrides` replacing or adding inputs.
    ///
    /// # Example
    ///
    /// ```
    /// use salary_engine::models::{EvalContext, Inputs};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let original = EvalContext::new("acme", date, Inputs::from([
    ///     ("Base".to_string(), Decimal::from(3000)),
    ///     ("HOURS".to_string(), Decimal::from(160)),
    /// ]));
    /// let simulated = original.with_overrides(&Inputs::from([
    ///     ("Base".to_string(), Decimal::from(3300)),
    /// ]));
    ///
    /// assert_eq!(simulated.input("Base"), Some(Decimal::from(3300)));
    /// assert_eq!(simulated.input("HOURS"), Some(Decimal::from(160)));
    /// ```
    pub fn with_overrides(&self, overrides: &Inputs) -> Self {
        let mut inputs = self.inputs.clone();
        inputs.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        Self {
            tenant_id: self.tenant_id.clone(),
            date: self.date,
            inputs,
        }
    }
}

/// The period part of an evaluation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodRequest {
    /// The first day of the period. Used as the evaluation date.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// The last day of the period.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// The employee inputs of an evaluation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeInput {
    /// Base salary, stored under [`INPUT_BASE`].
    #[serde(default)]
    pub base: Option<Decimal>,
    /// Hours worked, stored under [`INPUT_HOURS`].
    #[serde(default)]
    pub hours: Option<Decimal>,
    /// Hourly rate, stored under [`INPUT_RATE`].
    #[serde(default)]
    pub rate: Option<Decimal>,
    /// Any additional named values.
    #[serde(default)]
    pub extras: Inputs,
}

/// An evaluation request as received from an external caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// The tenant whose rules apply.
    pub tenant_id: String,
    /// The pay period, if any.
    #[serde(default)]
    pub period: Option<PeriodRequest>,
    /// The employee inputs.
    #[serde(default)]
    pub employee: EmployeeInput,
}

impl EvaluationRequest {
    /// Maps the request into a context, defaulting the date to today.
    pub fn into_context(self) -> EvalContext {
        let today = Local::now().date_naive();
        self.into_context_on(today)
    }

    /// Maps the request into a context, using `today` when no period start is given.
    ///
    /// Extras are merged first so that the reserved fields win on a name clash.
    pub fn into_context_on(self, today: NaiveDate) -> EvalContext {
        let date = self
            .period
            .as_ref()
            .and_then(|p| p.start_date)
            .unwrap_or(today);

        let mut inputs = self.employee.extras;
        let reserved = [
            (INPUT_BASE, self.employee.base),
            (INPUT_HOURS, self.employee.hours),
            (INPUT_RATE, self.employee.rate),
        ];
        for (name, value) in reserved {
            if let Some(value) = value {
                inputs.insert(name.to_string(), value);
            }
        }

        EvalContext::new(self.tenant_id, date, inputs)
    }
}

/// A what-if request: an evaluation request plus input overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// The original evaluation request.
    #[serde(flatten)]
    pub request: EvaluationRequest,
    /// Inputs replaced or added in the simulated run.
    #[serde(default)]
    pub overrides: Inputs,
}

impl SimulationRequest {
    /// Maps the request into its original and simulated contexts.
    pub fn into_contexts_on(self, today: NaiveDate) -> (EvalContext, EvalContext) {
        let original = self.request.into_context_on(today);
        let simulated = original.with_overrides(&self.overrides);
        (original, simulated)
    }
}
