//! Configuration-time salary component definitions.
//!
//! A [`SalaryComponent`] is the declarative shape components are authored
//! in: a fixed amount, or a percentage of the components it depends on.
//! It compiles into a [`Rule`] the engine can evaluate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::{ComponentTags, EffectiveRange, Expr, Rule};

/// A declaratively defined salary component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryComponent {
    /// The component name, used as the rule target.
    pub name: String,
    /// The components or inputs this component is based on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Percentage applied to the sum of the dependencies.
    #[serde(default)]
    pub percentage: Option<Decimal>,
    /// A fixed amount. Takes precedence over `percentage`.
    #[serde(default)]
    pub fixed_amount: Option<Decimal>,
    /// The contribution group the component is reported under.
    #[serde(default)]
    pub contribution_group: Option<String>,
    /// Whether the component counts towards taxable salary.
    #[serde(default)]
    pub taxable: bool,
}

impl SalaryComponent {
    /// Builds the expression for this component.
    ///
    /// A fixed amount ignores the dependencies entirely. A percentage is
    /// applied as `(d1 + d2 + ...) * (percentage / 100)`.
    pub fn expression(&self) -> EngineResult<Expr> {
        if let Some(amount) = self.fixed_amount {
            return Ok(Expr::literal(amount));
        }

        let Some(percentage) = self.percentage else {
            return Err(self.invalid("either fixed_amount or percentage is required"));
        };

        let base = self
            .dependencies
            .iter()
            .map(Expr::reference)
            .reduce(|acc, next| acc + next)
            .ok_or_else(|| self.invalid("a percentage needs at least one dependency"))?;

        Ok(Expr::percent_of(base, percentage))
    }

    /// Compiles the component into a rule effective over `effective`.
    ///
    /// # Example
    ///
    /// ```
    /// use salary_engine::models::{EffectiveRange, SalaryComponent};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let bonus = SalaryComponent {
    ///     name: "Bonus".to_string(),
    ///     dependencies: vec!["Base".to_string()],
    ///     percentage: Some(Decimal::from(10)),
    ///     fixed_amount: None,
    ///     contribution_group: None,
    ///     taxable: true,
    /// };
    /// let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let rule = bonus.to_rule(EffectiveRange::starting(from)).unwrap();
    ///
    /// assert_eq!(rule.target, "Bonus");
    /// assert_eq!(rule.depends_on, vec!["Base".to_string()]);
    /// assert!(rule.tags.taxable);
    /// ```
    pub fn to_rule(&self, effective: EffectiveRange) -> EngineResult<Rule> {
        let expression = self.expression()?;
        let depends_on = if self.fixed_amount.is_some() {
            Vec::new()
        } else {
            self.dependencies.clone()
        };

        Ok(
            Rule::new(self.name.clone(), expression, depends_on, effective)?.with_tags(
                ComponentTags {
                    taxable: self.taxable,
                    contribution_group: self.contribution_group.clone(),
                },
            ),
        )
    }

    fn invalid(&self, message: &str) -> EngineError {
        EngineError::InvalidComponent {
            name: self.name.clone(),
            message: message.to_string(),
        }
    }
}
