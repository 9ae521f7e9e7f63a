//! Rule set model and active-rule selection.
//!
//! A [`RuleSet`] holds every rule of one tenant and version. For a given
//! date it exposes the [`ActiveRuleIndex`]: the single rule per target that
//! applies on that date.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::Rule;

/// An ordered collection of rules for one tenant and version.
///
/// Rule order only determines tie-breaking between independent components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// The tenant the rules belong to.
    pub tenant_id: String,
    /// The version of the tenant's rules.
    pub version: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Creates a rule set, validating every rule.
    pub fn new(
        tenant_id: impl Into<String>,
        version: impl Into<String>,
        rules: Vec<Rule>,
    ) -> EngineResult<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        Ok(Self {
            tenant_id: tenant_id.into(),
            version: version.into(),
            rules,
        })
    }

    /// Returns the `tenant@version` identifier.
    pub fn id(&self) -> String {
        format!("{}@{}", self.tenant_id, self.version)
    }

    /// Returns all rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Selects the rules active on `date`.
    ///
    /// Returns `DuplicateActiveRule` if two rules for the same target are both
    /// active on `date`.
    ///
    /// # Example
    ///
    /// ```
    /// use salary_engine::models::{EffectiveRange, Expr, Rule, RuleSet};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let base = Rule::new("Base", Expr::literal(Decimal::from(3000)), vec![],
    ///     EffectiveRange::starting(jan)).unwrap();
    /// let rule_set = RuleSet::new("acme", "v1", vec![base]).unwrap();
    ///
    /// let index = rule_set.active_rule_index(jan).unwrap();
    /// assert!(index.contains("Base"));
    /// ```
    pub fn active_rule_index(&self, date: NaiveDate) -> EngineResult<ActiveRuleIndex<'_>> {
        ActiveRuleIndex::from_rules(date, &self.rules)
    }

    /// Finds two rules for the same target whose effective ranges overlap.
    ///
    /// Returns the shared target and the first date on which both apply.
    /// Useful for checking definitions before they are ever evaluated.
    pub fn find_overlap(&self) -> Option<(&str, NaiveDate)> {
        for (i, a) in self.rules.iter().enumerate() {
            for b in &self.rules[i + 1..] {
                if a.target != b.target {
                    continue;
                }
                let start = a.effective.from.max(b.effective.from);
                if a.is_active_on(start) && b.is_active_on(start) {
                    return Some((&a.target, start));
                }
            }
        }
        None
    }
}

/// The rules active on one date, at most one per target, in declaration order.
#[derive(Debug, Clone)]
pub struct ActiveRuleIndex<'a> {
    date: NaiveDate,
    rules: Vec<&'a Rule>,
    positions: HashMap<&'a str, usize>,
}

impl<'a> ActiveRuleIndex<'a> {
    /// Builds an index of the rules in `rules` that are active on `date`.
    ///
    /// Inactive rules are skipped. Returns `DuplicateActiveRule` on the first
    /// repeated active target.
    pub fn from_rules<I>(date: NaiveDate, rules: I) -> EngineResult<Self>
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let mut index = Self {
            date,
            rules: Vec::new(),
            positions: HashMap::new(),
        };

        for rule in rules.into_iter().filter(|r| r.is_active_on(date)) {
            if index.positions.contains_key(rule.target.as_str()) {
                return Err(EngineError::DuplicateActiveRule {
                    target: rule.target.clone(),
                    date,
                });
            }
            index.positions.insert(rule.target.as_str(), index.rules.len());
            index.rules.push(rule);
        }

        Ok(index)
    }

    /// The date the index was built for.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the active rule for `target`, if any.
    pub fn get(&self, target: &str) -> Option<&'a Rule> {
        self.positions.get(target).map(|&i| self.rules[i])
    }

    /// Returns true if a rule for `target` is active.
    pub fn contains(&self, target: &str) -> bool {
        self.positions.contains_key(target)
    }

    /// Returns the declaration position of `target` within the index.
    pub fn position(&self, target: &str) -> Option<usize> {
        self.positions.get(target).copied()
    }

    /// Iterates the active rules in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &'a Rule> + '_ {
        self.rules.iter().copied()
    }

    /// Iterates the active targets in declaration order.
    pub fn targets(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.rules.iter().map(|r| r.target.as_str())
    }

    /// The number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if no rule is active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
