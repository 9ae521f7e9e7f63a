//! Rule model.
//!
//! A [`Rule`] describes how one salary component is computed and on which
//! dates it applies.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

use super::Expr;

/// Metadata key holding a component's display label.
pub const LABEL_META_KEY: &str = "label";

/// An inclusive date range. An absent `to` means the range is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveRange {
    /// First day the rule applies.
    pub from: NaiveDate,
    /// Last day the rule applies, if any.
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl EffectiveRange {
    /// Creates an open-ended range starting at `from`.
    pub fn starting(from: NaiveDate) -> Self {
        Self { from, to: None }
    }

    /// Creates a closed range.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to: Some(to) }
    }

    /// Returns true if `date` lies within the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use salary_engine::models::EffectiveRange;
    /// use chrono::NaiveDate;
    ///
    /// let range = EffectiveRange::between(
    ///     NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    ///     NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
    /// );
    /// assert!(range.covers(NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()));
    /// assert!(!range.covers(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()));
    /// ```
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.from <= date && self.to.is_none_or(|to| date <= to)
    }
}

/// Reporting tags used when aggregating results. Not read by evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTags {
    /// Whether the component counts towards taxable salary.
    #[serde(default)]
    pub taxable: bool,
    /// The contribution group the component is reported under.
    #[serde(default)]
    pub contribution_group: Option<String>,
}

/// Immutable, date-effective definition of one salary component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// The component this rule produces.
    pub target: String,
    /// The formula computing the component.
    pub expression: Expr,
    /// The names the expression reads through references.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// The dates on which the rule applies.
    pub effective: EffectiveRange,
    /// Reporting tags.
    #[serde(default)]
    pub tags: ComponentTags,
    /// Free-form annotations such as display labels.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl Rule {
    /// Creates a rule with no tags or metadata.
    ///
    /// Returns `InvalidRule` if the target is empty or the range ends before it starts.
    pub fn new(
        target: impl Into<String>,
        expression: Expr,
        depends_on: Vec<String>,
        effective: EffectiveRange,
    ) -> EngineResult<Self> {
        let rule = Self {
            target: target.into(),
            expression,
            depends_on,
            effective,
            tags: ComponentTags::default(),
            meta: BTreeMap::new(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Sets the reporting tags.
    pub fn with_tags(mut self, tags: ComponentTags) -> Self {
        self.tags = tags;
        self
    }

    /// Marks the component as taxable.
    pub fn taxable(mut self) -> Self {
        self.tags.taxable = true;
        self
    }

    /// Assigns the component to a contribution group.
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.tags.contribution_group = Some(group.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Returns true if the rule applies on `date`.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.effective.covers(date)
    }

    /// Returns the display label, falling back to the target.
    pub fn label(&self) -> &str {
        self.meta
            .get(LABEL_META_KEY)
            .map(String::as_str)
            .unwrap_or(&self.target)
    }

    /// Checks the rule's internal consistency.
    ///
    /// Deserialized rules bypass [`Rule::new`], so callers loading rules from
    /// storage should run this before building a rule set.
    pub fn validate(&self) -> EngineResult<()> {
        if self.target.trim().is_empty() {
            return Err(EngineError::InvalidRule {
                target: self.target.clone(),
                message: "target must not be empty".to_string(),
            });
        }

        if let Some(to) = self.effective.to
            && to < self.effective.from
        {
            return Err(EngineError::InvalidRule {
                target: self.target.clone(),
                message: format!(
                    "effective_to {} is before effective_from {}",
                    to, self.effective.from
                ),
            });
        }

        Ok(())
    }
}
