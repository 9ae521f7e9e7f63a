//! Rule evaluation.
//!
//! This module resolves the dependencies between active rules, evaluates
//! their expressions in dependency order against a context and a table
//! service, and compares original and simulated runs.
//!
//! # Example
//!
//! ```
//! use salary_engine::evaluation::{evaluate, InMemoryTableService};
//! use salary_engine::models::{EffectiveRange, EvalContext, Expr, Inputs, Rule, RuleSet};
//! use chrono::NaiveDate;
//! use rust_decimal::Decimal;
//!
//! let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
//! let range = EffectiveRange::starting(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
//! let rule_set = RuleSet::new("acme", "v1", vec![
//!     Rule::new("Bonus", Expr::percent_of(Expr::reference("Base"), Decimal::from(10)),
//!         vec!["Base".to_string()], range).unwrap(),
//!     Rule::new("Base", Expr::input("Base"), vec![], range).unwrap(),
//! ]).unwrap();
//!
//! let context = EvalContext::new("acme", date, Inputs::from([
//!     ("Base".to_string(), Decimal::from(3000)),
//! ]));
//! let active = rule_set.active_rule_index(date).unwrap();
//! let result = evaluate(&active, &context, &InMemoryTableService::new()).unwrap();
//!
//! assert_eq!(result.amount("Bonus"), Some(Decimal::from(300)));
//! assert_eq!(result.total, Decimal::from(3300));
//! ```

mod comparison;
mod dependency_graph;
mod engine;
mod expression_eval;
mod table;

pub use comparison::{ENGINE_VERSION, SalaryComparator};
pub use dependency_graph::{DependencyGraph, evaluation_order};
pub use engine::{evaluate, evaluate_rule_set, evaluate_with_policy};
pub use expression_eval::{ExpressionValue, Scope};
pub use table::{
    InMemoryTableService, KeyMatcher, LookupError, TableDefinition, TableRow, TableService,
    TableVersion,
};
