//! Integration tests for the Salary Rule Evaluation Engine.
//!
//! This test suite covers:
//! - The reference evaluation and comparison scenarios
//! - Rule sets authored as YAML and as salary components
//! - Evaluation against the default configuration's lookup tables
//! - Error cases
//! - Properties that hold for arbitrary inputs

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::str::FromStr;

use salary_engine::config::{AggregationConfig, ConfigLoader};
use salary_engine::error::EngineError;
use salary_engine::evaluation::{
    InMemoryTableService, KeyMatcher, SalaryComparator, TableDefinition, TableRow, TableVersion,
    evaluate,
};
use salary_engine::models::{
    EffectiveRange, EvalContext, Expr, Inputs, KeyArg, LookupKey, Rule, RuleSet,
    SalaryComponent, SimulationRequest,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn eval_date() -> NaiveDate {
    date(2025, 3, 1)
}

fn from_2025() -> EffectiveRange {
    EffectiveRange::starting(date(2025, 1, 1))
}

fn inputs(entries: &[(&str, &str)]) -> Inputs {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), dec(v)))
        .collect()
}

fn context(entries: &[(&str, &str)]) -> EvalContext {
    EvalContext::new("acme", eval_date(), inputs(entries))
}

fn no_tables() -> InMemoryTableService {
    InMemoryTableService::new()
}

/// Base as a fixed 3000 and Bonus as 10% of Base.
fn base_and_bonus(bonus_range: EffectiveRange) -> RuleSet {
    RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Base", Expr::literal(dec("3000")), vec![], from_2025()).unwrap(),
            Rule::new(
                "Bonus",
                Expr::percent_of(Expr::reference("Base"), dec("10")),
                vec!["Base".to_string()],
                bonus_range,
            )
            .unwrap(),
        ],
    )
    .unwrap()
}

/// Bonus as 10% of the Base input, both taxable.
fn raise_rules() -> RuleSet {
    RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Base", Expr::input("Base"), vec![], from_2025())
                .unwrap()
                .taxable(),
            Rule::new(
                "Bonus",
                Expr::percent_of(Expr::reference("Base"), dec("10")),
                vec!["Base".to_string()],
                from_2025(),
            )
            .unwrap()
            .taxable(),
        ],
    )
    .unwrap()
}

fn component_targets(rule_set: &RuleSet, ctx: &EvalContext) -> Vec<String> {
    let active = rule_set.active_rule_index(ctx.date).unwrap();
    evaluate(&active, ctx, &no_tables())
        .unwrap()
        .components
        .iter()
        .map(|c| c.target.clone())
        .collect()
}

// =============================================================================
// SECTION 1: Reference Scenarios
// =============================================================================

/// SC-001: Base 3000 with a 10% bonus totals 3300.
#[test]
fn test_fixed_base_with_percentage_bonus() {
    let rule_set = base_and_bonus(from_2025());
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    let result = evaluate(&active, &ctx, &no_tables()).unwrap();

    assert_eq!(result.amount("Base"), Some(dec("3000")));
    assert_eq!(result.amount("Bonus"), Some(dec("300")));
    assert_eq!(result.total, dec("3300"));
}

/// SC-002: An expired rule is not active and nothing misses it.
#[test]
fn test_expired_bonus_is_not_active() {
    let rule_set = base_and_bonus(EffectiveRange::between(date(2024, 1, 1), date(2024, 12, 31)));
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    assert_eq!(active.targets().collect::<Vec<_>>(), vec!["Base"]);

    let result = evaluate(&active, &ctx, &no_tables()).unwrap();
    assert_eq!(result.components.len(), 1);
    assert_eq!(result.total, dec("3000"));
}

/// SC-003: Mutually dependent rules fail with a cycle naming both.
#[test]
fn test_mutual_dependency_is_a_cycle() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("A", Expr::reference("B"), vec!["B".to_string()], from_2025()).unwrap(),
            Rule::new("B", Expr::reference("A"), vec!["A".to_string()], from_2025()).unwrap(),
        ],
    )
    .unwrap();
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    match evaluate(&active, &ctx, &no_tables()) {
        Err(EngineError::CyclicDependency { cycle }) => {
            let members: BTreeSet<&str> = cycle.iter().map(String::as_str).collect();
            assert_eq!(members, BTreeSet::from(["A", "B"]));
        }
        other => panic!("Expected CyclicDependency, got {:?}", other),
    }
}

/// SC-004: A 10% raise propagates to the bonus.
#[test]
fn test_raise_simulation_deltas() {
    let comparator = SalaryComparator::new(AggregationConfig::default(), no_tables());

    let result = comparator
        .compare(
            &raise_rules(),
            &inputs(&[("Base", "3000")]),
            &inputs(&[("Base", "3300")]),
            eval_date(),
        )
        .unwrap();

    assert_eq!(result.delta("Base").unwrap().delta, dec("300"));
    assert_eq!(result.delta("Bonus").unwrap().delta, dec("30"));
    assert_eq!(result.original_total, dec("3300"));
    assert_eq!(result.simulated_total, dec("3630"));
    assert_eq!(result.total_delta(), Some(dec("330")));
}

/// SC-005: A lookup with no matching row names the failing component.
#[test]
fn test_lookup_without_matching_row_fails() {
    let tables = InMemoryTableService::from_definitions([TableDefinition {
        name: "allowance".to_string(),
        tenant: None,
        versions: vec![TableVersion {
            effective_from: date(2024, 1, 1),
            rows: vec![TableRow {
                keys: vec![KeyMatcher::Exact(LookupKey::Text("north".to_string()))],
                value: dec("120"),
            }],
        }],
    }]);
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Base", Expr::literal(dec("3000")), vec![], from_2025()).unwrap(),
            Rule::new(
                "RegionalAllowance",
                Expr::lookup("allowance", vec![KeyArg::Text("south".to_string())]),
                vec![],
                from_2025(),
            )
            .unwrap(),
        ],
    )
    .unwrap();
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    match evaluate(&active, &ctx, &tables) {
        Err(EngineError::LookupFailure { target, table, .. }) => {
            assert_eq!(target, "RegionalAllowance");
            assert_eq!(table, "allowance");
        }
        other => panic!("Expected LookupFailure, got {:?}", other),
    }
}

// =============================================================================
// SECTION 2: Ordering and Effective Dating
// =============================================================================

#[test]
fn test_dependencies_evaluated_before_dependents() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new(
                "Net",
                Expr::reference("Gross") - Expr::reference("Tax"),
                vec!["Gross".to_string(), "Tax".to_string()],
                from_2025(),
            )
            .unwrap(),
            Rule::new(
                "Tax",
                Expr::percent_of(Expr::reference("Gross"), dec("20")),
                vec!["Gross".to_string()],
                from_2025(),
            )
            .unwrap(),
            Rule::new("Gross", Expr::input("Base"), vec![], from_2025()).unwrap(),
        ],
    )
    .unwrap();

    let targets = component_targets(&rule_set, &context(&[("Base", "1000")]));
    assert_eq!(targets, vec!["Gross", "Tax", "Net"]);
}

#[test]
fn test_independent_rules_keep_declaration_order() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Zeta", Expr::literal(dec("1")), vec![], from_2025()).unwrap(),
            Rule::new("Alpha", Expr::literal(dec("2")), vec![], from_2025()).unwrap(),
            Rule::new("Mid", Expr::literal(dec("3")), vec![], from_2025()).unwrap(),
        ],
    )
    .unwrap();

    let targets = component_targets(&rule_set, &context(&[]));
    assert_eq!(targets, vec!["Zeta", "Alpha", "Mid"]);
}

#[test]
fn test_successive_rule_versions_select_by_date() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new(
                "Allowance",
                Expr::literal(dec("100")),
                vec![],
                EffectiveRange::between(date(2024, 1, 1), date(2024, 12, 31)),
            )
            .unwrap(),
            Rule::new(
                "Allowance",
                Expr::literal(dec("150")),
                vec![],
                EffectiveRange::starting(date(2025, 1, 1)),
            )
            .unwrap(),
        ],
    )
    .unwrap();
    assert!(rule_set.find_overlap().is_none());

    for (on, expected) in [(date(2024, 12, 31), "100"), (date(2025, 1, 1), "150")] {
        let ctx = EvalContext::new("acme", on, Inputs::new());
        let active = rule_set.active_rule_index(on).unwrap();
        let result = evaluate(&active, &ctx, &no_tables()).unwrap();
        assert_eq!(result.amount("Allowance"), Some(dec(expected)), "on {}", on);
    }
}

#[test]
fn test_overlapping_rule_versions_are_rejected() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Allowance", Expr::literal(dec("100")), vec![], from_2025()).unwrap(),
            Rule::new(
                "Allowance",
                Expr::literal(dec("150")),
                vec![],
                EffectiveRange::starting(date(2025, 2, 1)),
            )
            .unwrap(),
        ],
    )
    .unwrap();

    assert_eq!(rule_set.find_overlap(), Some(("Allowance", date(2025, 2, 1))));
    match rule_set.active_rule_index(eval_date()) {
        Err(EngineError::DuplicateActiveRule { target, .. }) => assert_eq!(target, "Allowance"),
        other => panic!("Expected DuplicateActiveRule, got {:?}", other),
    }
}

// =============================================================================
// SECTION 3: Authored Rule Sets
// =============================================================================

#[test]
fn test_rule_set_from_yaml() {
    let yaml = r#"
tenant_id: acme
version: "2025.1"
rules:
  - target: Salary
    expression: { kind: input, name: Base }
    effective: { from: 2025-01-01 }
    tags: { taxable: true }
    meta: { label: Monthly salary }
  - target: Commission
    expression:
      kind: binary
      op: mul
      lhs: { kind: ref, name: Sales }
      rhs: { kind: literal, value: "0.05" }
    depends_on: [Sales]
    effective: { from: 2025-01-01, to: 2025-12-31 }
    tags: { taxable: true }
"#;
    let rule_set: RuleSet = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(rule_set.id(), "acme@2025.1");

    let ctx = context(&[("Base", "2800"), ("Sales", "10000")]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();
    let result = evaluate(&active, &ctx, &no_tables()).unwrap();

    assert_eq!(result.amount("Commission"), Some(dec("500")));
    assert_eq!(result.taxable_total().unwrap(), dec("3300"));
    assert_eq!(result.components.get("Salary").unwrap().label, "Monthly salary");
    assert_eq!(result.audit_trace.steps.len(), 2);
}

#[test]
fn test_rule_set_from_salary_components() {
    let yaml = r#"
- name: Base
  fixed_amount: "3000"
  taxable: true
- name: Overtime
  fixed_amount: "200"
  taxable: true
- name: Pension
  dependencies: [Base, Overtime]
  percentage: "5"
  contribution_group: pension
"#;
    let components: Vec<SalaryComponent> = serde_yaml::from_str(yaml).unwrap();
    let rules = components
        .iter()
        .map(|c| c.to_rule(from_2025()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let rule_set = RuleSet::new("acme", "v1", rules).unwrap();

    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();
    let result = evaluate(&active, &ctx, &no_tables()).unwrap();

    assert_eq!(result.amount("Pension"), Some(dec("160")));
    assert_eq!(result.taxable_total().unwrap(), dec("3200"));
    assert_eq!(
        result.components.get("Pension").unwrap().tags.contribution_group.as_deref(),
        Some("pension")
    );
}

// =============================================================================
// SECTION 4: Default Configuration
// =============================================================================

fn configured_rules() -> RuleSet {
    RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Salary", Expr::input("Base"), vec![], from_2025())
                .unwrap()
                .taxable(),
            Rule::new(
                "Pension",
                Expr::reference("Salary")
                    * Expr::lookup("pension_rate", vec![KeyArg::Text("standard".to_string())])
                    / Expr::literal(dec("100")),
                vec!["Salary".to_string()],
                from_2025(),
            )
            .unwrap()
            .in_group("pension"),
            Rule::new(
                "IncomeTax",
                Expr::round(
                    Expr::reference("Salary")
                        * Expr::lookup(
                            "income_tax_rate",
                            vec![KeyArg::Value(Expr::reference("Salary"))],
                        ),
                    2,
                ),
                vec!["Salary".to_string()],
                from_2025(),
            )
            .unwrap()
            .in_group("income_tax"),
        ],
    )
    .unwrap()
}

#[test]
fn test_evaluation_with_configured_tables() {
    let loader = ConfigLoader::load("./config/default").unwrap();
    let comparator = loader.into_comparator();

    let result = comparator
        .evaluate(&configured_rules(), &context(&[("Base", "3500")]))
        .unwrap();

    assert_eq!(result.amount("Pension"), Some(dec("157.5")));
    assert_eq!(result.amount("IncomeTax"), Some(dec("875")));

    let lookups = &result.components.get("IncomeTax").unwrap().lookups;
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0].table, "income_tax_rate");
    assert_eq!(lookups[0].keys, vec![LookupKey::Number(dec("3500"))]);
    assert_eq!(lookups[0].value, dec("0.25"));
}

#[test]
fn test_configured_comparison_crossing_tax_bracket() {
    let comparator = ConfigLoader::load("./config/default")
        .unwrap()
        .into_comparator();

    let result = comparator
        .compare(
            &configured_rules(),
            &inputs(&[("Base", "1800")]),
            &inputs(&[("Base", "2200")]),
            eval_date(),
        )
        .unwrap();

    assert_eq!(result.original_total_tax, dec("180"));
    assert_eq!(result.simulated_total_tax, dec("550"));
    assert_eq!(result.delta("IncomeTax").unwrap().delta, dec("370"));
    assert_eq!(result.contribution_totals.get("pension"), Some(&dec("99")));
    assert_eq!(result.contribution_totals.get("income_tax"), Some(&dec("550")));
    assert_eq!(result.contribution_totals.get("social_security"), Some(&Decimal::ZERO));
    assert_eq!(result.original_taxable_salary, dec("1800"));
    assert_eq!(result.simulated_taxable_salary, dec("2200"));
}

#[test]
fn test_simulation_request_from_json() {
    let comparator = ConfigLoader::load("./config/default")
        .unwrap()
        .into_comparator();
    let request: SimulationRequest = serde_json::from_str(
        r#"{
            "tenant_id": "acme",
            "period": { "start_date": "2025-03-01", "end_date": "2025-03-31" },
            "employee": { "base": "3500" },
            "overrides": { "Base": "4000" }
        }"#,
    )
    .unwrap();

    let result = comparator
        .compare_request(&configured_rules(), request, date(2030, 1, 1))
        .unwrap();

    assert_eq!(result.date, eval_date());
    assert_eq!(result.delta("Salary").unwrap().delta, dec("500"));
    assert_eq!(result.delta("IncomeTax").unwrap().delta, dec("125"));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["rule_set_id"], "acme@v1");
    assert!(json["deltas"].is_array());
}

// =============================================================================
// SECTION 5: Error Cases
// =============================================================================

#[test]
fn test_missing_input_is_unresolved_dependency() {
    let rule_set = raise_rules();
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    match evaluate(&active, &ctx, &no_tables()) {
        Err(EngineError::UnresolvedDependency { target, dependency }) => {
            assert_eq!(target, "Base");
            assert_eq!(dependency, "Base");
        }
        other => panic!("Expected UnresolvedDependency, got {:?}", other),
    }
}

#[test]
fn test_undeclared_reference_is_rejected() {
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Base", Expr::literal(dec("3000")), vec![], from_2025()).unwrap(),
            Rule::new(
                "Bonus",
                Expr::percent_of(Expr::reference("Base"), dec("10")),
                vec![],
                from_2025(),
            )
            .unwrap(),
        ],
    )
    .unwrap();
    let ctx = context(&[]);
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    match evaluate(&active, &ctx, &no_tables()) {
        Err(EngineError::UndeclaredDependency { target, reference }) => {
            assert_eq!(target, "Bonus");
            assert_eq!(reference, "Base");
        }
        other => panic!("Expected UndeclaredDependency, got {:?}", other),
    }
}

#[test]
fn test_comparison_fails_when_either_side_fails() {
    let comparator = SalaryComparator::new(AggregationConfig::default(), no_tables());
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new(
                "Rate",
                Expr::input("Base") / Expr::input("HOURS"),
                vec![],
                from_2025(),
            )
            .unwrap(),
        ],
    )
    .unwrap();

    let result = comparator.compare(
        &rule_set,
        &inputs(&[("Base", "3000"), ("HOURS", "0")]),
        &inputs(&[("HOURS", "160")]),
        eval_date(),
    );

    assert!(matches!(result, Err(EngineError::ExpressionError { .. })));
}

fn base_and_copy() -> RuleSet {
    RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new("Base", Expr::input("Base"), vec![], from_2025()).unwrap(),
            Rule::new("Copy", Expr::reference("Base"), vec!["Base".to_string()], from_2025())
                .unwrap(),
        ],
    )
    .unwrap()
}

#[test]
fn test_total_overflow_returns_error() {
    let rule_set = base_and_copy();
    let ctx = EvalContext::new(
        "acme",
        eval_date(),
        Inputs::from([("Base".to_string(), Decimal::MAX)]),
    );
    let active = rule_set.active_rule_index(ctx.date).unwrap();

    match evaluate(&active, &ctx, &no_tables()) {
        Err(EngineError::AggregationOverflow { aggregate }) => assert_eq!(aggregate, "total"),
        other => panic!("Expected AggregationOverflow, got {:?}", other),
    }
}

#[test]
fn test_delta_overflow_returns_error() {
    let comparator = SalaryComparator::new(AggregationConfig::default(), no_tables());
    let rule_set = RuleSet::new(
        "acme",
        "v1",
        vec![Rule::new("Base", Expr::input("Base"), vec![], from_2025()).unwrap()],
    )
    .unwrap();

    let result = comparator.compare(
        &rule_set,
        &Inputs::from([("Base".to_string(), Decimal::MIN)]),
        &Inputs::from([("Base".to_string(), Decimal::ONE)]),
        eval_date(),
    );

    match result {
        Err(EngineError::AggregationOverflow { aggregate }) => {
            assert_eq!(aggregate, "delta of 'Base'");
        }
        other => panic!("Expected AggregationOverflow, got {:?}", other),
    }
}

// =============================================================================
// SECTION 6: Properties
// =============================================================================

fn amount() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn percentage() -> impl Strategy<Value = Decimal> {
    (0i64..10_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn layered_rules(bonus_pct: Decimal, pension_pct: Decimal) -> RuleSet {
    RuleSet::new(
        "acme",
        "v1",
        vec![
            Rule::new(
                "Pension",
                Expr::percent_of(Expr::reference("Base") + Expr::reference("Bonus"), pension_pct),
                vec!["Base".to_string(), "Bonus".to_string()],
                from_2025(),
            )
            .unwrap()
            .in_group("pension"),
            Rule::new(
                "Bonus",
                Expr::percent_of(Expr::reference("Base"), bonus_pct),
                vec!["Base".to_string()],
                from_2025(),
            )
            .unwrap()
            .taxable(),
            Rule::new("Base", Expr::input("Base"), vec![], from_2025())
                .unwrap()
                .taxable(),
            Rule::new("Expenses", Expr::input("Expenses"), vec![], from_2025()).unwrap(),
        ],
    )
    .unwrap()
}

proptest! {
    #[test]
    fn prop_evaluation_is_deterministic(
        base in amount(),
        expenses in amount(),
        bonus_pct in percentage(),
        pension_pct in percentage(),
    ) {
        let rule_set = layered_rules(bonus_pct, pension_pct);
        let ctx = EvalContext::new(
            "acme",
            eval_date(),
            Inputs::from([("Base".to_string(), base), ("Expenses".to_string(), expenses)]),
        );
        let active = rule_set.active_rule_index(ctx.date).unwrap();

        let first = evaluate(&active, &ctx, &no_tables()).unwrap();
        let second = evaluate(&active, &ctx, &no_tables()).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_deltas_are_simulated_minus_original(
        base in amount(),
        raised in amount(),
        expenses in amount(),
        bonus_pct in percentage(),
        pension_pct in percentage(),
    ) {
        let comparator = SalaryComparator::new(AggregationConfig::default(), no_tables());
        let original = Inputs::from([("Base".to_string(), base), ("Expenses".to_string(), expenses)]);
        let overrides = Inputs::from([("Base".to_string(), raised)]);

        let result = comparator
            .compare(&layered_rules(bonus_pct, pension_pct), &original, &overrides, eval_date())
            .unwrap();

        prop_assert_eq!(result.deltas.len(), 4);
        for delta in &result.deltas {
            let original = result
                .original_components
                .iter()
                .find(|c| c.target == delta.target)
                .map_or(Decimal::ZERO, |c| c.amount);
            let simulated = result
                .simulated_components
                .iter()
                .find(|c| c.target == delta.target)
                .map_or(Decimal::ZERO, |c| c.amount);
            prop_assert_eq!(delta.delta, simulated - original);
        }
        prop_assert_eq!(result.total_delta(), Some(result.simulated_total - result.original_total));
    }

    #[test]
    fn prop_taxable_total_sums_taxable_components(
        base in amount(),
        raised in amount(),
        expenses in amount(),
        bonus_pct in percentage(),
    ) {
        let comparator = SalaryComparator::new(AggregationConfig::default(), no_tables());
        let rule_set = layered_rules(bonus_pct, Decimal::ONE);
        let original = Inputs::from([("Base".to_string(), base), ("Expenses".to_string(), expenses)]);
        let overrides = Inputs::from([("Base".to_string(), raised)]);

        let result = comparator.compare(&rule_set, &original, &overrides, eval_date()).unwrap();

        let original_bonus = result.delta("Bonus").and_then(|d| d.original).unwrap_or_default();
        let simulated_bonus = result.delta("Bonus").and_then(|d| d.simulated).unwrap_or_default();
        prop_assert_eq!(result.original_taxable_salary, base + original_bonus);
        prop_assert_eq!(result.simulated_taxable_salary, raised + simulated_bonus);
    }
}
