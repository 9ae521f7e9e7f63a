//! Expression evaluation.
//!
//! Evaluates one rule's [`Expr`] against the components computed so far,
//! the context inputs, and the table service. All arithmetic is checked
//! decimal arithmetic; overflow and division by zero are errors.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{EngineError, EngineResult};
use crate::models::{BinaryOp, ComponentLedger, EvalContext, Expr, KeyArg, LookupKey, LookupRecord};

use super::TableService;

/// The outcome of evaluating one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionValue {
    /// The computed amount.
    pub amount: Decimal,
    /// Every computed component the expression read, by target.
    pub components: BTreeMap<String, Decimal>,
    /// Every context input the expression read, by name.
    pub inputs: BTreeMap<String, Decimal>,
    /// Every table lookup the expression performed, in order.
    pub lookups: Vec<LookupRecord>,
}

#[derive(Default)]
struct Reads {
    components: BTreeMap<String, Decimal>,
    inputs: BTreeMap<String, Decimal>,
    lookups: Vec<LookupRecord>,
}

/// The symbols visible to one component's expression.
pub struct Scope<'a> {
    /// The component being computed.
    pub target: &'a str,
    /// The evaluation context.
    pub context: &'a EvalContext,
    /// Components computed so far.
    pub computed: &'a ComponentLedger,
    /// The table lookup capability.
    pub tables: &'a dyn TableService,
}

impl Scope<'_> {
    /// Evaluates `expr` within this scope.
    pub fn evaluate(&self, expr: &Expr) -> EngineResult<ExpressionValue> {
        let mut reads = Reads::default();
        let amount = self.eval(expr, &mut reads)?;
        Ok(ExpressionValue {
            amount,
            components: reads.components,
            inputs: reads.inputs,
            lookups: reads.lookups,
        })
    }

    fn eval(
        &self,
        expr: &Expr,
        reads: &mut Reads,
    ) -> EngineResult<Decimal> {
        match expr {
            Expr::Literal { value } => Ok(*value),
            Expr::Ref { name } => match self.computed.amount(name) {
                Some(value) => {
                    reads.components.insert(name.clone(), value);
                    Ok(value)
                }
                None => self.read_input(name, reads),
            },
            Expr::Input { name } => self.read_input(name, reads),
            Expr::Lookup { table, keys } => {
                let keys = keys
                    .iter()
                    .map(|key| match key {
                        KeyArg::Text(text) => Ok(LookupKey::Text(text.clone())),
                        KeyArg::Value(expr) => {
                            self.eval(expr, reads).map(LookupKey::Number)
                        }
                    })
                    .collect::<EngineResult<Vec<_>>>()?;

                let value = self
                    .tables
                    .lookup(
                        &self.context.tenant_id,
                        self.target,
                        table,
                        &keys,
                        self.context.date,
                    )
                    .map_err(|source| EngineError::LookupFailure {
                        target: self.target.to_string(),
                        table: table.clone(),
                        source,
                    })?;

                reads.lookups.push(LookupRecord {
                    table: table.clone(),
                    keys,
                    value,
                });
                Ok(value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, reads)?;
                let rhs = self.eval(rhs, reads)?;
                self.apply(*op, lhs, rhs)
            }
            Expr::Round { value, scale } => {
                let value = self.eval(value, reads)?;
                Ok(value.round_dp_with_strategy(*scale, RoundingStrategy::MidpointAwayFromZero))
            }
        }
    }

    fn read_input(&self, name: &str, reads: &mut Reads) -> EngineResult<Decimal> {
        let value = self
            .context
            .input(name)
            .ok_or_else(|| self.unresolved(name))?;
        reads.inputs.insert(name.to_string(), value);
        Ok(value)
    }

    fn apply(&self, op: BinaryOp, lhs: Decimal, rhs: Decimal) -> EngineResult<Decimal> {
        let result = match op {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            BinaryOp::Div => {
                if rhs.is_zero() {
                    return Err(self.failure(format!("division by zero in {} / {}", lhs, rhs)));
                }
                lhs.checked_div(rhs)
            }
            BinaryOp::Min => Some(lhs.min(rhs)),
            BinaryOp::Max => Some(lhs.max(rhs)),
        };

        result.ok_or_else(|| {
            self.failure(format!(
                "arithmetic overflow in {} of {} and {}",
                op.symbol(),
                lhs,
                rhs
            ))
        })
    }

    fn unresolved(&self, name: &str) -> EngineError {
        EngineError::UnresolvedDependency {
            target: self.target.to_string(),
            dependency: name.to_string(),
        }
    }

    fn failure(&self, message: String) -> EngineError {
        EngineError::ExpressionError {
            target: self.target.to_string(),
            message,
        }
    }
}
