//! Rule expression model.
//!
//! An [`Expr`] is a closed tree of literal values, references to other
//! components or context inputs, table lookups, and binary operations.
//! Expressions are data only; they are evaluated by
//! [`crate::evaluation::evaluate`].

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division. Division by zero is an evaluation error.
    Div,
    /// The smaller of both operands.
    Min,
    /// The larger of both operands.
    Max,
}

impl BinaryOp {
    /// The operator as written in rendered expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Min => "min",
            BinaryOp::Max => "max",
        }
    }
}

/// A single key value passed to a table lookup.
///
/// Keys are opaque to the engine; their meaning is defined by the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKey {
    /// A textual key such as a tax class or region code.
    Text(String),
    /// A numeric key such as an income amount.
    Number(Decimal),
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Text(text) => write!(f, "'{}'", text),
            LookupKey::Number(number) => write!(f, "{}", number),
        }
    }
}

/// An argument of a table lookup, resolved to a [`LookupKey`] at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyArg {
    /// A constant text key.
    Text(String),
    /// A numeric key computed from an expression.
    Value(Expr),
}

/// The formula attached to a rule.
///
/// # Example
///
/// ```
/// use salary_engine::models::Expr;
/// use rust_decimal::Decimal;
///
/// // Bonus = 10% of Base
/// let bonus = Expr::percent_of(Expr::reference("Base"), Decimal::from(10));
/// assert_eq!(bonus.to_string(), "(Base * (10 / 100))");
/// assert!(bonus.references().contains("Base"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expr {
    /// A constant amount.
    Literal {
        /// The constant value.
        value: Decimal,
    },
    /// A reference to another component, or to a context input when no
    /// active component has that name. Must be declared in the rule's
    /// dependencies.
    Ref {
        /// The referenced name.
        name: String,
    },
    /// A direct read of a context input, bypassing components of the same name.
    Input {
        /// The input name.
        name: String,
    },
    /// A date-effective table lookup.
    Lookup {
        /// The table to query.
        table: String,
        /// The ordered lookup keys.
        #[serde(default)]
        keys: Vec<KeyArg>,
    },
    /// A binary operation.
    Binary {
        /// The operator.
        op: BinaryOp,
        /// The left operand.
        lhs: Box<Expr>,
        /// The right operand.
        rhs: Box<Expr>,
    },
    /// Rounds the inner value to `scale` decimal places, midpoint away from zero.
    Round {
        /// The value to round.
        value: Box<Expr>,
        /// The number of decimal places to keep.
        scale: u32,
    },
}

impl Expr {
    /// Creates a literal expression.
    pub fn literal(value: Decimal) -> Self {
        Expr::Literal { value }
    }

    /// Creates a component-or-input reference.
    pub fn reference(name: impl Into<String>) -> Self {
        Expr::Ref { name: name.into() }
    }

    /// Creates a direct input read.
    pub fn input(name: impl Into<String>) -> Self {
        Expr::Input { name: name.into() }
    }

    /// Creates a table lookup.
    pub fn lookup(table: impl Into<String>, keys: Vec<KeyArg>) -> Self {
        Expr::Lookup {
            table: table.into(),
            keys,
        }
    }

    /// Creates a binary operation.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// The smaller of two expressions.
    pub fn minimum(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Min, lhs, rhs)
    }

    /// The larger of two expressions.
    pub fn maximum(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Max, lhs, rhs)
    }

    /// Rounds an expression to `scale` decimal places.
    pub fn round(value: Expr, scale: u32) -> Self {
        Expr::Round {
            value: Box::new(value),
            scale,
        }
    }

    /// `base * (percentage / 100)`.
    pub fn percent_of(base: Expr, percentage: Decimal) -> Self {
        base * (Expr::literal(percentage) / Expr::literal(Decimal::ONE_HUNDRED))
    }

    /// Returns every name read through [`Expr::Ref`], including inside lookup keys.
    pub fn references(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_references(&mut names);
        names
    }

    fn collect_references<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Literal { .. } | Expr::Input { .. } => {}
            Expr::Ref { name } => {
                names.insert(name.as_str());
            }
            Expr::Lookup { keys, .. } => {
                for key in keys {
                    if let KeyArg::Value(expr) = key {
                        expr.collect_references(names);
                    }
                }
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(names);
                rhs.collect_references(names);
            }
            Expr::Round { value, .. } => value.collect_references(names),
        }
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value } => write!(f, "{}", value),
            Expr::Ref { name } => write!(f, "{}", name),
            Expr::Input { name } => write!(f, "input({})", name),
            Expr::Lookup { table, keys } => {
                write!(f, "lookup({}", table)?;
                for key in keys {
                    match key {
                        KeyArg::Text(text) => write!(f, ", '{}'", text)?,
                        KeyArg::Value(expr) => write!(f, ", {}", expr)?,
                    }
                }
                write!(f, ")")
            }
            Expr::Binary { op, lhs, rhs } => match op {
                BinaryOp::Min | BinaryOp::Max => write!(f, "{}({}, {})", op.symbol(), lhs, rhs),
                _ => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            },
            Expr::Round { value, scale } => write!(f, "round({}, {})", value, scale),
        }
    }
}
