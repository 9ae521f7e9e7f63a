//! Salary Rule Evaluation Engine
//!
//! This crate computes an employee's salary breakdown from date-effective
//! rules. Each rule produces one salary component from a formula over other
//! components, context inputs, constants and table lookups. The engine orders
//! the active rules by their dependencies, evaluates them, and compares an
//! original run against a simulated one.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod evaluation;
pub mod models;
