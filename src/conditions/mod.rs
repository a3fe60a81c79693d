//! rule expressions: JSON predicates over window descriptors
//!
//! provides a condition system supporting:
//! - logical operators: all (AND), any (OR), not (NOT)
//! - text operators: ==, !=, contains, starts_with, ends_with (case-insensitive)
//! - regex matching, with `"/re/flags"` string shorthand
//! - set operator: in
//! - implicit AND when multiple fields in one object
//! - rule-builder groups as saved by the desktop GUI
//!
//! expressions are compiled once per rule snapshot into a [`Predicate`].

mod builder;
mod eval;
mod parser;
mod types;

use std::fmt;

use serde_json::Value as JsonValue;

use crate::window::WindowDescriptor;

pub use eval::evaluate;
pub use parser::{parse_condition, ParseError};
pub use types::{CompareOp, Condition, Field, FieldCondition, Pattern, Value};

/// compiled, ready-to-run rule expression
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    condition: Condition,
}

impl Predicate {
    pub fn matches(&self, window: &WindowDescriptor) -> bool {
        evaluate(&self.condition, window)
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }
}

impl From<Condition> for Predicate {
    fn from(condition: Condition) -> Self {
        Self { condition }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.condition)
    }
}

/// compile a JSON expression; invalid regexes and unknown fields fail here,
/// never at match time
pub fn compile(json: &JsonValue) -> Result<Predicate, ParseError> {
    parse_condition(json).map(Predicate::from)
}
