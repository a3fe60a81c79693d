//! condition evaluator
//!
//! evaluates parsed conditions against an enriched window descriptor.
//! text comparisons ignore case; regexes follow their own flags.

use std::borrow::Cow;

use super::types::{CompareOp, Condition, Field, FieldCondition, Value};
use crate::window::WindowDescriptor;

/// evaluate a condition against a window
pub fn evaluate(condition: &Condition, window: &WindowDescriptor) -> bool {
    match condition {
        // empty All = true (vacuous truth)
        Condition::All(conditions) => conditions.iter().all(|c| evaluate(c, window)),
        // empty Any = false
        Condition::Any(conditions) => conditions.iter().any(|c| evaluate(c, window)),
        Condition::Not(inner) => !evaluate(inner, window),
        Condition::Field(fc) => evaluate_field(fc, window),
    }
}

fn evaluate_field(fc: &FieldCondition, window: &WindowDescriptor) -> bool {
    let candidates = field_values(fc.field, window);

    match fc.op {
        // "differs" means no candidate equals the value
        CompareOp::Ne => !candidates.iter().any(|c| value_matches(&fc.value, c)),
        op => candidates.iter().any(|c| compare(op, &fc.value, c)),
    }
}

/// text the field can match against
///
/// absent values (unreadable path or command line) read as empty text.
/// a command line matches through any single argument or the joined line.
fn field_values(field: Field, window: &WindowDescriptor) -> Vec<Cow<'_, str>> {
    match field {
        Field::Title => vec![Cow::Borrowed(window.title.as_str())],
        Field::ProcessName => vec![Cow::Borrowed(window.process_name.as_str())],
        Field::ProcessPath => vec![Cow::Borrowed(
            window.process_path.as_deref().unwrap_or_default(),
        )],
        Field::CommandLine => match &window.command_line {
            Some(args) if !args.is_empty() => {
                let mut values: Vec<Cow<'_, str>> =
                    args.iter().map(|a| Cow::Borrowed(a.as_str())).collect();
                if args.len() > 1 {
                    values.push(Cow::Owned(args.join(" ")));
                }
                values
            }
            _ => vec![Cow::Borrowed("")],
        },
        Field::Class => vec![Cow::Borrowed(window.window_class.as_str())],
        Field::Screen => vec![Cow::Borrowed(window.screen_index.as_str())],
    }
}

fn compare(op: CompareOp, value: &Value, candidate: &str) -> bool {
    match op {
        CompareOp::Eq | CompareOp::In => value_matches(value, candidate),
        CompareOp::Ne => !value_matches(value, candidate),
        CompareOp::Contains => text_test(value, candidate, |c, v| c.contains(v)),
        CompareOp::StartsWith => text_test(value, candidate, |c, v| c.starts_with(v)),
        CompareOp::EndsWith => text_test(value, candidate, |c, v| c.ends_with(v)),
        CompareOp::Matches => match value {
            Value::Regex(pattern) => pattern.is_match(candidate),
            _ => false,
        },
    }
}

/// equality for text, match for regex, membership for lists
fn value_matches(value: &Value, candidate: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase() == candidate.to_lowercase(),
        Value::Regex(pattern) => pattern.is_match(candidate),
        Value::List(items) => items.iter().any(|item| value_matches(item, candidate)),
    }
}

fn text_test(value: &Value, candidate: &str, test: impl Fn(&str, &str) -> bool) -> bool {
    match value {
        Value::String(s) => test(&candidate.to_lowercase(), &s.to_lowercase()),
        _ => false,
    }
}
