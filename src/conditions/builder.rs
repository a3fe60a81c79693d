//! rule-builder group format
//!
//! rule files written by the desktop GUI store expressions as query-builder
//! groups:
//!
//! ```json
//! { "condition": "AND", "not": false, "rules": [
//!     { "field": "ProcessName", "operator": "equal", "value": "notepad.exe" },
//!     { "condition": "OR", "rules": [ ... ] }
//! ] }
//! ```
//!
//! groups compile to the same AST as the native condition syntax.

use serde_json::{Map, Value as JsonValue};

use super::parser::{
    join_path, parse_field_name, parse_pattern, parse_text, parse_value_array, ParseError,
};
use super::types::{CompareOp, Condition, FieldCondition, Value};

/// whether `obj` is a rule-builder group rather than a native condition
pub(super) fn is_group(obj: &Map<String, JsonValue>) -> bool {
    obj.contains_key("rules") && (obj.contains_key("condition") || obj.len() == 1)
}

pub(super) fn parse_group(obj: &Map<String, JsonValue>, path: &str) -> Result<Condition, ParseError> {
    let rules = obj
        .get("rules")
        .and_then(JsonValue::as_array)
        .ok_or_else(|| ParseError::new("'rules' must be an array", join_path(path, "rules")))?;

    let any = match obj.get("condition") {
        None => false,
        Some(JsonValue::String(c)) if c.eq_ignore_ascii_case("and") => false,
        Some(JsonValue::String(c)) if c.eq_ignore_ascii_case("or") => true,
        Some(other) => {
            return Err(ParseError::new(
                format!("'condition' must be \"AND\" or \"OR\", got {}", other),
                join_path(path, "condition"),
            ))
        }
    };

    let conditions = rules
        .iter()
        .enumerate()
        .map(|(i, rule)| {
            let rule_path = join_path(path, &format!("rules[{}]", i));
            let rule = rule
                .as_object()
                .ok_or_else(|| ParseError::new("rule must be an object", &rule_path))?;
            if rule.contains_key("rules") {
                parse_group(rule, &rule_path)
            } else {
                parse_leaf(rule, &rule_path)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let group = if any {
        Condition::Any(conditions)
    } else {
        Condition::All(conditions)
    };

    match obj.get("not") {
        Some(JsonValue::Bool(true)) => Ok(Condition::negate(group)),
        Some(JsonValue::Bool(false)) | None => Ok(group),
        Some(_) => Err(ParseError::new("'not' must be a boolean", join_path(path, "not"))),
    }
}

fn parse_leaf(rule: &Map<String, JsonValue>, path: &str) -> Result<Condition, ParseError> {
    // "field" is the property, "id" the filter id; they usually coincide
    let name = rule
        .get("field")
        .or_else(|| rule.get("id"))
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ParseError::new("rule needs a 'field'", path))?;
    let field = parse_field_name(name, &join_path(path, "field"))?;

    let operator = rule
        .get("operator")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ParseError::new("rule needs an 'operator'", path))?;

    let value_path = join_path(path, "value");
    let value = rule.get("value").unwrap_or(&JsonValue::Null);
    let text = || parse_text(value, &value_path).map(Value::String);

    let (op, val, negated) = match operator {
        "equal" => (CompareOp::Eq, text()?, false),
        "not_equal" => (CompareOp::Ne, text()?, false),
        "in" => (CompareOp::In, list(value, &value_path)?, false),
        "not_in" => (CompareOp::In, list(value, &value_path)?, true),
        "begins_with" => (CompareOp::StartsWith, text()?, false),
        "not_begins_with" => (CompareOp::StartsWith, text()?, true),
        "contains" => (CompareOp::Contains, text()?, false),
        "not_contains" => (CompareOp::Contains, text()?, true),
        "ends_with" => (CompareOp::EndsWith, text()?, false),
        "not_ends_with" => (CompareOp::EndsWith, text()?, true),
        "is_empty" | "is_null" => (CompareOp::Eq, Value::String(String::new()), false),
        "is_not_empty" | "is_not_null" => (CompareOp::Ne, Value::String(String::new()), false),
        "regex" => (CompareOp::Matches, parse_pattern(value, &value_path)?, false),
        other => {
            return Err(ParseError::new(
                format!("unsupported operator: '{}'", other),
                join_path(path, "operator"),
            ))
        }
    };

    let condition = Condition::Field(FieldCondition::new(field, op, val));
    Ok(if negated {
        Condition::negate(condition)
    } else {
        condition
    })
}

/// `in` values arrive either as an array or as a comma separated string
fn list(value: &JsonValue, path: &str) -> Result<Value, ParseError> {
    match value {
        JsonValue::Array(arr) => parse_value_array(arr, path).map(Value::List),
        JsonValue::String(s) => Ok(Value::List(
            s.split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
        )),
        _ => Err(ParseError::new("'in' expects an array or a list string", path)),
    }
}
