//! condition parser - converts JSON to condition AST
//!
//! supports:
//! - logical operators: all, any, not
//! - comparison operators: ==, !=, contains, starts_with, ends_with, matches, in
//! - implicit AND when multiple keys in one object
//! - `"/regex/flags"` string shorthand for regex matches
//! - rule-builder groups (`{ "condition": "AND", "rules": [...] }`), see [`super::builder`]

use serde_json::Value as JsonValue;
use strsim::levenshtein;

use super::builder;
use super::types::{CompareOp, Condition, Field, FieldCondition, Pattern, Value};

/// error type for parsing conditions
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub path: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// parse a JSON value into a condition AST
pub fn parse_condition(json: &JsonValue) -> Result<Condition, ParseError> {
    parse_condition_internal(json, "")
}

pub(super) fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else if segment.starts_with('[') {
        format!("{}{}", path, segment)
    } else {
        format!("{}.{}", path, segment)
    }
}

fn parse_condition_internal(json: &JsonValue, path: &str) -> Result<Condition, ParseError> {
    match json {
        JsonValue::Object(obj) => parse_object(obj, path),
        JsonValue::Bool(b) => {
            // bare boolean: true = always, false = never
            if *b {
                Ok(Condition::always())
            } else {
                Ok(Condition::never())
            }
        }
        JsonValue::String(s) => Err(ParseError::new(
            format!("unexpected string value: {}", s),
            path,
        )),
        _ => Err(ParseError::new(
            format!("expected object, got {}", json),
            path,
        )),
    }
}

fn parse_object(
    obj: &serde_json::Map<String, JsonValue>,
    path: &str,
) -> Result<Condition, ParseError> {
    if builder::is_group(obj) {
        return builder::parse_group(obj, path);
    }

    // multiple keys = implicit AND
    let mut conditions = Vec::new();

    for (key, value) in obj {
        let key_path = join_path(path, key);
        let condition = match key.as_str() {
            "all" => Condition::All(parse_list(value, "all", &key_path)?),
            "any" => Condition::Any(parse_list(value, "any", &key_path)?),
            "not" => Condition::negate(parse_condition_internal(value, &key_path)?),
            _ => parse_field_condition(parse_field_name(key, &key_path)?, value, &key_path)?,
        };
        conditions.push(condition);
    }

    match conditions.len() {
        0 => Ok(Condition::always()), // empty object = true
        1 => Ok(conditions.remove(0)),
        _ => Ok(Condition::All(conditions)),
    }
}

fn parse_list(value: &JsonValue, op: &str, path: &str) -> Result<Vec<Condition>, ParseError> {
    let arr = value
        .as_array()
        .ok_or_else(|| ParseError::new(format!("'{}' must be an array", op), path))?;

    arr.iter()
        .enumerate()
        .map(|(i, v)| parse_condition_internal(v, &join_path(path, &format!("[{}]", i))))
        .collect()
}

/// resolve a field name, suggesting the closest known name on failure
pub(super) fn parse_field_name(name: &str, path: &str) -> Result<Field, ParseError> {
    Field::parse(name).ok_or_else(|| {
        let message = match suggest_field(name) {
            Some(suggestion) => format!(
                "unknown field: '{}' (did you mean '{}'?)",
                name, suggestion
            ),
            None => format!(
                "unknown field: '{}' (expected one of: {})",
                name,
                Field::ALL
                    .iter()
                    .map(Field::name)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        ParseError::new(message, path)
    })
}

fn suggest_field(name: &str) -> Option<&'static str> {
    let name_lower = name.to_lowercase();
    Field::ALL
        .iter()
        .map(|f| (f.name(), levenshtein(&name_lower, f.name())))
        .filter(|(_, distance)| *distance <= 3)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

fn parse_field_condition(
    field: Field,
    value: &JsonValue,
    path: &str,
) -> Result<Condition, ParseError> {
    match value {
        // simple value: { "title": "Untitled" } or { "title": "/untitled/i" }
        JsonValue::String(s) => match Pattern::parse_literal(s) {
            Some(pattern) => Ok(Condition::Field(FieldCondition::new(
                field,
                CompareOp::Matches,
                Value::Regex(pattern.map_err(|e| regex_error(e, path))?),
            ))),
            None => Ok(Condition::Field(FieldCondition::eq(field, s.clone()))),
        },
        // { "screen": 1 } compares against "1"
        JsonValue::Number(n) => Ok(Condition::Field(FieldCondition::eq(field, n.to_string()))),

        // object value: { "title": { "contains": "Notepad" } }
        JsonValue::Object(obj) => parse_field_with_operators(field, obj, path),

        // array value: shorthand for 'in'
        JsonValue::Array(arr) => {
            let values = parse_value_array(arr, path)?;
            Ok(Condition::Field(FieldCondition::is_in(field, values)))
        }

        JsonValue::Bool(_) => Err(ParseError::new(
            format!("'{}' is text, boolean values not supported", field),
            path,
        )),
        JsonValue::Null => Err(ParseError::new("null values not supported", path)),
    }
}

fn parse_field_with_operators(
    field: Field,
    obj: &serde_json::Map<String, JsonValue>,
    path: &str,
) -> Result<Condition, ParseError> {
    let mut conditions = Vec::new();

    for (op_str, value) in obj {
        let op_path = join_path(path, op_str);
        let op = CompareOp::parse(op_str)
            .ok_or_else(|| ParseError::new(format!("unknown operator: '{}'", op_str), path))?;

        let val = match op {
            CompareOp::Matches => parse_pattern(value, &op_path)?,
            CompareOp::In => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| ParseError::new("'in' expects an array", &op_path))?;
                Value::List(parse_value_array(arr, &op_path)?)
            }
            _ => Value::String(parse_text(value, &op_path)?),
        };
        conditions.push(Condition::Field(FieldCondition::new(field, op, val)));
    }

    match conditions.len() {
        0 => Err(ParseError::new("empty operator object", path)),
        1 => Ok(conditions.remove(0)),
        _ => Ok(Condition::All(conditions)), // multiple operators = AND
    }
}

/// a string or number, as text
pub(super) fn parse_text(json: &JsonValue, path: &str) -> Result<String, ParseError> {
    match json {
        JsonValue::String(s) => Ok(s.clone()),
        JsonValue::Number(n) => Ok(n.to_string()),
        JsonValue::Null => Err(ParseError::new("null values not supported", path)),
        other => Err(ParseError::new(
            format!("expected string or number, got {}", other),
            path,
        )),
    }
}

/// a regex in literal or bare form
pub(super) fn parse_pattern(json: &JsonValue, path: &str) -> Result<Value, ParseError> {
    let source = json
        .as_str()
        .ok_or_else(|| ParseError::new("regex must be a string", path))?;
    Pattern::parse(source)
        .map(Value::Regex)
        .map_err(|e| regex_error(e, path))
}

/// list members: text, or regex literals
pub(super) fn parse_value_array(arr: &[JsonValue], path: &str) -> Result<Vec<Value>, ParseError> {
    arr.iter()
        .enumerate()
        .map(|(i, v)| {
            let item_path = join_path(path, &format!("[{}]", i));
            match v.as_str().and_then(Pattern::parse_literal) {
                Some(pattern) => pattern
                    .map(Value::Regex)
                    .map_err(|e| regex_error(e, &item_path)),
                None => parse_text(v, &item_path).map(Value::String),
            }
        })
        .collect()
}

fn regex_error(err: regex::Error, path: &str) -> ParseError {
    // regex errors are multi-line; keep the last line, which names the problem
    let detail = err.to_string();
    let detail = detail.lines().last().unwrap_or("").trim().to_string();
    ParseError::new(format!("invalid regex: {}", detail), path)
}
