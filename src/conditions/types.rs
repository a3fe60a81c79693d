//! core types for the condition system

use std::fmt;

use regex::{Regex, RegexBuilder};

/// window properties a condition can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// window title
    Title,
    /// executable name, e.g. `notepad.exe`
    ProcessName,
    /// full executable path (absent for protected processes)
    ProcessPath,
    /// process arguments (absent for protected processes)
    CommandLine,
    /// window class name
    Class,
    /// monitor ordinal, as a string
    Screen,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Title,
        Field::ProcessName,
        Field::ProcessPath,
        Field::CommandLine,
        Field::Class,
        Field::Screen,
    ];

    /// parse field name (case-insensitive, accepts legacy property names)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "title" => Some(Field::Title),
            "process" | "process.name" | "process_name" | "processname" => {
                Some(Field::ProcessName)
            }
            "process.path" | "process_path" | "processpath" => Some(Field::ProcessPath),
            "command_line" | "commandline" | "cmdline" => Some(Field::CommandLine),
            "class" | "classname" | "window_class" => Some(Field::Class),
            "screen" | "wininscreen" | "screen_index" => Some(Field::Screen),
            _ => None,
        }
    }

    /// canonical name used in messages and display
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::ProcessName => "process",
            Field::ProcessPath => "process.path",
            Field::CommandLine => "command_line",
            Field::Class => "class",
            Field::Screen => "screen",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// comparison operators supported in conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// equality: ==, eq, equals
    Eq,
    /// inequality: !=, ne, not_equals
    Ne,
    /// substring: contains
    Contains,
    /// prefix: starts_with
    StartsWith,
    /// suffix: ends_with
    EndsWith,
    /// regular expression: matches, regex
    Matches,
    /// set membership: in
    In,
}

impl CompareOp {
    /// parse operator from string (supports all forms)
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "==" | "eq" | "equals" => Some(CompareOp::Eq),
            "!=" | "ne" | "not_equals" => Some(CompareOp::Ne),
            "contains" => Some(CompareOp::Contains),
            "starts_with" => Some(CompareOp::StartsWith),
            "ends_with" => Some(CompareOp::EndsWith),
            "matches" | "regex" | "=~" => Some(CompareOp::Matches),
            "in" => Some(CompareOp::In),
            _ => None,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "=="),
            CompareOp::Ne => write!(f, "!="),
            CompareOp::Contains => write!(f, "contains"),
            CompareOp::StartsWith => write!(f, "starts_with"),
            CompareOp::EndsWith => write!(f, "ends_with"),
            CompareOp::Matches => write!(f, "=~"),
            CompareOp::In => write!(f, "in"),
        }
    }
}

/// compiled regular expression that remembers how it was written
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// compile a bare regex (no slashes)
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    /// recognise the `/regex/flags` literal form
    ///
    /// returns `None` if `s` is not written as a literal. flags are any of
    /// `imsxU`; anything else means the slashes are part of a plain string
    /// (e.g. a path like `/usr/bin/code`). a trailing slash makes it a
    /// literal: `/usr/bin/` is the regex `usr/bin`
    pub fn parse_literal(s: &str) -> Option<Result<Self, regex::Error>> {
        if !s.starts_with('/') || s.len() <= 2 {
            return None;
        }
        let end = s[1..].rfind('/')? + 1;
        let body = &s[1..end];
        let flags = &s[end + 1..];
        if body.is_empty() || !flags.chars().all(|c| "imsxU".contains(c)) {
            return None;
        }

        let built = RegexBuilder::new(body)
            .case_insensitive(flags.contains('i'))
            .multi_line(flags.contains('m'))
            .dot_matches_new_line(flags.contains('s'))
            .ignore_whitespace(flags.contains('x'))
            .swap_greed(flags.contains('U'))
            .build();

        Some(built.map(|regex| Self {
            source: s.to_string(),
            regex,
        }))
    }

    /// accept either a literal or a bare regex
    pub fn parse(s: &str) -> Result<Self, regex::Error> {
        Self::parse_literal(s).unwrap_or_else(|| Self::new(s))
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.starts_with('/') {
            write!(f, "{}", self.source)
        } else {
            write!(f, "/{}/", self.source)
        }
    }
}

/// a value that can be used in comparisons
///
/// every window field is text, so numbers are stored as their decimal string
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// string value
    String(String),
    /// compiled regex
    Regex(Pattern),
    /// list of values (for 'in' operator)
    List(Vec<Value>),
}

impl Value {
    /// try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// try to get as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Regex(p) => write!(f, "{}", p),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// a single field comparison condition
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCondition {
    /// window property under test
    pub field: Field,
    /// comparison operator
    pub op: CompareOp,
    /// value to compare against
    pub value: Value,
}

impl FieldCondition {
    /// create a new field condition
    pub fn new(field: Field, op: CompareOp, value: Value) -> Self {
        Self { field, op, value }
    }

    /// create an equality condition
    pub fn eq(field: Field, value: impl Into<String>) -> Self {
        Self::new(field, CompareOp::Eq, Value::String(value.into()))
    }

    /// create an 'in' condition
    pub fn is_in(field: Field, values: Vec<Value>) -> Self {
        Self::new(field, CompareOp::In, Value::List(values))
    }
}

impl fmt::Display for FieldCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.op, self.value)
    }
}

/// the condition AST - represents a parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// all conditions must be true (AND)
    All(Vec<Condition>),
    /// any condition must be true (OR)
    Any(Vec<Condition>),
    /// negate a condition (NOT)
    Not(Box<Condition>),
    /// a field comparison
    Field(FieldCondition),
}

impl Condition {
    /// condition that always holds
    pub fn always() -> Self {
        Condition::All(vec![])
    }

    /// condition that never holds
    pub fn never() -> Self {
        Condition::Any(vec![])
    }

    /// create a NOT condition
    pub fn negate(condition: Condition) -> Self {
        Condition::Not(Box::new(condition))
    }

    /// create a field condition
    pub fn field(fc: FieldCondition) -> Self {
        Condition::Field(fc)
    }

    /// number of field comparisons in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Condition::All(v) | Condition::Any(v) => v.iter().map(Condition::leaf_count).sum(),
            Condition::Not(inner) => inner.leaf_count(),
            Condition::Field(_) => 1,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::All(conditions) if conditions.is_empty() => write!(f, "true"),
            Condition::Any(conditions) if conditions.is_empty() => write!(f, "false"),
            Condition::All(conditions) => {
                write!(f, "all(")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Condition::Any(conditions) => {
                write!(f, "any(")?;
                for (i, c) in conditions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            Condition::Not(inner) => write!(f, "not({})", inner),
            Condition::Field(fc) => write!(f, "{}", fc),
        }
    }
}
