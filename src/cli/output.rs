//! output formatting for scriptable CLI output
//!
//! machine-readable output uses JSON-RPC 2.0 envelopes:
//! - success: {"jsonrpc": "2.0", "result": {...}, "id": null}
//! - error: {"jsonrpc": "2.0", "error": {"code": N, "message": "...", "data": {...}}, "id": null}

use serde::Serialize;
use std::io::IsTerminal;

use crate::checker::StateStats;
use crate::dispatch::ActionSpec;
use crate::rules::{RuleProblem, RuleTemplate};
use crate::window::WindowDescriptor;

const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// human-readable text output
    Text,
    /// JSON-RPC 2.0 output
    Json,
    /// no output on success (errors still go to stderr)
    Quiet,
}

impl OutputMode {
    /// priority: quiet > json > no_json > auto-detect
    pub fn from_flags(json: bool, no_json: bool, quiet: bool) -> Self {
        if quiet {
            return Self::Quiet;
        }
        if json {
            return Self::Json;
        }
        if no_json {
            return Self::Text;
        }
        // JSON when stdout is piped
        if !std::io::stdout().is_terminal() {
            Self::Json
        } else {
            Self::Text
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self, Self::Quiet)
    }
}

#[derive(Serialize)]
pub struct JsonRpcResponse<T: Serialize> {
    pub jsonrpc: &'static str,
    pub result: T,
    /// null for CLI responses (no request id)
    pub id: Option<String>,
}

impl<T: Serialize> JsonRpcResponse<T> {
    pub fn new(result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result,
            id: None,
        }
    }
}

#[derive(Serialize)]
pub struct JsonRpcError {
    pub jsonrpc: &'static str,
    pub error: RpcError,
    pub id: Option<String>,
}

#[derive(Serialize)]
pub struct RpcError {
    /// exit code offset into the application range, see [`to_jsonrpc_code`]
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ErrorData>,
}

#[derive(Serialize)]
pub struct ErrorData {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub problems: Vec<String>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            error: RpcError {
                code: to_jsonrpc_code(code),
                message: message.into(),
                data: None,
            },
            id: None,
        }
    }

    pub fn with_problems(code: i32, message: impl Into<String>, problems: Vec<String>) -> Self {
        let mut error = Self::new(code, message);
        if !problems.is_empty() {
            error.error.data = Some(ErrorData { problems });
        }
        error
    }
}

/// JSON-RPC reserves -32000 to -32099 for application errors
fn to_jsonrpc_code(exit_code: i32) -> i32 {
    -32000 - exit_code
}

// ============================================================================
// Result data
// ============================================================================

/// one rule as shown by `rules list`
#[derive(Serialize)]
pub struct RuleSummary {
    pub name: String,
    pub enabled: bool,
    pub action: String,
    pub expression: serde_json::Value,
}

impl From<&RuleTemplate> for RuleSummary {
    fn from(rule: &RuleTemplate) -> Self {
        Self {
            name: rule.name.clone(),
            enabled: rule.enabled,
            action: rule.action.to_string(),
            expression: rule.expression.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct RulesListData {
    pub profile: String,
    pub path: String,
    pub rules: Vec<RuleSummary>,
}

#[derive(Serialize)]
pub struct RulesVerifyData {
    pub path: String,
    pub valid: bool,
    pub problems: Vec<String>,
}

impl RulesVerifyData {
    pub fn new(path: String, problems: &[RuleProblem]) -> Self {
        Self {
            path,
            valid: problems.is_empty(),
            problems: problems.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CheckData<'a> {
    pub window: &'a WindowDescriptor,
    pub actions: &'a [ActionSpec],
}

#[derive(Serialize)]
pub struct ReplayData {
    pub events: usize,
    pub executed: u64,
    pub failed: u64,
    pub windows: StateStats,
}

impl std::fmt::Display for ReplayData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "replayed {} event(s): {} action(s) executed, {} failed; windows matched {}, exhausted {}, still checking {}",
            self.events,
            self.executed,
            self.failed,
            self.windows.matched,
            self.windows.exhausted,
            self.windows.checking
        )
    }
}

// ============================================================================
// Output functions
// ============================================================================

pub fn print_json<T: Serialize>(data: &T) {
    let response = JsonRpcResponse::new(data);
    if let Ok(json) = serde_json::to_string(&response) {
        println!("{}", json);
    }
}

pub fn print_json_error_with_problems(code: i32, message: &str, problems: Vec<String>) {
    let error = JsonRpcError::with_problems(code, message, problems);
    if let Ok(json) = serde_json::to_string(&error) {
        println!("{}", json);
    }
}
