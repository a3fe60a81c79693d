use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// what happens to a window once a rule matches it
///
/// the engine never interprets the action; it is handed to the executor as is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleAction {
    /// move the window to the desktop at `index` (zero based)
    #[serde(alias = "MoveToDesktop")]
    MoveToDesktop {
        index: u32,
        /// switch to the target desktop as well
        #[serde(default)]
        follow: bool,
    },
    #[serde(alias = "PinWindow")]
    PinWindow,
    #[serde(alias = "UnpinWindow")]
    UnpinWindow,
    #[serde(alias = "PinApp")]
    PinApp,
    #[serde(alias = "UnpinApp")]
    UnpinApp,
    #[serde(alias = "HideFromView")]
    HideFromView,
}

impl RuleAction {
    /// snake_case name, as written in rule files
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::MoveToDesktop { .. } => "move_to_desktop",
            RuleAction::PinWindow => "pin_window",
            RuleAction::UnpinWindow => "unpin_window",
            RuleAction::PinApp => "pin_app",
            RuleAction::UnpinApp => "unpin_app",
            RuleAction::HideFromView => "hide_from_view",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::MoveToDesktop { index, follow } => {
                write!(f, "move to desktop {}", index)?;
                if *follow {
                    write!(f, " (follow)")?;
                }
                Ok(())
            }
            RuleAction::PinWindow => write!(f, "pin window"),
            RuleAction::UnpinWindow => write!(f, "unpin window"),
            RuleAction::PinApp => write!(f, "pin app"),
            RuleAction::UnpinApp => write!(f, "unpin app"),
            RuleAction::HideFromView => write!(f, "hide from view"),
        }
    }
}

/// a rule as stored in the rule file
///
/// the expression stays raw JSON here; compiled predicates only exist in a
/// [`super::RuleSnapshot`] and are never written back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTemplate {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(default = "default_enabled", alias = "Enabled")]
    pub enabled: bool,
    #[serde(alias = "Expression")]
    pub expression: JsonValue,
    #[serde(alias = "Action")]
    pub action: RuleAction,
}

fn default_enabled() -> bool {
    true
}

impl RuleTemplate {
    pub fn new(name: impl Into<String>, expression: JsonValue, action: RuleAction) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            expression,
            action,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
