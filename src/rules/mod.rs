//! rule store: rule file persistence and the active compiled rule set

mod book;
mod store;
mod template;

pub use book::{CompiledRule, RuleBook, RuleSnapshot};
pub use store::{load, save, verify, verify_rules, RuleProblem, RuleStoreError, MAX_DESKTOP_INDEX};
pub use template::{RuleAction, RuleTemplate};
