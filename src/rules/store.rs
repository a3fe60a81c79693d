//! rule file persistence
//!
//! the rule file is a JSON array of [`RuleTemplate`]. a missing file means
//! "no rules configured" and is not an error.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::template::{RuleAction, RuleTemplate};
use crate::conditions::{compile, ParseError};

/// highest desktop index a rule may target
pub const MAX_DESKTOP_INDEX: u32 = 99;

#[derive(Debug, Error)]
pub enum RuleStoreError {
    #[error("failed to access rule file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed rule file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule '{rule}' has an invalid expression: {source}")]
    Compile {
        rule: String,
        #[source]
        source: ParseError,
    },

    #[error("failed to serialize rules: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RuleStoreError {
    /// true for errors that mean the file content is unusable
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            RuleStoreError::Parse { .. } | RuleStoreError::Compile { .. }
        )
    }
}

/// read rules without compiling them
pub(crate) fn read(path: &Path) -> Result<Vec<RuleTemplate>, RuleStoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(RuleStoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    // an empty file is what a crashed editor leaves behind; treat as no rules
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|source| RuleStoreError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// load rules, checking that every expression compiles
pub fn load(path: &Path) -> Result<Vec<RuleTemplate>, RuleStoreError> {
    let rules = read(path)?;
    for rule in &rules {
        compile(&rule.expression).map_err(|source| RuleStoreError::Compile {
            rule: rule.name.clone(),
            source,
        })?;
    }
    Ok(rules)
}

/// write rules atomically: temp file in the same directory, then rename
pub fn save(path: &Path, rules: &[RuleTemplate]) -> Result<(), RuleStoreError> {
    let io_err = |source| RuleStoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err)?;

    let content = serde_json::to_string_pretty(rules)?;

    let mut temp = NamedTempFile::new_in(&dir).map_err(io_err)?;
    temp.write_all(content.as_bytes()).map_err(io_err)?;
    temp.write_all(b"\n").map_err(io_err)?;
    temp.persist(path).map_err(|e| io_err(e.error))?;

    Ok(())
}

/// one problem found by [`verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleProblem {
    /// position in the file
    pub index: usize,
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for RuleProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rules[{}] '{}': {}", self.index, self.rule, self.message)
    }
}

/// check every rule and report all problems instead of stopping at the first
///
/// fails only when the file itself cannot be read or parsed
pub fn verify(path: &Path) -> Result<Vec<RuleProblem>, RuleStoreError> {
    let rules = read(path)?;
    Ok(verify_rules(&rules))
}

pub fn verify_rules(rules: &[RuleTemplate]) -> Vec<RuleProblem> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();

    for (index, rule) in rules.iter().enumerate() {
        let mut report = |message: String| {
            problems.push(RuleProblem {
                index,
                rule: rule.name.clone(),
                message,
            })
        };

        if rule.name.trim().is_empty() {
            report("name is empty".to_string());
        } else if !seen.insert(rule.name.as_str()) {
            report("duplicate rule name".to_string());
        }

        if let Err(e) = compile(&rule.expression) {
            report(format!("invalid expression: {}", e));
        }

        if let RuleAction::MoveToDesktop { index, .. } = rule.action {
            if index > MAX_DESKTOP_INDEX {
                report(format!(
                    "desktop index {} out of range (0-{})",
                    index, MAX_DESKTOP_INDEX
                ));
            }
        }
    }

    problems
}
