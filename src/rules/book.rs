use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info};

use super::store::{self, RuleStoreError};
use super::template::{RuleAction, RuleTemplate};
use crate::conditions::{compile, Predicate};
use crate::window::WindowDescriptor;

/// a rule together with its compiled expression
#[derive(Debug, Clone)]
pub struct CompiledRule {
    template: RuleTemplate,
    predicate: Predicate,
}

impl CompiledRule {
    pub fn compile(template: RuleTemplate) -> Result<Self, RuleStoreError> {
        let predicate =
            compile(&template.expression).map_err(|source| RuleStoreError::Compile {
                rule: template.name.clone(),
                source,
            })?;
        Ok(Self {
            template,
            predicate,
        })
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub fn enabled(&self) -> bool {
        self.template.enabled
    }

    pub fn action(&self) -> &RuleAction {
        &self.template.action
    }

    pub fn template(&self) -> &RuleTemplate {
        &self.template
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn matches(&self, window: &WindowDescriptor) -> bool {
        self.predicate.matches(window)
    }
}

/// immutable, compiled view of the rule set
///
/// readers hold an `Arc<RuleSnapshot>` for a whole check pass; replacing
/// the rule set never changes a snapshot already handed out
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    generation: u64,
    rules: Vec<CompiledRule>,
}

impl RuleSnapshot {
    /// compile every template, failing on the first invalid expression
    pub fn compile(templates: Vec<RuleTemplate>) -> Result<Self, RuleStoreError> {
        let rules = templates
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            generation: 0,
            rules,
        })
    }

    /// increases by one every time the rule set is replaced
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// enabled rules in declaration order
    pub fn enabled(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|r| r.enabled())
    }

    pub fn templates(&self) -> Vec<RuleTemplate> {
        self.rules.iter().map(|r| r.template.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// owned rule store: the rule file plus the active snapshot
pub struct RuleBook {
    path: Option<PathBuf>,
    current: RwLock<Arc<RuleSnapshot>>,
}

impl RuleBook {
    /// load the rule file at `path`; a missing file gives an empty book
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RuleStoreError> {
        let path = path.into();
        let snapshot = RuleSnapshot::compile(store::read(&path)?)?;
        info!(
            "loaded {} rule(s) from {}",
            snapshot.len(),
            path.display()
        );
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// book without a backing file
    pub fn in_memory(rules: Vec<RuleTemplate>) -> Result<Self, RuleStoreError> {
        Ok(Self {
            path: None,
            current: RwLock::new(Arc::new(RuleSnapshot::compile(rules)?)),
        })
    }

    pub fn empty() -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(RuleSnapshot::default())),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// current snapshot; cheap, clones an `Arc`
    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.read().clone()
    }

    /// current rule templates, in file order
    pub fn fetch_rules(&self) -> Vec<RuleTemplate> {
        self.snapshot().templates()
    }

    /// compile and install a new rule set wholesale
    ///
    /// on a compile error the active snapshot is left untouched
    pub fn replace(&self, rules: Vec<RuleTemplate>) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        let snapshot = RuleSnapshot::compile(rules)?;
        Ok(self.install(snapshot))
    }

    /// re-read the rule file
    ///
    /// on a malformed file the previous snapshot stays active and the error
    /// is returned. a book without a file keeps its rules.
    pub fn reload(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        match self.read_file()? {
            Some(snapshot) => Ok(self.install(snapshot)),
            None => Ok(self.snapshot()),
        }
    }

    /// read and compile the rule file without activating it
    ///
    /// `None` for a book without a file
    pub fn read_file(&self) -> Result<Option<RuleSnapshot>, RuleStoreError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let snapshot = RuleSnapshot::compile(store::read(path)?)?;
        debug!("read {} rule(s) from {}", snapshot.len(), path.display());
        Ok(Some(snapshot))
    }

    /// write the rules of `snapshot` to the rule file, if there is one
    pub fn write_file(&self, snapshot: &RuleSnapshot) -> Result<(), RuleStoreError> {
        match &self.path {
            Some(path) => store::save(path, &snapshot.templates()),
            None => Ok(()),
        }
    }

    /// persist `rules`, then make them the active set
    ///
    /// rules that do not compile are rejected before anything is written
    pub fn save_rules(
        &self,
        rules: Vec<RuleTemplate>,
    ) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        let snapshot = RuleSnapshot::compile(rules)?;
        self.write_file(&snapshot)?;
        Ok(self.install(snapshot))
    }

    /// make `snapshot` the active rule set under the next generation number
    pub fn install(&self, mut snapshot: RuleSnapshot) -> Arc<RuleSnapshot> {
        let mut current = self.write();
        snapshot.generation = current.generation + 1;
        let snapshot = Arc::new(snapshot);
        *current = snapshot.clone();
        info!(
            "rule set generation {} active ({} rule(s))",
            snapshot.generation,
            snapshot.len()
        );
        snapshot
    }

    // snapshots are replaced whole, so a poisoned lock still holds a valid one
    fn read(&self) -> RwLockReadGuard<'_, Arc<RuleSnapshot>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<RuleSnapshot>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn rule(name: &str, process: &str) -> RuleTemplate {
        RuleTemplate::new(
            name,
            json!({ "process": process }),
            RuleAction::MoveToDesktop {
                index: 1,
                follow: false,
            },
        )
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let book = RuleBook::open(dir.path().join("rules.json")).unwrap();

        assert!(book.snapshot().is_empty());
        assert!(book.fetch_rules().is_empty());
        assert_eq!(book.snapshot().generation(), 0);
    }

    #[test]
    fn test_replace_bumps_generation_and_keeps_old_snapshot() {
        let book = RuleBook::in_memory(vec![rule("a", "a.exe")]).unwrap();
        let before = book.snapshot();

        let after = book.replace(vec![rule("b", "b.exe"), rule("c", "c.exe")]).unwrap();

        assert_eq!(before.generation(), 0);
        assert_eq!(before.len(), 1);
        assert_eq!(after.generation(), 1);
        assert_eq!(book.snapshot().len(), 2);
        assert_eq!(book.fetch_rules()[0].name, "b");
    }

    #[test]
    fn test_replace_with_bad_expression_keeps_previous() {
        let book = RuleBook::in_memory(vec![rule("a", "a.exe")]).unwrap();
        let bad = RuleTemplate::new("bad", json!({ "nope": 1 }), RuleAction::PinWindow);

        assert!(book.replace(vec![bad]).is_err());
        assert_eq!(book.fetch_rules()[0].name, "a");
        assert_eq!(book.snapshot().generation(), 0);
    }

    #[test]
    fn test_reload_picks_up_file_changes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let book = RuleBook::open(&path).unwrap();

        store::save(&path, &[rule("a", "a.exe")]).unwrap();
        let snapshot = book.reload().unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.generation(), 1);
    }

    #[test]
    fn test_reload_malformed_keeps_previous() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        store::save(&path, &[rule("a", "a.exe")]).unwrap();
        let book = RuleBook::open(&path).unwrap();

        fs::write(&path, "{ not json").unwrap();
        let err = book.reload().unwrap_err();

        assert!(err.is_malformed());
        assert_eq!(book.fetch_rules().len(), 1);
    }

    #[test]
    fn test_read_file_does_not_activate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let book = RuleBook::open(&path).unwrap();
        store::save(&path, &[rule("a", "a.exe")]).unwrap();

        let prepared = book.read_file().unwrap().unwrap();
        assert_eq!(prepared.len(), 1);
        assert!(book.snapshot().is_empty());

        let active = book.install(prepared);
        assert_eq!(active.generation(), 1);
        assert_eq!(book.fetch_rules()[0].name, "a");
    }

    #[test]
    fn test_in_memory_book_has_no_file() {
        let book = RuleBook::in_memory(vec![rule("a", "a.exe")]).unwrap();

        assert!(book.read_file().unwrap().is_none());
        assert!(book.write_file(&book.snapshot()).is_ok());
        assert_eq!(book.reload().unwrap().generation(), 0);
    }

    #[test]
    fn test_save_rules_persists_and_installs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let book = RuleBook::open(&path).unwrap();

        book.save_rules(vec![rule("a", "a.exe"), rule("b", "b.exe").disabled()])
            .unwrap();

        assert_eq!(book.snapshot().len(), 2);
        assert_eq!(book.snapshot().enabled().count(), 1);
        assert_eq!(store::load(&path).unwrap(), book.fetch_rules());
    }

    #[test]
    fn test_save_rules_rejects_invalid_before_writing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let book = RuleBook::open(&path).unwrap();
        let bad = RuleTemplate::new("bad", json!({ "title": "/(/" }), RuleAction::PinWindow);

        assert!(book.save_rules(vec![bad]).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_compiled_rule_matches() {
        let compiled = CompiledRule::compile(rule("n", "notepad.exe")).unwrap();
        let window = WindowDescriptor::new(crate::window::WindowHandle(1)).with_process("notepad.exe");

        assert!(compiled.matches(&window));
        assert_eq!(compiled.name(), "n");
    }
}
