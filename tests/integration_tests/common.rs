// shared utilities for integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

/// isolated home for one test: config file and rule file live here
pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create test directory"),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.path("config.json")
    }

    pub fn rules_path(&self) -> PathBuf {
        self.path("rules.json")
    }

    /// config whose default profile reads `rules.json` next to it
    pub fn write_config(&self, checker: Value) -> PathBuf {
        let config = serde_json::json!({
            "current_profile_name": "default",
            "profiles": {
                "default": {
                    "ignore_window_on_rule_check_timeout": true,
                    "rules_path": self.rules_path().to_str().unwrap(),
                }
            },
            "checker": checker,
            "log": { "level": "warn" }
        });
        write_json(&self.config_path(), &config);
        self.config_path()
    }

    pub fn write_rules(&self, rules: Value) -> PathBuf {
        write_json(&self.rules_path(), &rules);
        self.rules_path()
    }

    /// run deskrules against this environment's config
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_deskrules"))
            .arg("--config")
            .arg(self.config_path())
            .args(args)
            .env_remove("RUST_LOG")
            .env_remove("DESKRULES_CONFIG")
            .output()
            .expect("Failed to run deskrules")
    }
}

pub fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).expect("Failed to write file");
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

/// parse the single JSON-RPC line printed in --json mode
pub fn json_output(output: &Output) -> Value {
    let stdout = stdout_of(output);
    serde_json::from_str(stdout.trim()).unwrap_or_else(|e| {
        panic!(
            "stdout is not one JSON document ({}): {}\nstderr: {}",
            e,
            stdout,
            stderr_of(output)
        )
    })
}

/// the notepad rule most scenarios start from
pub fn notepad_rule() -> Value {
    serde_json::json!({
        "name": "notepad to desktop 2",
        "enabled": true,
        "expression": { "process": "notepad.exe" },
        "action": { "kind": "move_to_desktop", "index": 2 }
    })
}
