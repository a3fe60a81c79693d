// integration tests for the replay command

use serde_json::{json, Value};

use crate::common::*;

fn action_lines(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("action line is JSON"))
        .collect()
}

#[test]
fn test_replay_prints_executed_actions() {
    let env = TestEnv::new();
    env.write_config(json!({
        "title_strategy": "settle",
        "settle_interval_ms": 20,
        "settle_timeout_ms": 500
    }));
    env.write_rules(json!([
        notepad_rule(),
        {
            "name": "report",
            "expression": { "title": { "contains": "report" } },
            "action": { "kind": "pin_window" }
        }
    ]));
    let script = env.path("session.json");
    write_json(
        &script,
        &json!({
            "windows": [
                { "handle": 1, "pid": 10, "process_name": "notepad.exe",
                  "titles": [{ "at_ms": 0, "title": "Untitled" }] },
                { "handle": 2, "pid": 11, "process_name": "excel.exe", "shown_at_ms": 20,
                  "titles": [{ "at_ms": 20, "title": "Loading" }, { "at_ms": 120, "title": "Q3 report.xlsx" }] },
                { "handle": 3, "pid": 12, "process_name": "calc.exe", "shown_at_ms": 30,
                  "titles": [{ "at_ms": 30, "title": "Calculator" }] }
            ]
        }),
    );

    let output = env.run(&["--json", "replay", script.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let mut actions = action_lines(&stdout_of(&output));
    actions.sort_by_key(|a| a["handle"].as_i64());
    assert_eq!(actions.len(), 2, "{:?}", actions);
    assert_eq!(actions[0]["rule_name"], "notepad to desktop 2");
    assert_eq!(actions[0]["window_title"], "Untitled");
    assert_eq!(actions[1]["kind"], "pin_window");
    assert_eq!(actions[1]["window_title"], "Q3 report.xlsx");

    assert!(stderr_of(&output).contains("2 action(s) executed"));
}

#[test]
fn test_replay_with_missing_script() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--json", "replay", env.path("nope.json").to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4));
}

#[test]
fn test_replay_log_only_prints_no_action_lines() {
    let env = TestEnv::new();
    env.write_config(json!({ "title_strategy": "eager" }));
    env.write_rules(json!([notepad_rule()]));
    let script = env.path("session.json");
    write_json(
        &script,
        &json!({
            "windows": [
                { "handle": 1, "pid": 10, "process_name": "notepad.exe",
                  "titles": [{ "at_ms": 0, "title": "Untitled" }] }
            ]
        }),
    );

    let output = env.run(&["--json", "replay", "--log-only", script.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    assert!(stdout_of(&output).trim().is_empty());
    assert!(stderr_of(&output).contains("1 action(s) executed"));
}
