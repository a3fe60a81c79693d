// integration tests for the rules command

use serde_json::json;

use crate::common::*;

#[test]
fn test_rules_list_json() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    env.write_rules(json!([notepad_rule()]));

    let output = env.run(&["--json", "rules", "list"]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let value = json_output(&output);
    assert_eq!(value["jsonrpc"], "2.0");
    assert_eq!(value["result"]["profile"], "default");
    assert_eq!(value["result"]["rules"][0]["name"], "notepad to desktop 2");
    assert_eq!(value["result"]["rules"][0]["action"], "move to desktop 2");
}

#[test]
fn test_rules_list_without_rule_file() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--no-json", "rules", "list"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("No rules configured"));
}

#[test]
fn test_rules_verify_reports_every_problem() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    env.write_rules(json!([
        notepad_rule(),
        notepad_rule(),
        {
            "name": "bad",
            "expression": { "titel": "x" },
            "action": { "kind": "move_to_desktop", "index": 500 }
        }
    ]));

    let output = env.run(&["--json", "rules", "verify"]);
    assert_eq!(output.status.code(), Some(3));

    let value = json_output(&output);
    let problems = value["error"]["data"]["problems"].as_array().unwrap();
    assert_eq!(problems.len(), 3, "{:?}", problems);
    assert!(problems[0].as_str().unwrap().contains("duplicate"));
    assert!(problems[1].as_str().unwrap().contains("did you mean 'title'"));
    assert!(problems[2].as_str().unwrap().contains("out of range"));
}

#[test]
fn test_rules_verify_valid() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    env.write_rules(json!([notepad_rule()]));

    let output = env.run(&["--json", "rules", "verify"]);
    assert!(output.status.success());
    assert_eq!(json_output(&output)["result"]["valid"], true);
}

#[test]
fn test_rules_check_matching_window() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    env.write_rules(json!([notepad_rule()]));

    let output = env.run(&[
        "--json",
        "rules",
        "check",
        "--window",
        r#"{"handle":1,"title":"Untitled","process_name":"notepad.exe"}"#,
    ]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    let value = json_output(&output);
    let actions = value["result"]["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["kind"], "move_to_desktop");
    assert_eq!(actions[0]["index"], 2);
    assert_eq!(actions[0]["window_title"], "Untitled");
}

#[test]
fn test_rules_check_no_match_exit_code() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    env.write_rules(json!([notepad_rule()]));

    let output = env.run(&[
        "--no-json",
        "rules",
        "check",
        "--window",
        r#"{"title":"main.rs","process_name":"code.exe"}"#,
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout_of(&output).contains("No rule matched"));
}

#[test]
fn test_rules_check_malformed_rule_file() {
    let env = TestEnv::new();
    env.write_config(json!({}));
    std::fs::write(env.rules_path(), "[{ nope").unwrap();

    let output = env.run(&[
        "--json",
        "rules",
        "check",
        "--window",
        r#"{"process_name":"notepad.exe"}"#,
    ]);
    assert_eq!(output.status.code(), Some(3));
    assert!(json_output(&output)["error"]["message"]
        .as_str()
        .unwrap()
        .contains("malformed rule file"));
}

#[test]
fn test_rules_check_invalid_window() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--json", "rules", "check", "--window", "{}"]);
    assert_eq!(output.status.code(), Some(4));
}
