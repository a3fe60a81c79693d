// integration tests for the config command

use serde_json::json;

use crate::common::*;

#[test]
fn test_config_show_creates_defaults() {
    let env = TestEnv::new();

    let output = env.run(&["--json", "config", "show"]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(env.config_path().exists());

    let value = json_output(&output);
    assert_eq!(value["result"]["current_profile_name"], "default");
    assert_eq!(value["result"]["checker"]["check_times_limit"], 5);
    assert_eq!(value["result"]["checker"]["match_policy"], "all");
}

#[test]
fn test_config_path_honors_flag() {
    let env = TestEnv::new();

    let output = env.run(&["config", "path"]);
    assert!(output.status.success());
    assert_eq!(
        stdout_of(&output).trim(),
        env.config_path().to_str().unwrap()
    );
}

#[test]
fn test_config_set_persists() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--no-json", "config", "set", "checker.match_policy", "first"]);
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stdout_of(&output).contains("Set checker.match_policy = first"));

    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(env.config_path()).unwrap()).unwrap();
    assert_eq!(saved["checker"]["match_policy"], "first");
}

#[test]
fn test_config_set_unknown_key() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--no-json", "config", "set", "checker.speed", "fast"]);
    assert_eq!(output.status.code(), Some(4));
    assert!(stderr_of(&output).contains("Unknown config key"));
}

#[test]
fn test_config_verify() {
    let env = TestEnv::new();
    env.write_config(json!({}));

    let output = env.run(&["--no-json", "config", "verify"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Configuration is valid"));

    write_json(
        &env.config_path(),
        &json!({
            "current_profile_name": "missing",
            "checker": { "check_times_limit": 0 }
        }),
    );
    let output = env.run(&["--json", "config", "verify"]);
    assert_eq!(output.status.code(), Some(5));

    let value = json_output(&output);
    assert_eq!(value["error"]["data"]["problems"].as_array().unwrap().len(), 2);
}

#[test]
fn test_malformed_config_is_config_error() {
    let env = TestEnv::new();
    std::fs::write(env.config_path(), "{ broken").unwrap();

    let output = env.run(&["--json", "rules", "list"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_malformed_config_show_is_config_error() {
    let env = TestEnv::new();
    std::fs::write(env.config_path(), "{ broken").unwrap();

    let output = env.run(&["--json", "config", "show"]);
    assert_eq!(output.status.code(), Some(5));
    assert_eq!(json_output(&output)["error"]["code"], json!(-32005));
}

#[test]
fn test_unwritable_config_is_general_error() {
    let env = TestEnv::new();
    // a directory where the config file should be
    std::fs::create_dir(env.config_path()).unwrap();

    let output = env.run(&["--json", "config", "reset"]);
    assert_eq!(output.status.code(), Some(1));

    let value = json_output(&output);
    assert_eq!(value["error"]["code"], json!(-32001));
    assert!(value["error"]["message"].is_string());
}
