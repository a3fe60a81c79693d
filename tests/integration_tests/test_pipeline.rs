// end-to-end scenarios through the public library API

use std::sync::{Arc, Mutex};
use std::time::Duration;

use deskrules::checker::{CheckerOptions, TitleStrategy, WindowCheckState};
use deskrules::daemon::{Pipeline, PipelineOptions};
use deskrules::dispatch::{ActionExecutor, ActionSpec, ExecutorError};
use deskrules::rules::{RuleAction, RuleBook, RuleTemplate};
use deskrules::window::scripted::{ScriptedWindow, TitleChange};
use deskrules::window::{ScriptedWindows, VisibleWindow, WindowHandle, WindowScript};
use serde_json::json;

use crate::common::{notepad_rule, write_json, TestEnv};

type Seen = Arc<Mutex<Vec<ActionSpec>>>;

fn recorder() -> (Seen, impl ActionExecutor) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let executor = move |spec: &ActionSpec| -> Result<(), ExecutorError> {
        sink.lock().unwrap().push(spec.clone());
        Ok(())
    };
    (seen, executor)
}

fn notepad(handle: isize, title: &str) -> ScriptedWindow {
    ScriptedWindow {
        handle: WindowHandle(handle),
        pid: 4000 + handle as u32,
        process_name: "notepad.exe".to_string(),
        titles: vec![TitleChange {
            at_ms: 0,
            title: title.to_string(),
        }],
        ..ScriptedWindow::default()
    }
}

fn system(windows: Vec<ScriptedWindow>) -> Arc<ScriptedWindows> {
    Arc::new(ScriptedWindows::new(WindowScript {
        monitors: vec![],
        windows,
    }))
}

fn eager() -> PipelineOptions {
    PipelineOptions {
        checker: CheckerOptions {
            title_strategy: TitleStrategy::Eager,
            check_times_limit: 3,
            ignore_on_timeout: true,
            ..CheckerOptions::default()
        },
        ..PipelineOptions::default()
    }
}

fn rule(value: serde_json::Value) -> RuleTemplate {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_notepad_moves_to_desktop_two() {
    let sys = system(vec![notepad(1, "Untitled")]);
    let book = Arc::new(RuleBook::in_memory(vec![rule(notepad_rule())]).unwrap());
    let (seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    pipeline.push(VisibleWindow::with_title(WindowHandle(1), "Untitled"));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(
        pipeline.checker().states().get(WindowHandle(1)),
        Some(WindowCheckState::Matched)
    );
    // already ignored: a second sighting emits nothing
    pipeline.push(VisibleWindow::with_title(WindowHandle(1), "Untitled"));
    let report = pipeline.finish().await;

    let seen = seen.lock().unwrap();
    assert_eq!(report.actions.executed, 1);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].rule_name, "notepad to desktop 2");
    assert_eq!(seen[0].window_title, "Untitled");
    assert_eq!(
        seen[0].action,
        RuleAction::MoveToDesktop {
            index: 2,
            follow: false
        }
    );
}

#[tokio::test]
async fn test_two_matching_rules_fire_in_order() {
    let sys = system(vec![notepad(1, "Untitled")]);
    let book = Arc::new(
        RuleBook::in_memory(vec![
            rule(json!({
                "name": "pin",
                "expression": { "title": "/^untitled$/i" },
                "action": { "kind": "pin_window" }
            })),
            rule(notepad_rule()),
        ])
        .unwrap(),
    );
    let (seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    pipeline.push(VisibleWindow::new(WindowHandle(1)));
    let report = pipeline.finish().await;

    let names: Vec<String> = seen.lock().unwrap().iter().map(|s| s.rule_name.clone()).collect();
    assert_eq!(names, vec!["pin", "notepad to desktop 2"]);
    assert_eq!(report.stats.windows.matched, 1);
}

#[tokio::test]
async fn test_disabled_rule_emits_nothing() {
    let sys = system(vec![notepad(1, "Untitled")]);
    let book = Arc::new(RuleBook::in_memory(vec![rule(notepad_rule()).disabled()]).unwrap());
    let (seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    pipeline.push(VisibleWindow::new(WindowHandle(1)));
    let report = pipeline.finish().await;

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(report.stats.windows.checking, 1);
}

#[tokio::test]
async fn test_dead_window_is_dropped_quietly() {
    let mut gone = notepad(1, "Untitled");
    gone.closed_at_ms = Some(0);
    let sys = system(vec![gone]);
    let book = Arc::new(RuleBook::in_memory(vec![rule(notepad_rule())]).unwrap());
    let (seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    pipeline.push(VisibleWindow::with_title(WindowHandle(1), "Untitled"));
    let report = pipeline.finish().await;

    assert!(seen.lock().unwrap().is_empty());
    assert_eq!(report.actions.failed, 0);
    assert_eq!(report.stats.windows.matched, 0);
}

#[tokio::test]
async fn test_unmatched_window_exhausts_at_limit() {
    let sys = system(vec![notepad(1, "Untitled")]);
    let book = Arc::new(
        RuleBook::in_memory(vec![rule(json!({
            "name": "code",
            "expression": { "process": "code.exe" },
            "action": { "kind": "move_to_desktop", "index": 1 }
        }))])
        .unwrap(),
    );
    let (_seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    for expected in [1u32, 2] {
        pipeline.push(VisibleWindow::new(WindowHandle(1)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            pipeline.checker().states().get(WindowHandle(1)),
            Some(WindowCheckState::Checking { checks: expected })
        );
    }
    pipeline.push(VisibleWindow::new(WindowHandle(1)));
    let report = pipeline.finish().await;

    assert_eq!(report.stats.windows.exhausted, 1);
}

#[tokio::test]
async fn test_reload_picks_up_saved_rules() {
    let env = TestEnv::new();
    let path = env.write_rules(json!([]));

    let sys = system(vec![notepad(1, "Untitled"), notepad(2, "Untitled")]);
    let book = Arc::new(RuleBook::open(&path).unwrap());
    assert!(book.fetch_rules().is_empty());
    let (seen, executor) = recorder();

    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);
    pipeline.push(VisibleWindow::new(WindowHandle(1)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    write_json(&path, &json!([notepad_rule()]));
    let snapshot = pipeline.reload_rules().unwrap();
    assert_eq!(snapshot.generation(), 1);
    assert_eq!(snapshot.len(), 1);

    pipeline.push(VisibleWindow::new(WindowHandle(2)));
    let report = pipeline.finish().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].handle, WindowHandle(2));
    assert_eq!(report.stats.windows.checking, 1);
}

#[tokio::test]
async fn test_missing_rule_file_means_no_rules() {
    let env = TestEnv::new();
    let book = RuleBook::open(env.path("absent.json")).unwrap();

    assert!(book.fetch_rules().is_empty());
    assert!(book.snapshot().is_empty());
}

#[tokio::test]
async fn test_save_rules_writes_file_and_activates() {
    let env = TestEnv::new();
    let path = env.rules_path();

    let sys = system(vec![notepad(1, "Untitled")]);
    let book = Arc::new(RuleBook::open(&path).unwrap());
    let (seen, executor) = recorder();
    let pipeline = Pipeline::start(eager(), book, sys.clone(), sys, executor);

    pipeline.save_rules(vec![rule(notepad_rule())]).unwrap();
    assert_eq!(deskrules::rules::load(&path).unwrap().len(), 1);

    pipeline.push(VisibleWindow::new(WindowHandle(1)));
    pipeline.finish().await;
    assert_eq!(seen.lock().unwrap().len(), 1);
}
