//! title settling
//!
//! many windows show a placeholder title ("Loading...", empty) when they
//! first become visible. settling re-reads the title on an interval and
//! re-evaluates until something matches or the time budget runs out.

use std::sync::Arc;

use log::debug;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::dispatch::ActionSpec;
use crate::window::{refresh, WindowDescriptor, WindowSystem};

#[derive(Debug)]
pub(super) enum SettleOutcome {
    Matched {
        window: WindowDescriptor,
        actions: Vec<ActionSpec>,
    },
    Unmatched(WindowDescriptor),
    Gone,
    Cancelled,
}

/// evaluate `window` now, then after every poll until a match, the window
/// disappears, `timeout` elapses or `cancel` fires
pub(super) async fn settle<F>(
    windows: Arc<dyn WindowSystem>,
    mut window: WindowDescriptor,
    every: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
    mut evaluate: F,
) -> SettleOutcome
where
    F: FnMut(&WindowDescriptor) -> Vec<ActionSpec>,
{
    let actions = evaluate(&window);
    if !actions.is_empty() {
        return SettleOutcome::Matched { window, actions };
    }

    let deadline = Instant::now() + timeout;
    // interval() panics on a zero period
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    let mut polls = 0u32;
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return SettleOutcome::Cancelled,
            _ = tokio::time::sleep_until(deadline) => {
                debug!(
                    "title of window {} did not settle on a match after {} poll(s)",
                    window.handle, polls
                );
                return SettleOutcome::Unmatched(window);
            }
            _ = ticker.tick() => {}
        }

        polls += 1;
        window = match refresh(windows.clone(), window).await {
            Ok(window) => window,
            Err(e) => {
                debug!("settling stopped: {}", e);
                return SettleOutcome::Gone;
            }
        };

        let actions = evaluate(&window);
        if !actions.is_empty() {
            debug!(
                "window {} matched after {} poll(s) with title \"{}\"",
                window.handle, polls, window.title
            );
            return SettleOutcome::Matched { window, actions };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleAction;
    use crate::window::scripted::{ScriptedWindow, ScriptedWindows, TitleChange, WindowScript};
    use crate::window::WindowHandle;

    fn titled(changes: &[(u64, &str)], closed_at_ms: Option<u64>) -> Arc<ScriptedWindows> {
        Arc::new(ScriptedWindows::new(WindowScript {
            monitors: vec![],
            windows: vec![ScriptedWindow {
                handle: WindowHandle(1),
                pid: 1,
                process_name: "app.exe".to_string(),
                titles: changes
                    .iter()
                    .map(|(at_ms, title)| TitleChange {
                        at_ms: *at_ms,
                        title: title.to_string(),
                    })
                    .collect(),
                closed_at_ms,
                ..ScriptedWindow::default()
            }],
        }))
    }

    fn when_title(expected: &'static str) -> impl FnMut(&WindowDescriptor) -> Vec<ActionSpec> {
        move |w: &WindowDescriptor| {
            if w.title == expected {
                vec![ActionSpec::new(w.handle, "r", &w.title, RuleAction::PinWindow)]
            } else {
                vec![]
            }
        }
    }

    fn start() -> WindowDescriptor {
        WindowDescriptor::new(WindowHandle(1)).with_title("Loading")
    }

    #[tokio::test]
    async fn test_immediate_match_skips_polling() {
        let sys = titled(&[(0, "Loading")], None);
        let outcome = settle(
            sys,
            start(),
            Duration::from_millis(10),
            Duration::from_millis(100),
            &CancellationToken::new(),
            when_title("Loading"),
        )
        .await;

        assert!(matches!(outcome, SettleOutcome::Matched { .. }));
    }

    #[tokio::test]
    async fn test_matches_once_title_changes() {
        let sys = titled(&[(0, "Loading"), (60, "Ready")], None);
        let outcome = settle(
            sys,
            start(),
            Duration::from_millis(10),
            Duration::from_secs(2),
            &CancellationToken::new(),
            when_title("Ready"),
        )
        .await;

        match outcome {
            SettleOutcome::Matched { window, actions } => {
                assert_eq!(window.title, "Ready");
                assert_eq!(actions.len(), 1);
            }
            other => panic!("expected Matched, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_times_out_unmatched() {
        let sys = titled(&[(0, "Loading")], None);
        let outcome = settle(
            sys,
            start(),
            Duration::from_millis(10),
            Duration::from_millis(50),
            &CancellationToken::new(),
            when_title("Ready"),
        )
        .await;

        assert!(matches!(outcome, SettleOutcome::Unmatched(_)));
    }

    #[tokio::test]
    async fn test_window_closing_ends_settle() {
        let sys = titled(&[(0, "Loading")], Some(30));
        let outcome = settle(
            sys,
            start(),
            Duration::from_millis(10),
            Duration::from_secs(2),
            &CancellationToken::new(),
            when_title("Ready"),
        )
        .await;

        assert!(matches!(outcome, SettleOutcome::Gone));
    }

    #[tokio::test]
    async fn test_cancel_ends_settle() {
        let sys = titled(&[(0, "Loading")], None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = settle(
            sys,
            start(),
            Duration::from_millis(10),
            Duration::from_secs(2),
            &cancel,
            when_title("Ready"),
        )
        .await;

        assert!(matches!(outcome, SettleOutcome::Cancelled));
    }
}
