//! rule evaluation for newly visible windows
//!
//! a window moves through Unseen -> Checking -> {Matched, Exhausted}. each
//! check pass enriches the window, evaluates the enabled rules of one
//! snapshot in declaration order and queues the actions of matching rules.

mod settle;
mod state;

pub use state::{StateStats, WindowCheckState, WindowStates};

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::{ActionQueue, ActionSpec};
use crate::rules::RuleSnapshot;
use crate::window::{enrich, EnrichError, ProcessInfo, VisibleWindow, WindowDescriptor, WindowSystem};

use settle::{settle, SettleOutcome};

/// which matching rules fire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// every matching rule, in declaration order
    #[default]
    #[serde(alias = "all_matching")]
    All,
    /// only the first matching rule
    #[serde(alias = "first_match")]
    First,
}

impl MatchPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" | "all_matching" => Some(MatchPolicy::All),
            "first" | "first_match" => Some(MatchPolicy::First),
            _ => None,
        }
    }
}

/// how the window title is obtained before matching
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleStrategy {
    /// evaluate once with the title known when the window appeared
    Eager,
    /// re-read the title on an interval until a rule matches or time runs out
    #[default]
    Settle,
}

impl TitleStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "eager" => Some(TitleStrategy::Eager),
            "settle" => Some(TitleStrategy::Settle),
            _ => None,
        }
    }
}

/// evaluate the enabled rules of `rules` against `window`
///
/// one spec per matching rule, in declaration order (only the first with
/// [`MatchPolicy::First`]); empty when nothing matches
pub fn evaluate(rules: &RuleSnapshot, window: &WindowDescriptor, policy: MatchPolicy) -> Vec<ActionSpec> {
    let matching = rules.enabled().filter(|rule| rule.matches(window));
    let take = match policy {
        MatchPolicy::All => usize::MAX,
        MatchPolicy::First => 1,
    };

    matching
        .take(take)
        .map(|rule| {
            debug!("rule '{}' matched {}", rule.name(), window.label());
            ActionSpec::new(
                window.handle,
                rule.name(),
                window.title.clone(),
                rule.action().clone(),
            )
        })
        .collect()
}

/// tuning for [`RuleChecker`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerOptions {
    /// misses before a window is given up on (when `ignore_on_timeout`)
    pub check_times_limit: u32,
    pub ignore_on_timeout: bool,
    pub match_policy: MatchPolicy,
    pub title_strategy: TitleStrategy,
    pub settle_interval: Duration,
    pub settle_timeout: Duration,
    /// profile name, for log lines
    pub profile: String,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            check_times_limit: crate::config::DEFAULT_CHECK_TIMES_LIMIT,
            ignore_on_timeout: false,
            match_policy: MatchPolicy::All,
            title_strategy: TitleStrategy::Settle,
            settle_interval: Duration::from_millis(crate::config::DEFAULT_SETTLE_INTERVAL_MS),
            settle_timeout: Duration::from_millis(crate::config::DEFAULT_SETTLE_TIMEOUT_MS),
            profile: crate::config::DEFAULT_PROFILE.to_string(),
        }
    }
}

impl CheckerOptions {
    /// options for the active profile of `config`
    pub fn from_config(config: &Config) -> Self {
        let checker = &config.checker;
        Self {
            check_times_limit: checker.check_times_limit,
            ignore_on_timeout: config
                .current_profile()
                .map(|p| p.ignore_window_on_rule_check_timeout)
                .unwrap_or(false),
            match_policy: checker.match_policy,
            title_strategy: checker.title_strategy,
            settle_interval: Duration::from_millis(checker.settle_interval_ms),
            settle_timeout: Duration::from_millis(checker.settle_timeout_ms),
            profile: config.current_profile_name.clone(),
        }
    }
}

/// result of one check pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// the handle is in the ignore set
    Skipped,
    /// window or process disappeared; nothing recorded
    Gone,
    /// rules matched; `actions` specs were queued
    Matched { actions: usize },
    /// no rule matched; `checks` misses so far
    NoMatch { checks: u32 },
    /// no rule matched and the window is now ignored
    Exhausted { checks: u32 },
    /// the pass was cancelled (rule set replaced or shutdown)
    Cancelled,
}

/// checks windows against rule snapshots and feeds the action queue
pub struct RuleChecker {
    options: CheckerOptions,
    states: WindowStates,
    windows: Arc<dyn WindowSystem>,
    processes: Arc<dyn ProcessInfo>,
    actions: ActionQueue,
}

impl RuleChecker {
    pub fn new(
        options: CheckerOptions,
        windows: Arc<dyn WindowSystem>,
        processes: Arc<dyn ProcessInfo>,
        actions: ActionQueue,
    ) -> Self {
        Self {
            options,
            states: WindowStates::new(),
            windows,
            processes,
            actions,
        }
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    pub fn states(&self) -> &WindowStates {
        &self.states
    }

    /// evict states of windows that no longer exist
    pub fn sweep_dead(&self) -> usize {
        self.states.sweep_dead(self.windows.as_ref())
    }

    /// run one check pass for a visible window against `rules`
    pub async fn check_window(
        &self,
        event: VisibleWindow,
        rules: Arc<RuleSnapshot>,
        cancel: &CancellationToken,
    ) -> CheckOutcome {
        let handle = event.handle;
        if self.states.is_ignored(handle) {
            return CheckOutcome::Skipped;
        }
        if cancel.is_cancelled() {
            return CheckOutcome::Cancelled;
        }

        let limit = self.options.check_times_limit.max(1);
        let periodic = self.states.begin(handle).checks() % limit == 0;

        let window = match enrich(self.windows.clone(), self.processes.clone(), event).await {
            Ok(window) => window,
            Err(EnrichError::TaskFailed(_)) => {
                warn!("enrichment of window {} did not complete", handle);
                return CheckOutcome::Gone;
            }
            Err(e) => {
                debug!("skipping window {}: {}", handle, e);
                return CheckOutcome::Gone;
            }
        };

        if periodic {
            debug!(
                "[{}] checking {} rule(s) for {}",
                self.options.profile,
                rules.enabled().count(),
                window.label()
            );
        }

        let policy = self.options.match_policy;
        let outcome = match self.options.title_strategy {
            TitleStrategy::Eager => {
                let actions = evaluate(&rules, &window, policy);
                if actions.is_empty() {
                    SettleOutcome::Unmatched(window)
                } else {
                    SettleOutcome::Matched { window, actions }
                }
            }
            TitleStrategy::Settle => {
                settle(
                    self.windows.clone(),
                    window,
                    self.options.settle_interval,
                    self.options.settle_timeout,
                    cancel,
                    |w| evaluate(&rules, w, policy),
                )
                .await
            }
        };

        match outcome {
            SettleOutcome::Matched { window, actions } => self.on_match(&window, actions),
            SettleOutcome::Unmatched(window) => self.on_miss(&window, periodic),
            SettleOutcome::Gone => CheckOutcome::Gone,
            SettleOutcome::Cancelled => {
                debug!("check of window {} cancelled", handle);
                CheckOutcome::Cancelled
            }
        }
    }

    fn on_match(&self, window: &WindowDescriptor, actions: Vec<ActionSpec>) -> CheckOutcome {
        // an overlapping pass for the same handle may have matched first
        if !self.states.mark_matched(window.handle) {
            return CheckOutcome::Skipped;
        }

        let count = actions.len();
        for spec in actions {
            if !self.actions.enqueue(spec) {
                debug!("action consumer gone while queueing for {}", window.label());
            }
        }
        info!(
            "[{}] {} rule(s) matched {}",
            self.options.profile,
            count,
            window.label()
        );
        CheckOutcome::Matched { actions: count }
    }

    fn on_miss(&self, window: &WindowDescriptor, periodic: bool) -> CheckOutcome {
        let previous = self.states.get(window.handle);
        let state = self.states.record_miss(
            window.handle,
            self.options.check_times_limit,
            self.options.ignore_on_timeout,
        );

        match state {
            WindowCheckState::Exhausted => {
                let checks = previous.map(|s| s.checks() + 1).unwrap_or(1);
                info!(
                    "[{}] no rule matched {} after {} check(s), ignoring it",
                    self.options.profile,
                    window.label(),
                    checks
                );
                CheckOutcome::Exhausted { checks }
            }
            WindowCheckState::Checking { checks } => {
                if periodic {
                    debug!(
                        "[{}] no matched rules for {} ({} check(s))",
                        self.options.profile,
                        window.label(),
                        checks
                    );
                }
                CheckOutcome::NoMatch { checks }
            }
            // matched by an overlapping pass meanwhile
            WindowCheckState::Matched => CheckOutcome::Skipped,
        }
    }
}
