use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::events::{self, WindowEventReceiver, WindowEvents};
use crate::checker::{CheckOutcome, CheckerOptions, RuleChecker, StateStats};
use crate::config::{Config, DEFAULT_SWEEP_INTERVAL_SECS};
use crate::dispatch::{self, ActionExecutor, DispatchStats};
use crate::rules::{RuleBook, RuleSnapshot, RuleStoreError, RuleTemplate};
use crate::window::{ProcessInfo, VisibleWindow, WindowHandle, WindowSystem};

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub checker: CheckerOptions,
    /// how often states of closed windows are evicted
    pub sweep_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            checker: CheckerOptions::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            checker: CheckerOptions::from_config(config),
            sweep_interval: Duration::from_secs(config.checker.sweep_interval_secs.max(1)),
        }
    }
}

// ============================================================================
// Generations
// ============================================================================

/// pairs the active rule snapshot with the cancellation token of its
/// generation
///
/// the lock is held only while an already compiled rule set is installed,
/// so a check never starts with a new snapshot and an already cancelled token
struct Generations {
    root: CancellationToken,
    current: Mutex<CancellationToken>,
}

impl Generations {
    fn new(root: CancellationToken) -> Self {
        let current = Mutex::new(root.child_token());
        Self { root, current }
    }

    fn lock(&self) -> MutexGuard<'_, CancellationToken> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// snapshot and token for a new check pass
    fn begin(&self, book: &RuleBook) -> (Arc<RuleSnapshot>, CancellationToken) {
        let current = self.lock();
        (book.snapshot(), current.child_token())
    }

    /// install a compiled snapshot and cancel the passes of the old rule set
    ///
    /// file reads and compilation happen before this is called
    fn advance(&self, book: &RuleBook, snapshot: RuleSnapshot) -> Arc<RuleSnapshot> {
        let mut current = self.lock();
        let snapshot = book.install(snapshot);
        current.cancel();
        *current = self.root.child_token();
        snapshot
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// counters reported by [`Pipeline::stats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub generation: u64,
    pub rules: usize,
    pub windows: StateStats,
}

impl PipelineStats {
    fn collect(book: &RuleBook, checker: &RuleChecker) -> Self {
        let snapshot = book.snapshot();
        Self {
            generation: snapshot.generation(),
            rules: snapshot.len(),
            windows: checker.states().stats(),
        }
    }
}

/// what a stopped pipeline did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub actions: DispatchStats,
    pub stats: PipelineStats,
}

/// visible windows in, actions out
///
/// owns the rule book, the checker with its per-window state, and three
/// tasks: the window consumer, the action consumer and the sweeper
pub struct Pipeline {
    book: Arc<RuleBook>,
    checker: Arc<RuleChecker>,
    generations: Arc<Generations>,
    events: WindowEvents,
    root: CancellationToken,
    closing: CancellationToken,
    window_task: JoinHandle<()>,
    action_task: JoinHandle<DispatchStats>,
    sweep_task: JoinHandle<()>,
}

impl Pipeline {
    /// spawn the pipeline tasks on the current tokio runtime
    pub fn start<E: ActionExecutor>(
        options: PipelineOptions,
        book: Arc<RuleBook>,
        windows: Arc<dyn WindowSystem>,
        processes: Arc<dyn ProcessInfo>,
        executor: E,
    ) -> Self {
        let root = CancellationToken::new();
        let closing = CancellationToken::new();
        let generations = Arc::new(Generations::new(root.clone()));

        let (actions, action_receiver) = dispatch::channel();
        let checker = Arc::new(RuleChecker::new(
            options.checker.clone(),
            windows,
            processes,
            actions,
        ));
        let (events, event_receiver) = events::channel();

        let action_task = tokio::spawn(dispatch::run_consumer(
            action_receiver,
            executor,
            root.clone(),
        ));
        let window_task = tokio::spawn(run_window_consumer(
            event_receiver,
            checker.clone(),
            book.clone(),
            generations.clone(),
            root.clone(),
            closing.clone(),
        ));
        let sweep_task = tokio::spawn(run_sweeper(
            checker.clone(),
            options.sweep_interval,
            closing.clone(),
        ));

        info!(
            "pipeline started for profile '{}' ({} rule(s))",
            options.checker.profile,
            book.snapshot().len()
        );

        Self {
            book,
            checker,
            generations,
            events,
            root,
            closing,
            window_task,
            action_task,
            sweep_task,
        }
    }

    /// a sender for visible-window events
    pub fn events(&self) -> WindowEvents {
        self.events.clone()
    }

    pub fn push(&self, window: VisibleWindow) -> bool {
        self.events.push(window)
    }

    pub fn rule_book(&self) -> &RuleBook {
        &self.book
    }

    pub fn checker(&self) -> &RuleChecker {
        &self.checker
    }

    pub fn fetch_rules(&self) -> Vec<RuleTemplate> {
        self.book.fetch_rules()
    }

    /// re-read the rule file and cancel passes still using the old rules
    ///
    /// when the file is malformed the old rules stay active and nothing is
    /// cancelled
    pub fn reload_rules(&self) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        match self.book.read_file() {
            Ok(Some(snapshot)) => Ok(self.generations.advance(&self.book, snapshot)),
            Ok(None) => Ok(self.book.snapshot()),
            Err(e) => {
                warn!("rule reload failed, keeping previous rules: {}", e);
                Err(e)
            }
        }
    }

    /// install `rules` without touching the rule file
    pub fn replace_rules(
        &self,
        rules: Vec<RuleTemplate>,
    ) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        let snapshot = RuleSnapshot::compile(rules)?;
        Ok(self.generations.advance(&self.book, snapshot))
    }

    /// persist `rules` to the rule file, then install them
    pub fn save_rules(&self, rules: Vec<RuleTemplate>) -> Result<Arc<RuleSnapshot>, RuleStoreError> {
        let snapshot = RuleSnapshot::compile(rules)?;
        self.book.write_file(&snapshot)?;
        Ok(self.generations.advance(&self.book, snapshot))
    }

    /// drop what is known about a window; its next event starts over
    pub fn forget(&self, handle: WindowHandle) -> bool {
        self.checker.states().forget(handle)
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats::collect(&self.book, &self.checker)
    }

    /// stop accepting events, let queued and running checks finish, then
    /// run every queued action
    pub async fn finish(self) -> PipelineReport {
        debug!("pipeline finishing");
        self.closing.cancel();
        self.stop().await
    }

    /// cancel running checks and stop without running queued actions
    pub async fn shutdown(self) -> PipelineReport {
        debug!("pipeline shutting down");
        self.closing.cancel();
        self.root.cancel();
        self.stop().await
    }

    async fn stop(self) -> PipelineReport {
        let Pipeline {
            book,
            checker,
            events,
            window_task,
            action_task,
            sweep_task,
            ..
        } = self;
        drop(events);

        if let Err(e) = window_task.await {
            warn!("window consumer ended abnormally: {}", e);
        }
        if let Err(e) = sweep_task.await {
            warn!("sweeper ended abnormally: {}", e);
        }
        let stats = PipelineStats::collect(&book, &checker);
        // last action sender goes with the checker
        drop(checker);

        let actions = match action_task.await {
            Ok(actions) => actions,
            Err(e) => {
                warn!("action consumer ended abnormally: {}", e);
                DispatchStats::default()
            }
        };
        PipelineReport { actions, stats }
    }
}

// ============================================================================
// Tasks
// ============================================================================

async fn run_window_consumer(
    mut receiver: WindowEventReceiver,
    checker: Arc<RuleChecker>,
    book: Arc<RuleBook>,
    generations: Arc<Generations>,
    root: CancellationToken,
    closing: CancellationToken,
) {
    let mut tasks = JoinSet::new();
    let mut closed = false;

    loop {
        tokio::select! {
            biased;
            _ = root.cancelled() => break,
            _ = closing.cancelled(), if !closed => {
                receiver.close();
                closed = true;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    warn!("window check task failed: {}", e);
                }
            }
            next = receiver.recv() => {
                let Some(event) = next else {
                    break;
                };
                let (snapshot, cancel) = generations.begin(&book);
                let checker = checker.clone();
                tasks.spawn(async move {
                    let handle = event.handle;
                    let outcome = checker.check_window(event, snapshot, &cancel).await;
                    if outcome != CheckOutcome::Skipped {
                        debug!("window {}: {:?}", handle, outcome);
                    }
                });
            }
        }
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            warn!("window check task failed: {}", e);
        }
    }
    debug!("window consumer stopped");
}

async fn run_sweeper(checker: Arc<RuleChecker>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sweeping = checker.clone();
        match tokio::task::spawn_blocking(move || sweeping.sweep_dead()).await {
            Ok(0) => {}
            Ok(evicted) => debug!("evicted {} closed window(s)", evicted),
            Err(e) => warn!("sweep failed: {}", e),
        }
    }
}
