//! action dispatch
//!
//! matched rules produce [`ActionSpec`]s. producers push them into an
//! [`ActionQueue`] without ever blocking; a single consumer loop hands them,
//! in arrival order, to an [`ActionExecutor`].

mod executors;

pub use executors::{JsonLinesExecutor, LoggingExecutor};

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::rules::RuleAction;
use crate::window::WindowHandle;

// ============================================================================
// Action Spec
// ============================================================================

/// one action to perform on one window, immutable once enqueued
///
/// serializes flat: `{"handle":1,"rule_name":"..","window_title":"..",
/// "kind":"move_to_desktop","index":2,"follow":false,"created_at":".."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub handle: WindowHandle,
    pub rule_name: String,
    pub window_title: String,
    #[serde(flatten)]
    pub action: RuleAction,
    pub created_at: DateTime<Utc>,
}

impl ActionSpec {
    pub fn new(
        handle: WindowHandle,
        rule_name: impl Into<String>,
        window_title: impl Into<String>,
        action: RuleAction,
    ) -> Self {
        Self {
            handle,
            rule_name: rule_name.into(),
            window_title: window_title.into(),
            action,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("window {0} no longer exists")]
    WindowGone(WindowHandle),

    #[error("desktop {0} does not exist")]
    NoSuchDesktop(u32),

    #[error("failed to write action: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// performs actions (moves windows between desktops, pins, ...)
///
/// called from the consumer loop, one action at a time
pub trait ActionExecutor: Send + 'static {
    fn execute(&mut self, spec: &ActionSpec) -> Result<(), ExecutorError>;
}

impl<F> ActionExecutor for F
where
    F: FnMut(&ActionSpec) -> Result<(), ExecutorError> + Send + 'static,
{
    fn execute(&mut self, spec: &ActionSpec) -> Result<(), ExecutorError> {
        self(spec)
    }
}

// ============================================================================
// Queue
// ============================================================================

/// producer side; clone freely, one per checking task
#[derive(Debug, Clone)]
pub struct ActionQueue {
    tx: mpsc::UnboundedSender<ActionSpec>,
}

/// consumer side, handed to [`run_consumer`]
#[derive(Debug)]
pub struct ActionReceiver {
    rx: mpsc::UnboundedReceiver<ActionSpec>,
}

pub fn channel() -> (ActionQueue, ActionReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ActionQueue { tx }, ActionReceiver { rx })
}

impl ActionQueue {
    /// queue an action without blocking
    ///
    /// returns false once the consumer has stopped
    pub fn enqueue(&self, spec: ActionSpec) -> bool {
        match self.tx.send(spec) {
            Ok(()) => true,
            Err(mpsc::error::SendError(spec)) => {
                debug!(
                    "action channel closed, dropping '{}' for window {}",
                    spec.rule_name, spec.handle
                );
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl ActionReceiver {
    /// take a queued action without waiting
    pub fn try_recv(&mut self) -> Option<ActionSpec> {
        self.rx.try_recv().ok()
    }
}

/// what the consumer loop did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub executed: u64,
    pub failed: u64,
}

/// hand queued actions to `executor` until every producer is gone or
/// `cancel` fires
///
/// executor failures, panics included, are logged and never stop the loop
pub async fn run_consumer<E: ActionExecutor>(
    receiver: ActionReceiver,
    mut executor: E,
    cancel: CancellationToken,
) -> DispatchStats {
    let mut rx = receiver.rx;
    let mut stats = DispatchStats::default();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("action consumer cancelled");
                break;
            }
            next = rx.recv() => {
                let Some(spec) = next else {
                    debug!("all action producers gone");
                    break;
                };
                let result = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&spec)));
                match result {
                    Ok(Ok(())) => stats.executed += 1,
                    Ok(Err(e)) => {
                        stats.failed += 1;
                        warn!(
                            "action '{}' of rule '{}' on window {} failed: {}",
                            spec.action, spec.rule_name, spec.handle, e
                        );
                    }
                    Err(payload) => {
                        stats.failed += 1;
                        warn!(
                            "action '{}' of rule '{}' on window {} panicked: {}",
                            spec.action,
                            spec.rule_name,
                            spec.handle,
                            panic_message(payload.as_ref())
                        );
                    }
                }
            }
        }
    }

    info!(
        "action consumer stopped ({} executed, {} failed)",
        stats.executed, stats.failed
    );
    stats
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
