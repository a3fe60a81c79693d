//! per-window check state and the ignore set

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::window::{WindowHandle, WindowSystem};

/// where a window is in its rule-checking life
///
/// `Matched` and `Exhausted` are terminal; together they form the ignore set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WindowCheckState {
    /// seen, no rule matched yet; `checks` misses so far
    Checking { checks: u32 },
    /// a rule matched and its actions were queued
    Matched,
    /// gave up after too many misses
    Exhausted,
}

impl WindowCheckState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WindowCheckState::Checking { .. })
    }

    /// misses recorded while checking, 0 for terminal states
    pub fn checks(&self) -> u32 {
        match self {
            WindowCheckState::Checking { checks } => *checks,
            _ => 0,
        }
    }
}

/// counts per state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateStats {
    pub checking: usize,
    pub matched: usize,
    pub exhausted: usize,
}

/// handle -> state map; every transition happens under one lock
#[derive(Debug, Default)]
pub struct WindowStates {
    inner: Mutex<HashMap<WindowHandle, WindowCheckState>>,
}

impl WindowStates {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WindowHandle, WindowCheckState>> {
        // every transition is a single insert, so the map is valid after a panic
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, handle: WindowHandle) -> Option<WindowCheckState> {
        self.lock().get(&handle).copied()
    }

    /// whether the handle is in the ignore set
    pub fn is_ignored(&self, handle: WindowHandle) -> bool {
        self.get(handle).is_some_and(|s| s.is_terminal())
    }

    /// register a sighting; unseen handles start checking with no misses
    pub fn begin(&self, handle: WindowHandle) -> WindowCheckState {
        *self
            .lock()
            .entry(handle)
            .or_insert(WindowCheckState::Checking { checks: 0 })
    }

    /// move to `Matched`
    ///
    /// returns true only for the pass that made the transition, so actions
    /// are queued once even when passes for the same handle overlap
    pub fn mark_matched(&self, handle: WindowHandle) -> bool {
        let mut states = self.lock();
        let state = states
            .entry(handle)
            .or_insert(WindowCheckState::Checking { checks: 0 });
        if state.is_terminal() {
            return false;
        }
        *state = WindowCheckState::Matched;
        true
    }

    /// count a pass in which no rule matched
    ///
    /// with `ignore_on_timeout` the window is exhausted once its miss count
    /// reaches `limit`; otherwise it keeps being checked
    pub fn record_miss(
        &self,
        handle: WindowHandle,
        limit: u32,
        ignore_on_timeout: bool,
    ) -> WindowCheckState {
        let mut states = self.lock();
        let state = states
            .entry(handle)
            .or_insert(WindowCheckState::Checking { checks: 0 });

        if let WindowCheckState::Checking { checks } = *state {
            let checks = checks.saturating_add(1);
            *state = if ignore_on_timeout && checks >= limit.max(1) {
                WindowCheckState::Exhausted
            } else {
                WindowCheckState::Checking { checks }
            };
        }
        *state
    }

    /// drop everything known about a handle; it will be treated as new
    pub fn forget(&self, handle: WindowHandle) -> bool {
        self.lock().remove(&handle).is_some()
    }

    /// evict handles whose window no longer exists, returning how many
    ///
    /// liveness is probed without holding the lock
    pub fn sweep_dead(&self, windows: &dyn WindowSystem) -> usize {
        let handles: Vec<WindowHandle> = self.lock().keys().copied().collect();
        let dead: Vec<WindowHandle> = handles
            .into_iter()
            .filter(|h| !windows.is_window(*h))
            .collect();

        let mut states = self.lock();
        dead.iter().filter(|h| states.remove(*h).is_some()).count()
    }

    pub fn stats(&self) -> StateStats {
        let states = self.lock();
        let mut stats = StateStats::default();
        for state in states.values() {
            match state {
                WindowCheckState::Checking { .. } => stats.checking += 1,
                WindowCheckState::Matched => stats.matched += 1,
                WindowCheckState::Exhausted => stats.exhausted += 1,
            }
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
