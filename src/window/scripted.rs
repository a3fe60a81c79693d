//! scripted window session
//!
//! a [`WindowSystem`] + [`ProcessInfo`] driven by a JSON description of
//! windows appearing, retitling themselves and closing over time. used by
//! `deskrules replay` and by tests; timestamps are milliseconds since the
//! script was instantiated.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use super::{
    EnrichError, ProcessDetails, ProcessInfo, VisibleWindow, WindowHandle, WindowSystem,
};

/// a title the window shows from `at_ms` on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleChange {
    pub at_ms: u64,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedWindow {
    pub handle: WindowHandle,
    pub pid: u32,
    pub process_name: String,
    #[serde(default)]
    pub process_path: Option<String>,
    #[serde(default)]
    pub command_line: Option<Vec<String>>,
    #[serde(default)]
    pub class: String,
    /// monitor device name, must appear in the script's monitor list
    #[serde(default)]
    pub monitor: Option<String>,
    /// first visibility event
    #[serde(default)]
    pub shown_at_ms: u64,
    /// further visibility events (window restored, re-shown, ...)
    #[serde(default)]
    pub reshown_at_ms: Vec<u64>,
    #[serde(default)]
    pub titles: Vec<TitleChange>,
    #[serde(default)]
    pub closed_at_ms: Option<u64>,
    /// path and command line are not readable (elevated process)
    #[serde(default)]
    pub protected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowScript {
    #[serde(default)]
    pub monitors: Vec<String>,
    pub windows: Vec<ScriptedWindow>,
}

impl WindowScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read window script: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse window script: {}", path.display()))
    }

    /// visibility events in firing order
    ///
    /// the event carries the title the window shows at that instant, like a
    /// real show-window notification does
    pub fn events(&self) -> Vec<(u64, VisibleWindow)> {
        let mut events: Vec<(u64, VisibleWindow)> = self
            .windows
            .iter()
            .flat_map(|w| {
                std::iter::once(w.shown_at_ms)
                    .chain(w.reshown_at_ms.iter().copied())
                    .map(move |at| {
                        let event = match title_at(w, at) {
                            Some(title) => VisibleWindow::with_title(w.handle, title),
                            None => VisibleWindow::new(w.handle),
                        };
                        (at, event)
                    })
            })
            .collect();
        events.sort_by_key(|(at, _)| *at);
        events
    }

    /// time of the last scripted event of any kind
    pub fn duration_ms(&self) -> u64 {
        self.windows
            .iter()
            .flat_map(|w| {
                std::iter::once(w.shown_at_ms)
                    .chain(w.reshown_at_ms.iter().copied())
                    .chain(w.titles.iter().map(|t| t.at_ms))
                    .chain(w.closed_at_ms)
            })
            .max()
            .unwrap_or(0)
    }
}

fn title_at(window: &ScriptedWindow, at_ms: u64) -> Option<String> {
    window
        .titles
        .iter()
        .filter(|t| t.at_ms <= at_ms)
        .max_by_key(|t| t.at_ms)
        .map(|t| t.title.clone())
}

/// live view over a [`WindowScript`]
pub struct ScriptedWindows {
    script: WindowScript,
    by_handle: HashMap<WindowHandle, usize>,
    by_pid: HashMap<u32, usize>,
    origin: Instant,
}

impl ScriptedWindows {
    pub fn new(script: WindowScript) -> Self {
        let by_handle = script
            .windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.handle, i))
            .collect();
        let by_pid = script
            .windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.pid, i))
            .collect();
        Self {
            script,
            by_handle,
            by_pid,
            origin: Instant::now(),
        }
    }

    /// instant that script timestamps are relative to
    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn script(&self) -> &WindowScript {
        &self.script
    }

    fn elapsed_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn alive(&self, window: &ScriptedWindow) -> bool {
        let now = self.elapsed_ms();
        now >= window.shown_at_ms && window.closed_at_ms.map_or(true, |closed| now < closed)
    }

    fn live_window(&self, handle: WindowHandle) -> Option<&ScriptedWindow> {
        let window = &self.script.windows[*self.by_handle.get(&handle)?];
        self.alive(window).then_some(window)
    }

    fn live_process(&self, pid: u32) -> Option<&ScriptedWindow> {
        let window = &self.script.windows[*self.by_pid.get(&pid)?];
        self.alive(window).then_some(window)
    }

    /// sleep until `at_ms` on the script clock
    pub async fn sleep_until(&self, at_ms: u64) {
        tokio::time::sleep_until(self.origin + Duration::from_millis(at_ms)).await;
    }
}

impl WindowSystem for ScriptedWindows {
    fn is_window(&self, handle: WindowHandle) -> bool {
        self.live_window(handle).is_some()
    }

    fn process_id(&self, handle: WindowHandle) -> Option<u32> {
        self.live_window(handle).map(|w| w.pid)
    }

    fn title(&self, handle: WindowHandle) -> Option<String> {
        let window = self.live_window(handle)?;
        Some(title_at(window, self.elapsed_ms()).unwrap_or_default())
    }

    fn class_name(&self, handle: WindowHandle) -> Option<String> {
        self.live_window(handle).map(|w| w.class.clone())
    }

    fn monitor_of(&self, handle: WindowHandle) -> Option<String> {
        self.live_window(handle)?.monitor.clone()
    }

    fn monitors(&self) -> Vec<String> {
        self.script.monitors.clone()
    }
}

impl ProcessInfo for ScriptedWindows {
    fn process_name(&self, pid: u32) -> Result<String, EnrichError> {
        self.live_process(pid)
            .map(|w| w.process_name.clone())
            .ok_or_else(|| EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "process exited".to_string(),
            })
    }

    fn process_details(&self, pid: u32) -> Result<ProcessDetails, EnrichError> {
        let window = self
            .live_process(pid)
            .ok_or_else(|| EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "process exited".to_string(),
            })?;

        if window.protected {
            return Err(EnrichError::ProcessInfoUnavailable {
                pid,
                reason: "access is denied".to_string(),
            });
        }

        Ok(ProcessDetails {
            path: window.process_path.clone(),
            command_line: window.command_line.clone(),
        })
    }
}
