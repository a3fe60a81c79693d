//! window descriptors and the OS collaborators that enrichment reads from
//!
//! the engine never talks to the OS directly. window-level queries go
//! through [`WindowSystem`], process-level queries through [`ProcessInfo`].

mod enrich;
mod process;
pub mod scripted;

pub use enrich::{enrich, refresh, EnrichError};
pub use process::SysinfoProcesses;
pub use scripted::{ScriptedWindows, WindowScript};

use std::fmt;

use serde::{Deserialize, Serialize};

/// raw OS window handle
///
/// identity only: the handle is not owned and may be recycled by the OS once
/// the window is destroyed, so liveness has to be re-checked before use
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WindowHandle(pub isize);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<isize> for WindowHandle {
    fn from(raw: isize) -> Self {
        WindowHandle(raw)
    }
}

/// enriched snapshot of a window used for rule matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowDescriptor {
    #[serde(default)]
    pub handle: WindowHandle,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub process_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<Vec<String>>,
    #[serde(default)]
    pub window_class: String,
    /// ordinal of the window's monitor among all monitors, as a string
    #[serde(default = "default_screen_index")]
    pub screen_index: String,
}

fn default_screen_index() -> String {
    "0".to_string()
}

impl WindowDescriptor {
    pub fn new(handle: WindowHandle) -> Self {
        Self {
            handle,
            title: String::new(),
            process_name: String::new(),
            process_path: None,
            command_line: None,
            window_class: String::new(),
            screen_index: default_screen_index(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_process(mut self, name: impl Into<String>) -> Self {
        self.process_name = name.into();
        self
    }

    pub fn with_process_path(mut self, path: impl Into<String>) -> Self {
        self.process_path = Some(path.into());
        self
    }

    pub fn with_command_line(mut self, args: Vec<String>) -> Self {
        self.command_line = Some(args);
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.window_class = class.into();
        self
    }

    pub fn with_screen(mut self, index: usize) -> Self {
        self.screen_index = index.to_string();
        self
    }

    /// short human-readable label for logs
    pub fn label(&self) -> String {
        if self.title.is_empty() {
            format!("{} ({})", self.process_name, self.handle)
        } else {
            format!("{} [{}]", self.title, self.process_name)
        }
    }
}

/// notification that a window became visible
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleWindow {
    pub handle: WindowHandle,
    /// title known when the event fired, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl VisibleWindow {
    pub fn new(handle: WindowHandle) -> Self {
        Self {
            handle,
            title: None,
        }
    }

    pub fn with_title(handle: WindowHandle, title: impl Into<String>) -> Self {
        Self {
            handle,
            title: Some(title.into()),
        }
    }
}

/// window-level OS queries
///
/// every method takes a handle that may already be dead; implementations
/// return `None`/`false` instead of failing
pub trait WindowSystem: Send + Sync + 'static {
    /// liveness probe (`IsWindow` on Windows)
    fn is_window(&self, handle: WindowHandle) -> bool;

    /// id of the process owning the window
    fn process_id(&self, handle: WindowHandle) -> Option<u32>;

    /// current window title
    fn title(&self, handle: WindowHandle) -> Option<String>;

    /// window class name
    fn class_name(&self, handle: WindowHandle) -> Option<String>;

    /// device name of the monitor containing the window
    fn monitor_of(&self, handle: WindowHandle) -> Option<String>;

    /// device names of all monitors, in system order
    fn monitors(&self) -> Vec<String>;
}

/// executable path and arguments of a process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDetails {
    pub path: Option<String>,
    pub command_line: Option<Vec<String>>,
}

/// process-level OS queries
pub trait ProcessInfo: Send + Sync + 'static {
    /// process name; any failure means the process can no longer be inspected
    fn process_name(&self, pid: u32) -> Result<String, EnrichError>;

    /// path and command line; may fail for elevated or protected processes
    fn process_details(&self, pid: u32) -> Result<ProcessDetails, EnrichError>;
}
