//! window enrichment: raw handle -> WindowDescriptor

use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use super::{ProcessInfo, VisibleWindow, WindowDescriptor, WindowHandle, WindowSystem};

/// failures while gathering window information
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnrichError {
    /// the window or its process disappeared mid-enrichment
    #[error("window {0} or its process no longer exists")]
    ProcessGone(WindowHandle),

    /// path / command line could not be read (elevated or protected process)
    #[error("process info unavailable for pid {pid}: {reason}")]
    ProcessInfoUnavailable { pid: u32, reason: String },

    /// the blocking enrichment task panicked or was aborted
    #[error("enrichment task for window {0} did not complete")]
    TaskFailed(WindowHandle),
}

/// gather a descriptor for a freshly visible window
///
/// OS queries are blocking, so the work runs on the blocking pool and never
/// delays enrichment of other windows
pub async fn enrich(
    windows: Arc<dyn WindowSystem>,
    processes: Arc<dyn ProcessInfo>,
    event: VisibleWindow,
) -> Result<WindowDescriptor, EnrichError> {
    let handle = event.handle;
    tokio::task::spawn_blocking(move || {
        enrich_blocking(windows.as_ref(), processes.as_ref(), event)
    })
    .await
    .map_err(|_| EnrichError::TaskFailed(handle))?
}

/// re-read title and class of an already enriched window
///
/// fails with [`EnrichError::ProcessGone`] when the window was destroyed
pub async fn refresh(
    windows: Arc<dyn WindowSystem>,
    mut descriptor: WindowDescriptor,
) -> Result<WindowDescriptor, EnrichError> {
    let handle = descriptor.handle;
    tokio::task::spawn_blocking(move || {
        if !windows.is_window(handle) {
            return Err(EnrichError::ProcessGone(handle));
        }
        if let Some(title) = windows.title(handle) {
            descriptor.title = title;
        }
        if let Some(class) = windows.class_name(handle) {
            descriptor.window_class = class;
        }
        Ok(descriptor)
    })
    .await
    .map_err(|_| EnrichError::TaskFailed(handle))?
}

fn enrich_blocking(
    windows: &dyn WindowSystem,
    processes: &dyn ProcessInfo,
    event: VisibleWindow,
) -> Result<WindowDescriptor, EnrichError> {
    let handle = event.handle;
    let pid = windows
        .process_id(handle)
        .ok_or(EnrichError::ProcessGone(handle))?;

    let mut descriptor = WindowDescriptor::new(handle);
    descriptor.process_name = processes.process_name(pid).map_err(|e| {
        debug!("process lookup for window {} failed: {}", handle, e);
        EnrichError::ProcessGone(handle)
    })?;

    match processes.process_details(pid) {
        Ok(details) => {
            descriptor.process_path = details.path;
            descriptor.command_line = details.command_line;
        }
        Err(EnrichError::ProcessGone(_)) => return Err(EnrichError::ProcessGone(handle)),
        Err(e) => warn!("get process info for {}: {}", descriptor.process_name, e),
    }

    descriptor.screen_index = screen_index(windows, handle).to_string();
    descriptor.window_class = windows.class_name(handle).unwrap_or_default();
    descriptor.title = match event.title {
        Some(title) => title,
        None => windows.title(handle).unwrap_or_default(),
    };

    // the process may have exited while we were reading it
    if !windows.is_window(handle) {
        debug!("window {} closed during enrichment", handle);
        return Err(EnrichError::ProcessGone(handle));
    }

    Ok(descriptor)
}

/// ordinal of the window's monitor among all monitors, 0 when unknown
///
/// only stable within one enrichment pass: monitors can be re-arranged
fn screen_index(windows: &dyn WindowSystem, handle: WindowHandle) -> usize {
    let Some(device) = windows.monitor_of(handle) else {
        return 0;
    };
    windows
        .monitors()
        .iter()
        .position(|name| *name == device)
        .unwrap_or(0)
}
