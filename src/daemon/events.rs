//! inbound window events
//!
//! the OS side pushes a [`VisibleWindow`] whenever a window becomes visible.
//! pushing never blocks; events queue up until the window consumer takes them.

use log::debug;
use tokio::sync::mpsc;

use crate::window::VisibleWindow;

/// producer side of the window event queue
#[derive(Debug, Clone)]
pub struct WindowEvents {
    tx: mpsc::UnboundedSender<VisibleWindow>,
}

#[derive(Debug)]
pub(super) struct WindowEventReceiver {
    rx: mpsc::UnboundedReceiver<VisibleWindow>,
}

pub(super) fn channel() -> (WindowEvents, WindowEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (WindowEvents { tx }, WindowEventReceiver { rx })
}

impl WindowEvents {
    /// queue a visible window, returns false once the pipeline stopped
    pub fn push(&self, window: VisibleWindow) -> bool {
        match self.tx.send(window) {
            Ok(()) => true,
            Err(mpsc::error::SendError(window)) => {
                debug!("pipeline stopped, dropping event for window {}", window.handle);
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl WindowEventReceiver {
    pub(super) async fn recv(&mut self) -> Option<VisibleWindow> {
        self.rx.recv().await
    }

    /// refuse new events; already queued ones can still be received
    pub(super) fn close(&mut self) {
        self.rx.close();
    }
}
