//! long-running rule pipeline
//!
//! one consumer takes visible-window events and spawns a check pass per
//! event, so windows are checked in parallel. matching passes feed the
//! action queue, which a second consumer drains in arrival order.

mod events;
mod pipeline;

pub use events::WindowEvents;
pub use pipeline::{Pipeline, PipelineOptions, PipelineReport, PipelineStats};
