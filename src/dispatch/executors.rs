use std::io::Write;

use log::info;

use super::{ActionExecutor, ActionSpec, ExecutorError};

/// logs every action instead of performing it
#[derive(Debug, Default)]
pub struct LoggingExecutor;

impl ActionExecutor for LoggingExecutor {
    fn execute(&mut self, spec: &ActionSpec) -> Result<(), ExecutorError> {
        info!(
            "[{}] {} -> window {} \"{}\"",
            spec.rule_name, spec.action, spec.handle, spec.window_title
        );
        Ok(())
    }
}

/// writes one JSON object per action, flushing after each line
pub struct JsonLinesExecutor<W: Write + Send + 'static> {
    out: W,
}

impl<W: Write + Send + 'static> JsonLinesExecutor<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> ActionExecutor for JsonLinesExecutor<W> {
    fn execute(&mut self, spec: &ActionSpec) -> Result<(), ExecutorError> {
        let line = serde_json::to_string(spec).map_err(|e| ExecutorError::Other(e.to_string()))?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
