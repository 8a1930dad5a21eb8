use std::io::Write;
use std::sync::{Arc, Mutex};

/// Write-only channel for the crate's own faults (failed sends, sink
/// errors). Implementations must not panic and must not block for long;
/// they run on the background delivery task.
///
/// Any `Fn(&str)` closure implements this trait.
pub trait DiagnosticSink: Send + Sync {
    fn write_line(&self, line: &str);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Writes diagnostics to standard error. Default channel.
#[derive(Clone, Copy, Debug, Default)]
pub struct StderrDiagnostics;

impl DiagnosticSink for StderrDiagnostics {
    fn write_line(&self, line: &str) {
        // Ignore write errors: there is nowhere left to report them.
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Keeps every line in memory. Handy for tests and for surfacing delivery
/// problems in a health endpoint.
#[derive(Clone, Debug, Default)]
pub struct MemoryDiagnostics {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl DiagnosticSink for MemoryDiagnostics {
    fn write_line(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

pub(crate) fn default_diagnostics() -> Arc<dyn DiagnosticSink> {
    Arc::new(StderrDiagnostics)
}
