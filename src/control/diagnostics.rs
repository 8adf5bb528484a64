use log::debug;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;

/// One record per executed control step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlDiagnostic {
    pub timestamp_ms: u64,
    pub target: f32,
    pub relative: f32,
    pub error: f32,
    pub output: i32,
}

/// Receives diagnostic records from the controller. Purely informational.
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: &ControlDiagnostic);
}

/// Emits each record through the `log` facade at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn record(&mut self, d: &ControlDiagnostic) {
        debug!(
            "PID: target={:.2} m, current={:.2} m, error={:.2}, output={}",
            d.target, d.relative, d.error, d.output
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&mut self, _diagnostic: &ControlDiagnostic) {}
}

impl<A: DiagnosticSink, B: DiagnosticSink> DiagnosticSink for (A, B) {
    fn record(&mut self, diagnostic: &ControlDiagnostic) {
        self.0.record(diagnostic);
        self.1.record(diagnostic);
    }
}

// Bounded ring of recent diagnostics, readable from any thread
#[derive(Clone)]
pub struct DiagnosticLog {
    entries: Arc<RwLock<VecDeque<ControlDiagnostic>>>,
    max_size: usize,
}

impl DiagnosticLog {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(max_size))),
            max_size,
        }
    }

    pub fn write(&self, diagnostic: ControlDiagnostic) {
        let mut log = self.entries.write();
        log.push_back(diagnostic);
        if log.len() > self.max_size {
            log.pop_front();
        }
    }

    pub fn read_all(&self) -> Vec<ControlDiagnostic> {
        self.entries.read().iter().copied().collect()
    }

    pub fn latest(&self) -> Option<ControlDiagnostic> {
        self.entries.read().back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn record(&mut self, diagnostic: &ControlDiagnostic) {
        self.write(*diagnostic);
    }
}
