//! Destination for a download tool's output lines.

use std::fs::File;
use std::io::Write;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::scheduler::RunEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

/// Forwards each line to the job's log file (complete) and to the event
/// channel (lossy, dropped when the consumer is behind).
#[derive(Debug)]
pub struct OutputSink {
    worker: usize,
    index: u32,
    log: Option<Mutex<File>>,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl OutputSink {
    pub fn new(
        worker: usize,
        index: u32,
        log: Option<File>,
        events: Option<mpsc::Sender<RunEvent>>,
    ) -> Self {
        Self {
            worker,
            index,
            log: log.map(Mutex::new),
            events,
        }
    }

    /// A sink that drops everything.
    pub fn discard() -> Self {
        Self::new(0, 0, None, None)
    }

    pub fn emit(&self, stream: OutputStream, line: &str) {
        if let Some(log) = &self.log {
            let mut file = log.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Err(e) = writeln!(file, "{}", line) {
                tracing::debug!(worker = self.worker, "job log write failed: {}", e);
            }
        }
        if let Some(tx) = &self.events {
            let _ = tx.try_send(RunEvent::Output {
                worker: self.worker,
                index: self.index,
                stream,
                line: line.to_string(),
            });
        }
    }
}
