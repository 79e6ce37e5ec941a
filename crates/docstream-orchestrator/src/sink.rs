//! Result sinks for completed analyses

use docstream_domain::{CompletedAnalysis, ResultSink};
use parking_lot::Mutex;
use serde_json::json;
use std::convert::Infallible;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Keeps completed analyses in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    results: Arc<Mutex<Vec<CompletedAnalysis>>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything stored so far, in completion order
    pub fn results(&self) -> Vec<CompletedAnalysis> {
        self.results.lock().clone()
    }
}

impl ResultSink for MemorySink {
    type Error = Infallible;

    fn store_result(&self, result: &CompletedAnalysis) -> Result<(), Self::Error> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

/// Appends one JSON object per completed analysis to a file
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl JsonLinesSink {
    /// Sink writing to `path`, created on first result
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }
}

impl ResultSink for JsonLinesSink {
    type Error = std::io::Error;

    fn store_result(&self, result: &CompletedAnalysis) -> Result<(), Self::Error> {
        let parsed = match result.parsed_json.as_deref() {
            Some(text) => serde_json::from_str(text)?,
            None => serde_json::Value::Null,
        };
        let line = json!({
            "document_id": result.document_id.as_str(),
            "task_id": result.upstream_task_id.as_ref().map(|t| t.as_str()),
            "text": result.text,
            "parsed": parsed,
        });

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}
