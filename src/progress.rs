//! Ingest progress reporting.
//!
//! Reports which batch is being embedded and stored so long runs under a
//! tight rate limit visibly make progress. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for an ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestProgressEvent {
    /// Content has been split; embedding is about to start.
    Chunked { chunks: u64 },
    /// Batch `n` of `total` has been embedded and stored.
    BatchStored { n: u64, total: u64, rows: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingest pipeline.
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  batch 3 / 12  (10 rows)".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Chunked { chunks } => {
                format!("ingest  chunked into {} chunks\n", format_number(*chunks))
            }
            IngestProgressEvent::BatchStored { n, total, rows } => format!(
                "ingest  batch {} / {}  ({} rows)\n",
                format_number(*n),
                format_number(*total),
                format_number(*rows)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Chunked { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "chunked",
                "chunks": chunks
            }),
            IngestProgressEvent::BatchStored { n, total, rows } => serde_json::json!({
                "event": "progress",
                "phase": "batch",
                "n": n,
                "total": total,
                "rows": rows
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Parse a `--progress` value; `None` picks the TTY default.
    pub fn parse(value: Option<&str>) -> anyhow::Result<Self> {
        match value {
            None => Ok(Self::default_for_tty()),
            Some("off") => Ok(ProgressMode::Off),
            Some("human") => Ok(ProgressMode::Human),
            Some("json") => Ok(ProgressMode::Json),
            Some(other) => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be off, human, or json.",
                other
            ),
        }
    }

    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller can pass it to ingest.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
