//! Ingestion progress reporting.
//!
//! Mirrors a session's log to the terminal while `docview ingest` runs.
//! Output goes to **stderr** so stdout only carries the final outcome and
//! stays parseable for scripts.

use std::io::Write;

use crate::session::SessionState;

/// Something observable during an ingestion session.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent<'a> {
    /// A line was appended to the session log.
    Line { index: usize, text: &'a str },
    /// The session moved to a new state.
    State { state: SessionState },
}

/// Reports session progress. Implementations write to stderr.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent<'_>);
}

/// Terminal-style log: `$ cloning...`.
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent<'_>) {
        let line = match event {
            IngestProgressEvent::Line { text, .. } => format!("$ {}\n", text),
            IngestProgressEvent::State { state } => match state {
                SessionState::Completed => "-- complete\n".to_string(),
                SessionState::Failed => "-- failed\n".to_string(),
                _ => return,
            },
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent<'_>) {
        let obj = match event {
            IngestProgressEvent::Line { index, text } => serde_json::json!({
                "event": "log",
                "index": index,
                "line": text,
            }),
            IngestProgressEvent::State { state } => serde_json::json!({
                "event": "state",
                "state": state.as_str(),
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
    fn report(&self, _event: IngestProgressEvent<'_>) {}
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

/// Tracks how much of a session has been reported so far.
#[derive(Debug, Default)]
pub struct LogCursor {
    reported: usize,
    last_state: Option<SessionState>,
}

impl LogCursor {
    /// Reports lines and state changes not yet seen. Returns how many
    /// new lines were reported.
    pub fn advance(
        &mut self,
        log: &[String],
        state: SessionState,
        reporter: &dyn IngestProgressReporter,
    ) -> usize {
        let start = self.reported.min(log.len());
        for (offset, text) in log[start..].iter().enumerate() {
            reporter.report(IngestProgressEvent::Line {
                index: start + offset,
                text,
            });
        }
        self.reported = log.len();

        if self.last_state != Some(state) {
            reporter.report(IngestProgressEvent::State { state });
            self.last_state = Some(state);
        }
        log.len() - start
    }
}
