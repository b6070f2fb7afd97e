//! Core data models used throughout docview.
//!
//! Projects and documents are produced by the backend and only read here.
//! Ingestion requests, session identifiers, and channel events describe one
//! ingestion attempt as the client observes it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named collection of generated documents, as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Ordered document descriptors. The backend sorts them by file name.
    #[serde(default)]
    pub files: Vec<DocumentRef>,
}

impl Project {
    /// The document shown when a project is opened without a selection.
    pub fn first_document(&self) -> Option<&DocumentRef> {
        self.files.first()
    }
}

/// Descriptor of a single Markdown document belonging to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// File name, e.g. `01_overview.md`.
    pub name: String,
    /// Path the raw Markdown is served from, e.g. `/output/demo/01_overview.md`.
    pub path: String,
}

/// What an ingestion job reads its sources from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A remote repository URL, cloned by the backend.
    #[serde(rename = "repo")]
    Repository,
    /// A directory on the backend's filesystem.
    #[serde(rename = "path")]
    LocalPath,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Repository => write!(f, "repo"),
            SourceKind::LocalPath => write!(f, "path"),
        }
    }
}

/// A request to start one ingestion job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRequest {
    pub source_kind: SourceKind,
    pub source: String,
    pub display_name: Option<String>,
    pub language: Option<String>,
}

impl IngestRequest {
    pub fn new(source_kind: SourceKind, source: impl Into<String>) -> Self {
        Self {
            source_kind,
            source: source.into(),
            display_name: None,
            language: None,
        }
    }

    pub fn repository(url: impl Into<String>) -> Self {
        Self::new(SourceKind::Repository, url)
    }

    pub fn local_path(path: impl Into<String>) -> Self {
        Self::new(SourceKind::LocalPath, path)
    }

    /// Sets the display name. Blank names are treated as absent.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.display_name = if name.trim().is_empty() {
            None
        } else {
            Some(name)
        };
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Opaque acknowledgement returned when the backend accepts a job.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Acknowledgement {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Client-generated identifier addressing a session's log channel.
///
/// Millisecond timestamps are unique enough for one client; collisions
/// across concurrent clients are tolerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(chrono::Utc::now().timestamp_millis().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        SessionId(value.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status reported by the backend over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

/// One message pushed by the backend during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelEvent {
    Log {
        message: String,
        /// Output stream the line came from (`stdout`/`stderr`), when reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<String>,
    },
    Status {
        status: JobStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl ChannelEvent {
    pub fn log(message: impl Into<String>) -> Self {
        ChannelEvent::Log {
            message: message.into(),
            channel: None,
        }
    }

    pub fn status(status: JobStatus, message: Option<&str>) -> Self {
        ChannelEvent::Status {
            status,
            message: message.map(str::to_string),
        }
    }

    /// Parses a text frame. Returns `None` for anything that is not a
    /// log or status event.
    pub fn from_frame(frame: &str) -> Option<Self> {
        serde_json::from_str(frame).ok()
    }
}
