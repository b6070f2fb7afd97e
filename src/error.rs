//! Error kinds surfaced by the library.
//!
//! None of these are fatal: the CLI reports them and the caller stays
//! usable. Channel transport problems never reach callers as errors; the
//! channel turns them into a synthetic log line instead.

/// All errors returned by `docview` library operations.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    // ─────────────────────────────────────────────────────────────────────
    // Directory
    // ─────────────────────────────────────────────────────────────────────
    #[error("project directory unavailable: {reason}")]
    DirectoryUnavailable { reason: String },

    #[error("document unavailable: {path}: {reason}")]
    DocumentUnavailable { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Ingestion
    // ─────────────────────────────────────────────────────────────────────
    #[error("{reason}")]
    SubmissionFailed { reason: String },

    #[error("log stream transport error: {reason}")]
    ChannelTransportError { reason: String },

    #[error("invalid ingestion request: {reason}")]
    InvalidRequest { reason: String },

    #[error("an ingestion session is already running")]
    SessionActive,

    // ─────────────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────────────
    #[error("export failed: {reason}")]
    ExportFailed { reason: String },
}

pub type Result<T> = std::result::Result<T, ViewerError>;

impl ViewerError {
    pub(crate) fn directory(reason: impl ToString) -> Self {
        ViewerError::DirectoryUnavailable {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn document(path: &str, reason: impl ToString) -> Self {
        ViewerError::DocumentUnavailable {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn submission(reason: impl ToString) -> Self {
        ViewerError::SubmissionFailed {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn transport(reason: impl ToString) -> Self {
        ViewerError::ChannelTransportError {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn export(reason: impl ToString) -> Self {
        ViewerError::ExportFailed {
            reason: reason.to_string(),
        }
    }
}
