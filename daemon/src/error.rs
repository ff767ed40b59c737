use std::path::PathBuf;
use thiserror::Error;

/// Failures of the best-effort steps. None of these ever escape the dispatcher;
/// they are logged through [`crate::outcome::settle`] and otherwise dropped.
#[derive(Error, Debug)]
pub enum NotifierError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry is enabled but no endpoint is configured")]
    MissingEndpoint,

    #[error("no async runtime available to schedule {0}")]
    NoRuntime(&'static str),
}

pub type Result<T> = std::result::Result<T, NotifierError>;
