//! Unified error type for hlsforge.
//!
//! Planning-stage failures (probe, configuration) abort a conversion before
//! any encoder is launched. Execution-stage failures are captured per
//! rendition as a [`JobFailure`] and only become an [`Error`] when a caller
//! asks for one.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why a single rendition job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum JobFailureKind {
    /// The encoder exited with a non-zero status (`None` when killed by a signal).
    ExitStatus(Option<i32>),
    /// The encoder process could not be started.
    Spawn,
    /// The caller aborted the run.
    Cancelled,
    /// The encoder ran past its configured time limit.
    TimedOut,
    /// Key material or the key-info descriptor could not be written.
    EncryptionSetup,
}

impl fmt::Display for JobFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFailureKind::ExitStatus(Some(code)) => write!(f, "exit status {code}"),
            JobFailureKind::ExitStatus(None) => write!(f, "terminated by signal"),
            JobFailureKind::Spawn => write!(f, "spawn failed"),
            JobFailureKind::Cancelled => write!(f, "cancelled"),
            JobFailureKind::TimedOut => write!(f, "timed out"),
            JobFailureKind::EncryptionSetup => write!(f, "encryption setup failed"),
        }
    }
}

/// Failure record kept in a rendition's result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: JobFailureKind,
    /// Captured diagnostic text from the encoder, or a structured message.
    pub diagnostics: String,
}

impl JobFailure {
    pub fn new(kind: JobFailureKind, diagnostics: impl Into<String>) -> Self {
        Self {
            kind,
            diagnostics: diagnostics.into(),
        }
    }

    /// Turn this failure into an [`Error::Job`] for the named rendition.
    pub fn into_error(self, rendition: impl Into<String>) -> Error {
        Error::Job {
            rendition: rendition.into(),
            kind: self.kind,
            diagnostics: self.diagnostics,
        }
    }
}

/// Unified error type covering all failure modes in hlsforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source file could not be inspected.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The requested plan cannot be executed (caught before any job starts).
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// One rendition's encode did not succeed.
    #[error("Rendition {rendition} failed ({kind}): {diagnostics}")]
    Job {
        rendition: String,
        kind: JobFailureKind,
        diagnostics: String,
    },

    /// Every rendition failed, so no master manifest was written.
    #[error("No renditions succeeded ({attempted} attempted); master manifest not written")]
    NoRenditionsSucceeded { attempted: usize },

    /// Key material or a key-info descriptor could not be created.
    #[error("Encryption setup error: {0}")]
    EncryptionSetup(String),

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool { tool: String, message: String },

    /// Request data or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Probe`].
    pub fn probe(message: impl Into<String>) -> Self {
        Error::Probe(message.into())
    }

    /// Convenience constructor for [`Error::UnsupportedConfiguration`].
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::UnsupportedConfiguration(message.into())
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the planning stage (nothing was launched).
    pub fn is_planning(&self) -> bool {
        matches!(
            self,
            Error::Probe(_) | Error::UnsupportedConfiguration(_) | Error::Validation(_)
        )
    }

    /// Process exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Probe(_) | Error::UnsupportedConfiguration(_) | Error::Validation(_) => 2,
            Error::NoRenditionsSucceeded { .. } => 3,
            _ => 1,
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_display() {
        let err = Error::probe("ffprobe exited with status 1");
        assert_eq!(err.to_string(), "Probe error: ffprobe exited with status 1");
        assert!(err.is_planning());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unsupported_display() {
        let err = Error::unsupported("no renditions selected");
        assert_eq!(
            err.to_string(),
            "Unsupported configuration: no renditions selected"
        );
        assert!(err.is_planning());
    }

    #[test]
    fn job_failure_into_error_keeps_diagnostics() {
        let failure = JobFailure::new(
            JobFailureKind::ExitStatus(Some(1)),
            "Unknown encoder 'h264_nvenc'",
        );
        let err = failure.into_error("1920x1080");
        assert_eq!(
            err.to_string(),
            "Rendition 1920x1080 failed (exit status 1): Unknown encoder 'h264_nvenc'"
        );
        assert!(!err.is_planning());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn cancelled_kind_display() {
        assert_eq!(JobFailureKind::Cancelled.to_string(), "cancelled");
        assert_eq!(
            JobFailureKind::ExitStatus(None).to_string(),
            "terminated by signal"
        );
    }

    #[test]
    fn no_renditions_exit_code() {
        let err = Error::NoRenditionsSucceeded { attempted: 3 };
        assert!(err.to_string().contains("3 attempted"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "not found");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: not found");
    }

    #[test]
    fn failure_kind_serializes_tagged() {
        let json = serde_json::to_string(&JobFailureKind::ExitStatus(Some(234))).unwrap();
        assert_eq!(json, r#"{"kind":"exit_status","code":234}"#);
        let back: JobFailureKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, JobFailureKind::ExitStatus(Some(234)));
    }
}
