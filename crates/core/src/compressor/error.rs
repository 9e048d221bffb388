//! Error types for the compressor module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a [`Transcoder`](super::Transcoder) while probing or encoding.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// ffmpeg or ffprobe binary not found.
    #[error("Media tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Local input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// ffprobe could not read the source.
    #[error("Failed to probe media: {reason}")]
    ProbeFailed { reason: String },

    /// ffprobe output could not be interpreted.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// The encoder exited unsuccessfully or produced no output.
    #[error("Encode failed: {reason}")]
    EncodeFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// The encoder ran past its time limit and was killed.
    #[error("Encode timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while preparing or inspecting files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscoderError {
    /// Creates an encode failure with captured stderr output.
    pub fn encode_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a probe failure.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Whether this error means the environment lacks a media tool.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. })
    }

    /// Maps a spawn error to `ToolNotFound` when the binary is absent.
    pub(crate) fn from_spawn(err: std::io::Error, tool: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::ToolNotFound {
                path: tool.to_path_buf(),
            }
        } else {
            Self::Io(err)
        }
    }
}
