//! Types shared by the probe, planner, encoder and controller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::error::TranscoderError;
use super::planner::PlanRejection;
use super::traits::Transcoder;

/// Where a video comes from.
///
/// Remote sources are handed to ffmpeg/ffprobe as-is; they stream from the URL
/// without a separate download step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum MediaSource {
    /// A file on the local filesystem.
    Local(PathBuf),
    /// A URL the media tools can read directly.
    Remote(String),
}

impl MediaSource {
    /// Builds a source from user input, treating anything with a scheme as remote.
    pub fn parse(input: &str) -> Self {
        if input.contains("://") {
            Self::Remote(input.to_string())
        } else {
            Self::Local(PathBuf::from(input))
        }
    }

    /// The local path, if this is a local source.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Self::Local(path) => Some(path),
            Self::Remote(_) => None,
        }
    }

    /// Argument form passed to ffmpeg/ffprobe.
    pub fn to_arg(&self) -> String {
        match self {
            Self::Local(path) => path.to_string_lossy().to_string(),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

impl From<PathBuf> for MediaSource {
    fn from(path: PathBuf) -> Self {
        Self::Local(path)
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        Self::Local(path.to_path_buf())
    }
}

/// Probe results for a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds.
    pub duration_secs: f64,
    /// Bitrate of the first audio stream, in bps. `None` when there is no audio
    /// stream or it does not report a bitrate.
    pub audio_bitrate_bps: Option<f64>,
    /// Size of the source in bytes, when known.
    pub size_bytes: Option<u64>,
    /// Container format name (first entry of ffprobe's `format_name`).
    pub format: String,
    /// Video codec name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    /// Audio codec name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
}

/// A source together with the probe results taken from it.
///
/// The results are fixed at construction. After the underlying file changes a
/// new handle must be created with [`MediaHandle::probe`].
#[derive(Debug, Clone)]
pub struct MediaHandle {
    source: MediaSource,
    info: MediaInfo,
}

impl MediaHandle {
    /// Probes `source` and captures the result.
    pub async fn probe<T>(transcoder: &T, source: MediaSource) -> Result<Self, TranscoderError>
    where
        T: Transcoder + ?Sized,
    {
        let info = transcoder.probe(&source).await?;
        Ok(Self { source, info })
    }

    /// Creates a handle from already known probe results.
    pub fn from_parts(source: MediaSource, info: MediaInfo) -> Self {
        Self { source, info }
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    pub fn info(&self) -> &MediaInfo {
        &self.info
    }

    pub fn duration_secs(&self) -> f64 {
        self.info.duration_secs
    }

    pub fn audio_bitrate_bps(&self) -> Option<f64> {
        self.info.audio_bitrate_bps
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.info.size_bytes
    }
}

/// Bitrate split between the video and audio streams, in bps.
///
/// Both values are positive whenever a budget exists; an infeasible budget is
/// reported as a [`PlanRejection`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitrateBudget {
    pub video_bitrate_bps: f64,
    pub audio_bitrate_bps: f64,
}

impl BitrateBudget {
    /// Combined bitrate of both streams.
    pub fn total_bps(&self) -> f64 {
        self.video_bitrate_bps + self.audio_bitrate_bps
    }
}

/// Encoder rate-control strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeMode {
    /// One run targeting the budget directly.
    SinglePass,
    /// An analysis run into a null sink followed by the real run.
    TwoPass,
}

impl EncodeMode {
    pub fn from_two_pass(two_pass: bool) -> Self {
        if two_pass {
            Self::TwoPass
        } else {
            Self::SinglePass
        }
    }

    /// Label used in metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SinglePass => "single_pass",
            Self::TwoPass => "two_pass",
        }
    }
}

/// A single encoder invocation.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    /// Token that keeps side artifacts of concurrent runs apart.
    pub token: String,
    /// Source to read, with its probe results.
    pub input: MediaHandle,
    /// Target bitrates.
    pub budget: BitrateBudget,
    /// Where to write the candidate.
    pub output_path: PathBuf,
    /// Rate-control strategy.
    pub mode: EncodeMode,
}

/// A candidate written by the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOutput {
    pub output_path: PathBuf,
    pub size_bytes: u64,
    /// Wall time of the encoder run(s) in milliseconds.
    pub duration_ms: u64,
}

/// Why a compression request was turned down before a usable encode.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The source (or an intermediate candidate) could not be probed.
    Probe(String),
    /// The bitrate budget is infeasible.
    Plan(PlanRejection),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Probe(reason) => write!(f, "probe failed: {}", reason),
            Self::Plan(rejection) => write!(f, "{}", rejection),
        }
    }
}

/// Terminal state of one compression request.
#[derive(Debug, Clone, PartialEq)]
pub enum CompressionOutcome {
    /// A candidate fits under the ceiling and has been placed at `path`.
    Success {
        path: PathBuf,
        size_bytes: u64,
        attempts: u32,
    },
    /// Probing or planning ruled the request out.
    Rejected(RejectReason),
    /// Attempts stopped shrinking the output, or the attempt ceiling was hit.
    Unconverged {
        attempts: u32,
        last_size_bytes: Option<u64>,
    },
    /// ffmpeg or ffprobe is not installed where configured.
    ToolMissing { tool: PathBuf },
    /// The encoder failed for any other reason.
    EncodeFailure { reason: String },
}

impl CompressionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Rejected(_) => "rejected",
            Self::Unconverged { .. } => "unconverged",
            Self::ToolMissing { .. } => "tool_missing",
            Self::EncodeFailure { .. } => "encode_failure",
        }
    }
}

/// Options for a single `compress` call.
#[derive(Debug, Clone)]
pub struct CompressOptions {
    /// Name (or path) of the final output. A relative name resolves under the
    /// work directory; `None` picks a unique name.
    pub output_name: Option<String>,
    /// Use two-pass encoding.
    pub two_pass: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            output_name: None,
            two_pass: true,
        }
    }
}

impl CompressOptions {
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    pub fn single_pass(mut self) -> Self {
        self.two_pass = false;
        self
    }
}
