//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::compressor::{
    EncodeOutput, EncodeRequest, MediaInfo, MediaSource, Transcoder, TranscoderError,
};

/// A recorded encode request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedEncode {
    /// The request that was submitted.
    pub request: EncodeRequest,
    /// Whether the encode succeeded.
    pub success: bool,
}

/// How the mock sizes its candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputSizeModel {
    /// Output is the input's size times the ratio.
    Ratio(f64),
    /// Output always has this size.
    Fixed(u64),
}

impl OutputSizeModel {
    fn output_size(&self, input_size: u64) -> u64 {
        match *self {
            Self::Ratio(ratio) => (input_size as f64 * ratio) as u64,
            Self::Fixed(size) => size,
        }
    }
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Track encode requests for assertions
/// - Control probe results per source
/// - Model candidate sizes relative to their input
/// - Simulate probe and encode failures
///
/// Encodes write an empty placeholder file at the requested output path and
/// register a probe result for it, so a candidate can be re-probed as the next
/// input. The registered audio bitrate is the one the budget asked for.
///
/// # Example
///
/// ```rust,ignore
/// use clipfit_core::testing::{MockTranscoder, OutputSizeModel};
///
/// let transcoder = MockTranscoder::new();
/// transcoder.set_probe_result(MediaSource::parse("/clips/goal.mp4"), info).await;
/// transcoder.set_size_model(OutputSizeModel::Ratio(0.8)).await;
///
/// let outcome = compressor.compress(source, 12_000, CompressOptions::default()).await;
///
/// assert_eq!(transcoder.encode_count().await, 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    /// Recorded encodes.
    encodes: Arc<RwLock<Vec<RecordedEncode>>>,
    /// Pre-configured probe results by source.
    probe_results: Arc<RwLock<HashMap<MediaSource, MediaInfo>>>,
    /// Number of probe calls made.
    probe_calls: Arc<RwLock<usize>>,
    /// Candidate size model.
    size_model: Arc<RwLock<OutputSizeModel>>,
    /// If set, the next probe will fail with this error.
    next_probe_error: Arc<RwLock<Option<TranscoderError>>>,
    /// If set, the probe following this many successful calls fails.
    probe_error_after: Arc<RwLock<Option<(usize, TranscoderError)>>>,
    /// If set, the next encode will fail with this error.
    next_encode_error: Arc<RwLock<Option<TranscoderError>>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder that halves every input.
    pub fn new() -> Self {
        Self {
            encodes: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            probe_calls: Arc::new(RwLock::new(0)),
            size_model: Arc::new(RwLock::new(OutputSizeModel::Ratio(0.5))),
            next_probe_error: Arc::new(RwLock::new(None)),
            probe_error_after: Arc::new(RwLock::new(None)),
            next_encode_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Get all recorded encodes.
    pub async fn recorded_encodes(&self) -> Vec<RecordedEncode> {
        self.encodes.read().await.clone()
    }

    /// Get the number of encodes attempted.
    pub async fn encode_count(&self) -> usize {
        self.encodes.read().await.len()
    }

    /// Get the number of probes performed.
    pub async fn probe_count(&self) -> usize {
        *self.probe_calls.read().await
    }

    /// Set a probe result for a specific source.
    pub async fn set_probe_result(&self, source: MediaSource, info: MediaInfo) {
        self.probe_results.write().await.insert(source, info);
    }

    /// Set how candidate sizes are derived.
    pub async fn set_size_model(&self, model: OutputSizeModel) {
        *self.size_model.write().await = model;
    }

    /// Configure the next probe to fail with the given error.
    pub async fn set_next_probe_error(&self, error: TranscoderError) {
        *self.next_probe_error.write().await = Some(error);
    }

    /// Configure the probe after `calls` more successful ones to fail.
    ///
    /// Counts from the probes already made, so `set_probe_error_after(1, ..)`
    /// lets one probe through and fails the second.
    pub async fn set_probe_error_after(&self, calls: usize, error: TranscoderError) {
        let made = *self.probe_calls.read().await;
        *self.probe_error_after.write().await = Some((made + calls, error));
    }

    /// Configure the next encode to fail with the given error.
    pub async fn set_next_encode_error(&self, error: TranscoderError) {
        *self.next_encode_error.write().await = Some(error);
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, source: &MediaSource) -> Result<MediaInfo, TranscoderError> {
        let call = {
            let mut calls = self.probe_calls.write().await;
            *calls += 1;
            *calls
        };

        if let Some(err) = self.next_probe_error.write().await.take() {
            return Err(err);
        }

        {
            let mut after = self.probe_error_after.write().await;
            if matches!(*after, Some((allowed, _)) if call > allowed) {
                if let Some((_, err)) = after.take() {
                    return Err(err);
                }
            }
        }

        self.probe_results
            .read()
            .await
            .get(source)
            .cloned()
            .ok_or_else(|| TranscoderError::probe_failed(format!("no probe result for {}", source)))
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, TranscoderError> {
        if let Some(err) = self.next_encode_error.write().await.take() {
            self.encodes.write().await.push(RecordedEncode {
                request: request.clone(),
                success: false,
            });
            return Err(err);
        }

        let input_size = request.input.size_bytes().unwrap_or(0);
        let size_bytes = self.size_model.read().await.output_size(input_size);

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&request.output_path, b"").await?;

        self.probe_results.write().await.insert(
            MediaSource::Local(request.output_path.clone()),
            MediaInfo {
                duration_secs: request.input.duration_secs(),
                audio_bitrate_bps: Some(request.budget.audio_bitrate_bps),
                size_bytes: Some(size_bytes),
                format: "mov".to_string(),
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
            },
        );

        self.encodes.write().await.push(RecordedEncode {
            request: request.clone(),
            success: true,
        });

        Ok(EncodeOutput {
            output_path: request.output_path.clone(),
            size_bytes,
            duration_ms: 0,
        })
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Ok(())
    }
}
