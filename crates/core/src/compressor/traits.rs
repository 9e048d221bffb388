//! Trait definitions for the compressor module.

use async_trait::async_trait;

use super::error::TranscoderError;
use super::types::{EncodeOutput, EncodeRequest, MediaInfo, MediaSource};

/// Capability to inspect and encode media with external tools.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Reads duration, audio bitrate and size of a source.
    ///
    /// Probing the same unmodified source twice yields identical results.
    async fn probe(&self, source: &MediaSource) -> Result<MediaInfo, TranscoderError>;

    /// Encodes `request.input` to `request.output_path` at the requested budget.
    ///
    /// A failed run is reported as-is; retry decisions belong to the caller.
    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, TranscoderError>;

    /// Validates that the underlying tools are available.
    async fn validate(&self) -> Result<(), TranscoderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::types::{BitrateBudget, EncodeMode, MediaHandle};
    use std::path::PathBuf;

    struct FixedTranscoder;

    #[async_trait]
    impl Transcoder for FixedTranscoder {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn probe(&self, _source: &MediaSource) -> Result<MediaInfo, TranscoderError> {
            Ok(MediaInfo {
                duration_secs: 42.0,
                audio_bitrate_bps: Some(128_000.0),
                size_bytes: Some(4_096),
                format: "mov".to_string(),
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
            })
        }

        async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, TranscoderError> {
            Ok(EncodeOutput {
                output_path: request.output_path.clone(),
                size_bytes: 1_024,
                duration_ms: 5,
            })
        }

        async fn validate(&self) -> Result<(), TranscoderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_trait_object_probe() {
        let transcoder: Box<dyn Transcoder> = Box::new(FixedTranscoder);
        let info = transcoder
            .probe(&MediaSource::parse("/clips/goal.mp4"))
            .await
            .unwrap();
        assert_eq!(transcoder.name(), "fixed");
        assert_eq!(info.duration_secs, 42.0);
    }

    #[tokio::test]
    async fn test_trait_object_encode() {
        let transcoder: Box<dyn Transcoder> = Box::new(FixedTranscoder);
        let request = EncodeRequest {
            token: "abc".to_string(),
            input: MediaHandle::from_parts(
                MediaSource::parse("/clips/goal.mp4"),
                transcoder.probe(&MediaSource::parse("/clips/goal.mp4")).await.unwrap(),
            ),
            budget: BitrateBudget {
                video_bitrate_bps: 900_000.0,
                audio_bitrate_bps: 96_000.0,
            },
            output_path: PathBuf::from("/tmp/abc-1.mp4"),
            mode: EncodeMode::TwoPass,
        };
        let output = transcoder.encode(&request).await.unwrap();
        assert_eq!(output.output_path, PathBuf::from("/tmp/abc-1.mp4"));
        assert_eq!(output.size_bytes, 1_024);
    }
}
