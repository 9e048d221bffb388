//! Compression lifecycle integration tests.
//!
//! These tests drive the compressor with the mock transcoder:
//! - Convergence when each attempt shrinks the candidate
//! - Termination when attempts stop shrinking or hit the attempt limit
//! - Mapping of probe/encode failures onto terminal outcomes
//! - Cleanup of intermediate candidates

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use clipfit_core::{
    compressor::{EncodeMode, RejectReason},
    testing::{MockTranscoder, OutputSizeModel},
    CompressOptions, CompressionConfig, CompressionOutcome, Compressor, MediaInfo, MediaSource,
    TranscoderError,
};

const CEILING_KB: u64 = 12_000;

/// Test helper holding a compressor wired to a mock transcoder.
struct TestHarness {
    compressor: Compressor<MockTranscoder>,
    transcoder: MockTranscoder,
    work_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_max_attempts(5)
    }

    fn with_max_attempts(max_attempts: u32) -> Self {
        let work_dir = TempDir::new().expect("Failed to create work dir");
        let transcoder = MockTranscoder::new();
        let compressor = Compressor::new(
            transcoder.clone(),
            work_dir.path().to_path_buf(),
            CompressionConfig::default().with_max_attempts(max_attempts),
        );
        Self {
            compressor,
            transcoder,
            work_dir,
        }
    }

    /// Registers a source of `size_kb` KiB and returns it.
    async fn source(&self, name: &str, size_kb: u64) -> MediaSource {
        let source = MediaSource::parse(&format!("/highlights/{}", name));
        self.transcoder
            .set_probe_result(
                source.clone(),
                MediaInfo {
                    duration_secs: 60.0,
                    audio_bitrate_bps: Some(128_000.0),
                    size_bytes: Some(size_kb * 1024),
                    format: "mov".to_string(),
                    video_codec: Some("h264".to_string()),
                    audio_codec: Some("aac".to_string()),
                },
            )
            .await;
        source
    }

    async fn compress(&self, source: MediaSource) -> CompressionOutcome {
        self.compressor
            .compress(source, CEILING_KB, CompressOptions::default())
            .await
    }

    fn files_in_work_dir(&self) -> Vec<PathBuf> {
        files_in(self.work_dir.path())
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("Failed to read work dir")
        .map(|entry| entry.expect("Failed to read entry").path())
        .collect();
    files.sort();
    files
}

// =============================================================================
// Convergence
// =============================================================================

#[tokio::test]
async fn test_shrinking_candidates_converge() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.8))
        .await;

    let outcome = harness.compress(source).await;

    let CompressionOutcome::Success {
        path,
        size_bytes,
        attempts,
    } = outcome
    else {
        panic!("expected the candidates to converge");
    };
    assert!(size_bytes <= CEILING_KB * 1024);
    assert_eq!(attempts, 3);

    // Never more encodes than the shrink ratio requires, plus one
    let ratio = 20_000.0_f64 / CEILING_KB as f64;
    let bound = (ratio.ln() / (1.0_f64 / 0.8).ln()).ceil() as usize + 1;
    let encodes = harness.transcoder.encode_count().await;
    assert_eq!(encodes, 3);
    assert!(encodes <= bound);

    // Only the accepted output is left behind
    assert_eq!(harness.files_in_work_dir(), vec![path]);
}

#[tokio::test]
async fn test_retry_reprobes_candidate() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.8))
        .await;

    harness.compress(source.clone()).await;

    let recorded = harness.transcoder.recorded_encodes().await;
    assert_eq!(recorded.len(), 3);
    assert_eq!(recorded[0].request.input.source(), &source);
    for pair in recorded.windows(2) {
        assert_eq!(
            pair[1].request.input.source(),
            &MediaSource::Local(pair[0].request.output_path.clone())
        );
        assert_eq!(
            pair[1].request.input.audio_bitrate_bps(),
            Some(pair[0].request.budget.audio_bitrate_bps)
        );
        assert_eq!(pair[1].request.input.duration_secs(), 60.0);
    }
    assert_eq!(harness.transcoder.probe_count().await, 3);
}

#[tokio::test]
async fn test_named_output_is_placed_in_work_dir() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 15_000).await;

    let outcome = harness
        .compressor
        .compress(
            source,
            CEILING_KB,
            CompressOptions::default().with_output_name("arsenal-goal.mp4"),
        )
        .await;

    let expected = harness.work_dir.path().join("arsenal-goal.mp4");
    assert!(matches!(outcome, CompressionOutcome::Success { ref path, .. } if *path == expected));
    assert_eq!(harness.files_in_work_dir(), vec![expected]);
}

#[tokio::test]
async fn test_single_pass_override() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 15_000).await;

    let outcome = harness
        .compressor
        .compress(source, CEILING_KB, CompressOptions::default().single_pass())
        .await;

    assert!(outcome.is_success());
    let recorded = harness.transcoder.recorded_encodes().await;
    assert_eq!(recorded[0].request.mode, EncodeMode::SinglePass);
}

#[tokio::test]
async fn test_two_pass_is_default() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 15_000).await;

    harness.compress(source).await;

    let recorded = harness.transcoder.recorded_encodes().await;
    assert_eq!(recorded[0].request.mode, EncodeMode::TwoPass);
}

#[tokio::test]
async fn test_source_without_audio_stream() {
    let harness = TestHarness::new();
    let source = MediaSource::parse("/highlights/silent.mp4");
    harness
        .transcoder
        .set_probe_result(
            source.clone(),
            MediaInfo {
                duration_secs: 30.0,
                audio_bitrate_bps: None,
                size_bytes: Some(200 * 1024),
                format: "mov".to_string(),
                video_codec: Some("h264".to_string()),
                audio_codec: None,
            },
        )
        .await;

    let outcome = harness
        .compressor
        .compress(source, 50, CompressOptions::default())
        .await;

    assert!(outcome.is_success());
    let recorded = harness.transcoder.recorded_encodes().await;
    let budget = recorded[0].request.budget;
    assert!(budget.audio_bitrate_bps > 0.0);
    assert!(budget.video_bitrate_bps > 0.0);
}

#[tokio::test]
async fn test_concurrent_requests_do_not_collide() {
    let harness = TestHarness::new();
    let first = harness.source("first.mp4", 20_000).await;
    let second = harness.source("second.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.8))
        .await;

    let (a, b) = tokio::join!(harness.compress(first), harness.compress(second));

    let (
        CompressionOutcome::Success { path: path_a, .. },
        CompressionOutcome::Success { path: path_b, .. },
    ) = (a, b)
    else {
        panic!("both requests should succeed");
    };
    assert_ne!(path_a, path_b);
    assert_eq!(harness.files_in_work_dir().len(), 2);
}

// =============================================================================
// Termination
// =============================================================================

#[tokio::test]
async fn test_non_shrinking_candidate_stops_after_one_attempt() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(1.0))
        .await;

    let outcome = harness.compress(source).await;

    assert_eq!(
        outcome,
        CompressionOutcome::Unconverged {
            attempts: 1,
            last_size_bytes: Some(20_000 * 1024),
        }
    );
    assert_eq!(harness.transcoder.encode_count().await, 1);
    assert!(harness.files_in_work_dir().is_empty());
}

#[tokio::test]
async fn test_growing_candidate_is_unconverged() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(1.1))
        .await;

    let outcome = harness.compress(source).await;

    assert!(matches!(
        outcome,
        CompressionOutcome::Unconverged { attempts: 1, .. }
    ));
    assert!(harness.files_in_work_dir().is_empty());
}

#[tokio::test]
async fn test_attempt_limit_stops_slow_convergence() {
    let harness = TestHarness::with_max_attempts(5);
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.99))
        .await;

    let outcome = harness.compress(source).await;

    assert!(matches!(
        outcome,
        CompressionOutcome::Unconverged { attempts: 5, .. }
    ));
    assert_eq!(harness.transcoder.encode_count().await, 5);
    assert!(harness.files_in_work_dir().is_empty());
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_infeasible_budget_is_rejected_without_encoding() {
    let harness = TestHarness::new();
    let source = MediaSource::parse("/highlights/full-match.mp4");
    harness
        .transcoder
        .set_probe_result(
            source.clone(),
            MediaInfo {
                duration_secs: 600.0,
                audio_bitrate_bps: Some(320_000.0),
                size_bytes: Some(400 * 1024 * 1024),
                format: "mov".to_string(),
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
            },
        )
        .await;

    let outcome = harness
        .compressor
        .compress(source, 500, CompressOptions::default())
        .await;

    assert!(matches!(
        outcome,
        CompressionOutcome::Rejected(RejectReason::Plan(_))
    ));
    assert_eq!(harness.transcoder.encode_count().await, 0);
}

#[tokio::test]
async fn test_unreadable_source_is_rejected() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_next_probe_error(TranscoderError::probe_failed("Invalid data found"))
        .await;

    let outcome = harness.compress(source).await;

    assert!(matches!(
        outcome,
        CompressionOutcome::Rejected(RejectReason::Probe(_))
    ));
    assert_eq!(harness.transcoder.encode_count().await, 0);
}

#[tokio::test]
async fn test_missing_prober_is_tool_missing() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_next_probe_error(TranscoderError::ToolNotFound {
            path: PathBuf::from("ffprobe"),
        })
        .await;

    let outcome = harness.compress(source).await;

    assert_eq!(
        outcome,
        CompressionOutcome::ToolMissing {
            tool: PathBuf::from("ffprobe")
        }
    );
}

#[tokio::test]
async fn test_missing_encoder_is_not_retried() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_next_encode_error(TranscoderError::ToolNotFound {
            path: PathBuf::from("ffmpeg"),
        })
        .await;

    let outcome = harness.compress(source).await;

    assert_eq!(
        outcome,
        CompressionOutcome::ToolMissing {
            tool: PathBuf::from("ffmpeg")
        }
    );
    assert_eq!(harness.transcoder.encode_count().await, 1);
}

#[tokio::test]
async fn test_encoder_failure_is_terminal() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.8))
        .await;
    harness
        .transcoder
        .set_next_encode_error(TranscoderError::encode_failed(
            "FFmpeg exited with code: Some(1)",
            Some("Error while decoding stream".to_string()),
        ))
        .await;

    let outcome = harness.compress(source).await;

    assert!(matches!(
        outcome,
        CompressionOutcome::EncodeFailure { ref reason } if reason.contains("exited with code")
    ));
    assert_eq!(harness.transcoder.encode_count().await, 1);
    assert!(harness.files_in_work_dir().is_empty());
}

#[tokio::test]
async fn test_failure_midway_cleans_up_earlier_candidates() {
    let harness = TestHarness::new();
    let source = harness.source("goal.mp4", 20_000).await;
    harness
        .transcoder
        .set_size_model(OutputSizeModel::Ratio(0.8))
        .await;

    // The source probes fine, the first candidate's re-probe fails
    harness
        .transcoder
        .set_probe_error_after(1, TranscoderError::probe_failed("truncated file"))
        .await;

    let outcome = harness.compress(source).await;

    assert!(matches!(
        outcome,
        CompressionOutcome::Rejected(RejectReason::Probe(ref reason)) if reason.contains("truncated file")
    ));
    assert_eq!(harness.transcoder.probe_count().await, 2);
    assert_eq!(harness.transcoder.encode_count().await, 1);
    assert!(harness.files_in_work_dir().is_empty());
}
