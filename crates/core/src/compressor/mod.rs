//! Size-constrained video compression.
//!
//! Fits a video under a size ceiling for upload to a messaging platform:
//!
//! - [`Transcoder`] is the capability over ffprobe/ffmpeg, implemented by
//!   [`FfmpegTranscoder`] and, for tests, `testing::MockTranscoder`.
//! - [`plan`] turns a duration, an audio bitrate and a ceiling in KiB into a
//!   [`BitrateBudget`], or a [`PlanRejection`].
//! - [`Compressor`] loops probe, plan, encode and evaluate until a candidate
//!   fits, stops shrinking, or the attempt limit is hit.
//!
//! # Example
//!
//! ```ignore
//! use clipfit_core::compressor::{
//!     CompressOptions, CompressionConfig, Compressor, EncoderConfig, FfmpegTranscoder, MediaSource,
//! };
//!
//! let encoder = EncoderConfig::default();
//! let work_dir = encoder.work_dir.clone();
//! let compressor = Compressor::new(FfmpegTranscoder::new(encoder), work_dir, CompressionConfig::default());
//!
//! let outcome = compressor
//!     .compress(MediaSource::parse("https://cdn.example.com/goal.mp4"), 12_000, CompressOptions::default())
//!     .await;
//! ```

mod config;
mod controller;
mod error;
mod ffmpeg;
mod planner;
mod traits;
mod types;

pub use config::{CompressionConfig, EncoderConfig};
pub use controller::Compressor;
pub use error::TranscoderError;
pub use ffmpeg::FfmpegTranscoder;
pub use planner::{
    plan, recommended_min_size_kb, target_total_bitrate, BitratePlan, PlanRejection,
    BINARY_DECIMAL_CORRECTION, DEFAULT_AUDIO_BITRATE, MAX_AUDIO_BITRATE, MIN_AUDIO_BITRATE,
    MIN_VIDEO_BITRATE, RECOMMENDED_MIN_VIDEO_BITRATE, TOTAL_BITRATE_FLOOR,
};
pub use traits::Transcoder;
pub use types::{
    BitrateBudget, CompressOptions, CompressionOutcome, EncodeMode, EncodeOutput, EncodeRequest,
    MediaHandle, MediaInfo, MediaSource, RejectReason,
};
