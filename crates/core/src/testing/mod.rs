//! Testing utilities and mock implementations.
//!
//! This module provides a scriptable [`Transcoder`](crate::compressor::Transcoder)
//! so the convergence loop can be exercised without ffmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipfit_core::testing::{MockTranscoder, OutputSizeModel};
//!
//! let transcoder = MockTranscoder::new();
//!
//! // Every encode shrinks its input by 20%
//! transcoder.set_size_model(OutputSizeModel::Ratio(0.8)).await;
//!
//! // Use in a Compressor...
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockTranscoder, OutputSizeModel, RecordedEncode};
