//! Probe, plan, encode and evaluate until a candidate fits the ceiling.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CompressionConfig;
use super::error::TranscoderError;
use super::planner::plan;
use super::traits::Transcoder;
use super::types::{
    CompressOptions, CompressionOutcome, EncodeMode, EncodeRequest, MediaHandle, MediaSource,
    RejectReason,
};
use crate::metrics;
use crate::publish::format_size;

/// Drives one compression request to a terminal [`CompressionOutcome`].
///
/// Each attempt probes its input, plans a budget, encodes a new candidate and
/// compares its size with the ceiling. An oversized candidate becomes the next
/// input only if it is strictly smaller than the input it came from, so every
/// request terminates; `max_attempts` caps the number of encodes regardless.
///
/// Requests are independent. Candidate names carry a random token, so several
/// requests may share a work directory and run concurrently.
pub struct Compressor<T: Transcoder> {
    transcoder: T,
    work_dir: PathBuf,
    config: CompressionConfig,
}

impl<T: Transcoder> Compressor<T> {
    pub fn new(transcoder: T, work_dir: PathBuf, config: CompressionConfig) -> Self {
        Self {
            transcoder,
            work_dir,
            config,
        }
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Compresses `source` to at most `size_upper_bound_kb` KiB.
    ///
    /// Never fails: every error ends up in the returned outcome. Candidates
    /// other than the accepted one are deleted before returning.
    pub async fn compress(
        &self,
        source: MediaSource,
        size_upper_bound_kb: u64,
        options: CompressOptions,
    ) -> CompressionOutcome {
        let start = Instant::now();
        info!(
            "Compressing {} to at most {} KB ({})",
            source,
            size_upper_bound_kb,
            EncodeMode::from_two_pass(options.two_pass).as_str()
        );

        let mut candidates = Vec::new();
        let outcome = self
            .run(source, size_upper_bound_kb, &options, &mut candidates)
            .await;

        if let CompressionOutcome::Success { path, .. } = &outcome {
            candidates.retain(|c| c != path);
        }
        remove_files(&candidates).await;

        let label = outcome.label();
        metrics::COMPRESSIONS_TOTAL.with_label_values(&[label]).inc();
        metrics::COMPRESSION_DURATION
            .with_label_values(&[label])
            .observe(start.elapsed().as_secs_f64());

        match &outcome {
            CompressionOutcome::Success {
                path,
                size_bytes,
                attempts,
            } => info!(
                "Compressed to {} in {} attempt(s): {:?}",
                format_size(*size_bytes),
                attempts,
                path
            ),
            CompressionOutcome::Rejected(reason) => info!("Compression rejected: {}", reason),
            CompressionOutcome::Unconverged {
                attempts,
                last_size_bytes,
            } => info!(
                "Compression did not converge after {} attempt(s), last size {}",
                attempts,
                last_size_bytes
                    .map(format_size)
                    .unwrap_or_else(|| "unknown".to_string())
            ),
            CompressionOutcome::ToolMissing { tool } => {
                warn!("Media tool missing: {:?}", tool)
            }
            CompressionOutcome::EncodeFailure { reason } => {
                warn!("Encode failed: {}", reason)
            }
        }

        outcome
    }

    /// The state machine. Every candidate path it creates is pushed onto
    /// `candidates` before the encoder runs, so partial outputs get cleaned up.
    async fn run(
        &self,
        source: MediaSource,
        size_upper_bound_kb: u64,
        options: &CompressOptions,
        candidates: &mut Vec<PathBuf>,
    ) -> CompressionOutcome {
        let token = Uuid::new_v4().simple().to_string();
        let ceiling_bytes = size_upper_bound_kb.saturating_mul(1024);
        let mode = EncodeMode::from_two_pass(options.two_pass);

        if let Err(e) = tokio::fs::create_dir_all(&self.work_dir).await {
            return CompressionOutcome::EncodeFailure {
                reason: format!("failed to create work dir {:?}: {}", self.work_dir, e),
            };
        }

        let mut input = source;
        let mut previous_size: Option<u64> = None;
        let mut last_size: Option<u64> = None;
        let mut attempts: u32 = 0;

        while attempts < self.config.max_attempts {
            // Init: probe the current input. Candidates are re-probed since
            // their audio bitrate differs from the source's.
            let handle = match MediaHandle::probe(&self.transcoder, input).await {
                Ok(handle) => handle,
                Err(e) => return probe_failure(e),
            };
            if attempts == 0 {
                previous_size = handle.size_bytes();
            }

            // Planning
            let bitrate_plan = match plan(
                handle.duration_secs(),
                handle.audio_bitrate_bps(),
                size_upper_bound_kb,
            ) {
                Ok(p) => p,
                Err(rejection) => return CompressionOutcome::Rejected(RejectReason::Plan(rejection)),
            };

            // Encoding
            attempts += 1;
            let output_path = self.work_dir.join(format!("{}-{}.mp4", token, attempts));
            candidates.push(output_path.clone());

            let request = EncodeRequest {
                token: token.clone(),
                input: handle,
                budget: bitrate_plan.budget,
                output_path,
                mode,
            };
            debug!(
                "Attempt {}: video {:.0} bps, audio {:.0} bps",
                attempts, request.budget.video_bitrate_bps, request.budget.audio_bitrate_bps
            );

            metrics::ENCODE_RUNS_TOTAL
                .with_label_values(&[mode.as_str()])
                .inc();
            let output = match self.transcoder.encode(&request).await {
                Ok(output) => output,
                Err(TranscoderError::ToolNotFound { path }) => {
                    return CompressionOutcome::ToolMissing { tool: path }
                }
                Err(e) => {
                    return CompressionOutcome::EncodeFailure {
                        reason: e.to_string(),
                    }
                }
            };

            // Evaluate
            let size = output.size_bytes;
            last_size = Some(size);
            info!(
                "Attempt {} produced {} in {} ms (ceiling {})",
                attempts,
                format_size(size),
                output.duration_ms,
                format_size(ceiling_bytes)
            );

            if size <= ceiling_bytes {
                let final_path = self.final_path(options, &token);
                return match place(&output.output_path, &final_path).await {
                    Ok(()) => CompressionOutcome::Success {
                        path: final_path,
                        size_bytes: size,
                        attempts,
                    },
                    Err(e) => CompressionOutcome::EncodeFailure {
                        reason: format!("failed to place output at {:?}: {}", final_path, e),
                    },
                };
            }

            match previous_size {
                Some(previous) if size < previous => {
                    debug!(
                        "Candidate shrank from {} to {}, retrying from it",
                        format_size(previous),
                        format_size(size)
                    );
                    previous_size = Some(size);
                    input = MediaSource::Local(output.output_path);
                }
                _ => {
                    return CompressionOutcome::Unconverged {
                        attempts,
                        last_size_bytes: last_size,
                    }
                }
            }
        }

        warn!(
            "Reached the limit of {} attempts without fitting the ceiling",
            self.config.max_attempts
        );
        CompressionOutcome::Unconverged {
            attempts,
            last_size_bytes: last_size,
        }
    }

    /// Where an accepted candidate ends up.
    fn final_path(&self, options: &CompressOptions, token: &str) -> PathBuf {
        match &options.output_name {
            Some(name) => self.work_dir.join(name),
            None => self.work_dir.join(format!("{}.mp4", token)),
        }
    }
}

/// Maps a probe error onto a terminal outcome.
fn probe_failure(err: TranscoderError) -> CompressionOutcome {
    match err {
        TranscoderError::ToolNotFound { path } => CompressionOutcome::ToolMissing { tool: path },
        other => CompressionOutcome::Rejected(RejectReason::Probe(other.to_string())),
    }
}

/// Moves `from` to `to`, copying when a rename is not possible.
async fn place(from: &Path, to: &Path) -> std::io::Result<()> {
    if from == to {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = tokio::fs::copy(from, to).await {
        let _ = tokio::fs::remove_file(to).await;
        return Err(e);
    }
    // `to` holds the output now; a leftover `from` is swept with the candidates
    if let Err(e) = tokio::fs::remove_file(from).await {
        warn!("Failed to remove {:?} after copying it: {}", from, e);
    }
    Ok(())
}

/// Best-effort removal; a file that never got written is not an error.
async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove candidate {:?}: {}", path, e);
            }
        }
    }
}
