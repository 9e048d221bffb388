//! Bitrate budget planning.
//!
//! Turns a size ceiling in binary kilobytes into a video/audio bitrate split.
//! Audio is allocated first because its acceptable band is narrow; video takes
//! whatever remains, down to its own floor.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::BitrateBudget;

/// Below this total bitrate no viable output can be produced (bps).
pub const TOTAL_BITRATE_FLOOR: f64 = 11_000.0;
/// Lowest audio bitrate the clamp raises to (bps).
pub const MIN_AUDIO_BITRATE: f64 = 32_000.0;
/// Highest audio bitrate the clamp allows (bps).
pub const MAX_AUDIO_BITRATE: f64 = 256_000.0;
/// Hard floor for the video stream (bps).
pub const MIN_VIDEO_BITRATE: f64 = 1_000.0;
/// Video bitrate used only for the advisory minimum-size estimate (bps).
pub const RECOMMENDED_MIN_VIDEO_BITRATE: f64 = 100_000.0;
/// Audio bitrate assumed when the source has no audio stream (bps).
pub const DEFAULT_AUDIO_BITRATE: f64 = MIN_AUDIO_BITRATE;

/// Encoders count bits in SI units while the ceiling is in KiB; dividing by
/// this factor keeps the output from overshooting by ~7.4%.
pub const BINARY_DECIMAL_CORRECTION: f64 = 1.073741824;

/// Reasons a budget cannot be produced.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PlanRejection {
    /// Duration is zero, negative or not a number.
    #[error("invalid duration: {duration_secs}")]
    InvalidDuration { duration_secs: f64 },

    /// The ceiling leaves too few bits per second for any viable output.
    #[error("bitrate too low to produce viable output: {target_bps:.0} bps < {floor_bps:.0} bps")]
    TotalBitrateTooLow { target_bps: f64, floor_bps: f64 },

    /// After audio is allocated the video stream falls under its floor.
    #[error("video bitrate floor violated: {video_bps:.0} bps < {floor_bps:.0} bps")]
    VideoBitrateTooLow { video_bps: f64, floor_bps: f64 },
}

/// A feasible budget plus the advisory quality estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitratePlan {
    pub budget: BitrateBudget,
    /// Total bitrate the ceiling allows (bps).
    pub target_total_bps: f64,
    /// Smallest size (KiB) that reaches the recommended quality floors.
    pub recommended_min_size_kb: f64,
    /// The ceiling is under `recommended_min_size_kb`. Encoding still proceeds.
    pub below_recommended: bool,
}

/// Total bitrate (bps) that fills `size_upper_bound_kb` over `duration_secs`.
pub fn target_total_bitrate(duration_secs: f64, size_upper_bound_kb: u64) -> f64 {
    (size_upper_bound_kb as f64 * 1024.0 * 8.0) / (BINARY_DECIMAL_CORRECTION * duration_secs)
}

/// Smallest size (KiB) that reaches the recommended audio and video floors.
pub fn recommended_min_size_kb(duration_secs: f64) -> f64 {
    (MIN_AUDIO_BITRATE + RECOMMENDED_MIN_VIDEO_BITRATE)
        * (BINARY_DECIMAL_CORRECTION * duration_secs)
        / (8.0 * 1024.0)
}

/// Plans the bitrate budget for a source.
///
/// `audio_bitrate_bps` is the probed bitrate of the first audio stream; `None`
/// falls back to [`DEFAULT_AUDIO_BITRATE`] before any clamping.
pub fn plan(
    duration_secs: f64,
    audio_bitrate_bps: Option<f64>,
    size_upper_bound_kb: u64,
) -> Result<BitratePlan, PlanRejection> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(PlanRejection::InvalidDuration { duration_secs });
    }

    let target_total = target_total_bitrate(duration_secs, size_upper_bound_kb);
    if target_total < TOTAL_BITRATE_FLOOR {
        return Err(PlanRejection::TotalBitrateTooLow {
            target_bps: target_total,
            floor_bps: TOTAL_BITRATE_FLOOR,
        });
    }

    let recommended_min = recommended_min_size_kb(duration_secs);
    let below_recommended = (size_upper_bound_kb as f64) < recommended_min;
    if below_recommended {
        warn!(
            "Quality will suffer: recommended minimum size is {:.0} KB, ceiling is {} KB",
            recommended_min, size_upper_bound_kb
        );
    }

    let audio_bitrate = allocate_audio(
        audio_bitrate_bps.unwrap_or(DEFAULT_AUDIO_BITRATE),
        target_total,
    );

    let video_bitrate = target_total - audio_bitrate;
    if video_bitrate < MIN_VIDEO_BITRATE {
        return Err(PlanRejection::VideoBitrateTooLow {
            video_bps: video_bitrate,
            floor_bps: MIN_VIDEO_BITRATE,
        });
    }

    debug!(
        target_total_bps = target_total,
        video_bps = video_bitrate,
        audio_bps = audio_bitrate,
        "Planned bitrate budget"
    );

    Ok(BitratePlan {
        budget: BitrateBudget {
            video_bitrate_bps: video_bitrate,
            audio_bitrate_bps: audio_bitrate,
        },
        target_total_bps: target_total,
        recommended_min_size_kb: recommended_min,
        below_recommended,
    })
}

/// Keeps audio at or under a tenth of the total, then clamps into the audio band.
fn allocate_audio(audio_bitrate: f64, target_total: f64) -> f64 {
    if 10.0 * audio_bitrate <= target_total {
        return audio_bitrate;
    }

    let shrunk = target_total / 10.0;
    if shrunk < MIN_AUDIO_BITRATE && MIN_AUDIO_BITRATE < target_total {
        MIN_AUDIO_BITRATE
    } else if shrunk > MAX_AUDIO_BITRATE {
        MAX_AUDIO_BITRATE
    } else {
        shrunk
    }
}
