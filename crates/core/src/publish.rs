//! Decides whether a discovered video can be uploaded as-is or needs compressing.

use serde::{Deserialize, Serialize};

/// Size thresholds of the messaging platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPolicy {
    /// Links at or below this size are not real videos (error pages, redirects).
    #[serde(default = "default_min_direct_size")]
    pub min_direct_size_bytes: u64,

    /// Videos at or above this size are compressed before upload.
    #[serde(default = "default_inline_upload_limit")]
    pub inline_upload_limit_bytes: u64,
}

fn default_min_direct_size() -> u64 {
    10_000
}

fn default_inline_upload_limit() -> u64 {
    14_000_000
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            min_direct_size_bytes: default_min_direct_size(),
            inline_upload_limit_bytes: default_inline_upload_limit(),
        }
    }
}

/// What to do with a direct video link of a given size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeDecision {
    /// Too small to be a video; skip the link.
    TooSmall,
    /// Fits the platform limit; upload unchanged.
    UploadDirect,
    /// Needs compressing to `target_size_kb` KiB first.
    Compress { target_size_kb: u64 },
}

impl PublishPolicy {
    /// Classifies a link by its reported content length.
    pub fn classify(&self, content_length: u64, target_size_kb: u64) -> SizeDecision {
        if content_length <= self.min_direct_size_bytes {
            SizeDecision::TooSmall
        } else if content_length < self.inline_upload_limit_bytes {
            SizeDecision::UploadDirect
        } else {
            SizeDecision::Compress { target_size_kb }
        }
    }
}

const SIZE_UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Human-readable size with 1024-based units, e.g. `13.35 MB`.
pub fn format_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }
    let exponent = ((size_bytes as f64).log(1024.0).floor() as usize).min(SIZE_UNITS.len() - 1);
    let value = size_bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[exponent])
}
