pub mod compressor;
pub mod config;
pub mod metrics;
pub mod publish;
pub mod testing;

pub use compressor::{
    plan, BitrateBudget, CompressOptions, CompressionConfig, CompressionOutcome, Compressor,
    EncoderConfig, FfmpegTranscoder, MediaHandle, MediaInfo, MediaSource, PlanRejection,
    RejectReason, Transcoder, TranscoderError,
};
pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use publish::{format_size, PublishPolicy, SizeDecision};
