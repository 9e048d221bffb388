use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clipfit_core::{
    load_config, validate_config, CompressOptions, CompressionOutcome, Compressor, Config,
    FfmpegTranscoder, MediaSource, SizeDecision, Transcoder,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: clipfit <path-or-url> [size-kb] [output-name]";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!(USAGE);
    };
    let size_kb = args
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .with_context(|| format!("invalid size in KB\n{}", USAGE))?;
    let output_name = args.next();

    // Configuration is optional; defaults apply without a file
    let config = match std::env::var("CLIPFIT_CONFIG") {
        Ok(path) => {
            let path = PathBuf::from(path);
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        Err(_) => Config::default(),
    };
    validate_config(&config).context("Configuration validation failed")?;

    info!("clipfit v{}", VERSION);
    info!("Work directory: {:?}", config.encoder.work_dir);

    let source = MediaSource::parse(&input);
    let size_kb = size_kb.unwrap_or(config.compression.target_size_kb);

    // Remote sources have no length without a request; they always compress
    if let Some(path) = source.as_path() {
        let length = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot read {:?}", path))?
            .len();
        match config.publish.classify(length, size_kb) {
            SizeDecision::TooSmall => {
                bail!("{} is only {} bytes, not a video", input, length)
            }
            SizeDecision::UploadDirect => {
                info!("{} already fits the upload limit, leaving it as is", input);
                println!("{}", path.display());
                return Ok(());
            }
            SizeDecision::Compress { target_size_kb } => {
                info!("Compressing {} to at most {} KB", input, target_size_kb);
            }
        }
    }

    let transcoder = FfmpegTranscoder::new(config.encoder.clone());
    transcoder
        .validate()
        .await
        .context("ffmpeg/ffprobe are not usable")?;

    let compressor = Compressor::new(
        transcoder,
        config.encoder.work_dir.clone(),
        config.compression.clone(),
    );

    let options = CompressOptions {
        output_name,
        two_pass: config.compression.two_pass,
    };

    let outcome = compressor.compress(source, size_kb, options).await;

    match clipfit_core::metrics::encode_metrics() {
        Ok(text) => debug!("Metrics:\n{}", text),
        Err(e) => warn!("Failed to encode metrics: {}", e),
    }

    match outcome {
        CompressionOutcome::Success { path, .. } => {
            println!("{}", path.display());
            Ok(())
        }
        other => bail!("compression of {} ended as {}", input, other.label()),
    }
}
