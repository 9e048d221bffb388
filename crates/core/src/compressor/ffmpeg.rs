//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::config::EncoderConfig;
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::{EncodeMode, EncodeOutput, EncodeRequest, MediaInfo, MediaSource};

/// Fixed output profile.
const VIDEO_CODEC: &str = "libx264";
const AUDIO_CODEC: &str = "aac";
const CONTAINER: &str = "mp4";

/// Files libx264 leaves next to the pass log prefix.
const PASS_LOG_SUFFIXES: &[&str] = &["-0.log", "-0.log.mbtree", "-0.log.temp", "-0.log.mbtree.temp"];

#[cfg(windows)]
const NULL_SINK: &str = "NUL";
#[cfg(not(windows))]
const NULL_SINK: &str = "/dev/null";

/// Which run of an encode the arguments are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Single,
    Analysis,
    Final,
}

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: EncoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Prefix for the rate-control statistics of a two-pass run.
    fn pass_log_prefix(&self, token: &str) -> PathBuf {
        self.config.work_dir.join(format!("{}-passlog", token))
    }

    /// Builds ffmpeg arguments for one run of an encode.
    fn build_args(&self, request: &EncodeRequest, pass: Pass) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            request.input.source().to_arg(),
            "-c:v".to_string(),
            VIDEO_CODEC.to_string(),
            "-b:v".to_string(),
            format_bitrate(request.budget.video_bitrate_bps),
        ];

        if pass != Pass::Single {
            let number = if pass == Pass::Analysis { "1" } else { "2" };
            args.extend([
                "-pass".to_string(),
                number.to_string(),
                "-passlogfile".to_string(),
                self.pass_log_prefix(&request.token)
                    .to_string_lossy()
                    .to_string(),
            ]);
        }

        if pass == Pass::Analysis {
            // Statistics only; the muxed output is discarded
            args.extend(["-an".to_string(), "-f".to_string(), CONTAINER.to_string()]);
        } else {
            args.extend([
                "-c:a".to_string(),
                AUDIO_CODEC.to_string(),
                "-b:a".to_string(),
                format_bitrate(request.budget.audio_bitrate_bps),
            ]);
        }

        // Log level and progress
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]);

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        if pass == Pass::Analysis {
            args.push(NULL_SINK.to_string());
        } else {
            args.push(request.output_path.to_string_lossy().to_string());
        }

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(output: &str) -> Result<MediaInfo, TranscoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| TranscoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        if probe.streams.is_empty() {
            return Err(TranscoderError::probe_failed("no audio or video streams"));
        }

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| TranscoderError::ParseError {
                reason: "missing or invalid duration".to_string(),
            })?;

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok());

        // Audio bitrate comes from the first audio stream only
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            duration_secs,
            audio_bitrate_bps: audio_stream
                .and_then(|s| s.bit_rate.as_ref())
                .and_then(|b| b.parse::<f64>().ok()),
            size_bytes,
            format: format_name.to_string(),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
        })
    }

    /// Runs ffmpeg once, logging progress and capturing error output.
    async fn run_ffmpeg(
        &self,
        args: &[String],
        duration_secs: f64,
    ) -> Result<(), TranscoderError> {
        debug!("Running {:?} {}", self.config.ffmpeg_path, args.join(" "));

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TranscoderError::from_spawn(e, &self.config.ffmpeg_path))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscoderError::encode_failed("stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr);

        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut last_progress_log = Instant::now();
            let progress_interval = Duration::from_secs(5);
            let mut error_output = String::new();
            let mut buf = Vec::new();

            // ffmpeg echoes metadata verbatim, so lines are not guaranteed UTF-8
            loop {
                buf.clear();
                if reader.read_until(b'\n', &mut buf).await? == 0 {
                    break;
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end();
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(line);
                    error_output.push('\n');
                }

                let Some(re) = time_regex.as_ref() else {
                    continue;
                };
                let Some(micros) = re
                    .captures(line)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse::<f64>().ok())
                else {
                    continue;
                };

                if last_progress_log.elapsed() >= progress_interval {
                    // out_time_ms is reported in microseconds
                    let current = micros / 1_000_000.0;
                    let percent = (current / duration_secs * 100.0).min(100.0);
                    debug!("Encode progress: {:.1}s ({:.0}%)", current, percent);
                    last_progress_log = Instant::now();
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(TranscoderError::encode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
                Ok(())
            }
            Ok(Err(e)) => Err(TranscoderError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(TranscoderError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    /// Removes the statistics files of a two-pass run.
    async fn remove_pass_logs(&self, token: &str) {
        let prefix = self.pass_log_prefix(token).to_string_lossy().to_string();
        for suffix in PASS_LOG_SUFFIXES {
            let path = PathBuf::from(format!("{}{}", prefix, suffix));
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove pass log {:?}: {}", path, e);
                }
            }
        }
    }
}

/// Integer bps, the form ffmpeg accepts for `-b:v` and `-b:a`.
fn format_bitrate(bps: f64) -> String {
    format!("{:.0}", bps)
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, source: &MediaSource) -> Result<MediaInfo, TranscoderError> {
        if let Some(path) = source.as_path() {
            if !path.exists() {
                return Err(TranscoderError::InputNotFound {
                    path: path.to_path_buf(),
                });
            }
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(source.to_arg())
            .output()
            .await
            .map_err(|e| TranscoderError::from_spawn(e, &self.config.ffprobe_path))?;

        if !output.status.success() {
            return Err(TranscoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut info = Self::parse_probe_output(&stdout)?;

        // Some containers omit format.size; the file itself is authoritative
        if let Some(path) = source.as_path() {
            info.size_bytes = Some(tokio::fs::metadata(path).await?.len());
        }

        Ok(info)
    }

    async fn encode(&self, request: &EncodeRequest) -> Result<EncodeOutput, TranscoderError> {
        let start = Instant::now();
        let duration_secs = request.input.duration_secs();

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        match request.mode {
            EncodeMode::SinglePass => {
                let args = self.build_args(request, Pass::Single);
                self.run_ffmpeg(&args, duration_secs).await?;
            }
            EncodeMode::TwoPass => {
                tokio::fs::create_dir_all(&self.config.work_dir).await?;
                let result = async {
                    let analysis = self.build_args(request, Pass::Analysis);
                    self.run_ffmpeg(&analysis, duration_secs).await?;
                    let output = self.build_args(request, Pass::Final);
                    self.run_ffmpeg(&output, duration_secs).await
                }
                .await;
                self.remove_pass_logs(&request.token).await;
                result?;
            }
        }

        let output_meta = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(|_| TranscoderError::encode_failed("Output file not created", None))?;

        Ok(EncodeOutput {
            output_path: request.output_path.clone(),
            size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        for tool in [&self.config.ffmpeg_path, &self.config.ffprobe_path] {
            Command::new(tool)
                .arg("-version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| TranscoderError::from_spawn(e, tool))?;
        }

        // Ensure work dir exists
        tokio::fs::create_dir_all(&self.config.work_dir).await?;

        Ok(())
    }
}
