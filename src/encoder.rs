//! # Media Encoder Module
//!
//! Interfaccia verso l'encoder esterno e implementazione basata su FFmpeg.
//!
//! ## Responsabilità:
//! - Trim lossless (stream copy) di un intervallo
//! - Transcodifica di un intervallo con un preset
//! - Copia byte per byte di un file intero
//! - Lettura del codec con ffprobe
//! - Versione di ffmpeg per il controllo delle dipendenze
//!
//! ## Comandi generati:
//! - **Trim**: `ffmpeg -y -i in -ss S -t D -c copy -map 0:v? -map 0:a? -avoid_negative_ts make_zero out`
//! - **Transcode**: `ffmpeg -y -ss S -i in -t D <argomenti del preset> out`
//!
//! ## Codec ammessi per il trim lossless:
//! ProRes, DNxHD/DNxHR, H.264, H.265, MJPEG, JPEG 2000, CineForm, v210/v410,
//! rawvideo e le sequenze di immagini PNG/TIFF/DPX/EXR.
//!
//! Ogni processo figlio viene terminato se il future che lo attende viene
//! abbandonato (`kill_on_drop`), così la cancellazione di un job ferma l'encoder.

use crate::config::Config;
use crate::error::{ConsolidateError, Result};
use crate::interval::Interval;
use crate::options::TranscodePreset;
use crate::ticks::ticks_to_seconds;
use crate::tool_resolver::ToolPathResolver;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Codecs whose streams can be cut without re-encoding
pub const STREAM_COPY_CODECS: &[&str] = &[
    "prores", "prores_ks", "dnxhd", "dnxhr", "h264", "avc", "h265", "hevc", "mjpeg", "jpeg2000",
    "cineform", "cfhd", "v210", "v410", "rawvideo", "png", "tiff", "dpx", "exr",
];

pub fn supports_stream_copy(codec: &str) -> bool {
    let codec = codec.trim().to_lowercase();
    STREAM_COPY_CODECS.contains(&codec.as_str())
}

/// External tool performing the file operations of a plan
pub trait MediaEncoder: Send + Sync + 'static {
    /// Version string of the underlying tool.
    fn version(&self) -> impl Future<Output = Result<String>> + Send;

    /// Codec name of the main stream, lowercase.
    fn detect_codec(&self, path: &Path) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Stream-copy `span` of `input` into `output`.
    fn trim(&self, input: &Path, output: &Path, span: Interval) -> impl Future<Output = Result<()>> + Send;

    /// Re-encode `input` (or only `span` of it) with `preset`.
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        span: Option<Interval>,
        preset: TranscodePreset,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Byte-for-byte copy, returning the bytes written.
    fn copy(&self, input: &Path, output: &Path) -> impl Future<Output = Result<u64>> + Send {
        async move { Ok(tokio::fs::copy(input, output).await?) }
    }
}

/// FFmpeg / ffprobe driver
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Locate the tools from the configuration, bundled tools or `PATH`.
    ///
    /// Missing tools fall back to the bare command name, so the failure
    /// surfaces as [`ConsolidateError::MissingDependency`] when first used.
    pub fn from_config(config: &Config) -> Self {
        let resolver = ToolPathResolver::new();
        let ffmpeg = resolver
            .resolve("ffmpeg", config.ffmpeg_path.as_deref())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        let ffprobe = resolver
            .resolve("ffprobe", config.ffprobe_path.as_deref())
            .unwrap_or_else(|| PathBuf::from("ffprobe"));
        Self::new(ffmpeg, ffprobe)
    }

    async fn run(&self, program: &Path, args: Vec<OsString>) -> Result<std::process::Output> {
        debug!("Running {} {:?}", program.display(), args);

        let output = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                let tool = program
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| program.display().to_string());
                ConsolidateError::MissingDependency(format!(
                    "{} ({})",
                    ToolPathResolver::install_instructions(&tool),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ConsolidateError::Encoder(stderr_tail(&output.stderr)));
        }
        Ok(output)
    }
}

impl MediaEncoder for FfmpegEncoder {
    async fn version(&self) -> Result<String> {
        let output = self.run(&self.ffmpeg, vec!["-version".into()]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ConsolidateError::Encoder("ffmpeg -version printed nothing".to_string()))
    }

    async fn detect_codec(&self, path: &Path) -> Result<Option<String>> {
        let args = vec![
            "-v".into(),
            "quiet".into(),
            "-print_format".into(),
            "json".into(),
            "-show_streams".into(),
            path.as_os_str().to_owned(),
        ];
        let output = self.run(&self.ffprobe, args).await?;
        parse_stream_codec(&String::from_utf8_lossy(&output.stdout))
    }

    async fn trim(&self, input: &Path, output: &Path, span: Interval) -> Result<()> {
        self.run(&self.ffmpeg, trim_args(input, output, span)).await?;
        Ok(())
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        span: Option<Interval>,
        preset: TranscodePreset,
    ) -> Result<()> {
        self.run(&self.ffmpeg, transcode_args(input, output, span, preset))
            .await?;
        Ok(())
    }
}

fn seconds_arg(ticks: i64) -> OsString {
    format!("{:.6}", ticks_to_seconds(ticks)).into()
}

fn quiet_args() -> Vec<OsString> {
    let level = if tracing::enabled!(tracing::Level::DEBUG) {
        "warning"
    } else {
        "error"
    };
    vec!["-hide_banner".into(), "-loglevel".into(), level.into()]
}

pub fn trim_args(input: &Path, output: &Path, span: Interval) -> Vec<OsString> {
    let mut args = quiet_args();
    args.extend([
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
        "-ss".into(),
        seconds_arg(span.start),
        "-t".into(),
        seconds_arg(span.len()),
        "-c".into(),
        "copy".into(),
        "-map".into(),
        "0:v?".into(),
        "-map".into(),
        "0:a?".into(),
        "-map_metadata".into(),
        "0".into(),
        "-avoid_negative_ts".into(),
        "make_zero".into(),
        output.as_os_str().to_owned(),
    ]);
    args
}

pub fn transcode_args(
    input: &Path,
    output: &Path,
    span: Option<Interval>,
    preset: TranscodePreset,
) -> Vec<OsString> {
    let mut args = quiet_args();
    args.push("-y".into());
    if let Some(span) = span {
        args.extend(["-ss".into(), seconds_arg(span.start)]);
    }
    args.extend(["-i".into(), input.as_os_str().to_owned()]);
    if let Some(span) = span {
        args.extend(["-t".into(), seconds_arg(span.len())]);
    }
    args.extend(["-map".into(), "0:v?".into(), "-map".into(), "0:a?".into()]);
    args.extend(preset_args(preset).iter().map(OsString::from));
    args.extend(["-map_metadata".into(), "0".into(), output.as_os_str().to_owned()]);
    args
}

/// Codec arguments of a preset.
pub fn preset_args(preset: TranscodePreset) -> &'static [&'static str] {
    match preset {
        TranscodePreset::ProRes422Lt => &["-c:v", "prores_ks", "-profile:v", "1", "-c:a", "pcm_s24le"],
        TranscodePreset::ProRes422 => &["-c:v", "prores_ks", "-profile:v", "2", "-c:a", "pcm_s24le"],
        TranscodePreset::ProRes422Hq => &["-c:v", "prores_ks", "-profile:v", "3", "-c:a", "pcm_s24le"],
        TranscodePreset::ProRes4444 => &[
            "-c:v", "prores_ks", "-profile:v", "4", "-pix_fmt", "yuva444p10le", "-c:a", "pcm_s24le",
        ],
        TranscodePreset::Dnxhd => &[
            "-c:v", "dnxhd", "-b:v", "185M", "-pix_fmt", "yuv422p", "-c:a", "pcm_s24le",
        ],
        TranscodePreset::Dnxhr => &[
            "-c:v", "dnxhd", "-profile:v", "dnxhr_hq", "-pix_fmt", "yuv422p", "-c:a", "pcm_s24le",
        ],
        TranscodePreset::H264Medium => &[
            "-c:v", "libx264", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "192k",
        ],
        TranscodePreset::H264High => &[
            "-c:v", "libx264", "-preset", "slow", "-crf", "18", "-c:a", "aac", "-b:a", "320k",
        ],
        TranscodePreset::H265Medium => &[
            "-c:v", "libx265", "-preset", "medium", "-crf", "23", "-c:a", "aac", "-b:a", "192k",
        ],
        TranscodePreset::H265High => &[
            "-c:v", "libx265", "-preset", "slow", "-crf", "18", "-c:a", "aac", "-b:a", "320k",
        ],
    }
}

/// Codec of the first video stream, otherwise of the first stream.
pub fn parse_stream_codec(json: &str) -> Result<Option<String>> {
    let info: serde_json::Value = serde_json::from_str(json)?;
    let empty_vec = vec![];
    let streams = info["streams"].as_array().unwrap_or(&empty_vec);
    let stream = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .or_else(|| streams.first());

    Ok(stream
        .and_then(|s| s["codec_name"].as_str())
        .map(|c| c.to_lowercase()))
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = &lines[lines.len().saturating_sub(5)..];
    if tail.is_empty() {
        "encoder exited with an error".to_string()
    } else {
        tail.join("\n")
    }
}
