//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`SourceProbe`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hf_core::{AudioStream, Error, SourceProbe, VideoStream};
use serde::Deserialize;

use super::Prober;
use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFPROBE};

/// Default probe timeout: 1 minute.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self {
            ffprobe_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a prober from the registry's ffprobe entry.
    pub fn from_registry(tools: &ToolRegistry) -> hf_core::Result<Self> {
        let tool = tools.require(FFPROBE)?;
        Ok(Self {
            ffprobe_path: tool.path.clone(),
            timeout: tool.timeout,
        })
    }

    /// Override the inspection time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    async fn probe(&self, path: &Path) -> hf_core::Result<SourceProbe> {
        if !path.is_file() {
            return Err(Error::probe(format!(
                "{}: file not found or not readable",
                path.display()
            )));
        }

        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.timeout(self.timeout);
        cmd.args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ]);
        cmd.arg(path.to_string_lossy().as_ref());

        let output = cmd.execute().await.map_err(|e| match e {
            Error::Tool { message, .. } => {
                Error::probe(format!("{}: ffprobe {message}", path.display()))
            }
            other => other,
        })?;

        let ff: FfprobeOutput = serde_json::from_str(&output.stdout).map_err(|e| {
            Error::probe(format!("{}: ffprobe JSON parse error: {e}", path.display()))
        })?;

        let probe = parse_ffprobe_output(path, ff)?;
        tracing::debug!(
            path = %path.display(),
            codec = %probe.video.codec,
            width = probe.video.width,
            height = probe.video.height,
            video_bitrate = ?probe.video.bitrate,
            duration = ?probe.duration,
            "probed source"
        );
        Ok(probe)
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    bit_rate: Option<String>,
    duration: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn parse_ffprobe_output(path: &Path, output: FfprobeOutput) -> hf_core::Result<SourceProbe> {
    let mut streams = output.streams.into_iter();

    let mut video_stream = None;
    let mut audio_stream = None;
    for stream in streams.by_ref() {
        match stream.codec_type.as_deref() {
            Some("video") if video_stream.is_none() => video_stream = Some(stream),
            Some("audio") if audio_stream.is_none() => audio_stream = Some(stream),
            _ => {}
        }
        if video_stream.is_some() && audio_stream.is_some() {
            break;
        }
    }

    let v = video_stream
        .ok_or_else(|| Error::probe(format!("{}: no video stream", path.display())))?;
    let (Some(width), Some(height)) = (v.width, v.height) else {
        return Err(Error::probe(format!(
            "{}: video stream has no dimensions",
            path.display()
        )));
    };

    let duration = parse_seconds(v.duration.as_deref())
        .or_else(|| parse_seconds(output.format.duration.as_deref()));

    let video = VideoStream {
        codec: v.codec_name.unwrap_or_default(),
        width,
        height,
        frame_rate: v
            .avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate)),
        bitrate: parse_bitrate(v.bit_rate.as_deref()),
    };

    let audio = audio_stream.map(|a| AudioStream {
        codec: a.codec_name.unwrap_or_default(),
        sample_rate: a.sample_rate.and_then(|s| s.parse().ok()),
        channels: a.channels,
        bitrate: parse_bitrate(a.bit_rate.as_deref()),
    });

    Ok(SourceProbe {
        path: path.to_path_buf(),
        video,
        audio,
        duration,
    })
}

/// Parse a bits-per-second field. Absent, unparseable and zero are unknown.
fn parse_bitrate(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&bps| bps > 0)
}

fn parse_seconds(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    if let Some((num, den)) = rate_str.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den != 0.0 && num > 0.0).then(|| num / den);
    }
    rate_str.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEVC_4K: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "hevc",
             "width": 3840, "height": 2160, "r_frame_rate": "24000/1001",
             "avg_frame_rate": "24000/1001", "bit_rate": "42000000", "duration": "600.5"},
            {"index": 1, "codec_type": "audio", "codec_name": "ac3",
             "sample_rate": "48000", "channels": 6, "bit_rate": "640000"}
        ],
        "format": {"format_name": "matroska,webm", "duration": "601.0"}
    }"#;

    fn parse(json: &str) -> hf_core::Result<SourceProbe> {
        let ff: FfprobeOutput = serde_json::from_str(json).unwrap();
        parse_ffprobe_output(Path::new("/media/in.mkv"), ff)
    }

    #[test]
    fn parses_video_and_audio() {
        let p = parse(HEVC_4K).unwrap();
        assert_eq!(p.video.codec, "hevc");
        assert_eq!((p.video.width, p.video.height), (3840, 2160));
        assert_eq!(p.video.bitrate, Some(42_000_000));
        assert!((p.video.frame_rate.unwrap() - 23.976).abs() < 0.01);
        let a = p.audio.unwrap();
        assert_eq!(a.codec, "ac3");
        assert_eq!(a.sample_rate, Some(48000));
        assert_eq!(a.channels, Some(6));
        assert_eq!(a.bitrate, Some(640_000));
        assert_eq!(p.duration, Some(Duration::from_secs_f64(600.5)));
    }

    #[test]
    fn missing_bitrate_and_duration_are_unknown() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "vp9", "width": 1280, "height": 720}],
            "format": {}
        }"#;
        let p = parse(json).unwrap();
        assert_eq!(p.video.bitrate, None);
        assert_eq!(p.duration, None);
        assert!(p.audio.is_none());
    }

    #[test]
    fn zero_bitrate_is_unknown() {
        assert_eq!(parse_bitrate(Some("0")), None);
        assert_eq!(parse_bitrate(Some("N/A")), None);
        assert_eq!(parse_bitrate(Some("128000")), Some(128_000));
    }

    #[test]
    fn duration_falls_back_to_format() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "h264", "width": 640, "height": 360}],
            "format": {"duration": "42.0"}
        }"#;
        assert_eq!(parse(json).unwrap().duration, Some(Duration::from_secs(42)));
    }

    #[test]
    fn audio_only_file_is_probe_error() {
        let json = r#"{"streams": [{"codec_type": "audio", "codec_name": "mp3"}], "format": {}}"#;
        let err = parse(json).unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert!(err.to_string().contains("no video stream"));
    }

    #[test]
    fn video_without_dimensions_is_probe_error() {
        let json = r#"{"streams": [{"codec_type": "video", "codec_name": "mjpeg"}]}"#;
        assert!(matches!(parse(json), Err(Error::Probe(_))));
    }

    #[test]
    fn frame_rate_fraction() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("invalid"), None);
    }

    #[tokio::test]
    async fn missing_file_is_probe_error() {
        let prober = FfprobeProber::new(PathBuf::from("ffprobe"));
        let err = prober
            .probe(Path::new("/nonexistent/video.mkv"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_ffprobe_is_probe_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mkv");
        std::fs::write(&input, b"not really video").unwrap();

        let prober = FfprobeProber::new(PathBuf::from("false"));
        let err = prober.probe(&input).await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)), "got {err:?}");
    }
}
