//! Media-domain types: probe results, host capabilities, encoders, bitrates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

// ---------------------------------------------------------------------------
// Bitrate
// ---------------------------------------------------------------------------

/// A bitrate in kilobits per second, rendered the way ffmpeg expects (`4500k`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kbps(pub u32);

impl Kbps {
    /// Truncate a bits-per-second value to whole kilobits.
    pub fn from_bps(bps: u64) -> Self {
        Kbps(u32::try_from(bps / 1000).unwrap_or(u32::MAX))
    }

    /// The value in bits per second.
    pub fn as_bps(self) -> u64 {
        u64::from(self.0) * 1000
    }
}

impl fmt::Display for Kbps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}

impl FromStr for Kbps {
    type Err = Error;

    /// Accepts `4500k`, `4500K`, `4500` (kbps) and `15M`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::Validation(format!("invalid bitrate '{s}'"));
        let (digits, scale) = if let Some(n) = s.strip_suffix(&['k', 'K'][..]) {
            (n, 1)
        } else if let Some(n) = s.strip_suffix(&['m', 'M'][..]) {
            (n, 1000)
        } else {
            (s, 1)
        };
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        if value == 0 {
            return Err(invalid());
        }
        value.checked_mul(scale).map(Kbps).ok_or_else(invalid)
    }
}

// ---------------------------------------------------------------------------
// SourceProbe
// ---------------------------------------------------------------------------

/// The primary video stream of a probed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    /// Codec name as reported by the inspection tool (`h264`, `hevc`, ...).
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: Option<f64>,
    /// Bits per second; `None` when the container does not report it.
    pub bitrate: Option<u64>,
}

impl VideoStream {
    pub fn is_h264(&self) -> bool {
        self.codec.eq_ignore_ascii_case("h264")
    }
}

/// The primary audio stream of a probed source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Bits per second; `None` when unknown.
    pub bitrate: Option<u64>,
}

impl AudioStream {
    pub fn is_aac(&self) -> bool {
        self.codec.eq_ignore_ascii_case("aac")
    }
}

/// Immutable result of inspecting an input file.
///
/// Unknown bitrates and durations are `None`, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProbe {
    pub path: PathBuf,
    pub video: VideoStream,
    pub audio: Option<AudioStream>,
    pub duration: Option<Duration>,
}

// ---------------------------------------------------------------------------
// HostCapabilities
// ---------------------------------------------------------------------------

/// Operating system family of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl OsFamily {
    /// The family this binary was compiled for.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OsFamily::Linux,
            "macos" => OsFamily::MacOs,
            "windows" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OsFamily::Linux => "Linux",
            OsFamily::MacOs => "macOS",
            OsFamily::Windows => "Windows",
            OsFamily::Other => "unknown",
        };
        f.write_str(s)
    }
}

/// Snapshot of what the host can encode with. Computed once, read-only after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// Whether the encode tool (ffmpeg) was found at all.
    pub encoder_available: bool,
    /// First version token reported by the encode tool.
    pub encoder_version: Option<String>,
    pub nvenc: bool,
    pub qsv: bool,
    pub videotoolbox: bool,
    /// CPU model description; `None` when it could not be read.
    pub cpu: Option<String>,
    pub os: OsFamily,
}

impl HostCapabilities {
    /// A host with no hardware encoders, useful for planning without detection.
    pub fn software_only() -> Self {
        Self {
            encoder_available: true,
            encoder_version: None,
            nvenc: false,
            qsv: false,
            videotoolbox: false,
            cpu: None,
            os: OsFamily::current(),
        }
    }

    /// Available hardware encoders in recommendation priority order.
    pub fn hardware_encoders(&self) -> Vec<VideoEncoder> {
        let mut out = Vec::new();
        if self.nvenc {
            out.push(VideoEncoder::Nvenc);
        }
        if self.videotoolbox {
            out.push(VideoEncoder::VideoToolbox);
        }
        if self.qsv {
            out.push(VideoEncoder::Qsv);
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Video encoder choice. Each variant is one encoder family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoEncoder {
    /// Pass-through; the stream is re-segmented, never re-encoded.
    Copy,
    /// libx264 on the CPU.
    Software,
    /// NVIDIA NVENC.
    Nvenc,
    /// Intel Quick Sync.
    Qsv,
    /// Apple VideoToolbox.
    VideoToolbox,
}

impl VideoEncoder {
    /// The ffmpeg encoder name passed to `-c:v`.
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            VideoEncoder::Copy => "copy",
            VideoEncoder::Software => "libx264",
            VideoEncoder::Nvenc => "h264_nvenc",
            VideoEncoder::Qsv => "h264_qsv",
            VideoEncoder::VideoToolbox => "h264_videotoolbox",
        }
    }

    pub fn is_copy(self) -> bool {
        self == VideoEncoder::Copy
    }

    pub fn is_hardware(self) -> bool {
        matches!(
            self,
            VideoEncoder::Nvenc | VideoEncoder::Qsv | VideoEncoder::VideoToolbox
        )
    }
}

impl fmt::Display for VideoEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

impl FromStr for VideoEncoder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(VideoEncoder::Copy),
            "libx264" | "software" | "x264" => Ok(VideoEncoder::Software),
            "h264_nvenc" | "nvenc" => Ok(VideoEncoder::Nvenc),
            "h264_qsv" | "qsv" => Ok(VideoEncoder::Qsv),
            "h264_videotoolbox" | "videotoolbox" => Ok(VideoEncoder::VideoToolbox),
            other => Err(Error::Validation(format!(
                "unknown video encoder '{other}' (valid: copy, libx264, h264_nvenc, h264_qsv, h264_videotoolbox)"
            ))),
        }
    }
}

/// Audio encoder choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoder {
    Copy,
    Aac,
}

impl AudioEncoder {
    pub fn ffmpeg_name(self) -> &'static str {
        match self {
            AudioEncoder::Copy => "copy",
            AudioEncoder::Aac => "aac",
        }
    }
}

impl fmt::Display for AudioEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

impl FromStr for AudioEncoder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "copy" => Ok(AudioEncoder::Copy),
            "aac" => Ok(AudioEncoder::Aac),
            other => Err(Error::Validation(format!(
                "unknown audio encoder '{other}' (valid: copy, aac)"
            ))),
        }
    }
}
