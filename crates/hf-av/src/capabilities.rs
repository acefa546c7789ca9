//! Host capability detection.
//!
//! Detection is synchronous and best-effort: every individual check that
//! fails leaves its field at "unknown" (or `false`) instead of failing the
//! whole snapshot. The first result is cached for the rest of the process.

use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

use hf_core::{HostCapabilities, OsFamily};

use crate::tools::{ToolRegistry, FFMPEG};

static CAPABILITIES: OnceLock<HostCapabilities> = OnceLock::new();

/// Detect host capabilities once and return the cached snapshot.
///
/// The registry passed on the first call decides the result; later calls
/// return the same snapshot regardless of their argument.
pub fn detect_capabilities(tools: &ToolRegistry) -> &'static HostCapabilities {
    CAPABILITIES.get_or_init(|| probe_host(tools))
}

/// [`detect_capabilities`] for async callers.
///
/// The first detection spawns `ffmpeg` synchronously, so it runs on the
/// blocking pool instead of a runtime worker. Cached snapshots return
/// immediately.
pub async fn detect_capabilities_async(tools: &ToolRegistry) -> hf_core::Result<HostCapabilities> {
    if let Some(caps) = CAPABILITIES.get() {
        return Ok(caps.clone());
    }
    let tools = tools.clone();
    tokio::task::spawn_blocking(move || detect_capabilities(&tools).clone())
        .await
        .map_err(|e| hf_core::Error::Internal(format!("capability detection panicked: {e}")))
}

/// Run detection without touching the process-wide cache.
pub fn probe_host(tools: &ToolRegistry) -> HostCapabilities {
    let os = OsFamily::current();
    let cpu = detect_cpu(os);

    let Ok(ffmpeg) = tools.require(FFMPEG) else {
        tracing::warn!("ffmpeg not found; hardware encoder detection skipped");
        return HostCapabilities {
            encoder_available: false,
            encoder_version: None,
            nvenc: false,
            qsv: false,
            videotoolbox: false,
            cpu,
            os,
        };
    };

    let encoder_version =
        run_stdout(&ffmpeg.path, &["-version"]).and_then(|out| parse_ffmpeg_version(&out));

    let encoders = run_stdout(&ffmpeg.path, &["-hide_banner", "-encoders"]).unwrap_or_default();
    let hw = parse_hw_encoders(&encoders);

    let caps = HostCapabilities {
        encoder_available: true,
        encoder_version,
        nvenc: hw.nvenc,
        qsv: hw.qsv,
        videotoolbox: hw.videotoolbox,
        cpu,
        os,
    };

    tracing::info!(
        os = %caps.os,
        cpu = caps.cpu.as_deref().unwrap_or("unknown"),
        ffmpeg = caps.encoder_version.as_deref().unwrap_or("unknown"),
        nvenc = caps.nvenc,
        qsv = caps.qsv,
        videotoolbox = caps.videotoolbox,
        "host capabilities detected"
    );

    caps
}

/// Hardware H.264 encoders listed by `ffmpeg -encoders`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HwEncoders {
    pub nvenc: bool,
    pub qsv: bool,
    pub videotoolbox: bool,
}

/// Scan `ffmpeg -encoders` output for the hardware H.264 encoders.
pub fn parse_hw_encoders(output: &str) -> HwEncoders {
    let mut found = HwEncoders::default();
    for token in output.lines().flat_map(str::split_whitespace) {
        match token {
            "h264_nvenc" => found.nvenc = true,
            "h264_qsv" => found.qsv = true,
            "h264_videotoolbox" => found.videotoolbox = true,
            _ => {}
        }
    }
    found
}

/// Extract the version token from `ffmpeg version <token> Copyright ...`.
pub fn parse_ffmpeg_version(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.trim()
            .strip_prefix("ffmpeg version ")
            .and_then(|rest| rest.split_whitespace().next())
            .map(str::to_string)
    })
}

/// Extract the first `model name` entry from `/proc/cpuinfo` contents.
pub fn parse_cpuinfo(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "model name")
            .then(|| value.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn detect_cpu(os: OsFamily) -> Option<String> {
    let cpu = match os {
        OsFamily::Linux => std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|c| parse_cpuinfo(&c)),
        OsFamily::MacOs => run_stdout(
            Path::new("sysctl"),
            &["-n", "machdep.cpu.brand_string"],
        )
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()),
        OsFamily::Windows => run_stdout(Path::new("wmic"), &["cpu", "get", "name"]).and_then(|s| {
            // First line is the "Name" header.
            s.lines()
                .skip(1)
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        }),
        OsFamily::Other => None,
    };
    if cpu.is_none() {
        tracing::debug!(os = %os, "CPU description unavailable");
    }
    cpu
}

fn run_stdout(program: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "\
Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D h264_videotoolbox    VideoToolbox H.264 Encoder (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn encoders_detected() {
        let hw = parse_hw_encoders(ENCODERS);
        assert!(hw.nvenc);
        assert!(hw.videotoolbox);
        assert!(!hw.qsv);
    }

    #[test]
    fn no_hw_encoders_in_empty_output() {
        assert_eq!(parse_hw_encoders(""), HwEncoders::default());
    }

    #[test]
    fn hevc_nvenc_is_not_h264_nvenc() {
        let hw = parse_hw_encoders(" V....D hevc_nvenc  NVIDIA NVENC hevc encoder");
        assert!(!hw.nvenc);
    }

    #[test]
    fn ffmpeg_version_token() {
        let out = "ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers\nbuilt with gcc 13";
        assert_eq!(parse_ffmpeg_version(out).as_deref(), Some("6.1.1-3ubuntu5"));
        assert_eq!(parse_ffmpeg_version("garbage"), None);
    }

    #[test]
    fn cpuinfo_model_name() {
        let info = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU @ 2.20GHz\n";
        assert_eq!(
            parse_cpuinfo(info).as_deref(),
            Some("Intel(R) Xeon(R) CPU @ 2.20GHz")
        );
        assert_eq!(parse_cpuinfo("processor\t: 0\n"), None);
    }

    #[test]
    fn missing_ffmpeg_degrades_to_unavailable() {
        let caps = probe_host(&ToolRegistry::default());
        assert!(!caps.encoder_available);
        assert!(caps.hardware_encoders().is_empty());
        assert_eq!(caps.os, OsFamily::current());
    }

    #[tokio::test]
    async fn async_detection_shares_the_cache() {
        let caps = detect_capabilities_async(&ToolRegistry::default())
            .await
            .unwrap();
        assert_eq!(&caps, detect_capabilities(&ToolRegistry::default()));
    }

    #[test]
    fn detection_is_cached() {
        let a = detect_capabilities(&ToolRegistry::default());
        let b = detect_capabilities(&ToolRegistry::default());
        assert!(std::ptr::eq(a, b));
    }
}
