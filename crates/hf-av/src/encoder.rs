//! Encoder families and the ffmpeg arguments each one contributes.
//!
//! Every family is a pure mapping from a [`RenditionSpec`] to its video
//! arguments; adding a family means adding a [`VideoEncoder`] variant and
//! one arm in [`tuning_args`].

use hf_core::{AudioEncoder, Kbps, RenditionSpec, VideoEncoder};

/// Family-specific rate-control and preset flags. Empty for copy.
pub fn tuning_args(encoder: VideoEncoder) -> &'static [&'static str] {
    match encoder {
        VideoEncoder::Copy => &[],
        VideoEncoder::Software => &["-preset", "fast"],
        VideoEncoder::Nvenc => &["-preset", "p4", "-rc", "cbr"],
        VideoEncoder::Qsv => &["-preset", "medium"],
        VideoEncoder::VideoToolbox => &["-allow_sw", "1"],
    }
}

/// Video arguments for one rendition: `-c:v`, then for re-encodes the
/// optional `-s WxH`, `-b:v` and the family tuning flags.
///
/// Copy never scales and never sets a bitrate.
pub fn video_args(encoder: VideoEncoder, rendition: &RenditionSpec) -> Vec<String> {
    let mut args = vec!["-c:v".to_string(), encoder.ffmpeg_name().to_string()];
    if encoder.is_copy() {
        return args;
    }

    if let Some((w, h)) = rendition.dimensions {
        args.push("-s".into());
        args.push(format!("{w}x{h}"));
    }
    if let Some(bitrate) = rendition.video_bitrate {
        args.push("-b:v".into());
        args.push(bitrate.to_string());
    }
    args.extend(tuning_args(encoder).iter().map(|s| s.to_string()));
    args
}

/// Audio arguments: `-c:a`, plus `-b:a` when transcoding.
pub fn audio_args(encoder: AudioEncoder, bitrate: Option<Kbps>) -> Vec<String> {
    let mut args = vec!["-c:a".to_string(), encoder.ffmpeg_name().to_string()];
    if encoder != AudioEncoder::Copy {
        if let Some(b) = bitrate {
            args.push("-b:a".into());
            args.push(b.to_string());
        }
    }
    args
}
