use clap::{Args, Parser, Subcommand};
use hf_core::{AudioEncoder, Kbps, VideoEncoder};
use hf_pipeline::ProfileOverrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hlsforge")]
#[command(author, version, about = "Adaptive-bitrate HLS packaging with ffmpeg")]
pub struct Cli {
    /// Path to config file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe a media file and display stream information
    Probe {
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that ffmpeg and ffprobe are available and list hardware encoders
    CheckTools,

    /// Show the encode profile that would be used for a file
    Recommend {
        #[arg(required = true)]
        input: PathBuf,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a file into an HLS rendition ladder
    Convert {
        #[arg(required = true)]
        input: PathBuf,

        /// Run directory (default: <output_root>/<date>_<timestamp>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Encrypt segments with AES-128
        #[arg(long)]
        encrypt: bool,

        /// Switch keys every N segments (0 = one key per rendition)
        #[arg(long, value_name = "N")]
        key_rotation: Option<u32>,

        /// Base URI players fetch keys from
        #[arg(long, value_name = "URI")]
        key_uri_prefix: Option<String>,

        /// Renditions encoded at once
        #[arg(long, value_name = "N")]
        parallel: Option<usize>,

        /// Skip thumbnail extraction
        #[arg(long)]
        no_thumbnail: bool,

        /// Do not print encoder progress lines
        #[arg(short, long)]
        quiet: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List previous conversions under the output root
    List {
        /// Output root (default: from config)
        root: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config or defaults if not specified)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

/// Manual edits to the recommended profile.
#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    /// Video encoder: copy, libx264, h264_nvenc, h264_qsv, h264_videotoolbox
    #[arg(long, value_name = "ENCODER")]
    pub video_encoder: Option<VideoEncoder>,

    /// Comma-separated renditions, e.g. 1080p,720p or 1920x1080,original
    #[arg(long, value_delimiter = ',', value_name = "LIST")]
    pub renditions: Option<Vec<String>>,

    /// Per-rendition video bitrate, e.g. 720p=3000k (repeatable)
    #[arg(long = "bitrate", value_name = "LABEL=RATE", value_parser = parse_bitrate_override)]
    pub bitrates: Vec<(String, Kbps)>,

    /// Audio encoder: copy or aac
    #[arg(long, value_name = "ENCODER")]
    pub audio_encoder: Option<AudioEncoder>,

    /// Audio bitrate, e.g. 160k
    #[arg(long, value_name = "RATE")]
    pub audio_bitrate: Option<Kbps>,

    /// Segment length in seconds
    #[arg(long, value_name = "SECS")]
    pub segment_duration: Option<u32>,
}

impl ProfileArgs {
    pub fn into_overrides(self) -> ProfileOverrides {
        ProfileOverrides {
            video_encoder: self.video_encoder,
            renditions: self.renditions,
            bitrates: self.bitrates,
            audio_encoder: self.audio_encoder,
            audio_bitrate: self.audio_bitrate,
            segment_duration: self.segment_duration,
        }
    }
}

fn parse_bitrate_override(s: &str) -> Result<(String, Kbps), String> {
    let (label, rate) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=RATE, got '{s}'"))?;
    let rate = rate.parse::<Kbps>().map_err(|e| e.to_string())?;
    Ok((label.trim().to_string(), rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_override_parsing() {
        assert_eq!(
            parse_bitrate_override("720p=3000k").unwrap(),
            ("720p".to_string(), Kbps(3000))
        );
        assert!(parse_bitrate_override("720p").is_err());
        assert!(parse_bitrate_override("720p=fast").is_err());
    }

    #[test]
    fn convert_flags_map_to_overrides() {
        let cli = Cli::parse_from([
            "hlsforge",
            "convert",
            "in.mkv",
            "--renditions",
            "1080p,720p",
            "--bitrate",
            "720p=3M",
            "--segment-duration",
            "6",
        ]);
        let Commands::Convert { profile, .. } = cli.command else {
            panic!("expected convert");
        };
        let overrides = profile.into_overrides();
        assert_eq!(
            overrides.renditions,
            Some(vec!["1080p".to_string(), "720p".to_string()])
        );
        assert_eq!(overrides.bitrates, vec![("720p".to_string(), Kbps(3000))]);
        assert_eq!(overrides.segment_duration, Some(6));
    }
}
