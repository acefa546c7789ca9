//! The encode plan: [`EncodeProfile`], [`RenditionSpec`] and [`EncryptionConfig`].
//!
//! A profile is built once (by the recommendation engine, optionally edited
//! by the caller) and then passed by value into job building. Nothing here
//! is shared mutable state.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::Result;
use crate::media::{AudioEncoder, Kbps, VideoEncoder};
use crate::rendition::{self, RenditionInfo};
use crate::Error;

// ---------------------------------------------------------------------------
// PlaylistType
// ---------------------------------------------------------------------------

/// HLS playlist type. Only video-on-demand is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistType {
    #[default]
    Vod,
}

impl PlaylistType {
    pub fn as_str(self) -> &'static str {
        match self {
            PlaylistType::Vod => "vod",
        }
    }
}

impl fmt::Display for PlaylistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RenditionSpec
// ---------------------------------------------------------------------------

/// One output target of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionSpec {
    /// Table label, e.g. `1920x1080` or `original`.
    pub label: String,
    /// Explicit output frame size; `None` keeps the source size.
    pub dimensions: Option<(u32, u32)>,
    /// Target video bitrate; `None` when the video stream is copied.
    pub video_bitrate: Option<Kbps>,
    /// Output subdirectory under the run directory.
    pub dir_name: String,
    /// Bits per second advertised in the master manifest.
    pub bandwidth: u64,
}

impl RenditionSpec {
    /// Build a rendition from a table row with the given bitrate.
    pub fn from_info(info: &RenditionInfo, video_bitrate: Option<Kbps>) -> Self {
        Self {
            label: info.label.to_string(),
            dimensions: info.dimensions,
            video_bitrate,
            dir_name: info.dir_name.to_string(),
            bandwidth: info.bandwidth,
        }
    }

    /// Build a rendition for a label, resolving directory and bandwidth through the
    /// rendition table (unknown labels land in `raw`).
    pub fn for_label(label: &str, video_bitrate: Option<Kbps>) -> Self {
        Self::from_info(rendition::lookup(label), video_bitrate)
    }

    /// The source-resolution rendition.
    pub fn original(video_bitrate: Option<Kbps>) -> Self {
        Self::from_info(rendition::original(), video_bitrate)
    }

    pub fn is_original(&self) -> bool {
        self.dimensions.is_none()
    }

    /// `WxH` for the master manifest; `None` for the original rendition.
    pub fn resolution_string(&self) -> Option<String> {
        self.dimensions.map(|(w, h)| format!("{w}x{h}"))
    }
}

// ---------------------------------------------------------------------------
// EncodeProfile
// ---------------------------------------------------------------------------

/// The complete encode plan for one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeProfile {
    pub video_encoder: VideoEncoder,
    pub audio_encoder: AudioEncoder,
    /// `None` when the audio stream is copied.
    pub audio_bitrate: Option<Kbps>,
    /// Target segment length in seconds.
    pub segment_duration: u32,
    pub playlist_type: PlaylistType,
    /// Renditions in output order. This order is preserved in results and
    /// in the master manifest.
    pub renditions: Vec<RenditionSpec>,
}

impl EncodeProfile {
    /// Check structural invariants. Any violation is an
    /// [`Error::UnsupportedConfiguration`] and must stop the conversion before
    /// a job is launched.
    pub fn validate(&self) -> Result<()> {
        if self.renditions.is_empty() {
            return Err(Error::unsupported("no renditions selected"));
        }

        if self.video_encoder.is_copy() {
            if self.renditions.len() != 1 || !self.renditions[0].is_original() {
                return Err(Error::unsupported(
                    "video copy keeps the source stream; exactly one 'original' rendition is allowed",
                ));
            }
        } else if let Some(r) = self.renditions.iter().find(|r| r.video_bitrate.is_none()) {
            return Err(Error::unsupported(format!(
                "rendition {} has no video bitrate but the video stream is re-encoded with {}",
                r.label, self.video_encoder
            )));
        }

        match (self.audio_encoder, self.audio_bitrate) {
            (AudioEncoder::Aac, None) => {
                return Err(Error::unsupported("aac audio requires an audio bitrate"));
            }
            (AudioEncoder::Copy, Some(_)) => {
                return Err(Error::unsupported(
                    "audio bitrate cannot be set when audio is copied",
                ));
            }
            _ => {}
        }

        if self.segment_duration == 0 {
            return Err(Error::unsupported("segment duration must be positive"));
        }

        let mut dirs = HashSet::new();
        for r in &self.renditions {
            if !dirs.insert(r.dir_name.as_str()) {
                return Err(Error::unsupported(format!(
                    "renditions share output directory '{}'",
                    r.dir_name
                )));
            }
        }

        Ok(())
    }

    /// Replace the bitrate of one rendition, addressed by label or alias.
    pub fn set_video_bitrate(&mut self, label: &str, bitrate: Kbps) -> Result<()> {
        if self.video_encoder.is_copy() {
            return Err(Error::unsupported(
                "video bitrate cannot be set when the video stream is copied",
            ));
        }
        let canonical = rendition::find(label).map(|r| r.label).unwrap_or(label);
        let target = self
            .renditions
            .iter_mut()
            .find(|r| r.label == canonical)
            .ok_or_else(|| {
                Error::unsupported(format!("rendition '{label}' is not part of this profile"))
            })?;
        target.video_bitrate = Some(bitrate);
        Ok(())
    }

    /// Labels in profile order.
    pub fn labels(&self) -> Vec<&str> {
        self.renditions.iter().map(|r| r.label.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// EncryptionConfig
// ---------------------------------------------------------------------------

/// AES-128 segment encryption settings for a whole conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    pub enabled: bool,
    /// Segments per key. `0` keeps one static key per rendition.
    pub key_rotation_period: u32,
    /// Prefix for the key URI written into the key-info descriptor. When
    /// absent the URI is the bare key file name.
    pub key_uri_prefix: Option<String>,
    /// Whether to write an explicit IV into the key-info descriptor. Off by
    /// default: the encoder then derives each segment's IV from its media
    /// sequence number instead of reusing one IV for every segment.
    pub with_iv: bool,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            key_rotation_period: 0,
            key_uri_prefix: None,
            with_iv: false,
        }
    }
}

impl EncryptionConfig {
    /// Encryption with a static key per rendition.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Encryption rotating keys every `period` segments.
    pub fn rotating(period: u32) -> Self {
        Self {
            enabled: true,
            key_rotation_period: period,
            ..Self::default()
        }
    }

    /// The effective rotation period: `Some(n)` only when encryption is on
    /// and `n > 0`.
    pub fn rotation_period(&self) -> Option<u32> {
        (self.enabled && self.key_rotation_period > 0).then_some(self.key_rotation_period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder_profile() -> EncodeProfile {
        EncodeProfile {
            video_encoder: VideoEncoder::Software,
            audio_encoder: AudioEncoder::Copy,
            audio_bitrate: None,
            segment_duration: 10,
            playlist_type: PlaylistType::Vod,
            renditions: vec![
                RenditionSpec::for_label("1920x1080", Some(Kbps(4500))),
                RenditionSpec::for_label("1280x720", Some(Kbps(2500))),
            ],
        }
    }

    #[test]
    fn valid_ladder_passes() {
        ladder_profile().validate().unwrap();
    }

    #[test]
    fn empty_ladder_is_unsupported() {
        let mut p = ladder_profile();
        p.renditions.clear();
        assert!(matches!(
            p.validate(),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn copy_requires_single_original() {
        let mut p = ladder_profile();
        p.video_encoder = VideoEncoder::Copy;
        assert!(p.validate().is_err());

        p.renditions = vec![RenditionSpec::original(None)];
        p.validate().unwrap();
    }

    #[test]
    fn reencode_requires_bitrates() {
        let mut p = ladder_profile();
        p.renditions[1].video_bitrate = None;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("1280x720"));
    }

    #[test]
    fn audio_bitrate_must_match_encoder() {
        let mut p = ladder_profile();
        p.audio_encoder = AudioEncoder::Aac;
        assert!(p.validate().is_err());
        p.audio_bitrate = Some(Kbps(128));
        p.validate().unwrap();
    }

    #[test]
    fn duplicate_directories_rejected() {
        let mut p = ladder_profile();
        p.renditions
            .push(RenditionSpec::for_label("720p", Some(Kbps(2000))));
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("720p"));
    }

    #[test]
    fn set_bitrate_by_alias() {
        let mut p = ladder_profile();
        p.set_video_bitrate("1080p", Kbps(6000)).unwrap();
        assert_eq!(p.renditions[0].video_bitrate, Some(Kbps(6000)));
        assert!(p.set_video_bitrate("4k", Kbps(1)).is_err());
    }

    #[test]
    fn resolution_string_only_for_scaled() {
        assert_eq!(
            RenditionSpec::for_label("1280x720", None).resolution_string(),
            Some("1280x720".to_string())
        );
        assert_eq!(RenditionSpec::original(None).resolution_string(), None);
    }

    #[test]
    fn rotation_period_requires_enabled() {
        let mut cfg = EncryptionConfig::rotating(5);
        assert_eq!(cfg.rotation_period(), Some(5));
        cfg.enabled = false;
        assert_eq!(cfg.rotation_period(), None);
        assert_eq!(EncryptionConfig::enabled().rotation_period(), None);
    }
}
