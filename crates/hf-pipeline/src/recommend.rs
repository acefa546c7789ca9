//! Recommendation engine: `(SourceProbe, HostCapabilities) -> EncodeProfile`.
//!
//! Rules, in order:
//!
//! 1. H.264 sources are copied. Otherwise the first available hardware
//!    encoder wins (NVENC, VideoToolbox, QSV), falling back to libx264.
//! 2. When re-encoding, the ladder is chosen by source height; copy always
//!    collapses to the single `original` rendition.
//! 3. AAC audio is copied; anything else becomes AAC at a bracketed bitrate.
//! 4. Segment length follows source duration (2 s, 5 s, else 10 s).
//!
//! [`ProfileOverrides`] lets a caller replace any of these choices before
//! jobs are built; the edited profile is re-validated.

use std::time::Duration;

use hf_core::rendition::{self, ORIGINAL_LABEL};
use hf_core::{
    AudioEncoder, AudioStream, EncodeProfile, Error, HostCapabilities, Kbps, PlaylistType,
    RenditionSpec, SourceProbe, VideoEncoder,
};
use serde::{Deserialize, Serialize};

/// Bitrate used for the `original` rendition when the source bitrate is unknown.
pub const FALLBACK_ORIGINAL_BITRATE: Kbps = Kbps(2000);

/// Audio bitrate used when transcoding audio of unknown bitrate.
pub const FALLBACK_AUDIO_BITRATE: Kbps = Kbps(128);

const AUDIO_HIGH_THRESHOLD_BPS: u64 = 256_000;
const AUDIO_LOW_THRESHOLD_BPS: u64 = 64_000;

/// Build the recommended profile for a probed source on this host.
pub fn recommend(probe: &SourceProbe, caps: &HostCapabilities) -> EncodeProfile {
    let video_encoder = select_video_encoder(probe, caps);
    let renditions = if video_encoder.is_copy() {
        vec![RenditionSpec::original(None)]
    } else {
        ladder_for_height(probe.video.height)
            .iter()
            .map(|label| rendition_for(label, probe, true))
            .collect()
    };
    let (audio_encoder, audio_bitrate) = select_audio(probe.audio.as_ref());

    let profile = EncodeProfile {
        video_encoder,
        audio_encoder,
        audio_bitrate,
        segment_duration: segment_duration_for(probe.duration),
        playlist_type: PlaylistType::Vod,
        renditions,
    };

    tracing::info!(
        video_encoder = %profile.video_encoder,
        audio_encoder = %profile.audio_encoder,
        segment_duration = profile.segment_duration,
        renditions = ?profile.labels(),
        "recommended encode profile"
    );

    profile
}

/// Rule 1: copy H.264, else the best hardware encoder, else software.
pub fn select_video_encoder(probe: &SourceProbe, caps: &HostCapabilities) -> VideoEncoder {
    if probe.video.is_h264() {
        return VideoEncoder::Copy;
    }
    caps.hardware_encoders()
        .first()
        .copied()
        .unwrap_or(VideoEncoder::Software)
}

/// Rule 2: ladder labels for a source height, largest first.
pub fn ladder_for_height(height: u32) -> &'static [&'static str] {
    match height {
        h if h >= 2160 => &["3840x2160", "2560x1440", "1920x1080", "1280x720"],
        h if h >= 1440 => &["2560x1440", "1920x1080", "1280x720"],
        h if h >= 1080 => &["1920x1080", "1280x720"],
        h if h >= 720 => &["1280x720"],
        _ => &[ORIGINAL_LABEL],
    }
}

/// Rule 3: audio encoder and bitrate. A missing audio stream is copied
/// (there is nothing to transcode).
pub fn select_audio(audio: Option<&AudioStream>) -> (AudioEncoder, Option<Kbps>) {
    match audio {
        None => (AudioEncoder::Copy, None),
        Some(a) if a.is_aac() => (AudioEncoder::Copy, None),
        Some(a) => (AudioEncoder::Aac, Some(audio_bitrate_for(a.bitrate))),
    }
}

/// Bracket a source audio bitrate: >256 kbps -> 192k, <64 kbps -> 128k,
/// otherwise the source rate truncated to whole kbps. Brackets compare the
/// exact rate, so 256.5 kbps is already above the upper bound.
pub fn audio_bitrate_for(source_bps: Option<u64>) -> Kbps {
    let Some(bps) = source_bps else {
        return FALLBACK_AUDIO_BITRATE;
    };
    if bps > AUDIO_HIGH_THRESHOLD_BPS {
        Kbps(192)
    } else if bps < AUDIO_LOW_THRESHOLD_BPS {
        Kbps(128)
    } else {
        Kbps::from_bps(bps)
    }
}

/// Rule 4: segment length in seconds. Unknown duration is treated as long.
pub fn segment_duration_for(duration: Option<Duration>) -> u32 {
    match duration.map(|d| d.as_secs_f64()) {
        Some(secs) if secs < 60.0 => 2,
        Some(secs) if secs < 300.0 => 5,
        _ => 10,
    }
}

/// Source bitrate in kbps for the `original` rendition.
fn original_bitrate(probe: &SourceProbe) -> Kbps {
    probe
        .video
        .bitrate
        .map(Kbps::from_bps)
        .filter(|k| k.0 > 0)
        .unwrap_or(FALLBACK_ORIGINAL_BITRATE)
}

fn rendition_for(label: &str, probe: &SourceProbe, reencode: bool) -> RenditionSpec {
    let info = rendition::lookup(label);
    let bitrate = reencode.then(|| info.default_bitrate.unwrap_or_else(|| original_bitrate(probe)));
    RenditionSpec::from_info(info, bitrate)
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

/// Manual edits applied to a recommended profile before jobs are built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOverrides {
    pub video_encoder: Option<VideoEncoder>,
    /// Rendition labels or aliases (`1080p`, `raw`, ...), in output order.
    pub renditions: Option<Vec<String>>,
    /// Per-rendition bitrate replacements, addressed by label or alias.
    pub bitrates: Vec<(String, Kbps)>,
    pub audio_encoder: Option<AudioEncoder>,
    pub audio_bitrate: Option<Kbps>,
    pub segment_duration: Option<u32>,
}

impl ProfileOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the overrides to `profile` and re-validate it.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedConfiguration`] for unknown rendition labels, a
    /// hardware encoder the host does not offer, or a profile that no longer
    /// satisfies [`EncodeProfile::validate`].
    pub fn apply(
        &self,
        mut profile: EncodeProfile,
        probe: &SourceProbe,
        caps: &HostCapabilities,
    ) -> hf_core::Result<EncodeProfile> {
        if let Some(encoder) = self.video_encoder {
            if encoder.is_hardware() && !caps.hardware_encoders().contains(&encoder) {
                return Err(Error::unsupported(format!(
                    "encoder {encoder} is not available on this host"
                )));
            }
            let was_copy = profile.video_encoder.is_copy();
            profile.video_encoder = encoder;
            if encoder.is_copy() {
                profile.renditions = vec![RenditionSpec::original(None)];
            } else if was_copy {
                profile.renditions = ladder_for_height(probe.video.height)
                    .iter()
                    .map(|label| rendition_for(label, probe, true))
                    .collect();
            }
        }

        if let Some(labels) = &self.renditions {
            let reencode = !profile.video_encoder.is_copy();
            profile.renditions = labels
                .iter()
                .map(|label| {
                    rendition::find(label)
                        .map(|info| rendition_for(info.label, probe, reencode))
                        .ok_or_else(|| {
                            Error::unsupported(format!("unknown rendition '{label}'"))
                        })
                })
                .collect::<hf_core::Result<_>>()?;
        }

        for (label, bitrate) in &self.bitrates {
            profile.set_video_bitrate(label, *bitrate)?;
        }

        if let Some(encoder) = self.audio_encoder {
            profile.audio_encoder = encoder;
            profile.audio_bitrate = match encoder {
                AudioEncoder::Copy => None,
                AudioEncoder::Aac => profile.audio_bitrate.or_else(|| {
                    Some(audio_bitrate_for(probe.audio.as_ref().and_then(|a| a.bitrate)))
                }),
            };
        }
        if let Some(bitrate) = self.audio_bitrate {
            if profile.audio_encoder == AudioEncoder::Copy {
                return Err(Error::unsupported(
                    "audio bitrate cannot be set when audio is copied",
                ));
            }
            profile.audio_bitrate = Some(bitrate);
        }

        if let Some(secs) = self.segment_duration {
            profile.segment_duration = secs;
        }

        profile.validate()?;
        Ok(profile)
    }
}
