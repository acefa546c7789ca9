//! Rendition job builder: one [`VariantJob`] per [`RenditionSpec`].
//!
//! Argument vectors are a pure function of the profile, the encryption
//! settings and the paths, so building twice yields identical jobs.

use std::path::{Path, PathBuf};

use hf_av::encoder::{audio_args, video_args};
use hf_core::{EncodeProfile, EncryptionConfig, RenditionSpec};
use serde::Serialize;

use crate::encryption::{KEY_FILE, KEY_INFO_FILE};

/// Segment file name pattern inside each rendition directory.
pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// One unit of work for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantJob {
    /// The rendition this job produces.
    pub rendition: RenditionSpec,
    /// Full ffmpeg argument vector (program name excluded).
    pub args: Vec<String>,
    /// The rendition's own subdirectory.
    pub output_dir: PathBuf,
    /// Rendition playlist the encoder writes.
    pub playlist_path: PathBuf,
    /// Key-info descriptor the encoder reads, when encryption is on.
    pub key_info_path: Option<PathBuf>,
}

impl VariantJob {
    pub fn label(&self) -> &str {
        &self.rendition.label
    }
}

/// Inputs shared by every job of one conversion.
#[derive(Debug, Clone)]
pub struct JobLayout<'a> {
    pub input: &'a Path,
    pub run_dir: &'a Path,
    /// Rendition playlist file stem (`playlist` -> `playlist.m3u8`).
    pub playlist_stem: &'a str,
}

/// Build jobs without touching the filesystem.
pub fn plan_jobs(
    profile: &EncodeProfile,
    encryption: &EncryptionConfig,
    layout: &JobLayout<'_>,
) -> Vec<VariantJob> {
    profile
        .renditions
        .iter()
        .map(|rendition| plan_job(profile, rendition, encryption, layout))
        .collect()
}

/// Build jobs and create every rendition directory (idempotent).
///
/// Without encryption, key artifacts left by an earlier encrypted run into
/// the same directory are removed.
///
/// # Errors
///
/// [`hf_core::Error::Io`] if a directory cannot be created or a stale key
/// artifact cannot be removed.
pub fn build_jobs(
    profile: &EncodeProfile,
    encryption: &EncryptionConfig,
    layout: &JobLayout<'_>,
) -> hf_core::Result<Vec<VariantJob>> {
    let jobs = plan_jobs(profile, encryption, layout);
    for job in &jobs {
        std::fs::create_dir_all(&job.output_dir)?;
        if !encryption.enabled {
            remove_stale_keys(&job.output_dir)?;
        }
        tracing::debug!(
            rendition = %job.label(),
            dir = %job.output_dir.display(),
            "rendition directory ready"
        );
    }
    Ok(jobs)
}

fn remove_stale_keys(dir: &Path) -> hf_core::Result<()> {
    for name in [KEY_FILE, KEY_INFO_FILE] {
        match std::fs::remove_file(dir.join(name)) {
            Ok(()) => tracing::info!(path = %dir.join(name).display(), "removed stale key artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn plan_job(
    profile: &EncodeProfile,
    rendition: &RenditionSpec,
    encryption: &EncryptionConfig,
    layout: &JobLayout<'_>,
) -> VariantJob {
    let output_dir = layout.run_dir.join(&rendition.dir_name);
    let playlist_path = output_dir.join(format!("{}.m3u8", layout.playlist_stem));
    let key_info_path = encryption.enabled.then(|| output_dir.join(KEY_INFO_FILE));

    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path_arg(layout.input)];
    args.extend(video_args(profile.video_encoder, rendition));
    args.extend(audio_args(profile.audio_encoder, profile.audio_bitrate));
    args.extend([
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        profile.segment_duration.to_string(),
        "-hls_playlist_type".into(),
        profile.playlist_type.as_str().into(),
        "-hls_segment_filename".into(),
        path_arg(&output_dir.join(SEGMENT_PATTERN)),
    ]);
    if let Some(key_info) = &key_info_path {
        args.push("-hls_key_info_file".into());
        args.push(path_arg(key_info));
        if let Some(period) = encryption.rotation_period() {
            args.push("-hls_key_rotation_period".into());
            args.push(period.to_string());
        }
    }
    args.push(path_arg(&playlist_path));

    VariantJob {
        rendition: rendition.clone(),
        args,
        output_dir,
        playlist_path,
        key_info_path,
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
