//! Listing of prior conversion runs under an output root.

use std::path::{Path, PathBuf};

use hf_av::THUMBNAIL_FILE;
use hf_core::rendition;
use hf_media::{parse_master_playlist, parse_media_playlist, MASTER_PLAYLIST_FILE};
use serde::Serialize;

/// One rendition directory inside a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenditionEntry {
    /// Directory name (`1080p`, `raw`, ...).
    pub dir_name: String,
    /// Table label for the directory.
    pub label: String,
    /// The rendition playlist, if one was written.
    pub playlist: Option<PathBuf>,
    pub segments: usize,
    /// Total media duration in seconds according to the playlist.
    pub duration_secs: f64,
    pub encrypted: bool,
}

/// One run directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionEntry {
    pub name: String,
    pub path: PathBuf,
    pub has_master: bool,
    /// Variants listed in the master manifest, when it parses.
    pub master_variants: Option<usize>,
    /// Rendition directories present, largest first with `raw` last.
    pub renditions: Vec<RenditionEntry>,
    pub has_thumbnail: bool,
}

/// Enumerate run directories under `root`, newest name first.
///
/// A missing root is an empty catalog. A run directory that cannot be read
/// is logged and left out.
///
/// # Errors
///
/// [`hf_core::Error::Io`] if `root` exists but cannot be read.
pub fn list_conversions(root: &Path) -> hf_core::Result<Vec<ConversionEntry>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match describe_run(&path) {
            Ok(run) => entries.push(run),
            Err(e) => {
                tracing::warn!(run = %path.display(), error = %e, "skipping unreadable run directory");
            }
        }
    }
    entries.sort_by(|a, b| b.name.cmp(&a.name));
    Ok(entries)
}

fn describe_run(path: &Path) -> hf_core::Result<ConversionEntry> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let master_path = path.join(MASTER_PLAYLIST_FILE);
    let has_master = master_path.is_file();
    let master_variants = if has_master {
        std::fs::read_to_string(&master_path)
            .ok()
            .and_then(|text| parse_master_playlist(&text).ok())
            .map(|m| m.variants.len())
    } else {
        None
    };

    let mut renditions = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(dir_name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(info) = rendition::by_dir_name(&dir_name) else {
            continue;
        };
        renditions.push(describe_rendition(&dir, dir_name, info.label)?);
    }
    renditions.sort_by_key(|r| rendition::display_rank(&r.dir_name));

    Ok(ConversionEntry {
        name,
        path: path.to_path_buf(),
        has_master,
        master_variants,
        renditions,
        has_thumbnail: path.join(THUMBNAIL_FILE).is_file(),
    })
}

fn describe_rendition(dir: &Path, dir_name: String, label: &str) -> hf_core::Result<RenditionEntry> {
    let mut playlists: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "m3u8"))
        .collect();
    playlists.sort();
    let playlist = playlists.into_iter().next();

    let summary = playlist.as_deref().and_then(|p| {
        let text = std::fs::read_to_string(p).ok()?;
        match parse_media_playlist(&text) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::debug!(playlist = %p.display(), error = %e, "unreadable rendition playlist");
                None
            }
        }
    });

    Ok(RenditionEntry {
        dir_name,
        label: label.to_string(),
        playlist,
        segments: summary.as_ref().map_or(0, |s| s.segments.len()),
        duration_secs: summary.as_ref().map_or(0.0, |s| s.total_duration),
        encrypted: summary.as_ref().is_some_and(|s| s.is_encrypted()),
    })
}
