//! Master manifest assembly over the renditions that succeeded.

use std::path::{Path, PathBuf};

use hf_core::Error;
use hf_media::{generate_master_playlist, MasterPlaylist, Variant, MASTER_PLAYLIST_FILE};

use crate::orchestrator::RenditionResult;

/// Build the master playlist model from job results.
///
/// Only successful renditions are listed, in result order. Each URI is the
/// rendition playlist relative to the run directory (`720p/playlist.m3u8`).
pub fn build_master(results: &[RenditionResult]) -> MasterPlaylist {
    let variants = results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| {
            let playlist = r.playlist.as_deref()?;
            let file_name = playlist.file_name()?.to_string_lossy();
            Some(Variant {
                bandwidth: r.rendition.bandwidth,
                resolution: r.rendition.dimensions,
                uri: format!("{}/{}", r.rendition.dir_name, file_name),
            })
        })
        .collect();
    MasterPlaylist { variants }
}

/// Write `master.m3u8` into `run_dir`.
///
/// The file is written to a temporary name and renamed into place, so a
/// reader never sees a partial manifest. When nothing succeeded, any stale
/// manifest from an earlier attempt is removed.
///
/// # Errors
///
/// [`Error::NoRenditionsSucceeded`] when no rendition succeeded;
/// [`Error::Io`] if the file cannot be written.
pub fn assemble_master(results: &[RenditionResult], run_dir: &Path) -> hf_core::Result<PathBuf> {
    let path = run_dir.join(MASTER_PLAYLIST_FILE);
    let master = build_master(results);

    if master.variants.is_empty() {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        tracing::warn!(
            attempted = results.len(),
            run_dir = %run_dir.display(),
            "no rendition succeeded, master manifest not written"
        );
        return Err(Error::NoRenditionsSucceeded {
            attempted: results.len(),
        });
    }

    let tmp = run_dir.join(format!("{MASTER_PLAYLIST_FILE}.tmp"));
    std::fs::write(&tmp, generate_master_playlist(&master))?;
    std::fs::rename(&tmp, &path)?;

    tracing::info!(
        path = %path.display(),
        variants = master.variants.len(),
        omitted = results.len() - master.variants.len(),
        "master manifest written"
    );
    Ok(path)
}
