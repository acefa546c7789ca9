//! The rendition lookup table.
//!
//! This is the only place that knows how a rendition label maps to its output
//! directory, frame size, default bitrate and advertised bandwidth. Planning,
//! job building, manifest assembly and output listing all read from here.
//!
//! Advertised bandwidth comes from this fixed table, not from the encoded
//! output, so a rendition whose bitrate was overridden still advertises the
//! table value.

use crate::media::Kbps;

/// Label of the rendition that keeps the source frame size.
pub const ORIGINAL_LABEL: &str = "original";

/// One row of the rendition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenditionInfo {
    /// Canonical label (`1920x1080`, or `original`).
    pub label: &'static str,
    /// Output subdirectory name under the run directory.
    pub dir_name: &'static str,
    /// Target frame size; `None` keeps the source size.
    pub dimensions: Option<(u32, u32)>,
    /// Recommended video bitrate; `None` means "use the source bitrate".
    pub default_bitrate: Option<Kbps>,
    /// Bits per second advertised in the master manifest.
    pub bandwidth: u64,
}

impl RenditionInfo {
    pub fn is_original(&self) -> bool {
        self.dimensions.is_none()
    }
}

/// All known renditions, largest first. The last row is the fallback.
pub const RENDITIONS: &[RenditionInfo] = &[
    RenditionInfo {
        label: "3840x2160",
        dir_name: "4k",
        dimensions: Some((3840, 2160)),
        default_bitrate: Some(Kbps(15000)),
        bandwidth: 15_000_000,
    },
    RenditionInfo {
        label: "2560x1440",
        dir_name: "2k",
        dimensions: Some((2560, 1440)),
        default_bitrate: Some(Kbps(9000)),
        bandwidth: 9_000_000,
    },
    RenditionInfo {
        label: "1920x1080",
        dir_name: "1080p",
        dimensions: Some((1920, 1080)),
        default_bitrate: Some(Kbps(4500)),
        bandwidth: 4_500_000,
    },
    RenditionInfo {
        label: "1280x720",
        dir_name: "720p",
        dimensions: Some((1280, 720)),
        default_bitrate: Some(Kbps(2500)),
        bandwidth: 2_500_000,
    },
    RenditionInfo {
        label: "854x480",
        dir_name: "480p",
        dimensions: Some((854, 480)),
        default_bitrate: Some(Kbps(1000)),
        bandwidth: 1_000_000,
    },
    RenditionInfo {
        label: "640x360",
        dir_name: "360p",
        dimensions: Some((640, 360)),
        default_bitrate: Some(Kbps(500)),
        bandwidth: 500_000,
    },
    RenditionInfo {
        label: ORIGINAL_LABEL,
        dir_name: "raw",
        dimensions: None,
        default_bitrate: None,
        bandwidth: 2_000_000,
    },
];

/// The `original` row.
pub fn original() -> &'static RenditionInfo {
    &RENDITIONS[RENDITIONS.len() - 1]
}

/// Look up a label. Unknown labels fall back to the `original` row.
pub fn lookup(label: &str) -> &'static RenditionInfo {
    find(label).unwrap_or_else(original)
}

/// Strict lookup by canonical label or directory alias (`1080p`, `4k`, `raw`).
pub fn find(label: &str) -> Option<&'static RenditionInfo> {
    let label = label.trim();
    RENDITIONS.iter().find(|r| {
        r.label.eq_ignore_ascii_case(label) || r.dir_name.eq_ignore_ascii_case(label)
    })
}

/// Look up a row by its output directory name.
pub fn by_dir_name(dir: &str) -> Option<&'static RenditionInfo> {
    RENDITIONS.iter().find(|r| r.dir_name == dir)
}

/// Sort key for listing: table order (largest first, `raw` last).
pub fn display_rank(dir: &str) -> usize {
    RENDITIONS
        .iter()
        .position(|r| r.dir_name == dir)
        .unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_labels() {
        let r = lookup("1920x1080");
        assert_eq!(r.dir_name, "1080p");
        assert_eq!(r.bandwidth, 4_500_000);
        assert_eq!(r.dimensions, Some((1920, 1080)));
        assert_eq!(lookup("3840x2160").dir_name, "4k");
        assert_eq!(lookup("2560x1440").dir_name, "2k");
    }

    #[test]
    fn unknown_label_falls_back_to_raw() {
        let r = lookup("1024x576");
        assert_eq!(r.dir_name, "raw");
        assert_eq!(r.bandwidth, 2_000_000);
        assert!(r.is_original());
        assert!(find("1024x576").is_none());
    }

    #[test]
    fn aliases_resolve_to_same_row() {
        assert_eq!(find("720p"), find("1280x720"));
        assert_eq!(find("4K").map(|r| r.label), Some("3840x2160"));
        assert_eq!(find("raw").map(|r| r.label), Some(ORIGINAL_LABEL));
    }

    #[test]
    fn directory_names_are_unique() {
        let mut dirs: Vec<_> = RENDITIONS.iter().map(|r| r.dir_name).collect();
        dirs.sort_unstable();
        dirs.dedup();
        assert_eq!(dirs.len(), RENDITIONS.len());
    }

    #[test]
    fn display_rank_orders_raw_last() {
        assert!(display_rank("4k") < display_rank("1080p"));
        assert!(display_rank("360p") < display_rank("raw"));
        assert_eq!(display_rank("thumbnails"), usize::MAX);
    }
}
