//! HLS master playlist generation.

use super::types::MasterPlaylist;
use std::fmt::{self, Write};

/// Protocol version declared in the master playlist.
const HLS_VERSION: u32 = 3;

/// Generate an HLS master playlist (M3U8) from a [`MasterPlaylist`].
///
/// Output is the `#EXTM3U` header, `#EXT-X-VERSION:3`, then one
/// `#EXT-X-STREAM-INF` line and URI per variant, in variant order.
/// `RESOLUTION` is emitted only for variants that carry one.
pub fn generate_master_playlist(playlist: &MasterPlaylist) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_master(&mut out, playlist);
    out
}

fn write_master(out: &mut String, playlist: &MasterPlaylist) -> fmt::Result {
    writeln!(out, "#EXTM3U")?;
    writeln!(out, "#EXT-X-VERSION:{HLS_VERSION}")?;

    for variant in &playlist.variants {
        write!(out, "#EXT-X-STREAM-INF:BANDWIDTH={}", variant.bandwidth)?;
        if let Some((w, h)) = variant.resolution {
            write!(out, ",RESOLUTION={w}x{h}")?;
        }
        writeln!(out)?;
        writeln!(out, "{}", variant.uri)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::types::Variant;

    #[test]
    fn master_playlist_two_renditions() {
        let playlist = MasterPlaylist {
            variants: vec![
                Variant {
                    bandwidth: 2_500_000,
                    resolution: Some((1280, 720)),
                    uri: "720p/playlist.m3u8".to_string(),
                },
                Variant {
                    bandwidth: 4_500_000,
                    resolution: Some((1920, 1080)),
                    uri: "1080p/playlist.m3u8".to_string(),
                },
            ],
        };

        let expected = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1280x720
720p/playlist.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=4500000,RESOLUTION=1920x1080
1080p/playlist.m3u8
";
        assert_eq!(generate_master_playlist(&playlist), expected);
    }

    #[test]
    fn original_rendition_has_no_resolution() {
        let playlist = MasterPlaylist {
            variants: vec![Variant {
                bandwidth: 2_000_000,
                resolution: None,
                uri: "raw/playlist.m3u8".to_string(),
            }],
        };

        let m3u8 = generate_master_playlist(&playlist);
        assert!(m3u8.contains("#EXT-X-STREAM-INF:BANDWIDTH=2000000\nraw/playlist.m3u8\n"));
        assert!(!m3u8.contains("RESOLUTION"));
    }

    #[test]
    fn empty_playlist_is_header_only() {
        assert_eq!(
            generate_master_playlist(&MasterPlaylist::default()),
            "#EXTM3U\n#EXT-X-VERSION:3\n"
        );
    }
}
