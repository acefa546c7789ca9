//! Reading HLS playlists back from disk.
//!
//! Only the tags this crate writes, plus the ones ffmpeg's HLS muxer emits,
//! are understood. Unknown tags are skipped.

use hf_core::{Error, Result};

use super::types::{MasterPlaylist, MediaPlaylistSummary, Variant};

/// Parse a master playlist.
///
/// # Errors
///
/// [`Error::Validation`] if the `#EXTM3U` header is missing or a
/// `#EXT-X-STREAM-INF` line has no usable `BANDWIDTH` or no following URI.
pub fn parse_master_playlist(text: &str) -> Result<MasterPlaylist> {
    let mut lines = playlist_lines(text)?;
    let mut variants = Vec::new();

    while let Some(line) = lines.next() {
        let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };

        let mut bandwidth = None;
        let mut resolution = None;
        for (key, value) in split_attributes(attrs) {
            match key {
                "BANDWIDTH" => bandwidth = value.parse::<u64>().ok(),
                "RESOLUTION" => resolution = parse_resolution(value),
                _ => {}
            }
        }

        let bandwidth = bandwidth.ok_or_else(|| {
            Error::Validation(format!("stream entry without BANDWIDTH: {line}"))
        })?;
        let uri = lines
            .by_ref()
            .find(|l| !l.starts_with('#'))
            .ok_or_else(|| Error::Validation(format!("stream entry without URI: {line}")))?;

        variants.push(Variant {
            bandwidth,
            resolution,
            uri: uri.to_string(),
        });
    }

    Ok(MasterPlaylist { variants })
}

/// Summarize a rendition (media) playlist.
///
/// # Errors
///
/// [`Error::Validation`] if the `#EXTM3U` header is missing.
pub fn parse_media_playlist(text: &str) -> Result<MediaPlaylistSummary> {
    let mut summary = MediaPlaylistSummary::default();

    for line in playlist_lines(text)? {
        if let Some(v) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            summary.target_duration = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("#EXT-X-PLAYLIST-TYPE:") {
            summary.playlist_type = Some(v.trim().to_string());
        } else if let Some(v) = line.strip_prefix("#EXTINF:") {
            let secs = v.split(',').next().unwrap_or_default();
            summary.total_duration += secs.trim().parse::<f64>().unwrap_or(0.0);
        } else if let Some(attrs) = line.strip_prefix("#EXT-X-KEY:") {
            if let Some((_, uri)) = split_attributes(attrs).find(|(k, _)| *k == "URI") {
                summary.key_uris.push(uri.to_string());
            }
        } else if line == "#EXT-X-ENDLIST" {
            summary.ended = true;
        } else if !line.starts_with('#') {
            summary.segments.push(line.to_string());
        }
    }

    Ok(summary)
}

/// Non-empty trimmed lines after a verified `#EXTM3U` header.
fn playlist_lines(text: &str) -> Result<impl Iterator<Item = &str>> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    match lines.next() {
        Some("#EXTM3U") => Ok(lines),
        _ => Err(Error::Validation("playlist does not start with #EXTM3U".into())),
    }
}

/// Split `KEY=value,KEY="quoted,value"` attribute lists.
fn split_attributes(attrs: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in attrs.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&attrs[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&attrs[start..]);

    parts.into_iter().filter_map(|part| {
        let (key, value) = part.split_once('=')?;
        Some((key.trim(), value.trim().trim_matches('"')))
    })
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::generate_master_playlist;

    #[test]
    fn parse_written_master() {
        let playlist = MasterPlaylist {
            variants: vec![
                Variant {
                    bandwidth: 2_500_000,
                    resolution: Some((1280, 720)),
                    uri: "720p/playlist.m3u8".into(),
                },
                Variant {
                    bandwidth: 2_000_000,
                    resolution: None,
                    uri: "raw/playlist.m3u8".into(),
                },
            ],
        };
        let parsed = parse_master_playlist(&generate_master_playlist(&playlist)).unwrap();
        assert_eq!(parsed, playlist);
    }

    #[test]
    fn master_with_quoted_codecs() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000,CODECS=\"avc1.4d401f,mp4a.40.2\",RESOLUTION=640x360\nlow.m3u8\n";
        let parsed = parse_master_playlist(text).unwrap();
        assert_eq!(parsed.variants[0].resolution, Some((640, 360)));
        assert_eq!(parsed.variants[0].uri, "low.m3u8");
    }

    #[test]
    fn master_without_header_is_rejected() {
        assert!(parse_master_playlist("#EXT-X-VERSION:3\n").is_err());
    }

    #[test]
    fn master_entry_without_uri_is_rejected() {
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n";
        assert!(parse_master_playlist(text).is_err());
    }

    #[test]
    fn media_playlist_summary() {
        let text = "\
#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXT-X-PLAYLIST-TYPE:VOD
#EXT-X-KEY:METHOD=AES-128,URI=\"enc.key\",IV=0x00000000000000000000000000000000
#EXTINF:10.000000,
segment_000.ts
#EXTINF:10.000000,
segment_001.ts
#EXT-X-KEY:METHOD=AES-128,URI=\"enc.key\",IV=0x00000000000000000000000000000001
#EXTINF:4.500000,
segment_002.ts
#EXT-X-ENDLIST
";
        let s = parse_media_playlist(text).unwrap();
        assert_eq!(s.target_duration, Some(10));
        assert_eq!(s.playlist_type.as_deref(), Some("VOD"));
        assert_eq!(s.segments, ["segment_000.ts", "segment_001.ts", "segment_002.ts"]);
        assert!((s.total_duration - 24.5).abs() < 1e-9);
        assert_eq!(s.key_uris.len(), 2);
        assert!(s.is_encrypted());
        assert!(s.ended);
    }
}
