//! HLS playlist types.

use serde::{Deserialize, Serialize};

/// A stream variant in a master playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Advertised bandwidth in bits per second.
    pub bandwidth: u64,
    /// Optional resolution as (width, height).
    pub resolution: Option<(u32, u32)>,
    /// URI of the rendition playlist, relative to the master playlist.
    pub uri: String,
}

/// An HLS master playlist. Variants are written in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterPlaylist {
    pub variants: Vec<Variant>,
}

/// What a rendition playlist written by the encoder contains.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaPlaylistSummary {
    pub target_duration: Option<u32>,
    /// `VOD` or `EVENT`, when declared.
    pub playlist_type: Option<String>,
    /// Segment URIs in order.
    pub segments: Vec<String>,
    /// Total of the `#EXTINF` durations, in seconds.
    pub total_duration: f64,
    /// Key URIs from `#EXT-X-KEY` tags, one per key change.
    pub key_uris: Vec<String>,
    /// Whether `#EXT-X-ENDLIST` was present.
    pub ended: bool,
}

impl MediaPlaylistSummary {
    pub fn is_encrypted(&self) -> bool {
        !self.key_uris.is_empty()
    }
}
