//! HLS playlist handling.
//!
//! The rendition playlists are written by the encoder; this module only
//! writes the master playlist that ties them together, and reads both kinds
//! back for listing prior runs.

mod generator;
mod parser;
mod types;

pub use generator::generate_master_playlist;
pub use parser::{parse_master_playlist, parse_media_playlist};
pub use types::{MasterPlaylist, MediaPlaylistSummary, Variant};

/// File name of the master playlist inside a run directory.
pub const MASTER_PLAYLIST_FILE: &str = "master.m3u8";
