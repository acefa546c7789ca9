//! hf-media: HLS text formats.
//!
//! # Modules
//!
//! - [`hls`] - master playlist model, writer and parser; rendition playlist
//!   summary parser
//! - [`keyinfo`] - the key-info descriptor ffmpeg reads for AES-128 segments

pub mod hls;
pub mod keyinfo;

pub use hls::{
    generate_master_playlist, parse_master_playlist, parse_media_playlist, MasterPlaylist,
    MediaPlaylistSummary, Variant, MASTER_PLAYLIST_FILE,
};
pub use keyinfo::KeyInfo;
