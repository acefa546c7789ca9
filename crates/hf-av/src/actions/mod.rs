//! Standalone ffmpeg actions that sit outside the rendition ladder.

mod thumbnail;

pub use thumbnail::{extract_thumbnail, THUMBNAIL_FILE};
