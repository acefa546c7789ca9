//! Media probing.
//!
//! [`Prober`] is the seam the pipeline plans against; [`FfprobeProber`] is the
//! production backend that shells out to the `ffprobe` CLI.

use std::path::Path;

use async_trait::async_trait;
use hf_core::SourceProbe;

pub mod ffprobe;

pub use self::ffprobe::FfprobeProber;

/// Extracts structural metadata from a source file.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Inspect the file at `path`.
    ///
    /// Fails with [`hf_core::Error::Probe`] when the file is missing, the
    /// inspection process fails, or its output cannot be parsed.
    async fn probe(&self, path: &Path) -> hf_core::Result<SourceProbe>;
}
