//! First-frame thumbnail extraction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFMPEG};

/// File name of the run thumbnail.
pub const THUMBNAIL_FILE: &str = "thumbnail.jpg";

/// Thumbnail frame size; the source is letterboxed to fit.
const WIDTH: u32 = 280;
const HEIGHT: u32 = 158;

/// Thumbnails are a single frame; anything slower is stuck.
const TIMEOUT: Duration = Duration::from_secs(120);

fn thumbnail_filter() -> String {
    format!(
        "select=eq(n\\,0),scale={WIDTH}:{HEIGHT}:force_original_aspect_ratio=decrease,\
         pad={WIDTH}:{HEIGHT}:(ow-iw)/2:(oh-ih)/2"
    )
}

/// Extract the first frame of `input` as `<output_dir>/thumbnail.jpg`.
pub async fn extract_thumbnail(
    tools: &ToolRegistry,
    input: &Path,
    output_dir: &Path,
) -> hf_core::Result<PathBuf> {
    let ffmpeg = tools.require(FFMPEG)?;
    let output = output_dir.join(THUMBNAIL_FILE);

    tracing::debug!(input = %input.display(), output = %output.display(), "extracting thumbnail");

    let mut cmd = ToolCommand::new(ffmpeg.path.clone());
    cmd.timeout(TIMEOUT.min(ffmpeg.timeout));
    cmd.args(["-y", "-i"]);
    cmd.arg(input.to_string_lossy().as_ref());
    cmd.arg("-vf");
    cmd.arg(thumbnail_filter());
    cmd.args(["-vframes", "1", "-q:v", "2"]);
    cmd.arg(output.to_string_lossy().as_ref());
    cmd.execute().await?;

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_letterboxes_first_frame() {
        assert_eq!(
            thumbnail_filter(),
            "select=eq(n\\,0),scale=280:158:force_original_aspect_ratio=decrease,pad=280:158:(ow-iw)/2:(oh-ih)/2"
        );
    }

    #[tokio::test]
    async fn missing_ffmpeg_is_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_thumbnail(&ToolRegistry::default(), Path::new("in.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, hf_core::Error::Tool { .. }));
    }
}
