//! Shared test harness for integration tests.
//!
//! [`FakeTools`] writes stand-in `ffmpeg` and `ffprobe` shell scripts into a
//! temp directory. The fake ffmpeg writes a one-segment rendition playlist
//! (with an `#EXT-X-KEY` line when given a key-info file), prints a progress
//! line, appends its arguments to `calls.log`, and exits 1 for the
//! frame size it was told to fail.
#![cfg(unix)]
#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

const FFPROBE_JSON: &str = r#"{
  "streams": [
    {"codec_type": "video", "codec_name": "hevc", "width": 2560, "height": 1440,
     "avg_frame_rate": "24000/1001", "bit_rate": "12000000", "duration": "600.0"},
    {"codec_type": "audio", "codec_name": "ac3", "sample_rate": "48000",
     "channels": 6, "bit_rate": "384000"}
  ],
  "format": {"duration": "600.0"}
}"#;

pub struct FakeTools {
    pub dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub input: PathBuf,
}

impl FakeTools {
    /// Fake tools that succeed for every rendition.
    pub fn new() -> Self {
        Self::failing(None)
    }

    /// Fake tools whose ffmpeg exits 1 when asked to scale to `fail_size`.
    pub fn failing(fail_size: Option<&str>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");
        let input = dir.path().join("source.mkv");

        write_script(&ffmpeg, &ffmpeg_script(fail_size.unwrap_or("none")));
        write_script(
            &ffprobe,
            &format!(
                "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then echo 'ffprobe version 6.1-fake'; exit 0; fi\ncat <<'JSON'\n{FFPROBE_JSON}\nJSON\n"
            ),
        );
        fs::write(&input, b"not really video").unwrap();

        Self {
            dir,
            ffmpeg,
            ffprobe,
            input,
        }
    }

    /// Every argument line the fake ffmpeg received, in call order.
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    /// A JSON config pointing hlsforge at the fake tools.
    pub fn config_json(&self, output_root: &Path) -> String {
        serde_json::json!({
            "tools": {
                "ffmpeg_path": self.ffmpeg,
                "ffprobe_path": self.ffprobe,
            },
            "conversion": {
                "output_root": output_root,
            }
        })
        .to_string()
    }
}

fn write_script(path: &Path, body: &str) {
    fs::write(path, body).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

fn ffmpeg_script(fail_size: &str) -> String {
    format!(
        r##"#!/bin/sh
case "$1" in
  -version) echo "ffmpeg version 6.1-fake Copyright (c) 2000-2023"; exit 0 ;;
  -hide_banner) echo " V....D libx264              libx264 H.264"; exit 0 ;;
esac
echo "$*" >> "$(dirname "$0")/calls.log"
out=""
prev=""
keyinfo=""
for a in "$@"; do
  if [ "$prev" = "-s" ] && [ "$a" = "{fail_size}" ]; then
    echo "Input #0, matroska,webm, from 'source.mkv':" >&2
    echo "Error initializing output stream 0:0 -- simulated failure" >&2
    exit 1
  fi
  if [ "$prev" = "-hls_key_info_file" ]; then keyinfo="$a"; fi
  prev="$a"
  out="$a"
done
echo "frame=   25 fps=0.0 q=28.0 size=N/A time=00:00:01.00 bitrate=N/A speed=2.0x" >&2
case "$out" in
  *.m3u8)
    dir=$(dirname "$out")
    printf 'ts' > "$dir/segment_000.ts"
    {{
      echo "#EXTM3U"
      echo "#EXT-X-VERSION:3"
      echo "#EXT-X-TARGETDURATION:10"
      echo "#EXT-X-PLAYLIST-TYPE:VOD"
      if [ -n "$keyinfo" ]; then
        echo "#EXT-X-KEY:METHOD=AES-128,URI=\"$(head -n 1 "$keyinfo")\""
      fi
      echo "#EXTINF:10.0,"
      echo "segment_000.ts"
      echo "#EXT-X-ENDLIST"
    }} > "$out"
    ;;
  *)
    printf 'jpg' > "$out"
    ;;
esac
exit 0
"##
    )
}
