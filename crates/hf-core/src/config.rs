//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::profile::EncryptionConfig;
use crate::Error;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub conversion: ConversionConfig,
    pub encryption: EncryptionConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("ffmpeg_path", &self.tools.ffmpeg_path),
            ("ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "tools.{name} '{}' does not exist; PATH lookup will be used",
                        p.display()
                    ));
                }
            }
        }

        if self.tools.probe_timeout_secs == 0 {
            warnings.push("tools.probe_timeout_secs is 0; probes will time out immediately".into());
        }
        if self.tools.encode_timeout_secs == 0 {
            warnings.push("tools.encode_timeout_secs is 0; encodes will time out immediately".into());
        }

        if self.conversion.max_parallel_jobs == 0 {
            warnings.push("conversion.max_parallel_jobs is 0; treating as 1".into());
        }
        if self.conversion.playlist_name.trim().is_empty()
            || self.conversion.playlist_name.contains(&['/', '\\'][..])
        {
            warnings.push(format!(
                "conversion.playlist_name '{}' is not a plain file stem; using 'playlist'",
                self.conversion.playlist_name
            ));
        }

        if !self.encryption.enabled {
            if self.encryption.key_rotation_period > 0 {
                warnings.push(
                    "encryption.key_rotation_period is set but encryption is disabled; ignored"
                        .into(),
                );
            }
            if self.encryption.key_uri_prefix.is_some() {
                warnings.push(
                    "encryption.key_uri_prefix is set but encryption is disabled; ignored".into(),
                );
            }
        }

        warnings
    }
}

/// Paths and limits for the external tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub probe_timeout_secs: u64,
    pub encode_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            probe_timeout_secs: 60,
            encode_timeout_secs: 86_400,
        }
    }
}

impl ToolsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }
}

/// Conversion run defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Parent directory for run directories.
    pub output_root: PathBuf,
    /// File stem of each rendition playlist.
    pub playlist_name: String,
    /// Renditions encoded at once. `1` is strictly sequential.
    pub max_parallel_jobs: usize,
    pub generate_thumbnail: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output"),
            playlist_name: "playlist".into(),
            max_parallel_jobs: 1,
            generate_thumbnail: true,
        }
    }
}

impl ConversionConfig {
    /// `max_parallel_jobs` clamped to at least one.
    pub fn parallelism(&self) -> usize {
        self.max_parallel_jobs.max(1)
    }

    /// The playlist file stem, falling back to `playlist` when unusable.
    pub fn playlist_stem(&self) -> &str {
        let name = self.playlist_name.trim();
        if name.is_empty() || name.contains(&['/', '\\'][..]) {
            "playlist"
        } else {
            name
        }
    }
}
