//! # hf-av
//!
//! External tool plumbing for the hlsforge pipeline.
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find and cache paths to ffmpeg
//!   and ffprobe.
//! - **Command execution** ([`ToolCommand`]) -- async builder with timeout,
//!   streamed stderr lines and cancellation.
//! - **Probing** ([`Prober`], [`FfprobeProber`]) -- source inspection.
//! - **Capabilities** ([`detect_capabilities`]) -- hardware encoder, CPU and
//!   OS detection, cached for the process lifetime.
//! - **Encoder families** ([`encoder`]) -- per-family ffmpeg arguments.
//! - **Actions** ([`actions`]) -- thumbnail extraction.

pub mod actions;
pub mod capabilities;
pub mod command;
pub mod encoder;
pub mod probe;
pub mod tools;

pub use actions::{extract_thumbnail, THUMBNAIL_FILE};
pub use capabilities::{detect_capabilities, detect_capabilities_async, probe_host};
pub use command::{StreamExit, ToolCommand, ToolOutput};
pub use probe::{FfprobeProber, Prober};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry, FFMPEG, FFPROBE};
