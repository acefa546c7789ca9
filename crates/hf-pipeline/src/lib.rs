//! hf-pipeline: from a probed source to a playable HLS ladder.
//!
//! [`recommend`] turns a probe and the host's capabilities into an
//! [`hf_core::EncodeProfile`], [`jobs`] expands the profile into encoder
//! invocations, [`orchestrator`] runs them, and [`manifest`] writes the master
//! playlist over whatever succeeded. [`conversion::Conversion`] drives the
//! whole sequence for one input.

pub mod catalog;
pub mod conversion;
pub mod encryption;
pub mod jobs;
pub mod manifest;
pub mod orchestrator;
pub mod recommend;

pub use catalog::{list_conversions, ConversionEntry, RenditionEntry};
pub use conversion::{
    default_run_dir, Conversion, ConversionOutcome, ConversionPlan, ConversionReport,
    ConversionRequest,
};
pub use encryption::{EncryptionManager, KEY_FILE, KEY_INFO_FILE};
pub use jobs::{build_jobs, plan_jobs, JobLayout, VariantJob};
pub use manifest::{assemble_master, build_master};
pub use orchestrator::{FfmpegRunner, JobRunner, JobState, Orchestrator, RenditionResult};
pub use recommend::{recommend, ProfileOverrides};
