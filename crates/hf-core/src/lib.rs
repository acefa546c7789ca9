//! hf-core: shared types, errors, configuration, and the event bus.
//!
//! This crate is the foundational dependency for all other hf-* crates. It
//! owns the media data model (probe results, host capabilities, encode
//! profiles), the single rendition lookup table, a unified error type,
//! application configuration, and a broadcast event bus for progress.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod profile;
pub mod rendition;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, JobFailure, JobFailureKind, Result};
pub use ids::*;
pub use media::*;
pub use profile::*;
