//! Transcoder Types
//!
//! Shared type definitions for transcode jobs, callback payloads and job
//! results used across the transcoder services.

pub mod job;
pub mod schemas;
pub mod error;

pub use job::*;
pub use schemas::*;
pub use error::*;
