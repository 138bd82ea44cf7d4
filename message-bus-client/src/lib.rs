//! Message Bus Client Library
//!
//! Provides a unified interface for publishing and consuming transcode jobs
//! on the message bus (NATS JetStream).

pub mod nats;
pub mod error;
pub mod traits;

pub use error::*;
pub use traits::*;
pub use nats::*;
