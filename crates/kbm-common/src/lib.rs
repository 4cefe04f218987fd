//! KBM Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the knowledge-base
//! migration tools.
//!
//! - **Error Handling**: [`KbmError`] for fatal run errors, [`RemoteError`]
//!   and [`ErrorKind`] for per-record remote failures
//! - **Records**: the CMS export shape ([`RawRecord`]) and its normalized
//!   form ([`CanonicalRecord`])
//! - **Logging**: `tracing` subscriber setup shared by every binary

pub mod error;
pub mod logging;
pub mod record;

// Re-export commonly used types
pub use error::{ErrorKind, KbmError, RemoteError, Result};
pub use record::{
    CanonicalRecord, ImageRef, Language, MalformedRecord, RawRecord, RecordRef, TextBody,
};
