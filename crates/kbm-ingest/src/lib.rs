//! KBM Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Migrates CMS JSON exports into a knowledge base.
//!
//! # Passes
//!
//! - **Validate**: count objects, published records and unexported paths
//!   ([`validator`])
//! - **Upload**: stream, normalize and write every published record, with
//!   resume and cap support ([`upload`])
//! - **Reconcile**: delete remote copies of unpublished records
//!   ([`reconcile`])
//! - **Lookup**: write a single record picked by `@id` or UID ([`lookup`])
//! - **Relabel**: rename the legacy language-service labelset ([`relabel`])
//!
//! # Example
//!
//! ```no_run
//! use kbm_ingest::config::{EndpointConfig, RunConfig, TargetRegistry};
//! use kbm_ingest::remote::NucliaClient;
//! use kbm_ingest::upload::UploadDriver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let target = TargetRegistry::from_env().resolve("vietnamese")?;
//!     let config = RunConfig::builder("export.json", target).build()?;
//!     let client = NucliaClient::new(&EndpointConfig::from_env())?;
//!     let report = UploadDriver::new(&config, &client).run().await?;
//!     println!("resume from {}", report.last_count);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod lookup;
pub mod normalizer;
pub mod pacing;
pub mod progress;
pub mod reconcile;
pub mod relabel;
pub mod remote;
pub mod stream;
pub mod upload;
pub mod validator;

pub use cli::{Cli, Command};
