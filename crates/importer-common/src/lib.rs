//! Importer Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the bulk-import workspace.
//!
//! # Overview
//!
//! This crate is depended on by the worker and by anything that enqueues
//! import jobs:
//!
//! - **Types**: The `ImportJob` and `MailJob` queue message schemas
//! - **Checksums**: Integrity-tag normalization and verification
//! - **Error Handling**: Common error and result types
//! - **Logging**: Tracing subscriber setup from `LOG_*` variables
//!
//! # Example
//!
//! ```no_run
//! use importer_common::checksum::verify_integrity_tag;
//! use importer_common::Result;
//!
//! fn check(declared: &str, etag: Option<&str>) -> Result<()> {
//!     verify_integrity_tag(declared, etag)?;
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{FileInfo, ImportCategory, ImportJob, MailJob};
