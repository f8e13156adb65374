//! Importer Worker Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Queue worker that turns uploaded spreadsheets into domain records.
//!
//! # Overview
//!
//! - **config**: Environment-driven worker configuration
//! - **storage**: Object store gateway (S3) with bounded retries
//! - **integrity**: Declared checksum vs storage integrity tag
//! - **decode**: CSV / xls / xlsx to header-keyed rows
//! - **strategy**: Per-category import strategies and their registry
//! - **members**: Tenant member directory and store
//! - **audit**: Member audit trail
//! - **notify**: Result notifications onto the mailer queue
//! - **tasker**: Job lifecycle, the importer tasker and the apalis scheduler

pub mod audit;
pub mod config;
pub mod decode;
pub mod error;
pub mod integrity;
pub mod members;
pub mod notify;
pub mod outcome;
pub mod storage;
pub mod strategy;
pub mod tasker;

pub use error::{FileError, JobError, JobStage};
pub use outcome::{FileOutcome, OutcomeMap};
pub use tasker::{execute, AckPolicy, ImporterTasker, Tasker};
