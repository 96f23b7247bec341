//! Shared test utilities for the blobmirror workspace.
//!
//! This crate provides standardised fixtures so crate test suites do not
//! each reinvent a bucket or a mirror tree. It is a dev-dependency only.
//!
//! # Modules
//!
//! - [`bucket`]: [`FakeBucket`], a directory standing in for a remote bucket
//! - [`mirror`]: [`TestMirror`], a temporary base/backup tree with a layout
//! - [`gsutil`]: a fake `gsutil` script serving a [`FakeBucket`] (Unix only)

pub mod bucket;
#[cfg(unix)]
pub mod gsutil;
pub mod mirror;

pub use bucket::{FakeBucket, gzip};
pub use mirror::TestMirror;
