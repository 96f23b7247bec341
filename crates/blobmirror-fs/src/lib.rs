//! Filesystem layer for blobmirror
//!
//! Everything that touches the destination tree goes through this crate:
//! per-attempt staging directories, atomic publish by same-volume rename,
//! locked appends for shared logs, and format-agnostic config loading.

pub mod config;
pub mod error;
pub mod io;
pub mod layout;
pub mod staging;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use layout::DirectoryLayout;
pub use staging::{StagingArea, StagingSlot};
