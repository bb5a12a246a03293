//! Constrained file store for filedrop.
//!
//! This module provides the storage core:
//! - Per-file access constraints (expiration, download limit, visibility)
//! - A cached, sorted listing of public files
//! - Expiration timers that reclaim files once they become inaccessible

pub mod constraints;
mod directory;
mod listing;
mod scheduler;

pub use constraints::{parse_downloads, parse_expire, Constraints, DownloadLimit, EXPIRE_FORMAT};
pub use directory::Store;

use crate::{FiledropError, Result};

/// Check that a name refers to a single entry inside the store directory.
///
/// Rejects empty names, `.` and `..`, and names containing a path separator
/// or a NUL byte.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(FiledropError::InvalidName(name.to_string()));
    }
    Ok(())
}
