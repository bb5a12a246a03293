//! filedrop - constrained file drop storage
//!
//! Stores uploaded files under a name, each with optional access
//! constraints: an expiration time, a download limit, public visibility,
//! and deletion once the file becomes inaccessible.

pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use config::Config;
pub use error::{FiledropError, Result};
pub use store::{
    parse_downloads, parse_expire, validate_name, Constraints, DownloadLimit, Store,
};
