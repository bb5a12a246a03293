//! Access constraints attached to stored files.
//!
//! [`Constraints`] is what an uploader asks for. Once a file is added the
//! store turns it into a `ConstraintRecord`, which keeps the immutable part
//! of the policy next to the download counter and its own lock.

use std::num::NonZeroU32;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;

use crate::{FiledropError, Result};

/// Format of expiration times entered by uploaders, in local time.
pub const EXPIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// State of a file's download counter.
///
/// The counter only moves forward:
/// `Remaining(n)` → `Remaining(n - 1)` → … → `Remaining(1)` → `Exhausted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownloadLimit {
    /// The file may be served any number of times.
    #[default]
    Unlimited,
    /// The file may be served this many more times.
    Remaining(NonZeroU32),
    /// The last permitted download was served; the file is pending removal.
    Exhausted,
}

impl DownloadLimit {
    /// Build a limit from a download count, where 0 means unlimited.
    pub fn from_count(count: u32) -> Self {
        NonZeroU32::new(count).map_or(DownloadLimit::Unlimited, DownloadLimit::Remaining)
    }

    /// State after one more download, or `None` if no download is permitted.
    pub fn after_download(self) -> Option<Self> {
        match self {
            DownloadLimit::Unlimited => Some(DownloadLimit::Unlimited),
            DownloadLimit::Remaining(n) => Some(
                NonZeroU32::new(n.get() - 1)
                    .map_or(DownloadLimit::Exhausted, DownloadLimit::Remaining),
            ),
            DownloadLimit::Exhausted => None,
        }
    }

    /// Check if the counter reached its terminal state.
    pub fn is_exhausted(self) -> bool {
        self == DownloadLimit::Exhausted
    }
}

/// Constraints for the use of an uploaded file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Constraints {
    /// Instant after which the file is inaccessible. `None` never expires.
    pub expire: Option<DateTime<Utc>>,
    /// How many times the file can be served.
    pub downloads: DownloadLimit,
    /// Whether the file appears in the public listing.
    pub public: bool,
    /// Whether the file is deleted from disk when it becomes inaccessible.
    pub delete: bool,
}

impl Constraints {
    /// Create unconstrained, private constraints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expiration time.
    pub fn with_expire(mut self, expire: DateTime<Utc>) -> Self {
        self.expire = Some(expire);
        self
    }

    /// Set the number of permitted downloads (0 = unlimited).
    pub fn with_downloads(mut self, count: u32) -> Self {
        self.downloads = DownloadLimit::from_count(count);
        self
    }

    /// Set whether the file is listed publicly.
    pub fn with_public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Set whether the file is deleted from disk once inaccessible.
    pub fn with_delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }
}

/// Parse an expiration time as entered in the upload form.
///
/// The value is interpreted in the local time zone.
pub fn parse_expire(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), EXPIRE_FORMAT)
        .map_err(|e| FiledropError::InvalidConstraint(format!("expiration {value:?}: {e}")))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| {
            FiledropError::InvalidConstraint(format!("expiration {value:?} does not exist locally"))
        })?;
    Ok(local.with_timezone(&Utc))
}

/// Parse a download count as entered in the upload form.
///
/// An empty value means unlimited; otherwise the count must be positive.
pub fn parse_downloads(value: &str) -> Result<DownloadLimit> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(DownloadLimit::Unlimited);
    }
    let count: i64 = value
        .parse()
        .map_err(|e| FiledropError::InvalidConstraint(format!("downloads {value:?}: {e}")))?;
    if count < 1 {
        return Err(FiledropError::InvalidConstraint(
            "number of downloads should be positive".to_string(),
        ));
    }
    let count = u32::try_from(count)
        .map_err(|_| FiledropError::InvalidConstraint(format!("downloads {value:?} too large")))?;
    Ok(DownloadLimit::from_count(count))
}

/// Per-file policy as tracked by the store.
///
/// Shared through an `Arc` so the counter lock lives at one stable place.
/// Only the counter is mutable; it has its own lock so serving one file
/// never blocks operations on others.
#[derive(Debug)]
pub(crate) struct ConstraintRecord {
    pub expire: Option<DateTime<Utc>>,
    pub public: bool,
    pub delete: bool,
    pub downloads: RwLock<DownloadLimit>,
    timer: Option<AbortHandle>,
}

impl ConstraintRecord {
    pub fn new(constraints: &Constraints, timer: Option<AbortHandle>) -> Self {
        Self {
            expire: constraints.expire,
            public: constraints.public,
            delete: constraints.delete,
            downloads: RwLock::new(constraints.downloads),
            timer,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire.is_some_and(|expire| now >= expire)
    }

    /// Abort the pending expiration timer, if any.
    pub fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }
}
