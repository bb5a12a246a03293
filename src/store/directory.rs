//! Directory-backed constrained store.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::constraints::{ConstraintRecord, Constraints, DownloadLimit};
use super::listing::ListingCache;
use super::scheduler;
use super::validate_name;
use crate::config::StorageConfig;
use crate::{FiledropError, Result};

/// Tracked files keyed by name.
pub(crate) type EntryMap = HashMap<String, Arc<ConstraintRecord>>;

#[derive(Debug)]
struct StoreInner {
    directory: PathBuf,
    /// Keeps a store-owned temporary directory alive.
    _temp_dir: Option<TempDir>,
    entries: RwLock<EntryMap>,
    listing: ListingCache,
}

/// File store which enforces per-file access constraints.
///
/// Files live as plain files in one directory; their constraints live only
/// in memory. The handle is cheap to clone and all clones share state.
///
/// Lock order: the listing cache before the entry map, and a record's
/// counter before the entry map. Nothing waits on a counter lock while
/// holding the entry map.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store over an existing directory.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        let metadata = std::fs::metadata(&directory).map_err(|e| {
            FiledropError::Config(format!(
                "error opening directory {}: {e}",
                directory.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(FiledropError::Config(format!(
                "{} is not a directory",
                directory.display()
            )));
        }
        Ok(Self::with_directory(directory, None))
    }

    /// Open a store over a fresh temporary directory.
    ///
    /// The directory and its content are deleted when the last handle drops.
    pub fn temporary() -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("filedrop").tempdir()?;
        let directory = temp_dir.path().to_path_buf();
        Ok(Self::with_directory(directory, Some(temp_dir)))
    }

    /// Open the store described by the configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.directory.is_empty() {
            return Self::temporary();
        }
        if config.create_if_missing {
            std::fs::create_dir_all(&config.directory)?;
        }
        Self::open(&config.directory)
    }

    fn with_directory(directory: PathBuf, temp_dir: Option<TempDir>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                directory,
                _temp_dir: temp_dir,
                entries: RwLock::new(EntryMap::new()),
                listing: ListingCache::new(),
            }),
        }
    }

    /// Directory holding the stored files.
    pub fn directory(&self) -> &Path {
        &self.inner.directory
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.inner.directory.join(name)
    }

    /// Number of tracked files.
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    /// Check if no files are tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    /// Check if a file is tracked under `name`.
    pub async fn contains(&self, name: &str) -> bool {
        self.inner.entries.read().await.contains_key(name)
    }

    /// Store `content` under `name` with the given constraints.
    ///
    /// A name that is already tracked is overwritten together with its
    /// constraints. A new name refuses to replace an untracked file that is
    /// already on disk. The entry map is left unchanged if writing fails.
    pub async fn add<R>(&self, mut content: R, name: &str, constraints: Constraints) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        validate_name(name)?;
        if constraints.downloads.is_exhausted() {
            return Err(FiledropError::InvalidConstraint(
                "download limit is already exhausted".to_string(),
            ));
        }

        let path = self.file_path(name);
        let mut entries = self.inner.entries.write().await;
        let overwrite = entries.contains_key(name);

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            warn!("Overwriting stored file {}", name);
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }

        let mut file = match options.open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(FiledropError::AlreadyExists(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let written = async {
            let n = tokio::io::copy(&mut content, &mut file).await?;
            file.flush().await?;
            Ok::<u64, io::Error>(n)
        }
        .await;
        let written = match written {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                if !overwrite {
                    if let Err(cleanup) = fs::remove_file(&path).await {
                        warn!("Could not discard partial file {}: {}", name, cleanup);
                    }
                }
                return Err(e.into());
            }
        };

        // Already expired files get no timer; the next serve reports them
        // expired and reclaims them.
        let now = Utc::now();
        let timer = constraints
            .expire
            .filter(|expire| *expire > now)
            .map(|expire| {
                let delay = scheduler::delay_until(expire, now);
                debug!("Expiration of {} armed in {:?}", name, delay);
                self.reclaim_after(name, delay)
            });
        let record = Arc::new(ConstraintRecord::new(&constraints, timer));

        let mut membership_changed = record.public;
        if let Some(previous) = entries.insert(name.to_string(), record) {
            previous.cancel_timer();
            membership_changed |= previous.public;
        }
        if membership_changed {
            self.inner.listing.invalidate();
        }

        info!(
            "Stored file {} ({} bytes, downloads: {:?}, public: {}, delete: {})",
            name, written, constraints.downloads, constraints.public, constraints.delete
        );
        Ok(())
    }

    /// Sorted names of the publicly listed files.
    pub async fn list(&self) -> Vec<String> {
        self.inner.listing.names(&self.inner.entries).await
    }

    /// Stop tracking `name`, regardless of its constraints.
    ///
    /// The file itself stays on disk. Removing an unknown name does nothing.
    pub async fn remove(&self, name: &str) {
        let mut entries = self.inner.entries.write().await;
        match entries.remove(name) {
            Some(record) => {
                record.cancel_timer();
                if record.public {
                    self.inner.listing.invalidate();
                }
                info!("Removed file {}", name);
            }
            None => debug!("File {} not stored, nothing to remove", name),
        }
    }

    /// Copy the content of `name` into `out`, enforcing its constraints.
    ///
    /// Returns the number of bytes copied. The download that exhausts the
    /// limit schedules the file's reclamation once the copy is done.
    pub async fn serve<W>(&self, name: &str, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        validate_name(name)?;
        let record = self.inner.entries.read().await.get(name).cloned();
        let record = record.ok_or_else(|| FiledropError::NotFound(name.to_string()))?;
        let path = self.file_path(name);

        {
            let downloads = record.downloads.read().await;
            if record.is_expired(Utc::now()) {
                drop(downloads);
                return Err(self.expired(name));
            }
            if *downloads == DownloadLimit::Unlimited {
                return self.transfer(&path, out).await;
            }
        }

        let mut downloads = record.downloads.write().await;
        if record.is_expired(Utc::now()) {
            drop(downloads);
            return Err(self.expired(name));
        }
        *downloads = downloads
            .after_download()
            .ok_or_else(|| FiledropError::LimitExceeded(name.to_string()))?;

        // A failed copy still consumes the download.
        let result = self.transfer(&path, out).await;
        let exhausted = downloads.is_exhausted();
        drop(downloads);

        if exhausted {
            debug!("Download limit of {} reached", name);
            self.reclaim_after(name, Duration::ZERO);
        }
        result
    }

    /// Serve `name` into memory.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let mut content = Vec::new();
        self.serve(name, &mut content).await?;
        Ok(content)
    }

    async fn transfer<W>(&self, path: &Path, out: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut file = fs::File::open(path).await?;
        let n = tokio::io::copy(&mut file, &mut *out).await?;
        out.flush().await?;
        Ok(n)
    }

    fn expired(&self, name: &str) -> FiledropError {
        self.reclaim_after(name, Duration::ZERO);
        FiledropError::Expired(name.to_string())
    }

    fn reclaim_after(&self, name: &str, delay: Duration) -> AbortHandle {
        let name = name.to_string();
        scheduler::schedule(Arc::downgrade(&self.inner), delay, move |inner| async move {
            Store { inner }.remove_if_exhausted(&name).await;
        })
    }

    /// Remove `name` only if it expired or used up its downloads.
    ///
    /// Waits for a transfer in progress on the file. Unlinks the file when
    /// its constraints ask for it; an unlink failure is logged and the entry
    /// is dropped anyway.
    pub(crate) async fn remove_if_exhausted(&self, name: &str) {
        let record = self.inner.entries.read().await.get(name).cloned();
        let Some(record) = record else {
            debug!("File {} already removed", name);
            return;
        };

        let downloads = *record.downloads.write().await;
        if !downloads.is_exhausted() && !record.is_expired(Utc::now()) {
            info!("File {} will not be removed", name);
            return;
        }

        let mut entries = self.inner.entries.write().await;
        match entries.get(name) {
            Some(current) if Arc::ptr_eq(current, &record) => {}
            _ => {
                debug!("File {} was replaced or removed meanwhile", name);
                return;
            }
        }
        entries.remove(name);
        if record.public {
            self.inner.listing.invalidate();
        }
        if record.delete {
            if let Err(e) = fs::remove_file(self.file_path(name)).await {
                warn!("Could not remove file {}: {}", name, e);
            }
        }
        drop(entries);

        info!("Reclaimed file {}", name);
        record.cancel_timer();
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Storage in directory {}", self.inner.directory.display())
    }
}
