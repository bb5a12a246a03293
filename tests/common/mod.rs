//! Shared helpers for store integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::time::Duration;

use filedrop::Store;
use tempfile::TempDir;

/// Default timeout for waiting on background reclamation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a store over a fresh scratch directory.
pub fn setup_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(temp_dir.path()).unwrap();
    (temp_dir, store)
}

/// Poll `condition` until it holds, panicking after [`DEFAULT_TIMEOUT`].
pub async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(DEFAULT_TIMEOUT, async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting until {what}");
}

/// Wait until the store stops tracking `name`.
pub async fn wait_until_gone(store: &Store, name: &str) {
    wait_until(&format!("{name} is reclaimed"), || async move {
        !store.contains(name).await
    })
    .await;
}
