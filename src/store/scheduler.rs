//! One-shot deferred callbacks for expiring files.
//!
//! A scheduled callback holds only a weak reference to its target, so a
//! pending timer never keeps a dropped store alive.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::AbortHandle;

/// Time left until `expire`, or zero if it already passed.
pub(crate) fn delay_until(expire: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (expire - now).to_std().unwrap_or(Duration::ZERO)
}

/// Run `callback` on `target` after `delay`.
///
/// The callback is skipped if the target has been dropped by then.
pub(crate) fn schedule<T, F, Fut>(target: Weak<T>, delay: Duration, callback: F) -> AbortHandle
where
    T: Send + Sync + 'static,
    F: FnOnce(Arc<T>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(target) = target.upgrade() {
            callback(target).await;
        }
    });
    handle.abort_handle()
}
