//! Refresh operation - one call to the fetch function, classified

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use super::error::{FailureInfo, FetchError};

/// Result of a single refresh operation
pub type RefreshResult<T> = Result<T, FailureInfo>;

/// Source of snapshots polled by a coordinator
///
/// Any `Fn() -> impl Future<Output = Result<T, FetchError>>` closure
/// implements this, so vendor clients can be plugged in without a wrapper type.
#[async_trait]
pub trait Fetch<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, FetchError>;
}

#[async_trait]
impl<T, F, Fut> Fetch<T> for F
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    async fn fetch(&self) -> Result<T, FetchError> {
        (self)().await
    }
}

/// Build the future for one refresh operation
///
/// The returned future never panics and never outlives `timeout`: panics in
/// the fetch function become `Unexpected` failures and a stalled fetch becomes
/// a `Timeout` failure.
pub(crate) fn refresh_operation<T>(fetcher: Arc<dyn Fetch<T>>, timeout: Duration) -> BoxFuture<'static, RefreshResult<T>>
where
    T: Send + 'static,
{
    async move {
        let guarded = AssertUnwindSafe(async move { fetcher.fetch().await }).catch_unwind();

        match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(err))) => {
                debug!(error = %err, "refresh_operation: fetch returned error");
                Err(FailureInfo::from(&err))
            }
            Ok(Err(panic)) => {
                debug!("refresh_operation: fetch panicked");
                Err(FailureInfo::panicked(panic_message(panic.as_ref())))
            }
            Err(_) => {
                debug!(?timeout, "refresh_operation: fetch timed out");
                Err(FailureInfo::timeout(timeout))
            }
        }
    }
    .boxed()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
