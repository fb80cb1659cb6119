use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Spawns a named background task and tracks its `JoinHandle`.
///
/// Errors returned by the task are logged, never propagated.
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    // Clone the name so it can be safely moved into the async block
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}

/// Spawns a detached task that sleeps for `delay`, then runs `task_fn`.
///
/// Dropping the returned handle detaches the task; it is not cancelled.
pub(crate) fn spawn_after<F, Fut>(
    name: &str,
    delay: Duration,
    task_fn: F,
) -> JoinHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        sleep(delay).await;
        debug!("delayed task {name} firing after {:?}", delay);
        task_fn().await;
    })
}
