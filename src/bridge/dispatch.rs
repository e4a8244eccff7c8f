use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::errors::{BridgeError, BridgeResult};
use crate::snapshot::PluginResult;

/// Runs bridge requests off the caller's thread on tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handle: Handle,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Dispatcher bound to the runtime of the calling task.
    ///
    /// # Errors
    /// `Config` when called outside a tokio runtime.
    pub fn current() -> BridgeResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| BridgeError::Config(format!("no tokio runtime: {e}")))
    }

    /// Runs `f` on a blocking worker. A panicking worker yields an error result.
    pub async fn execute<F>(&self, f: F) -> PluginResult
    where
        F: FnOnce() -> PluginResult + Send + 'static,
    {
        match self.handle.spawn_blocking(f).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error processing request in worker: {e}");
                PluginResult::error(format!("worker failed: {e}"))
            }
        }
    }

    /// Runs `f` and hands its result to `callback` exactly once.
    pub fn submit<F, C>(&self, f: F, callback: C) -> JoinHandle<()>
    where
        F: FnOnce() -> PluginResult + Send + 'static,
        C: FnOnce(PluginResult) + Send + 'static,
    {
        let this = self.clone();
        self.handle.spawn(async move {
            let result = this.execute(f).await;
            callback(result);
        })
    }
}
