use crate::error::HttpClientError;
use resilient_http_core::lock_unpoisoned;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Background runtime that runs async requests and their backoff timers.
///
/// Owned by the client and shared, through an `Arc`, with every client
/// derived from it by reconfiguration. Tasks still running when the
/// scheduler is dropped are cancelled.
#[derive(Debug)]
pub struct Scheduler {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    workers: usize,
}

impl Scheduler {
    /// Worker threads used when none are configured.
    pub const DEFAULT_WORKERS: usize = 3;

    /// Starts a multi-threaded runtime with `workers` threads (at least one).
    pub fn new(workers: usize) -> Result<Self, HttpClientError> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("resilient-http-scheduler")
            .enable_all()
            .build()
            .map_err(HttpClientError::Scheduler)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(workers, "request scheduler started");

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle to the runtime, usable from any thread.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns `future` onto the scheduler.
    ///
    /// After [`shutdown`](Self::shutdown) the task never runs and its handle
    /// resolves as cancelled.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn is_shut_down(&self) -> bool {
        lock_unpoisoned(&self.runtime).is_none()
    }

    /// Stops the runtime, cancelling pending requests.
    ///
    /// Outside an async context this waits up to `timeout` for worker threads
    /// to finish; inside one it returns immediately.
    pub fn shutdown(&self, timeout: Duration) {
        let runtime = lock_unpoisoned(&self.runtime).take();
        if let Some(runtime) = runtime {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            } else {
                runtime.shutdown_timeout(timeout);
            }

            #[cfg(feature = "tracing")]
            tracing::debug!("request scheduler stopped");
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let runtime = match self.runtime.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
        }
    }
}
