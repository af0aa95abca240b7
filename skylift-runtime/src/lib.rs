//! Tokio runtime wrapper with one cancellation token shared by the whole run.
//!
//! The import loop only checks the token between steps, so cancelling never
//! interrupts a request that is already in flight.
use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second interrupt forces the process down.
pub const FORCED_EXIT_CODE: i32 = 130;

#[derive(Clone)]
pub struct SkyliftHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct SkyliftRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl SkyliftRuntime {
    /// Build a multi-threaded runtime.
    ///
    /// ```
    /// use skylift_runtime::SkyliftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SkyliftRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        let runtime = builder.build()?;
        Ok(Self {
            runtime,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> SkyliftHandle {
        SkyliftHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and shut the runtime down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl SkyliftHandle {
    /// Spawn a future onto the shared runtime.
    ///
    /// ```
    /// use skylift_runtime::SkyliftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SkyliftRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let task = runtime.handle().spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// The run-wide cancellation token.
    ///
    /// ```
    /// use skylift_runtime::SkyliftRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = SkyliftRuntime::build("cancel-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// cancel.cancel();
    /// assert!(runtime.handle().cancellation().is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// ```
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the run on the first Ctrl-C; exit immediately on the second.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("runtime.signal.unavailable");
                return;
            }
            tracing::warn!(hint = "press Ctrl-C again to abort", "runtime.interrupt.received");
            cancel.cancel();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::error!("runtime.interrupt.forced");
                std::process::exit(FORCED_EXIT_CODE);
            }
        })
    }
}
