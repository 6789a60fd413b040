//! Blocking and non-blocking dispatch over a shared registry.
//!
//! [`Dispatcher`] pairs an immutable [`Registry`] with a rayon worker pool.
//! [`dispatch`](Dispatcher::dispatch) parses and executes on the caller's
//! thread; [`dispatch_async`](Dispatcher::dispatch_async) submits exactly one
//! parse+execute job to the pool and hands back a [`DispatchHandle`].
//!
//! In-flight dispatches share nothing but the read-only registry, so they
//! may finish in any order. There is no cancellation and no timeout at this
//! level; callers that need either wrap the handle
//! ([`DispatchHandle::wait_timeout`] leaves the job running).

use std::any::Any;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

use command_dispatch_core::{CommandResult, DispatchError, Registry};
use tracing::{debug, info, warn};

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::manifest::{HandlerTable, Manifest};

/// What a dispatch eventually produces.
pub type DispatchOutcome<T> = std::result::Result<CommandResult<T>, DispatchError>;

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

fn worker_lost() -> DispatchError {
    DispatchError::Internal("dispatch worker stopped without reporting a result".to_string())
}

/// Registry plus worker pool. Cheap to clone; clones share both.
pub struct Dispatcher<C, T> {
    registry: Arc<Registry<C, T>>,
    pool: Arc<rayon::ThreadPool>,
}

impl<C, T> Clone for Dispatcher<C, T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<C, T> Dispatcher<C, T> {
    /// Starts a worker pool sized by `config` around `registry`.
    ///
    /// A body that panics on a worker is logged and its handle reports
    /// [`DispatchError::Internal`]; the pool keeps running.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`](crate::RuntimeError::PoolError) if the pool
    /// cannot be started.
    pub fn new(registry: Registry<C, T>, config: &RuntimeConfig) -> Result<Self> {
        let workers = config.worker_count();
        let thread_name = config.thread_name.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{thread_name}-{index}"))
            .panic_handler(|payload| {
                warn!(
                    panic = panic_message(payload.as_ref()),
                    "command body panicked on a dispatch worker"
                );
            })
            .build()?;

        info!(
            workers,
            commands = registry.len(),
            "dispatcher started"
        );

        Ok(Self {
            registry: Arc::new(registry),
            pool: Arc::new(pool),
        })
    }

    /// Binds `table` to `manifest`, builds the registry with the configured
    /// alias scope and starts the pool.
    ///
    /// # Errors
    ///
    /// Any binding or build error from the manifest, or a pool error.
    pub fn from_manifest(
        manifest: &Manifest,
        table: &HandlerTable<C, T>,
        config: &RuntimeConfig,
    ) -> Result<Self> {
        let registry = manifest.build_registry(table, config.alias_scope)?;
        Self::new(registry, config)
    }

    pub fn registry(&self) -> &Registry<C, T> {
        &self.registry
    }

    /// Shared handle to the registry, for callers that outlive the dispatcher.
    pub fn shared_registry(&self) -> Arc<Registry<C, T>> {
        Arc::clone(&self.registry)
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Parses and executes `raw` on the calling thread.
    ///
    /// # Errors
    ///
    /// See [`Registry::dispatch`].
    pub fn dispatch(&self, raw: &str, ctx: &C) -> DispatchOutcome<T> {
        self.registry.dispatch(raw, ctx)
    }
}

impl<C, T> Dispatcher<C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    /// Schedules parse+execute of `raw` on the pool and returns immediately.
    ///
    /// `ctx` moves into the job; share state across dispatches by making `C`
    /// an `Arc`.
    pub fn dispatch_async(&self, raw: impl Into<String>, ctx: C) -> DispatchHandle<T> {
        let raw = raw.into();
        let registry = Arc::clone(&self.registry);
        let (sender, receiver) = mpsc::sync_channel(1);

        self.pool.spawn(move || {
            let outcome = registry.dispatch(&raw, &ctx);
            if sender.send(outcome).is_err() {
                debug!(input = %raw, "dispatch handle dropped before completion");
            }
        });

        DispatchHandle {
            receiver,
            completed: false,
        }
    }
}

/// Pending result of one [`Dispatcher::dispatch_async`] call.
///
/// Yields its outcome exactly once. Dropping the handle does not stop the
/// job; its result is discarded.
pub struct DispatchHandle<T> {
    receiver: Receiver<DispatchOutcome<T>>,
    completed: bool,
}

impl<T> DispatchHandle<T> {
    /// Blocks until the dispatch finishes.
    pub fn wait(self) -> DispatchOutcome<T> {
        if self.completed {
            return Err(DispatchError::Internal(
                "dispatch result already taken".to_string(),
            ));
        }
        self.receiver.recv().unwrap_or_else(|_| Err(worker_lost()))
    }

    /// Blocks for at most `timeout`. Gives the handle back if the dispatch
    /// is still running.
    pub fn wait_timeout(self, timeout: Duration) -> std::result::Result<DispatchOutcome<T>, Self> {
        if self.completed {
            return Ok(Err(DispatchError::Internal(
                "dispatch result already taken".to_string(),
            )));
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(outcome) => Ok(outcome),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => Ok(Err(worker_lost())),
        }
    }

    /// Returns the outcome if it is ready. After it has been returned once,
    /// always `None`.
    pub fn try_poll(&mut self) -> Option<DispatchOutcome<T>> {
        if self.completed {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(worker_lost()),
        };
        self.completed = true;
        Some(outcome)
    }

    /// True once [`try_poll`](Self::try_poll) has returned the outcome.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl<T> std::fmt::Debug for DispatchHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
