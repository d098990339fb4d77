//! Background write dispatch.
//!
//! Writes never run on the caller's thread (unless the host explicitly opts
//! into [`InlineExecutor`]). A [`WriteDispatcher`] hands each write to a
//! [`TaskExecutor`] as a [`WriteTask`] and keeps count of the writes still in
//! flight so shutdown can wait for them to drain.
//!
//! A `WriteTask` completes exactly once: it runs its work and invokes either
//! the success or the error callback. A task that panics, or that is dropped
//! without running (for example because the runtime shut down), reports
//! [`PropertyError::WriteAborted`] through its error callback.

use crate::error::{PropertyError, PropertyResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

type Work = Box<dyn FnOnce() -> PropertyResult<()> + Send + 'static>;
type OnSuccess = Box<dyn FnOnce() + Send + 'static>;
type OnError = Box<dyn FnOnce(PropertyError) + Send + 'static>;

/// Runs write tasks off the calling thread.
pub trait TaskExecutor: Send + Sync {
    /// Accepts a task. An executor that cannot run it must call
    /// [`WriteTask::abort`] (or drop it) so the caller still hears back.
    fn execute(&self, task: WriteTask);
}

/// A single background write plus its completion callbacks.
pub struct WriteTask {
    work: Option<Work>,
    on_success: Option<OnSuccess>,
    on_error: Option<OnError>,
    pending: Arc<PendingWrites>,
    completed: bool,
}

impl WriteTask {
    /// Runs the write and invokes exactly one callback.
    pub fn run(mut self) {
        let result = match self.work.take() {
            Some(work) => catch_unwind(AssertUnwindSafe(work))
                .unwrap_or_else(|panic| Err(PropertyError::WriteAborted(panic_message(&*panic)))),
            None => Err(PropertyError::WriteAborted("write task has no work".into())),
        };
        self.complete(result);
    }

    /// Completes the task with `error` without running it.
    pub fn abort(mut self, error: PropertyError) {
        self.work = None;
        self.complete(Err(error));
    }

    fn complete(&mut self, result: PropertyResult<()>) {
        if self.completed {
            return;
        }
        self.completed = true;
        let _done = PendingGuard(Arc::clone(&self.pending));

        match result {
            Ok(()) => {
                if let Some(on_success) = self.on_success.take() {
                    on_success();
                }
            }
            Err(e) => {
                warn!(error = %e, "background write failed");
                if let Some(on_error) = self.on_error.take() {
                    on_error(e);
                }
            }
        }
    }
}

impl Drop for WriteTask {
    fn drop(&mut self) {
        if !self.completed {
            self.complete(Err(PropertyError::WriteAborted(
                "write task dropped before it ran".into(),
            )));
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "write panicked".to_string()
    }
}

/// Runs tasks on the calling thread.
///
/// For hosts without an async runtime and for deterministic tests. `set`
/// blocks for the duration of the write under this executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, task: WriteTask) {
        task.run();
    }
}

/// Runs each task on the Tokio blocking pool.
///
/// Tasks run concurrently and in no guaranteed order; the sync domain still
/// serializes their container access.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    /// Creates an executor on an explicit runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates an executor on the runtime the caller is running in.
    pub fn current() -> PropertyResult<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| PropertyError::ExecutorUnavailable(e.to_string()))
    }
}

impl TaskExecutor for TokioExecutor {
    fn execute(&self, task: WriteTask) {
        // Detached: completion is reported through the task's callbacks.
        drop(self.handle.spawn_blocking(move || task.run()));
    }
}

/// Runs tasks one at a time, in submission order.
///
/// A single Tokio task drains a channel and hands each write to the blocking
/// pool, waiting for it before taking the next.
#[derive(Debug, Clone)]
pub struct SerialExecutor {
    tx: mpsc::UnboundedSender<WriteTask>,
}

impl SerialExecutor {
    /// Spawns the writer loop on an explicit runtime handle.
    pub fn spawn(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteTask>();
        handle.spawn(async move {
            while let Some(task) = rx.recv().await {
                if let Err(e) = tokio::task::spawn_blocking(move || task.run()).await {
                    warn!("serial write task failed to join: {}", e);
                }
            }
            debug!("serial writer stopped");
        });
        Self { tx }
    }

    /// Spawns the writer loop on the runtime the caller is running in.
    pub fn current() -> PropertyResult<Self> {
        Handle::try_current()
            .map(|handle| Self::spawn(&handle))
            .map_err(|e| PropertyError::ExecutorUnavailable(e.to_string()))
    }
}

impl TaskExecutor for SerialExecutor {
    fn execute(&self, task: WriteTask) {
        if let Err(mpsc::error::SendError(task)) = self.tx.send(task) {
            task.abort(PropertyError::ExecutorUnavailable(
                "serial writer has stopped".into(),
            ));
        }
    }
}

/// Counts writes that have been submitted but not completed.
#[derive(Debug, Default)]
struct PendingWrites {
    count: Mutex<usize>,
    idle: Condvar,
    notify: Notify,
}

impl PendingWrites {
    fn count(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) {
        *self.count() += 1;
    }

    fn finish(&self) {
        let mut count = self.count();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
            self.notify.notify_waiters();
        }
    }
}

struct PendingGuard(Arc<PendingWrites>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

/// Submits writes to an executor and tracks them until they complete.
pub struct WriteDispatcher {
    executor: Arc<dyn TaskExecutor>,
    pending: Arc<PendingWrites>,
}

impl WriteDispatcher {
    /// Creates a dispatcher over `executor`.
    pub fn new(executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            executor,
            pending: Arc::new(PendingWrites::default()),
        }
    }

    /// A dispatcher that runs writes on the calling thread.
    pub fn inline() -> Self {
        Self::new(Arc::new(InlineExecutor))
    }

    /// Submits `work`; exactly one of `on_success` or `on_error` runs when it
    /// completes.
    pub fn submit<W, S, E>(&self, work: W, on_success: S, on_error: E)
    where
        W: FnOnce() -> PropertyResult<()> + Send + 'static,
        S: FnOnce() + Send + 'static,
        E: FnOnce(PropertyError) + Send + 'static,
    {
        self.pending.begin();
        let task = WriteTask {
            work: Some(Box::new(work)),
            on_success: Some(Box::new(on_success)),
            on_error: Some(Box::new(on_error)),
            pending: Arc::clone(&self.pending),
            completed: false,
        };
        self.executor.execute(task);
    }

    /// Returns the number of writes still in flight.
    pub fn pending(&self) -> usize {
        *self.pending.count()
    }

    /// Resolves once no writes are in flight.
    pub async fn drain(&self) {
        loop {
            let notified = self.pending.notify.notified();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Like [`drain`](Self::drain) but bounded by `timeout`.
    pub async fn drain_timeout(&self, timeout: Duration) -> PropertyResult<()> {
        tokio::time::timeout(timeout, self.drain())
            .await
            .map_err(|_| PropertyError::DrainTimeout {
                timeout_ms: timeout.as_millis() as u64,
                pending: self.pending(),
            })
    }

    /// Blocks the current thread until no writes are in flight or `timeout`
    /// elapses. Returns true if drained.
    ///
    /// Must not be called from inside an async task.
    pub fn drain_blocking(&self, timeout: Duration) -> bool {
        let count = self.pending.count();
        let (count, _) = self
            .pending
            .idle
            .wait_timeout_while(count, timeout, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

impl std::fmt::Debug for WriteDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteDispatcher")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
