// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Async task queue for blocking provider calls.
//!
//! [`TaskQueue::submit`] moves a blocking closure onto tokio's blocking pool
//! and hands back a [`PendingTask`] that resolves exactly once. Tasks run to
//! completion: dropping the `PendingTask` or the session does not stop the
//! provider call, it only discards the result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use opcda_core::{BridgeError, BridgeResult};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Semaphore};

use crate::stats::BridgeStats;

/// Kind of a queued provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Provider connect.
    Connect,
    /// Item read.
    Read,
    /// Item write.
    Write,
    /// Address space browse.
    Browse,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Browse => write!(f, "browse"),
        }
    }
}

// =============================================================================
// PendingTask
// =============================================================================

/// The result slot of one submitted task.
#[must_use = "a PendingTask does nothing unless awaited; the call still runs"]
pub struct PendingTask<T> {
    receiver: oneshot::Receiver<BridgeResult<T>>,
}

impl<T> PendingTask<T> {
    /// Creates an already resolved task.
    pub fn ready(result: BridgeResult<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { receiver: rx }
    }
}

impl<T> Future for PendingTask<T> {
    type Output = BridgeResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(BridgeError::internal(
                "task was dropped before it resolved",
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for PendingTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask").finish_non_exhaustive()
    }
}

// =============================================================================
// TaskQueue
// =============================================================================

/// Runs provider calls off the caller's execution context.
#[derive(Clone)]
pub struct TaskQueue {
    runtime: Handle,
    permits: Arc<Semaphore>,
    stats: Arc<BridgeStats>,
}

impl TaskQueue {
    /// Creates a queue allowing `max_concurrent` calls in flight.
    pub fn new(runtime: Handle, max_concurrent: usize, stats: Arc<BridgeStats>) -> Self {
        Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats,
        }
    }

    /// Submits blocking work.
    pub fn submit<T, W>(&self, kind: TaskKind, work: W) -> PendingTask<T>
    where
        T: Send + 'static,
        W: FnOnce() -> BridgeResult<T> + Send + 'static,
    {
        self.submit_then(kind, work, |result| result)
    }

    /// Submits blocking work followed by a completion step.
    ///
    /// `complete` runs on the runtime once `work` has finished, whether or
    /// not anyone still awaits the task.
    pub fn submit_then<T, U, W, C>(&self, kind: TaskKind, work: W, complete: C) -> PendingTask<U>
    where
        T: Send + 'static,
        U: Send + 'static,
        W: FnOnce() -> BridgeResult<T> + Send + 'static,
        C: FnOnce(BridgeResult<T>) -> BridgeResult<U> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let permits = Arc::clone(&self.permits);
        let stats = Arc::clone(&self.stats);

        stats.record_task_submitted();
        tracing::debug!(task = %kind, "Task submitted");

        self.runtime.spawn(async move {
            let result = match permits.acquire_owned().await {
                Ok(permit) => {
                    let joined = tokio::task::spawn_blocking(work).await;
                    drop(permit);
                    joined.unwrap_or_else(|e| {
                        Err(BridgeError::internal(format!("{} task aborted: {}", kind, e)))
                    })
                }
                Err(_) => Err(BridgeError::internal("task queue closed")),
            };

            let output = complete(result);
            stats.record_task_finished(output.is_ok());
            if let Err(e) = &output {
                e.log(&format!("{} task", kind));
            }

            if tx.send(output).is_err() {
                tracing::trace!(task = %kind, "Task result discarded, caller went away");
            }
        });

        PendingTask { receiver: rx }
    }

    /// Returns the number of free permits.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("available_permits", &self.available_permits())
            .finish()
    }
}
