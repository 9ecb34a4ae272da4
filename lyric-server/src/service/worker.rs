//! Blocking work adapter
//!
//! Runs blocking, callback-driven operations (transcription, tag embedding) on
//! one dedicated OS thread and forwards the events they emit to the async
//! caller while the operation is still running.
//!
//! ```text
//!   async caller                     worker thread
//!   ────────────                     ─────────────
//!   run(op, on_event) ──[1-slot queue]──▶ op(sink)
//!        ▲                                  │ sink.emit(e)
//!        └──────[unbounded event queue]─────┘
//!        ▲                                  │ return
//!        └──────────[completion]────────────┘
//! ```
//!
//! Work is never interrupted: once an operation starts it runs to completion.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Failure of an adapted operation
#[derive(Debug, Error)]
pub enum WorkError {
    /// The operation itself returned an error
    #[error("{0:#}")]
    Operation(anyhow::Error),

    /// The operation panicked; the worker thread survives
    #[error("operation panicked: {0}")]
    Panicked(String),

    /// The worker thread is gone and cannot accept work
    #[error("worker is not accepting work")]
    Unavailable,
}

impl WorkError {
    /// Whether the worker itself failed, as opposed to the operation
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkError::Unavailable)
    }
}

/// Handle an operation uses to report events to its caller
///
/// Can be cloned and used from any thread.
pub struct EventSink<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> EventSink<E> {
    pub fn emit(&self, event: E) {
        if self.tx.send(event).is_err() {
            warn!("Dropping event emitted after its operation completed");
        }
    }
}

/// Single dedicated worker thread with a one-slot work queue
pub struct BlockingWorker {
    queue: mpsc::Sender<WorkItem>,
}

impl BlockingWorker {
    /// Spawns the worker thread
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<WorkItem>(1);

        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(item) = rx.blocking_recv() {
                    item();
                }
                debug!("Worker queue closed, thread exiting");
            })?;

        Ok(Self { queue: tx })
    }

    /// Worker whose thread is already gone
    #[cfg(test)]
    pub(crate) fn disconnected() -> Self {
        let (tx, _) = mpsc::channel(1);
        Self { queue: tx }
    }

    /// Runs `operation` on the worker, calling `on_event` for every event it
    /// emits, in order, as they arrive
    ///
    /// Events emitted before the operation returns are all delivered, even when
    /// it fails.
    pub async fn run<T, E, F, C>(&self, operation: F, mut on_event: C) -> Result<T, WorkError>
    where
        T: Send + 'static,
        E: Send + 'static,
        F: FnOnce(EventSink<E>) -> anyhow::Result<T> + Send + 'static,
        C: FnMut(E),
    {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = oneshot::channel();
        let sink = EventSink { tx: event_tx };

        let item: WorkItem = Box::new(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || operation(sink)));
            let _ = done_tx.send(outcome.map_err(panic_message));
        });

        if self.queue.send(item).await.is_err() {
            return Err(WorkError::Unavailable);
        }

        let outcome = loop {
            tokio::select! {
                biased;
                Some(event) = event_rx.recv() => on_event(event),
                outcome = &mut done_rx => break outcome,
            }
        };

        while let Ok(event) = event_rx.try_recv() {
            on_event(event);
        }

        match outcome {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(WorkError::Operation(err)),
            Ok(Err(message)) => Err(WorkError::Panicked(message)),
            // The item was dropped without running
            Err(_) => Err(WorkError::Unavailable),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
