// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Pending-Operation Canceller
//
// Every page-driven operation a test starts is registered here. When the test
// body settles, all of them are signalled, then awaited up to a bound. An
// operation that does not settle in time is abandoned: its result is
// discarded and the manager disposes the context it could still touch.

use crate::error::{Error, Result};
use crate::protocol::BrowserContext;
use crate::reuse::deadline_after;
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// What a pending operation is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Navigation,
    Evaluation,
    Action,
    Wait,
    Other,
}

/// How a single operation ended at a test boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Settled on its own before the signal
    Completed,
    /// Stopped after the signal, within the bound
    Cancelled,
    /// Ignored the signal past the bound; result discarded
    Abandoned,
}

/// Abort signal handed to operations.
///
/// Cloneable; all clones observe the same test boundary.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<String>>,
}

impl CancelSignal {
    /// Returns true once the boundary was signalled.
    pub fn is_cancelled(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Resolves with the cancellation reason once the boundary is signalled.
    pub async fn cancelled(&mut self) -> String {
        match self.rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or_default(),
            // Registry dropped without an explicit cancel
            Err(_) => "Context released.".to_string(),
        }
    }
}

/// Handle to a tracked operation; await it for the operation's result.
///
/// Resolves to [`Error::OperationCancelled`] when the operation was stopped,
/// or finished after its test ended.
#[must_use = "a pending operation does nothing observable unless awaited"]
pub struct PendingOperation<T> {
    label: String,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> PendingOperation<T> {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl<T> Future for PendingOperation<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::OperationCancelled {
                label: self.label.clone(),
                reason: "operation abandoned".to_string(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Entry {
    id: u64,
    kind: OperationKind,
    label: String,
    handle: JoinHandle<()>,
}

struct Epoch {
    tx: watch::Sender<Option<String>>,
    entries: Vec<Entry>,
}

impl Epoch {
    fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            entries: Vec::new(),
        }
    }
}

/// Registry of in-flight operations for one retained context.
///
/// Operations registered after [`PendingOperations::cancel_all`] belong to
/// the next test and are unaffected by the previous boundary.
pub struct PendingOperations {
    next_id: AtomicU64,
    epoch: Mutex<Epoch>,
}

impl Default for PendingOperations {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PendingOperations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingOperations")
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl PendingOperations {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            epoch: Mutex::new(Epoch::new()),
        }
    }

    /// Signal of the current test boundary
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.epoch.lock().tx.subscribe(),
        }
    }

    /// Number of registered operations that have not settled yet
    pub fn pending_count(&self) -> usize {
        self.epoch
            .lock()
            .entries
            .iter()
            .filter(|entry| !entry.handle.is_finished())
            .count()
    }

    /// Runs `operation` raced against the boundary signal.
    ///
    /// On cancellation the operation future is dropped at its next suspension
    /// point.
    pub fn spawn<T, F>(
        &self,
        kind: OperationKind,
        label: impl Into<String>,
        operation: F,
    ) -> PendingOperation<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let mut signal = self.signal();
        let task_label = label.clone();

        let handle = tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                reason = signal.cancelled() => Err(Error::OperationCancelled {
                    label: task_label,
                    reason,
                }),
                result = operation => result,
            };
            let _ = tx.send(result);
        });

        self.register(kind, label.clone(), handle);
        PendingOperation { label, rx }
    }

    /// Runs an operation that observes the signal itself.
    ///
    /// The operation is never dropped by the registry; if it finishes after the
    /// boundary its result is replaced by [`Error::OperationCancelled`].
    pub fn spawn_cooperative<T, F, Fut>(
        &self,
        kind: OperationKind,
        label: impl Into<String>,
        operation: F,
    ) -> PendingOperation<T>
    where
        T: Send + 'static,
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let label = label.into();
        let (tx, rx) = oneshot::channel();
        let signal = self.signal();
        let future = operation(signal.clone());
        let task_label = label.clone();

        let handle = tokio::spawn(async move {
            let result = future.await;
            let result = if signal.is_cancelled() {
                Err(Error::OperationCancelled {
                    label: task_label,
                    reason: "finished after its test ended".to_string(),
                })
            } else {
                result
            };
            let _ = tx.send(result);
        });

        self.register(kind, label.clone(), handle);
        PendingOperation { label, rx }
    }

    fn register(&self, kind: OperationKind, label: String, handle: JoinHandle<()>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Tracking operation #{} ({:?}): {}", id, kind, label);

        let mut epoch = self.epoch.lock();
        epoch.entries.retain(|entry| !entry.handle.is_finished());
        epoch.entries.push(Entry {
            id,
            kind,
            label,
            handle,
        });
    }

    /// Signals every operation of the current boundary, then waits for them
    /// until `bound` elapses. Idempotent when nothing is pending.
    pub async fn cancel_all(&self, reason: &str, bound: Duration) -> CancellationReport {
        let epoch = std::mem::replace(&mut *self.epoch.lock(), Epoch::new());
        let mut report = CancellationReport::default();

        let (finished, running): (Vec<_>, Vec<_>) = epoch
            .entries
            .into_iter()
            .partition(|entry| entry.handle.is_finished());
        report.completed = finished.len();

        epoch.tx.send_replace(Some(reason.to_string()));
        let deadline = deadline_after(bound);

        for mut entry in running {
            match tokio::time::timeout_at(deadline, &mut entry.handle).await {
                Ok(_) => {
                    tracing::debug!("Cancelled operation #{}: {}", entry.id, entry.label);
                    report.cancelled += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        "Operation #{} ({:?}) ignored cancellation within {:?}; abandoning: {}",
                        entry.id,
                        entry.kind,
                        bound,
                        entry.label
                    );
                    // Dropped at its next suspension point, orphaned otherwise
                    entry.handle.abort();
                    report.abandoned.push(entry.label);
                }
            }
        }

        report
    }
}

/// Result of cancelling everything a test left running
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancellationReport {
    /// Operations that had settled on their own
    pub completed: usize,
    /// Operations stopped by the signal within the bound
    pub cancelled: usize,
    /// Labels of operations abandoned past the bound
    pub abandoned: Vec<String>,
    /// Route handlers that could not be removed
    pub route_errors: Vec<String>,
}

impl CancellationReport {
    /// Returns true if nothing had to be abandoned.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }

    /// The outcome for one of the counted categories
    pub fn outcomes(&self) -> Vec<CancelOutcome> {
        std::iter::repeat_n(CancelOutcome::Completed, self.completed)
            .chain(std::iter::repeat_n(CancelOutcome::Cancelled, self.cancelled))
            .chain(std::iter::repeat_n(
                CancelOutcome::Abandoned,
                self.abandoned.len(),
            ))
            .collect()
    }

    /// [`Error::CancellationTimeout`] when something was abandoned
    pub fn timeout_error(&self) -> Option<Error> {
        (!self.is_clean()).then(|| Error::CancellationTimeout {
            abandoned: self.abandoned.clone(),
        })
    }
}

/// Stops everything the finished test left running on `context`.
///
/// Route handlers on the context and on every open page are removed first so
/// no in-flight request reaches a handler of the finished test, then pending
/// operations are cancelled within `bound`.
pub async fn cancel_all(
    context: &dyn BrowserContext,
    operations: &PendingOperations,
    reason: &str,
    bound: Duration,
) -> CancellationReport {
    let deadline = deadline_after(bound);
    let mut route_errors = Vec::new();

    if !context.is_closed() {
        match tokio::time::timeout_at(deadline, context.unroute_all()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => route_errors.push(format!("context: {}", e)),
            Err(_) => route_errors.push("context: unroute timed out".to_string()),
        }

        let pages = context.pages().into_iter().filter(|page| !page.is_closed());
        let outcomes = join_all(pages.map(|page| async move {
            let outcome = tokio::time::timeout_at(deadline, page.unroute_all()).await;
            (page.guid().to_string(), outcome)
        }))
        .await;
        for (guid, outcome) in outcomes {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => route_errors.push(format!("page {}: {}", guid, e)),
                Err(_) => route_errors.push(format!("page {}: unroute timed out", guid)),
            }
        }
    }

    let remaining = deadline.saturating_duration_since(Instant::now());
    let mut report = operations.cancel_all(reason, remaining).await;
    report.route_errors = route_errors;

    if !report.route_errors.is_empty() {
        tracing::warn!("Route handlers left behind: {:?}", report.route_errors);
    }
    report
}
