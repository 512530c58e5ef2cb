//! Serialized, paced task queue for one rate-limited resource.
//!
//! A [`ThrottledQueue`] runs submitted operations strictly one at a time and
//! in submission order. Consecutive dispatches are spaced by at least the
//! configured minimum interval, every attempt runs under its own deadline,
//! and non-fatal failures are retried a bounded number of times.
//!
//! The drain loop is a tokio task spawned lazily on the first submission. It
//! exits when the queue is empty and is restarted by the next submission.

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::QueueConfig;
use crate::error::FatalMatcher;
use crate::{Result, SearchError};

type Payload = Box<dyn Any + Send>;
type Operation = Arc<dyn Fn() -> BoxFuture<'static, Result<Payload>> + Send + Sync>;

/// One pending unit of work.
struct QueuedTask {
    id: u64,
    operation: Operation,
    retry_count: u32,
    created_at: Instant,
    responder: oneshot::Sender<Result<Payload>>,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<QueuedTask>,
    /// Completion time of the most recent attempt.
    last_dispatch_at: Option<Instant>,
    is_draining: bool,
    /// Bumped by teardown; a drain loop from an older generation must stop.
    generation: u64,
    drain: Option<JoinHandle<()>>,
    next_id: u64,
}

struct Shared {
    config: QueueConfig,
    fatal: FatalMatcher,
    state: Mutex<QueueState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Serializing, interval-enforcing, retrying dispatcher.
///
/// Share it behind an `Arc` with every caller of the same external resource.
pub struct ThrottledQueue {
    shared: Arc<Shared>,
}

impl ThrottledQueue {
    /// Creates a queue; fails if a fatal pattern does not compile.
    pub fn new(config: QueueConfig) -> Result<Self> {
        let fatal = FatalMatcher::new(&config.fatal_patterns)?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                fatal,
                state: Mutex::new(QueueState::default()),
            }),
        })
    }

    /// Returns the queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Number of tasks waiting or in flight.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    /// Whether a drain loop is currently active.
    pub fn is_draining(&self) -> bool {
        self.shared.lock().is_draining
    }

    /// Enqueues `operation` and returns a handle to its eventual outcome.
    ///
    /// The task is enqueued before this returns, so submission order is call
    /// order. `operation` may be invoked more than once. Must be called from
    /// within a tokio runtime.
    pub fn submit<T, F, Fut>(&self, operation: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let operation: Operation = Arc::new(move || {
            let call = operation();
            async move { call.await.map(|value| Box::new(value) as Payload) }.boxed()
        });
        let (responder, receiver) = oneshot::channel();

        let mut state = self.shared.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.pending.push_back(QueuedTask {
            id,
            operation,
            retry_count: 0,
            created_at: Instant::now(),
            responder,
        });
        debug!(task = id, pending = state.pending.len(), "task submitted");

        if !state.is_draining {
            state.is_draining = true;
            let generation = state.generation;
            state.drain = Some(tokio::spawn(drain(Arc::clone(&self.shared), generation)));
        }

        TaskHandle {
            receiver,
            _output: PhantomData,
        }
    }

    /// Rejects every pending task with [`SearchError::Cancelled`] and resets
    /// the queue to its pre-first-use state.
    pub fn teardown(&self) {
        let (cancelled, drain) = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.last_dispatch_at = None;
            state.is_draining = false;
            (std::mem::take(&mut state.pending), state.drain.take())
        };

        if let Some(handle) = drain {
            handle.abort();
        }

        let count = cancelled.len();
        for task in cancelled {
            let _ = task.responder.send(Err(SearchError::Cancelled));
        }
        if count > 0 {
            info!(cancelled = count, "queue torn down");
        }
    }
}

impl Drop for ThrottledQueue {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to the outcome of a submitted operation.
///
/// Resolves with the operation's value, its final error, or
/// [`SearchError::Cancelled`] if the queue was torn down first.
pub struct TaskHandle<T> {
    receiver: oneshot::Receiver<Result<Payload>>,
    _output: PhantomData<fn() -> T>,
}

impl<T: 'static> Future for TaskHandle<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(_)) => Poll::Ready(Err(SearchError::Cancelled)),
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome.and_then(|payload| {
                payload
                    .downcast::<T>()
                    .map(|value| *value)
                    .map_err(|_| SearchError::Other("queued task produced an unexpected type".into()))
            })),
        }
    }
}

/// What the drain loop does after an attempt has been settled.
enum Next {
    Continue,
    Retry,
    Stop,
}

async fn drain(shared: Arc<Shared>, generation: u64) {
    let config = &shared.config;

    loop {
        let (id, operation, wait) = {
            let mut state = shared.lock();
            if state.generation != generation {
                return;
            }

            // abandoned handles are not worth a dispatch
            while state
                .pending
                .front()
                .is_some_and(|task| task.responder.is_closed())
            {
                if let Some(task) = state.pending.pop_front() {
                    debug!(task = task.id, "skipping abandoned task");
                }
            }

            let Some(head) = state.pending.front() else {
                state.is_draining = false;
                state.drain = None;
                return;
            };
            let wait = state
                .last_dispatch_at
                .map(|last| config.min_interval().saturating_sub(last.elapsed()))
                .unwrap_or_default();
            (head.id, Arc::clone(&head.operation), wait)
        };

        if !wait.is_zero() {
            debug!(task = id, wait_ms = wait.as_millis() as u64, "pacing dispatch");
            sleep(wait).await;
        }

        // a panicking operation settles as a failure instead of killing the loop
        let attempt = AssertUnwindSafe(async { operation().await }).catch_unwind();
        let outcome = match timeout(config.call_timeout(), attempt).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                warn!(task = id, "operation panicked");
                Err(SearchError::Other("operation panicked".into()))
            }
            Err(_) => Err(SearchError::Timeout(config.call_timeout_ms)),
        };

        let next = settle(&shared, generation, id, outcome);
        match next {
            Next::Continue => {}
            Next::Retry => sleep(config.retry_delay()).await,
            Next::Stop => return,
        }
    }
}

/// Applies an attempt outcome to the head task in one critical section.
fn settle(shared: &Shared, generation: u64, id: u64, outcome: Result<Payload>) -> Next {
    let mut state = shared.lock();
    if state.generation != generation {
        return Next::Stop;
    }
    state.last_dispatch_at = Some(Instant::now());

    let Some(head) = state.pending.front_mut().filter(|task| task.id == id) else {
        return Next::Continue;
    };

    let err = match outcome {
        Ok(value) => {
            if let Some(task) = state.pending.pop_front() {
                debug!(
                    task = task.id,
                    attempts = task.retry_count + 1,
                    queued_ms = task.created_at.elapsed().as_millis() as u64,
                    "task completed"
                );
                let _ = task.responder.send(Ok(value));
            }
            return Next::Continue;
        }
        Err(err) => err,
    };

    if shared.fatal.is_fatal(&err) {
        warn!(task = id, error = %err, "fatal error, not retrying");
    } else if head.retry_count < shared.config.max_retries {
        head.retry_count += 1;
        warn!(task = id, retry_count = head.retry_count, error = %err, "attempt failed, retrying");
        return Next::Retry;
    } else {
        warn!(task = id, attempts = head.retry_count + 1, error = %err, "retries exhausted");
    }

    if let Some(task) = state.pending.pop_front() {
        let _ = task.responder.send(Err(err));
    }
    Next::Continue
}
