//! Designated execution context for marshalled work.
//!
//! A [`MainContext`] is bound to the thread that created it. Other threads hold
//! a [`ContextHandle`] and post [`QueuedInvocation`]s to it; the owning thread
//! drains them with [`MainContext::process_pending`], [`MainContext::run_for`]
//! or [`MainContext::run_until`]. Invocations posted from one thread run in the
//! order they were posted.
//!
//! # Example
//!
//! ```
//! use tether_core::MainContext;
//!
//! let context = MainContext::new();
//! let handle = context.handle();
//!
//! let worker = std::thread::spawn(move || {
//!     for i in 0..3 {
//!         handle.post_fn(move || println!("item {i}")).unwrap();
//!     }
//! });
//! worker.join().unwrap();
//!
//! assert_eq!(context.process_pending(), 3);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};

use crate::error::{ContextError, Result};
use crate::invocation::QueuedInvocation;
use crate::logging::targets;

/// Message carried through the context queue.
enum ContextMessage {
    Invoke(QueuedInvocation),
    Quit,
}

/// The designated execution context that marshalled work is delivered on.
///
/// `MainContext` is deliberately `!Send`: it stays on the thread that created
/// it, and only that thread runs the queued work. Use [`handle`](Self::handle)
/// to obtain a sendable handle for producers.
pub struct MainContext {
    sender: Sender<ContextMessage>,
    receiver: Receiver<ContextMessage>,
    closed: Arc<AtomicBool>,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MainContext {
    /// Create a context bound to the current thread.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            closed: Arc::new(AtomicBool::new(false)),
            thread: std::thread::current().id(),
            _not_send: PhantomData,
        }
    }

    /// Get a handle that other threads can use to post work here.
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            sender: self.sender.clone(),
            closed: self.closed.clone(),
            thread: self.thread,
        }
    }

    /// Check whether the caller is running on this context's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread
    }

    /// Get the number of queued messages not yet processed.
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Run every invocation that is already queued, without blocking.
    ///
    /// Quit requests found in the queue are discarded. Returns the number of
    /// invocations executed.
    pub fn process_pending(&self) -> usize {
        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(ContextMessage::Invoke(invocation)) => {
                    invocation.execute();
                    executed += 1;
                }
                Ok(ContextMessage::Quit) => {
                    tracing::trace!(target: targets::CONTEXT, "discarding stale quit request");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if executed > 0 {
            tracing::trace!(target: targets::CONTEXT, executed, "processed pending invocations");
        }
        executed
    }

    /// Run queued invocations until `timeout` elapses or a quit request arrives.
    ///
    /// Returns the number of invocations executed.
    pub fn run_for(&self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut executed = 0;
        loop {
            match self.receiver.recv_deadline(deadline) {
                Ok(ContextMessage::Invoke(invocation)) => {
                    invocation.execute();
                    executed += 1;
                }
                Ok(ContextMessage::Quit) => {
                    tracing::debug!(target: targets::CONTEXT, "quit requested");
                    break;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        executed
    }

    /// Run queued invocations until `condition` holds, `timeout` elapses or a
    /// quit request arrives.
    ///
    /// The condition is checked before waiting and after every invocation.
    /// Returns the final value of the condition.
    pub fn run_until<F>(&self, mut condition: F, timeout: Duration) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        while !condition() {
            match self.receiver.recv_deadline(deadline) {
                Ok(ContextMessage::Invoke(invocation)) => invocation.execute(),
                Ok(ContextMessage::Quit) => {
                    tracing::debug!(target: targets::CONTEXT, "quit requested");
                    return condition();
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return condition();
                }
            }
        }
        true
    }
}

impl Drop for MainContext {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        let dropped = self.receiver.len();
        if dropped > 0 {
            tracing::warn!(target: targets::CONTEXT, dropped, "context dropped with queued work");
        }
    }
}

impl std::fmt::Debug for MainContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainContext")
            .field("thread", &self.thread)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// A cloneable, thread-safe handle for posting work to a [`MainContext`].
#[derive(Clone)]
pub struct ContextHandle {
    sender: Sender<ContextMessage>,
    closed: Arc<AtomicBool>,
    thread: ThreadId,
}

impl ContextHandle {
    /// Queue an invocation for execution on the context's thread.
    ///
    /// Returns [`ContextError::Closed`] if the context has been dropped; the
    /// invocation is dropped without running in that case.
    pub fn post(&self, invocation: QueuedInvocation) -> Result<()> {
        if self.is_closed() {
            return Err(ContextError::Closed);
        }
        self.sender
            .send(ContextMessage::Invoke(invocation))
            .map_err(|_| ContextError::Closed)
    }

    /// Queue a closure for execution on the context's thread.
    pub fn post_fn<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(QueuedInvocation::new(f))
    }

    /// Ask a running `run_for`/`run_until` loop to return.
    pub fn quit(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ContextError::Closed);
        }
        self.sender
            .send(ContextMessage::Quit)
            .map_err(|_| ContextError::Closed)
    }

    /// Check whether the owning context has been dropped.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Check whether the caller is running on the context's thread.
    pub fn is_current(&self) -> bool {
        std::thread::current().id() == self.thread
    }
}

impl std::fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("thread", &self.thread)
            .field("closed", &self.is_closed())
            .finish()
    }
}
