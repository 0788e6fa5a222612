//! Queued invocations for cross-thread delivery.
//!
//! A [`QueuedInvocation`] captures a closure together with everything it needs
//! so that it can be handed to another execution context and run there later.
//! The [`MainContext`](crate::MainContext) queue carries these.

/// A type-erased queued invocation that can be executed later.
pub struct QueuedInvocation {
    invoke: Box<dyn FnOnce() + Send>,
}

impl QueuedInvocation {
    /// Create a new queued invocation.
    pub fn new<F>(invoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            invoke: Box::new(invoke),
        }
    }

    /// Execute the invocation, consuming it.
    pub fn execute(self) {
        (self.invoke)();
    }
}

impl std::fmt::Debug for QueuedInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedInvocation").finish_non_exhaustive()
    }
}
