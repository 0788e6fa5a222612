//! Delivery of socket events to the listener.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tether_core::logging::targets;

use super::config::CallbackMode;
use super::event::{SocketEvent, SocketListener};
use super::socket::SocketHandle;

/// Delivers the events of one worker, in the order they are dispatched.
///
/// Inline delivery runs the listener on the calling (worker) thread.
/// Marshalled delivery posts each event to the target context, whose queue
/// preserves the order events were posted in.
pub(crate) struct Dispatcher {
    socket: SocketHandle,
    listener: Option<Arc<dyn SocketListener>>,
    mode: CallbackMode,
}

impl Dispatcher {
    pub(crate) fn new(
        socket: SocketHandle,
        listener: Option<Arc<dyn SocketListener>>,
        mode: CallbackMode,
    ) -> Self {
        Self {
            socket,
            listener,
            mode,
        }
    }

    /// Deliver one event.
    pub(crate) fn dispatch(&self, event: SocketEvent) {
        let Some(listener) = &self.listener else {
            tracing::trace!(
                target: targets::DISPATCH,
                id = self.socket.id(),
                event = event.name(),
                "no listener, dropping event"
            );
            return;
        };

        match &self.mode {
            CallbackMode::Inline => deliver(listener.as_ref(), &self.socket, &event),
            CallbackMode::Marshalled(context) => {
                let name = event.name();
                let listener = listener.clone();
                let socket = self.socket.clone();
                let posted =
                    context.post_fn(move || deliver(listener.as_ref(), &socket, &event));
                if posted.is_err() {
                    tracing::warn!(
                        target: targets::DISPATCH,
                        id = self.socket.id(),
                        event = name,
                        "target context is closed, dropping event"
                    );
                }
            }
        }
    }
}

/// Invoke the listener, containing any panic so the worker can still make
/// its terminal transition.
fn deliver(listener: &dyn SocketListener, socket: &SocketHandle, event: &SocketEvent) {
    let result = catch_unwind(AssertUnwindSafe(|| listener.on_event(socket, event)));
    if result.is_err() {
        tracing::error!(
            target: targets::DISPATCH,
            id = socket.id(),
            event = event.name(),
            "listener panicked"
        );
    }
}
