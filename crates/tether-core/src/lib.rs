//! Core systems for Tether.
//!
//! This crate provides the execution-context plumbing the networking crate
//! builds on:
//!
//! - **Main Context**: A designated execution context that other threads can
//!   hand work to through a thread-safe FIFO queue
//! - **Queued Invocations**: Type-erased closures carried through that queue
//! - **Logging**: `tracing` target names used across the workspace
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tether_core::MainContext;
//!
//! let context = MainContext::new();
//! let handle = context.handle();
//!
//! std::thread::spawn(move || {
//!     handle.post_fn(|| println!("runs on the main context"))?;
//!     handle.quit()
//! });
//!
//! // Drain posted work until the quit request arrives.
//! context.run_for(Duration::from_secs(1));
//! ```

mod context;
mod error;
pub mod invocation;
pub mod logging;

pub use context::{ContextHandle, MainContext};
pub use error::{ContextError, Result};
pub use invocation::QueuedInvocation;
