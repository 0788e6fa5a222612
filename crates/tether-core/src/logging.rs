//! Logging facilities for Tether.
//!
//! Tether uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("tether_net=debug")
//!         .init();
//! }
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Main context queue processing.
    pub const CONTEXT: &str = "tether_core::context";
    /// Connection state machine and public socket operations.
    pub const SOCKET: &str = "tether_net::socket";
    /// Background connect/receive loop.
    pub const WORKER: &str = "tether_net::worker";
    /// Event delivery to listeners.
    pub const DISPATCH: &str = "tether_net::dispatch";
    /// Binary stream buffer.
    pub const STREAM: &str = "tether_net::stream";
}

#[cfg(test)]
mod tests {
    use super::targets;

    #[test]
    fn test_targets_are_namespaced() {
        assert!(targets::CONTEXT.starts_with("tether_core::"));
        for target in [
            targets::SOCKET,
            targets::WORKER,
            targets::DISPATCH,
            targets::STREAM,
        ] {
            assert!(target.starts_with("tether_net::"));
        }
    }
}
