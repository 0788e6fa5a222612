//! Error types for Tether core.

/// Errors raised when handing work to an execution context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The target context has been dropped and no longer accepts work.
    #[error("The target context has been closed")]
    Closed,
}

/// A specialized Result type for Tether core operations.
pub type Result<T> = std::result::Result<T, ContextError>;
