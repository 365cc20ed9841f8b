//! Service layer error types.

use common::{BatchReference, Sku};
use domain::{CommandKind, DomainError};
use product_store::StoreError;
use thiserror::Error;

/// Errors raised while handling messages.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The command referenced a sku with no product.
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    /// The command referenced a batch no product owns.
    #[error("Unknown batch {0}")]
    UnknownBatch(BatchReference),

    /// A batch with this reference already exists.
    #[error("Batch {0} already exists")]
    DuplicateBatch(BatchReference),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The unit of work scope was already committed or rolled back.
    #[error("Transaction already closed")]
    TransactionClosed,

    /// A notification could not be sent.
    #[error("Notification to {destination} failed: {reason}")]
    Notification { destination: String, reason: String },

    /// An event could not be published.
    #[error("Publishing to channel {channel} failed: {reason}")]
    Publish { channel: String, reason: String },

    /// A handler was given a message it does not handle.
    #[error("Handler {handler} cannot handle {message}")]
    UnexpectedMessage {
        handler: &'static str,
        message: &'static str,
    },

    /// No handler is registered for the command.
    #[error("No handler registered for command {0}")]
    UnhandledCommand(CommandKind),
}

impl ServiceError {
    /// Returns true if the failure was an optimistic concurrency conflict.
    pub fn is_concurrent_update(&self) -> bool {
        matches!(self, ServiceError::Store(err) if err.is_concurrent_update())
    }
}

/// Errors found while assembling a message bus.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusConfigError {
    /// Two handlers were registered for one command.
    #[error("Command {kind} already handled by {existing}, cannot also register {duplicate}")]
    DuplicateCommandHandler {
        kind: CommandKind,
        existing: &'static str,
        duplicate: &'static str,
    },

    /// A command has no handler.
    #[error("No handler registered for command {0}")]
    MissingCommandHandler(CommandKind),
}

/// Convenience type alias for service results.
pub type Result<T> = std::result::Result<T, ServiceError>;
