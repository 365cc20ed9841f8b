use common::{BatchReference, Sku};
use thiserror::Error;

/// Errors that can occur when interacting with a product store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another transaction changed the product after this one read it.
    #[error("Concurrent update of product {sku}")]
    ConcurrentUpdate { sku: Sku },

    /// The batch reference is already taken by a persisted batch.
    #[error("Batch {reference} already exists")]
    DuplicateBatch { reference: BatchReference },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A persisted row could not be mapped back onto the domain model.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Returns true if this is an optimistic concurrency conflict.
    pub fn is_concurrent_update(&self) -> bool {
        matches!(self, StoreError::ConcurrentUpdate { .. })
    }
}

/// Result type for product store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
