//! Domain error types.

use common::{BatchReference, Sku};
use thiserror::Error;

/// Structural misuse of the domain model.
///
/// Business outcomes such as running out of stock are never errors; they are
/// recorded as events on the aggregate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The batch reference does not belong to the product.
    #[error("Batch {reference} does not belong to product {sku}")]
    UnknownBatch { sku: Sku, reference: BatchReference },
}
