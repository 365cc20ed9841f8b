use async_trait::async_trait;
use common::{BatchReference, Sku, Version};
use domain::Product;

use crate::Result;

/// Key-to-aggregate access to products.
///
/// Lookups return owned snapshots. A missing product is `Ok(None)`; errors
/// are reserved for the store itself failing.
#[async_trait]
pub trait ProductRepository: Send {
    /// Stages a new product for insertion.
    ///
    /// Fails with `ConcurrentUpdate` on commit if the sku already exists.
    async fn add(&mut self, product: &Product) -> Result<()>;

    /// Loads the product with the given sku.
    async fn get(&mut self, sku: &Sku) -> Result<Option<Product>>;

    /// Loads the product owning the batch with the given reference.
    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<Product>>;

    /// Loads every product, ordered by sku.
    async fn list(&mut self) -> Result<Vec<Product>>;
}

/// One atomic unit of reads and writes against a store.
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait Transaction: ProductRepository + Sized {
    /// Stages the full state of an existing product.
    ///
    /// `expected` is the version the product had when this transaction loaded
    /// it. The write is refused if the stored product moved on since.
    async fn save(&mut self, product: &Product, expected: Version) -> Result<()>;

    /// Applies every staged write atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every staged write.
    async fn rollback(self) -> Result<()>;
}

/// A transactional product store.
#[async_trait]
pub trait ProductStore: Clone + Send + Sync + 'static {
    /// The transaction type this store hands out.
    type Transaction: Transaction + 'static;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;
}
