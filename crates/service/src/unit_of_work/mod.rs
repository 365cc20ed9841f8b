//! Transactional boundary around product access.
//!
//! A [`UnitOfWork`] opens [`Scope`]s. A scope owns one store transaction and
//! tracks every product it handed out, so that commit knows what to write and
//! [`Scope::collect_new_events`] knows whose events to drain.

mod fake;
mod store;

use async_trait::async_trait;
use common::{BatchReference, Sku, Version};
use domain::{Aggregate, Event, Product};
use product_store::Transaction;

use crate::error::{Result, ServiceError};

pub use fake::{FakeTransaction, FakeUnitOfWork};
pub use store::StoreUnitOfWork;

/// Source of transactional scopes.
#[async_trait]
pub trait UnitOfWork: Send + Sync + 'static {
    /// The store transaction each scope wraps.
    type Transaction: Transaction + 'static;

    /// Opens a new scope with its own transaction.
    async fn begin(&self) -> Result<Scope<Self::Transaction>>;
}

/// Index of a product tracked by a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ProductHandle(usize);

#[derive(Debug)]
struct Tracked {
    product: Product,
    /// Version when loaded, or `None` if the product was added in this scope.
    loaded: Option<Version>,
}

/// Products handed out by one scope.
///
/// Entries are addressed by index and never removed, so a handle
/// stays valid for the life of the scope.
#[derive(Debug, Default)]
pub struct SeenProducts {
    tracked: Vec<Tracked>,
}

impl SeenProducts {
    fn register(&mut self, product: Product, loaded: Option<Version>) -> ProductHandle {
        self.tracked.push(Tracked { product, loaded });
        ProductHandle(self.tracked.len() - 1)
    }

    fn find(&self, sku: &Sku) -> Option<ProductHandle> {
        self.tracked
            .iter()
            .position(|tracked| tracked.product.sku() == sku)
            .map(ProductHandle)
    }

    fn find_by_batch_reference(&self, reference: &BatchReference) -> Option<ProductHandle> {
        self.tracked
            .iter()
            .position(|tracked| tracked.product.has_batch(reference))
            .map(ProductHandle)
    }

    /// Returns the tracked product behind a handle.
    fn get(&self, handle: ProductHandle) -> &Product {
        &self.tracked[handle.0].product
    }

    /// Returns the tracked product behind a handle, mutably.
    fn get_mut(&mut self, handle: ProductHandle) -> &mut Product {
        &mut self.tracked[handle.0].product
    }

    /// Returns the number of tracked products.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    /// Returns true if no product has been tracked yet.
    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    fn drain_events(&mut self) -> Vec<Event> {
        self.tracked
            .iter_mut()
            .flat_map(|tracked| tracked.product.take_events())
            .collect()
    }
}

/// One transactional scope.
///
/// Nothing is persisted unless [`commit`](Scope::commit) succeeds. Dropping
/// an open scope rolls its transaction back.
pub struct Scope<T: Transaction> {
    tx: Option<T>,
    seen: SeenProducts,
}

impl<T: Transaction> Scope<T> {
    /// Wraps an open store transaction.
    pub fn new(tx: T) -> Self {
        Self {
            tx: Some(tx),
            seen: SeenProducts::default(),
        }
    }

    /// Returns the repository view bound to this scope.
    pub fn products(&mut self) -> Products<'_, T> {
        Products {
            tx: self.tx.as_mut(),
            seen: &mut self.seen,
        }
    }

    /// Returns the products this scope has handed out.
    pub fn seen(&self) -> &SeenProducts {
        &self.seen
    }

    /// Returns true until the scope commits or rolls back.
    pub fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    /// Writes every changed product and commits the transaction.
    ///
    /// Products are saved against the version they were loaded at. On any
    /// failure the transaction is rolled back and the scope is closed.
    pub async fn commit(&mut self) -> Result<()> {
        let mut tx = self.tx.take().ok_or(ServiceError::TransactionClosed)?;

        if let Err(err) = Self::write_tracked(&mut tx, &self.seen).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "Rollback after failed write also failed");
            }
            return Err(err);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn write_tracked(tx: &mut T, seen: &SeenProducts) -> Result<()> {
        for tracked in &seen.tracked {
            match tracked.loaded {
                None => tx.add(&tracked.product).await?,
                Some(expected) if tracked.product.has_changes() => {
                    tx.save(&tracked.product, expected).await?
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Discards the transaction. Calling it again is a no-op.
    pub async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }

    /// Takes every event buffered on the tracked products.
    ///
    /// An open transaction is rolled back first, so events are only ever
    /// handed on once the outcome of the scope is settled. Each event is
    /// returned once.
    pub async fn collect_new_events(&mut self) -> Result<Vec<Event>> {
        self.rollback().await?;
        Ok(self.seen.drain_events())
    }
}

impl<T: Transaction> Drop for Scope<T> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::debug!(tracked = self.seen.len(), "Scope dropped without commit");
        }
    }
}

/// Repository bound to a scope.
///
/// Consults the scope's tracked products before the store, so a product is
/// loaded at most once per scope and every lookup sees earlier changes.
pub struct Products<'a, T> {
    tx: Option<&'a mut T>,
    seen: &'a mut SeenProducts,
}

impl<'a, T: Transaction> Products<'a, T> {
    fn tx(&mut self) -> Result<&mut T> {
        self.tx.as_deref_mut().ok_or(ServiceError::TransactionClosed)
    }

    /// Tracks a new product; it is inserted on commit.
    pub async fn add(mut self, product: Product) -> Result<&'a mut Product> {
        self.tx()?;
        let seen = self.seen;
        let handle = seen.register(product, None);
        Ok(seen.get_mut(handle))
    }

    /// Loads the product with the given sku.
    pub async fn get(mut self, sku: &Sku) -> Result<Option<&'a mut Product>> {
        let handle = match self.seen.find(sku) {
            Some(handle) => Some(handle),
            None => {
                let product = self.tx()?.get(sku).await?;
                self.load(product)
            }
        };
        Ok(self.into_product(handle))
    }

    /// Loads the product owning the referenced batch.
    pub async fn get_by_batch_reference(
        mut self,
        reference: &BatchReference,
    ) -> Result<Option<&'a mut Product>> {
        let handle = match self.seen.find_by_batch_reference(reference) {
            Some(handle) => Some(handle),
            None => {
                let product = self.tx()?.get_by_batch_reference(reference).await?;
                self.load(product)
            }
        };
        Ok(self.into_product(handle))
    }

    /// Loads the product with the given sku, or tracks the one `create`
    /// builds if the store has none.
    pub async fn get_or_add(
        mut self,
        sku: &Sku,
        create: impl FnOnce() -> Product + Send,
    ) -> Result<&'a mut Product> {
        let handle = match self.seen.find(sku) {
            Some(handle) => handle,
            None => {
                let product = self.tx()?.get(sku).await?;
                match self.load(product) {
                    Some(handle) => handle,
                    None => self.seen.register(create(), None),
                }
            }
        };
        let seen = self.seen;
        Ok(seen.get_mut(handle))
    }

    /// Loads every product, ordered by sku.
    pub async fn list(mut self) -> Result<Vec<&'a Product>> {
        let stored = self.tx()?.list().await?;

        let mut handles = Vec::with_capacity(stored.len());
        for product in stored {
            let handle = match self.seen.find(product.sku()) {
                Some(handle) => handle,
                None => {
                    let version = product.version();
                    self.seen.register(product, Some(version))
                }
            };
            handles.push(handle);
        }
        for (index, tracked) in self.seen.tracked.iter().enumerate() {
            if tracked.loaded.is_none() && !handles.contains(&ProductHandle(index)) {
                handles.push(ProductHandle(index));
            }
        }

        let seen: &'a SeenProducts = self.seen;
        let mut products: Vec<&'a Product> = handles.into_iter().map(move |h| seen.get(h)).collect();
        products.sort_by(|a, b| a.sku().cmp(b.sku()));
        Ok(products)
    }

    fn into_product(self, handle: Option<ProductHandle>) -> Option<&'a mut Product> {
        let seen = self.seen;
        match handle {
            Some(handle) => Some(seen.get_mut(handle)),
            None => None,
        }
    }

    fn load(&mut self, product: Option<Product>) -> Option<ProductHandle> {
        product.map(|product| {
            let version = product.version();
            self.seen.register(product, Some(version))
        })
    }
}
