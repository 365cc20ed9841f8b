use async_trait::async_trait;
use product_store::ProductStore;

use super::{Scope, UnitOfWork};
use crate::error::Result;

/// Unit of work backed by a transactional [`ProductStore`].
#[derive(Clone)]
pub struct StoreUnitOfWork<S> {
    store: S,
}

impl<S: ProductStore> StoreUnitOfWork<S> {
    /// Creates a unit of work over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: ProductStore> UnitOfWork for StoreUnitOfWork<S> {
    type Transaction = S::Transaction;

    async fn begin(&self) -> Result<Scope<S::Transaction>> {
        Ok(Scope::new(self.store.begin().await?))
    }
}
