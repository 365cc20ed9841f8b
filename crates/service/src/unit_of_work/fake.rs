use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{BatchReference, Sku, Version};
use domain::{Aggregate, Product};
use product_store::{ProductRepository, Transaction};
use tokio::sync::Mutex;

use super::{Scope, UnitOfWork};
use crate::error::Result;

type Products = Arc<Mutex<BTreeMap<Sku, Product>>>;

/// In-memory unit of work for deterministic tests.
///
/// Commits apply unconditionally, so it never reports a concurrent update.
/// It records whether any scope ever committed.
#[derive(Clone, Default)]
pub struct FakeUnitOfWork {
    products: Products,
    committed: Arc<AtomicBool>,
}

impl FakeUnitOfWork {
    /// Creates an empty fake unit of work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once any scope has committed.
    pub fn committed(&self) -> bool {
        self.committed.load(Ordering::SeqCst)
    }

    /// Returns the committed state of a product.
    pub async fn product(&self, sku: &Sku) -> Option<Product> {
        self.products.lock().await.get(sku).cloned()
    }
}

#[async_trait]
impl UnitOfWork for FakeUnitOfWork {
    type Transaction = FakeTransaction;

    async fn begin(&self) -> Result<Scope<FakeTransaction>> {
        Ok(Scope::new(FakeTransaction {
            products: Arc::clone(&self.products),
            committed: Arc::clone(&self.committed),
            staged: Vec::new(),
        }))
    }
}

/// Transaction handed out by [`FakeUnitOfWork`].
pub struct FakeTransaction {
    products: Products,
    committed: Arc<AtomicBool>,
    staged: Vec<Product>,
}

fn persisted(product: &Product) -> Product {
    Product::restore(
        product.sku().clone(),
        product.batches().to_vec(),
        product.version(),
    )
}

#[async_trait]
impl ProductRepository for FakeTransaction {
    async fn add(&mut self, product: &Product) -> product_store::Result<()> {
        self.staged.push(persisted(product));
        Ok(())
    }

    async fn get(&mut self, sku: &Sku) -> product_store::Result<Option<Product>> {
        Ok(self.products.lock().await.get(sku).cloned())
    }

    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchReference,
    ) -> product_store::Result<Option<Product>> {
        Ok(self
            .products
            .lock()
            .await
            .values()
            .find(|product| product.has_batch(reference))
            .cloned())
    }

    async fn list(&mut self) -> product_store::Result<Vec<Product>> {
        Ok(self.products.lock().await.values().cloned().collect())
    }
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn save(&mut self, product: &Product, _expected: Version) -> product_store::Result<()> {
        self.staged.push(persisted(product));
        Ok(())
    }

    async fn commit(self) -> product_store::Result<()> {
        let mut products = self.products.lock().await;
        for product in self.staged {
            products.insert(product.sku().clone(), product);
        }
        self.committed.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self) -> product_store::Result<()> {
        Ok(())
    }
}
