use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchReference, Sku, Version};
use domain::{Aggregate, Product};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{ProductRepository, ProductStore, Transaction},
};

/// A committed product with a store-private revision.
///
/// The revision advances on every committed write, including writes that do
/// not move the product version, so transactions can detect any intervening
/// commit.
#[derive(Debug, Clone)]
struct Stored {
    product: Product,
    revision: u64,
}

type Products = Arc<RwLock<BTreeMap<Sku, Stored>>>;

/// In-memory product store for tests and database-less runs.
///
/// Transactions read committed state, stage their writes and validate every
/// product they write against what they read when they commit.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Products,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory product store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns a committed product without opening a transaction.
    pub async fn snapshot(&self, sku: &Sku) -> Option<Product> {
        self.products
            .read()
            .await
            .get(sku)
            .map(|stored| stored.product.clone())
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            products: Arc::clone(&self.products),
            reads: HashMap::new(),
            staged: BTreeMap::new(),
        })
    }
}

#[derive(Debug)]
enum Staged {
    Insert(Product),
    Update { product: Product, expected: Version },
}

impl Staged {
    fn product(&self) -> &Product {
        match self {
            Staged::Insert(product) | Staged::Update { product, .. } => product,
        }
    }
}

/// Transaction over an [`InMemoryProductStore`].
pub struct InMemoryTransaction {
    products: Products,
    reads: HashMap<Sku, u64>,
    staged: BTreeMap<Sku, Staged>,
}

/// Strips buffered events and change tracking from a product.
fn persisted(product: &Product) -> Product {
    Product::restore(
        product.sku().clone(),
        product.batches().to_vec(),
        product.version(),
    )
}

impl InMemoryTransaction {
    fn read(&mut self, sku: &Sku, committed: &BTreeMap<Sku, Stored>) -> Option<Product> {
        if let Some(staged) = self.staged.get(sku) {
            return Some(persisted(staged.product()));
        }
        let stored = committed.get(sku)?;
        self.reads.entry(sku.clone()).or_insert(stored.revision);
        Some(stored.product.clone())
    }

    fn validate(&self, sku: &Sku, staged: &Staged, committed: &BTreeMap<Sku, Stored>) -> Result<()> {
        let conflict = || {
            metrics::counter!("store_concurrent_updates_total", "store" => "memory").increment(1);
            StoreError::ConcurrentUpdate { sku: sku.clone() }
        };
        match (staged, committed.get(sku)) {
            (Staged::Insert(_), None) => {}
            (Staged::Insert(_), Some(_)) => return Err(conflict()),
            (Staged::Update { .. }, None) => return Err(conflict()),
            (Staged::Update { expected, .. }, Some(stored)) => {
                let revision_moved = self
                    .reads
                    .get(sku)
                    .is_some_and(|&revision| revision != stored.revision);
                if revision_moved || stored.product.version() != *expected {
                    return Err(conflict());
                }
            }
        }
        self.check_references(sku, staged.product(), committed)
    }

    /// Batch references are unique across the whole store.
    fn check_references(
        &self,
        sku: &Sku,
        product: &Product,
        committed: &BTreeMap<Sku, Stored>,
    ) -> Result<()> {
        let mut references = HashSet::new();
        for batch in product.batches() {
            let reference = batch.reference();
            let taken = !references.insert(reference)
                || committed
                    .iter()
                    .any(|(other, stored)| other != sku && stored.product.has_batch(reference))
                || self
                    .staged
                    .iter()
                    .any(|(other, staged)| other != sku && staged.product().has_batch(reference));
            if taken {
                return Err(StoreError::DuplicateBatch {
                    reference: reference.clone(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryTransaction {
    async fn add(&mut self, product: &Product) -> Result<()> {
        self.staged
            .insert(product.sku().clone(), Staged::Insert(persisted(product)));
        Ok(())
    }

    async fn get(&mut self, sku: &Sku) -> Result<Option<Product>> {
        let products = Arc::clone(&self.products);
        let committed = products.read().await;
        Ok(self.read(sku, &committed))
    }

    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<Product>> {
        let products = Arc::clone(&self.products);
        let committed = products.read().await;

        let owner = self
            .staged
            .values()
            .map(Staged::product)
            .chain(committed.values().map(|stored| &stored.product))
            .find(|product| product.has_batch(reference))
            .map(|product| product.sku().clone());

        Ok(owner.and_then(|sku| self.read(&sku, &committed)))
    }

    async fn list(&mut self) -> Result<Vec<Product>> {
        let products = Arc::clone(&self.products);
        let committed = products.read().await;

        let mut skus: Vec<Sku> = committed.keys().cloned().collect();
        skus.extend(
            self.staged
                .keys()
                .filter(|sku| !committed.contains_key(*sku))
                .cloned(),
        );
        skus.sort();

        Ok(skus
            .iter()
            .filter_map(|sku| self.read(sku, &committed))
            .collect())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn save(&mut self, product: &Product, expected: Version) -> Result<()> {
        let sku = product.sku().clone();
        let staged = match self.staged.remove(&sku) {
            // A product added in this transaction is still an insert.
            Some(Staged::Insert(_)) => Staged::Insert(persisted(product)),
            _ => Staged::Update {
                product: persisted(product),
                expected,
            },
        };
        self.staged.insert(sku, staged);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let mut committed = self.products.write().await;

        for (sku, staged) in &self.staged {
            if let Err(err) = self.validate(sku, staged, &committed) {
                tracing::warn!(%sku, error = %err, "Rejected write");
                return Err(err);
            }
        }

        for (sku, staged) in self.staged {
            let revision = committed.get(&sku).map_or(0, |stored| stored.revision + 1);
            let product = match staged {
                Staged::Insert(product) | Staged::Update { product, .. } => product,
            };
            committed.insert(sku, Stored { product, revision });
        }

        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
