use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BatchReference, Sku, Version};
use domain::{Aggregate, Batch, OrderLine, Product};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{ProductRepository, ProductStore, Transaction},
};

/// SQLSTATE for a serialization failure.
const SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed product store.
///
/// Every transaction runs at REPEATABLE READ, so a transaction that writes a
/// product row another transaction changed after its snapshot fails instead
/// of overwriting it.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(PostgresTransaction { tx })
    }
}

/// Transaction over a [`PostgresProductStore`].
///
/// Dropping it without committing rolls the database transaction back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

/// Maps write failures caused by a racing transaction onto `ConcurrentUpdate`.
fn write_error(sku: &Sku) -> impl Fn(sqlx::Error) -> StoreError + '_ {
    move |err| {
        if let sqlx::Error::Database(ref db_err) = err
            && matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE | UNIQUE_VIOLATION)
            )
        {
            metrics::counter!("store_concurrent_updates_total", "store" => "postgres").increment(1);
            return StoreError::ConcurrentUpdate { sku: sku.clone() };
        }
        StoreError::Database(err)
    }
}

/// Like [`write_error`], except that a unique violation on a new batch means
/// its reference is already taken.
fn batch_insert_error<'a>(
    sku: &'a Sku,
    reference: &'a BatchReference,
) -> impl Fn(sqlx::Error) -> StoreError + 'a {
    move |err| {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
        {
            return StoreError::DuplicateBatch {
                reference: reference.clone(),
            };
        }
        write_error(sku)(err)
    }
}

fn quantity(row: &PgRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| StoreError::InvalidData(format!("{column} out of range: {value}")))
}

impl PostgresTransaction {
    async fn load(&mut self, sku: &str) -> Result<Option<Product>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version_number FROM products WHERE sku = $1")
                .bind(sku)
                .fetch_optional(&mut *self.tx)
                .await?;

        let Some(version) = version else {
            return Ok(None);
        };

        let allocation_rows = sqlx::query(
            r#"
            SELECT a.batch_reference, a.order_id, a.sku, a.qty
            FROM allocations a
            JOIN batches b ON b.reference = a.batch_reference
            WHERE b.sku = $1
            "#,
        )
        .bind(sku)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut allocations: HashMap<String, Vec<OrderLine>> = HashMap::new();
        for row in allocation_rows {
            let line = OrderLine::new(
                row.try_get::<String, _>("order_id")?,
                row.try_get::<String, _>("sku")?,
                quantity(&row, "qty")?,
            );
            allocations
                .entry(row.try_get("batch_reference")?)
                .or_default()
                .push(line);
        }

        let batch_rows = sqlx::query(
            r#"
            SELECT reference, sku, purchased_quantity, eta
            FROM batches
            WHERE sku = $1
            ORDER BY id ASC
            "#,
        )
        .bind(sku)
        .fetch_all(&mut *self.tx)
        .await?;

        let batches = batch_rows
            .iter()
            .map(|row| -> Result<Batch> {
                let reference: String = row.try_get("reference")?;
                let lines = allocations.remove(&reference).unwrap_or_default();
                Ok(Batch::restore(
                    reference,
                    row.try_get::<String, _>("sku")?,
                    quantity(row, "purchased_quantity")?,
                    row.try_get::<Option<NaiveDate>, _>("eta")?,
                    lines,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Product::restore(sku, batches, Version::new(version))))
    }

    /// Rewrites the batches and allocations of a product whose row this
    /// transaction already wrote.
    async fn write_batches(&mut self, product: &Product) -> Result<()> {
        let sku = product.sku();

        sqlx::query(
            r#"
            DELETE FROM allocations a
            USING batches b
            WHERE a.batch_reference = b.reference AND b.sku = $1
            "#,
        )
        .bind(sku.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(write_error(sku))?;

        let mut persisted: HashSet<String> =
            sqlx::query_scalar::<_, String>("SELECT reference FROM batches WHERE sku = $1")
                .bind(sku.as_str())
                .fetch_all(&mut *self.tx)
                .await?
                .into_iter()
                .collect();

        for batch in product.batches() {
            let reference = batch.reference();
            if persisted.remove(reference.as_str()) {
                sqlx::query(
                    r#"
                    UPDATE batches SET purchased_quantity = $2, eta = $3
                    WHERE reference = $1
                    "#,
                )
                .bind(reference.as_str())
                .bind(i64::from(batch.purchased_quantity()))
                .bind(batch.eta())
                .execute(&mut *self.tx)
                .await
                .map_err(write_error(sku))?;
            } else {
                sqlx::query(
                    r#"
                    INSERT INTO batches (reference, sku, purchased_quantity, eta)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(reference.as_str())
                .bind(batch.sku().as_str())
                .bind(i64::from(batch.purchased_quantity()))
                .bind(batch.eta())
                .execute(&mut *self.tx)
                .await
                .map_err(batch_insert_error(sku, reference))?;
            }

            for line in batch.allocations() {
                sqlx::query(
                    r#"
                    INSERT INTO allocations (batch_reference, order_id, sku, qty)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(batch.reference().as_str())
                .bind(line.order_id().as_str())
                .bind(line.sku().as_str())
                .bind(i64::from(line.qty()))
                .execute(&mut *self.tx)
                .await
                .map_err(write_error(sku))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ProductRepository for PostgresTransaction {
    async fn add(&mut self, product: &Product) -> Result<()> {
        let sku = product.sku();

        sqlx::query("INSERT INTO products (sku, version_number) VALUES ($1, $2)")
            .bind(sku.as_str())
            .bind(product.version().as_i64())
            .execute(&mut *self.tx)
            .await
            .map_err(write_error(sku))?;

        self.write_batches(product).await
    }

    async fn get(&mut self, sku: &Sku) -> Result<Option<Product>> {
        self.load(sku.as_str()).await
    }

    async fn get_by_batch_reference(
        &mut self,
        reference: &BatchReference,
    ) -> Result<Option<Product>> {
        let sku: Option<String> = sqlx::query_scalar("SELECT sku FROM batches WHERE reference = $1")
            .bind(reference.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        match sku {
            Some(sku) => self.load(&sku).await,
            None => Ok(None),
        }
    }

    async fn list(&mut self) -> Result<Vec<Product>> {
        let skus: Vec<String> = sqlx::query_scalar("SELECT sku FROM products ORDER BY sku ASC")
            .fetch_all(&mut *self.tx)
            .await?;

        let mut products = Vec::with_capacity(skus.len());
        for sku in skus {
            if let Some(product) = self.load(&sku).await? {
                products.push(product);
            }
        }
        Ok(products)
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn save(&mut self, product: &Product, expected: Version) -> Result<()> {
        let sku = product.sku();

        let updated = sqlx::query(
            r#"
            UPDATE products SET version_number = $1
            WHERE sku = $2 AND version_number = $3
            "#,
        )
        .bind(product.version().as_i64())
        .bind(sku.as_str())
        .bind(expected.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(write_error(sku))?;

        if updated.rows_affected() == 0 {
            tracing::warn!(%sku, %expected, "Product version moved on");
            metrics::counter!("store_concurrent_updates_total", "store" => "postgres").increment(1);
            return Err(StoreError::ConcurrentUpdate { sku: sku.clone() });
        }

        self.write_batches(product).await
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
