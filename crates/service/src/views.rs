//! Read-only queries over committed allocations.

use common::{BatchReference, OrderId, Sku};
use domain::Product;
use serde::Serialize;

use crate::error::Result;
use crate::unit_of_work::UnitOfWork;

/// One order line allocated to one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationView {
    pub order_id: OrderId,
    pub sku: Sku,
    pub batch_reference: BatchReference,
    pub qty: u32,
}

fn views_of<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<AllocationView> {
    products
        .into_iter()
        .flat_map(|product| product.batches())
        .flat_map(|batch| {
            batch.allocations().map(move |line| AllocationView {
                order_id: line.order_id().clone(),
                sku: line.sku().clone(),
                batch_reference: batch.reference().clone(),
                qty: line.qty(),
            })
        })
        .collect()
}

/// Returns the allocations of one order.
#[tracing::instrument(skip(uow))]
pub async fn allocations<U: UnitOfWork>(order_id: &OrderId, uow: &U) -> Result<Vec<AllocationView>> {
    let mut all = all_allocations(uow).await?;
    all.retain(|view| &view.order_id == order_id);
    Ok(all)
}

/// Returns every allocation, grouped by product.
pub async fn all_allocations<U: UnitOfWork>(uow: &U) -> Result<Vec<AllocationView>> {
    let mut scope = uow.begin().await?;
    let views = views_of(scope.products().list().await?);
    scope.rollback().await?;
    Ok(views)
}
